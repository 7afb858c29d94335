//! The send/retry loop.
//!
//! Each message goes through the same cycle: submit to the producer, wait
//! for the outcome, and on failure consult the classifier. Retriable causes
//! are retried after a backoff pause until the configured retry budget runs
//! out; anything else ends the message after a single attempt.
//!
//! | state           | on                      | next                                   |
//! |-----------------|-------------------------|----------------------------------------|
//! | attempting      | ack                     | [`SendOutcome::Success`]               |
//! | attempting      | fatal cause             | [`SendOutcome::FatalFailure`]          |
//! | attempting      | retriable, budget left  | backoff, then attempting               |
//! | attempting      | retriable, budget spent | [`SendOutcome::RetriesExhausted`]      |

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::kafka::failure::{classify, Retriability, SendError};
use crate::kafka::message::ResolvedMessage;
use crate::kafka::producer::MessageProducer;

/// How many times a message is re-sent after a retriable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retries {
    Unbounded,
    /// `Limited(0)` means a single attempt.
    Limited(u32),
}

impl Retries {
    /// Whether the `retry`-th retry (1-based) may still run.
    pub fn allows(&self, retry: u32) -> bool {
        match self {
            Retries::Unbounded => true,
            Retries::Limited(max) => retry <= *max,
        }
    }
}

impl fmt::Display for Retries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Retries::Unbounded => f.write_str("unbounded"),
            Retries::Limited(n) => write!(f, "{}", n),
        }
    }
}

/// Pause between attempts.
pub trait BackoffPolicy: Send + Sync {
    /// Delay before the `retry`-th retry (1-based).
    fn backoff(&self, retry: u32) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl BackoffPolicy for FixedBackoff {
    fn backoff(&self, _retry: u32) -> Duration {
        self.delay
    }
}

/// Doubling delay, starting at `base` and capped at `max`. No jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl BackoffPolicy for ExponentialBackoff {
    fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        self.base.saturating_mul(1 << exponent).min(self.max)
    }
}

/// Suspends the sending task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Terminal result of sending one message.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Success { attempts: u32 },
    FatalFailure { cause: SendError, attempts: u32 },
    RetriesExhausted { last_error: SendError, attempts: u32 },
}

impl SendOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            SendOutcome::Success { attempts }
            | SendOutcome::FatalFailure { attempts, .. }
            | SendOutcome::RetriesExhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Success { .. })
    }
}

pub struct RetrySender {
    retries: Retries,
    backoff: Box<dyn BackoffPolicy>,
    sleeper: Arc<dyn Sleeper>,
}

impl RetrySender {
    pub fn new(retries: Retries, backoff: Box<dyn BackoffPolicy>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            retries,
            backoff,
            sleeper,
        }
    }

    pub fn retries(&self) -> Retries {
        self.retries
    }

    /// Sends `message` until it is acknowledged, fails fatally or runs out
    /// of retries. Never returns early on a retriable failure.
    #[instrument(skip_all, fields(topic = %message.topic))]
    pub async fn send(&self, message: &ResolvedMessage, producer: &dyn MessageProducer) -> SendOutcome {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            let err = match producer.send(message).await {
                Ok(()) => {
                    if attempts > 1 {
                        debug!("Message sent successfully after {} attempts", attempts);
                    }
                    return SendOutcome::Success { attempts };
                }
                Err(err) => err,
            };

            match classify(&err) {
                Retriability::Fatal => {
                    error!(
                        cause = %err.cause,
                        attempts,
                        "Non-retriable send failure: {}", err
                    );
                    return SendOutcome::FatalFailure { cause: err, attempts };
                }
                Retriability::Retriable => {
                    let retry = attempts;
                    if !self.retries.allows(retry) {
                        error!(
                            cause = %err.cause,
                            attempts,
                            retries = %self.retries,
                            "Exhausted retries: {}", err
                        );
                        return SendOutcome::RetriesExhausted { last_error: err, attempts };
                    }

                    let backoff = self.backoff.backoff(retry);
                    warn!(
                        cause = %err.cause,
                        "Send failed (retry {}/{}), retrying in {:?}: {}",
                        retry, self.retries, backoff, err
                    );
                    self.sleeper.sleep(backoff).await;
                }
            }
        }
    }
}
