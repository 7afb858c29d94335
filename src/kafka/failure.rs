//! Classification of producer failures.
//!
//! The producer reports failures in two ways: the enqueue call can fail
//! immediately, or the delivery future can resolve with an error. Both are
//! folded into a single [`SendError`] whose [`FailureCause`] decides whether
//! the retry engine tries again.

use rdkafka::error::KafkaError;
use rdkafka::types::RDKafkaErrorCode;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retriability {
    Retriable,
    Fatal,
}

/// What went wrong with a send, independent of how the client reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    Timeout,
    Disconnected,
    CoordinatorUnavailable,
    Interrupted,
    NotLeader,
    /// The partition exists but cannot take writes right now.
    PartitionUnavailable,
    QueueFull,
    Serialization,
    RecordTooLarge,
    InvalidTopic,
    Authorization,
    Other,
}

impl FailureCause {
    pub fn retriability(&self) -> Retriability {
        match self {
            FailureCause::Timeout
            | FailureCause::Disconnected
            | FailureCause::CoordinatorUnavailable
            | FailureCause::Interrupted
            | FailureCause::NotLeader
            | FailureCause::PartitionUnavailable
            | FailureCause::QueueFull => Retriability::Retriable,
            FailureCause::Serialization
            | FailureCause::RecordTooLarge
            | FailureCause::InvalidTopic
            | FailureCause::Authorization
            | FailureCause::Other => Retriability::Fatal,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FailureCause::Timeout => "timeout",
            FailureCause::Disconnected => "disconnected",
            FailureCause::CoordinatorUnavailable => "coordinator unavailable",
            FailureCause::Interrupted => "interrupted",
            FailureCause::NotLeader => "not leader",
            FailureCause::PartitionUnavailable => "partition unavailable",
            FailureCause::QueueFull => "queue full",
            FailureCause::Serialization => "serialization",
            FailureCause::RecordTooLarge => "record too large",
            FailureCause::InvalidTopic => "invalid topic",
            FailureCause::Authorization => "authorization",
            FailureCause::Other => "other",
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RDKafkaErrorCode> for FailureCause {
    fn from(code: RDKafkaErrorCode) -> Self {
        match code {
            RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::OperationTimedOut => FailureCause::Timeout,
            RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::BrokerNotAvailable
            | RDKafkaErrorCode::Resolve => FailureCause::Disconnected,
            RDKafkaErrorCode::CoordinatorNotAvailable
            | RDKafkaErrorCode::CoordinatorLoadInProgress
            | RDKafkaErrorCode::NotCoordinator => FailureCause::CoordinatorUnavailable,
            RDKafkaErrorCode::Interrupted => FailureCause::Interrupted,
            RDKafkaErrorCode::NotLeaderForPartition
            | RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NotEnoughReplicas
            | RDKafkaErrorCode::NotEnoughReplicasAfterAppend => FailureCause::NotLeader,
            // metadata not yet propagated, or a log directory is offline
            RDKafkaErrorCode::UnknownTopicOrPartition | RDKafkaErrorCode::KafkaStorageError => {
                FailureCause::PartitionUnavailable
            }
            RDKafkaErrorCode::QueueFull => FailureCause::QueueFull,
            RDKafkaErrorCode::KeySerialization | RDKafkaErrorCode::ValueSerialization => {
                FailureCause::Serialization
            }
            RDKafkaErrorCode::MessageSizeTooLarge | RDKafkaErrorCode::InvalidMessageSize => {
                FailureCause::RecordTooLarge
            }
            RDKafkaErrorCode::InvalidTopic | RDKafkaErrorCode::UnknownTopic => {
                FailureCause::InvalidTopic
            }
            RDKafkaErrorCode::TopicAuthorizationFailed | RDKafkaErrorCode::Authentication => {
                FailureCause::Authorization
            }
            _ => FailureCause::Other,
        }
    }
}

impl From<&KafkaError> for FailureCause {
    fn from(error: &KafkaError) -> Self {
        match error {
            KafkaError::Canceled => FailureCause::Interrupted,
            other => other
                .rdkafka_error_code()
                .map(FailureCause::from)
                .unwrap_or(FailureCause::Other),
        }
    }
}

/// A failed send attempt.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{cause}: {detail}")]
pub struct SendError {
    pub cause: FailureCause,
    pub detail: String,
}

impl SendError {
    pub fn new(cause: FailureCause, detail: impl Into<String>) -> Self {
        Self {
            cause,
            detail: detail.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        classify(self) == Retriability::Retriable
    }
}

impl From<KafkaError> for SendError {
    fn from(error: KafkaError) -> Self {
        Self::new(FailureCause::from(&error), error.to_string())
    }
}

pub fn classify(error: &SendError) -> Retriability {
    error.cause.retriability()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_codes_are_retriable() {
        for code in [
            RDKafkaErrorCode::MessageTimedOut,
            RDKafkaErrorCode::RequestTimedOut,
            RDKafkaErrorCode::BrokerTransportFailure,
            RDKafkaErrorCode::AllBrokersDown,
            RDKafkaErrorCode::CoordinatorNotAvailable,
            RDKafkaErrorCode::NotLeaderForPartition,
            RDKafkaErrorCode::QueueFull,
            RDKafkaErrorCode::Interrupted,
        ] {
            let error = SendError::from(KafkaError::MessageProduction(code));
            assert_eq!(classify(&error), Retriability::Retriable, "{:?}", code);
        }
    }

    #[test]
    fn test_permanent_codes_are_fatal() {
        for code in [
            RDKafkaErrorCode::ValueSerialization,
            RDKafkaErrorCode::MessageSizeTooLarge,
            RDKafkaErrorCode::InvalidTopic,
            RDKafkaErrorCode::UnknownTopic,
            RDKafkaErrorCode::TopicAuthorizationFailed,
        ] {
            let error = SendError::from(KafkaError::MessageProduction(code));
            assert_eq!(classify(&error), Retriability::Fatal, "{:?}", code);
        }
    }

    #[test]
    fn test_broker_side_unavailability_is_retriable() {
        for (code, cause) in [
            (
                RDKafkaErrorCode::UnknownTopicOrPartition,
                FailureCause::PartitionUnavailable,
            ),
            (
                RDKafkaErrorCode::KafkaStorageError,
                FailureCause::PartitionUnavailable,
            ),
            (RDKafkaErrorCode::BrokerNotAvailable, FailureCause::Disconnected),
        ] {
            let error = SendError::from(KafkaError::MessageProduction(code));
            assert_eq!(error.cause, cause, "{:?}", code);
            assert!(error.is_retriable(), "{:?}", code);
        }
    }

    #[test]
    fn test_unlisted_code_is_fatal() {
        let error = SendError::from(KafkaError::MessageProduction(RDKafkaErrorCode::Fail));
        assert_eq!(error.cause, FailureCause::Other);
        assert!(!error.is_retriable());
    }

    #[test]
    fn test_canceled_delivery_is_interrupted() {
        let error = SendError::from(KafkaError::Canceled);
        assert_eq!(error.cause, FailureCause::Interrupted);
        assert!(error.is_retriable());
    }

    #[test]
    fn test_display() {
        let error = SendError::new(FailureCause::Timeout, "Local: Message timed out");
        assert_eq!(error.to_string(), "timeout: Local: Message timed out");
    }
}
