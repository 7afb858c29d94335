//! The output adapter: register once, then hand it batches of events.
//!
//! ```rust,no_run
//! use kafka_output::{Event, KafkaOutput, OutputConfig};
//!
//! # async fn example() -> kafka_output::Result<()> {
//! let config = OutputConfig {
//!     message_key: Some("%{host}".to_string()),
//!     retries: Some(3),
//!     ..OutputConfig::new("logs-%{service}")
//! };
//! let output = KafkaOutput::register(config)?;
//!
//! let batch = vec![Event::new().with_field("service", "api").with_field("host", "web-1")];
//! let report = output.multi_receive(&batch).await;
//! assert_eq!(report.len(), 1);
//!
//! output.close().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::config::OutputConfig;
use crate::event::Event;
use crate::kafka::{
    translate, KafkaProducer, MessageBuilder, MessageProducer, PropertyMap, RetrySender,
    SendOutcome, Sleeper, TokioSleeper,
};
use crate::Result;

pub struct KafkaOutput {
    config: OutputConfig,
    properties: PropertyMap,
    builder: MessageBuilder,
    sender: RetrySender,
    producer: Arc<dyn MessageProducer>,
}

impl KafkaOutput {
    /// Validates the configuration and creates the Kafka producer.
    ///
    /// # Errors
    ///
    /// Any configuration problem is returned here and no producer is
    /// created. Producer construction errors are returned as well.
    pub fn register(config: OutputConfig) -> Result<Self> {
        Self::register_with(
            config,
            |properties| Ok(Arc::new(KafkaProducer::create(properties)?) as Arc<dyn MessageProducer>),
            Arc::new(TokioSleeper),
        )
    }

    /// Like [`register`](Self::register) with a caller-supplied producer
    /// factory and backoff sleeper. The factory only runs once the
    /// configuration is known to be valid.
    pub fn register_with<F>(config: OutputConfig, create_producer: F, sleeper: Arc<dyn Sleeper>) -> Result<Self>
    where
        F: FnOnce(&PropertyMap) -> Result<Arc<dyn MessageProducer>>,
    {
        config.validate()?;
        let config = config.normalized();

        let properties = translate(&config)?;
        let builder = MessageBuilder::new(&config)?;
        let sender = RetrySender::new(config.retry_limit()?, config.backoff_policy(), sleeper);

        let producer = create_producer(&properties)?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            topic_id = %config.topic_id,
            retries = %sender.retries(),
            security_protocol = %config.security_protocol,
            "Kafka output registered"
        );

        Ok(Self {
            config,
            properties,
            builder,
            sender,
            producer,
        })
    }

    /// The configuration in effect, with deprecated values rewritten.
    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Builds and sends one event, logging the decision when it is dropped.
    pub async fn receive(&self, event: &Event) -> SendOutcome {
        let message = self.builder.build(event);
        let outcome = self.sender.send(&message, self.producer.as_ref()).await;

        match &outcome {
            SendOutcome::Success { .. } => {}
            SendOutcome::FatalFailure { cause, attempts } => {
                error!(
                    topic = %message.topic,
                    attempts,
                    event = %event,
                    "Dropping event after non-retriable failure: {}", cause
                );
            }
            SendOutcome::RetriesExhausted { last_error, attempts } => {
                error!(
                    topic = %message.topic,
                    attempts,
                    event = %event,
                    "Dropping event after exhausting retries: {}", last_error
                );
            }
        }

        outcome
    }

    /// Sends the events in order, one at a time. Returns once every event
    /// was delivered or dropped; a failed event never stops the batch.
    #[instrument(skip_all, fields(batch_size = events.len()))]
    pub async fn multi_receive(&self, events: &[Event]) -> BatchReport {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.receive(event).await);
        }

        let report = BatchReport { outcomes };
        if report.dropped() > 0 {
            info!(
                delivered = report.delivered(),
                dropped_fatal = report.dropped_fatal(),
                dropped_exhausted = report.dropped_exhausted(),
                "Batch finished with dropped events"
            );
        }
        report
    }

    /// Flushes in-flight messages and releases the producer.
    pub async fn close(self) -> Result<()> {
        info!("Closing Kafka output");
        self.producer.close().await
    }
}

/// Per-event outcomes of one [`KafkaOutput::multi_receive`] call, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<SendOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn dropped_fatal(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SendOutcome::FatalFailure { .. }))
            .count()
    }

    pub fn dropped_exhausted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, SendOutcome::RetriesExhausted { .. }))
            .count()
    }

    pub fn dropped(&self) -> usize {
        self.dropped_fatal() + self.dropped_exhausted()
    }
}
