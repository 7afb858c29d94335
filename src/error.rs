//! Error types and result handling for kafka-output.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate. Failures of individual
//! message sends are not represented here; they are modelled by
//! [`SendError`](crate::kafka::SendError) and never leave the retry engine.
//!
//! # Example
//!
//! ```rust
//! use kafka_output::{Error, Result};
//!
//! fn check_retries(retries: i64) -> Result<()> {
//!     if retries < 0 {
//!         return Err(Error::Config(format!("retries must be >= 0, got {}", retries)));
//!     }
//!     Ok(())
//! }
//!
//! match check_retries(-1) {
//!     Ok(()) => println!("valid"),
//!     Err(Error::Config(msg)) => eprintln!("Configuration error: {}", msg),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for kafka-output operations.
///
/// Everything in here escalates to the caller. A configuration error raised
/// during registration means the output never becomes ready.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid option value, unknown serializer, malformed template or
    /// security settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure loading the configuration sources (file or environment).
    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    /// Kafka client error, typically raised while flushing the producer.
    /// A client that cannot be constructed is reported as [`Error::Config`].
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// JSON error when decoding an event.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error, typically from reading events on stdin.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenient Result type alias for kafka-output operations.
///
/// This is equivalent to `std::result::Result<T, kafka_output::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
