use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::error::KafkaError;
use rdkafka::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::kafka::failure::{FailureCause, SendError};
use crate::kafka::jaas;
use crate::kafka::message::ResolvedMessage;
use crate::kafka::properties::PropertyMap;
use crate::{Error, Result};

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Properties librdkafka knows under another name.
const RENAMED_PROPERTIES: &[(&str, &str)] = &[
    ("max.request.size", "message.max.bytes"),
    ("send.buffer.bytes", "socket.send.buffer.bytes"),
    ("receive.buffer.bytes", "socket.receive.buffer.bytes"),
];

/// Properties with no librdkafka counterpart.
const UNSUPPORTED_PROPERTIES: &[&str] = &[
    "buffer.memory",
    "key.serializer",
    "value.serializer",
    "ssl.truststore.location",
    "ssl.truststore.password",
    "ssl.truststore.type",
    "ssl.keystore.type",
    "sasl.jaas.config",
    "sasl.oauthbearer.scope.claim.name",
    "sasl.login.connect.timeout.ms",
    "sasl.login.read.timeout.ms",
    "sasl.login.retry.backoff.ms",
    "sasl.login.retry.backoff.max.ms",
    "sasl.login.callback.handler.class",
];

/// The broker client as seen by the retry engine.
///
/// A call to [`send`](MessageProducer::send) is one attempt: it resolves once
/// the broker acknowledged the message or the attempt failed.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn send(&self, message: &ResolvedMessage) -> std::result::Result<(), SendError>;

    /// Flushes in-flight messages and releases client resources.
    async fn close(&self) -> Result<()>;
}

/// Applies a translated property map to a librdkafka client configuration.
///
/// Credentials in `sasl.jaas.config` are set as the matching librdkafka
/// properties. OAuth tokens are fetched by the client itself (`oidc`) only
/// when both a token endpoint and a client id are configured.
pub fn client_config(properties: &PropertyMap) -> ClientConfig {
    let mut config = ClientConfig::new();

    for (name, value) in properties {
        if UNSUPPORTED_PROPERTIES.contains(&name.as_str()) {
            debug!(property = %name, "Skipping property not supported by librdkafka");
            continue;
        }

        let name = RENAMED_PROPERTIES
            .iter()
            .find(|(from, _)| *from == name.as_str())
            .map(|(_, to)| *to)
            .unwrap_or(name.as_str());

        if name == "ssl.endpoint.identification.algorithm" && value.is_empty() {
            config.set(name, "none");
        } else {
            config.set(name, value);
        }
    }

    if let Some(entry) = properties.get("sasl.jaas.config") {
        for (name, value) in jaas::client_properties(entry) {
            config.set(name, value);
        }
    }

    if properties.contains_key("sasl.oauthbearer.token.endpoint.url")
        && config.get("sasl.oauthbearer.client.id").is_some()
    {
        config.set("sasl.oauthbearer.method", "oidc");
    }

    config
}

pub struct KafkaProducer {
    producer: FutureProducer,
    flush_timeout: Duration,
    closed: AtomicBool,
}

impl KafkaProducer {
    /// Creates the client. Malformed properties surface here, before any
    /// event is sent, as [`Error::Config`].
    pub fn create(properties: &PropertyMap) -> Result<Self> {
        let producer: FutureProducer = client_config(properties)
            .create()
            .map_err(|e| match e {
                KafkaError::ClientConfig(..) | KafkaError::ClientCreation(_) => {
                    Error::Config(format!("invalid producer configuration: {}", e))
                }
                other => Error::Kafka(other),
            })?;

        let flush_timeout = properties
            .get("request.timeout.ms")
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_FLUSH_TIMEOUT);

        info!(
            bootstrap = properties.get("bootstrap.servers").map(String::as_str).unwrap_or(""),
            security_protocol = properties
                .get("security.protocol")
                .map(String::as_str)
                .unwrap_or("PLAINTEXT"),
            "Kafka producer created successfully"
        );

        Ok(Self {
            producer,
            flush_timeout,
            closed: AtomicBool::new(false),
        })
    }

    fn flush(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(timeout = ?self.flush_timeout, "Flushing Kafka producer");
        self.producer
            .flush(Timeout::After(self.flush_timeout))
            .map_err(Error::Kafka)
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send(&self, message: &ResolvedMessage) -> std::result::Result<(), SendError> {
        let mut record: FutureRecord<'_, [u8], [u8]> =
            FutureRecord::to(&message.topic).payload(message.value.as_ref());

        if let Some(key) = &message.key {
            record = record.key(key.as_ref());
        }

        if !message.headers.is_empty() {
            let headers = message
                .headers
                .iter()
                .fold(OwnedHeaders::new(), |headers, (name, value)| {
                    headers.insert(Header {
                        key: name.as_str(),
                        value: Some(value.as_ref()),
                    })
                });
            record = record.headers(headers);
        }

        // Enqueue failures are reported immediately, delivery failures
        // through the returned future.
        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| SendError::from(e))?;

        match delivery.await {
            Ok(Ok((partition, offset))) => {
                debug!(topic = %message.topic, partition, offset, "Message delivered");
                Ok(())
            }
            Ok(Err((e, _))) => Err(SendError::from(e)),
            Err(_) => Err(SendError::new(
                FailureCause::Interrupted,
                "delivery future dropped before completion",
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        self.flush()
    }
}

impl Drop for KafkaProducer {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush Kafka producer on drop: {}", e);
        }
    }
}
