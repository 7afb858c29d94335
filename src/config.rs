use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::kafka::retry::{BackoffPolicy, ExponentialBackoff, FixedBackoff, Retries};
use crate::kafka::serializer::Serializer;
use crate::template::Template;
use crate::{Error, Result};

pub const DNS_LOOKUP_DEFAULT: &str = "default";
pub const DNS_LOOKUP_ALL_IPS: &str = "use_all_dns_ips";
pub const DNS_LOOKUP_CANONICAL: &str = "resolve_canonical_bootstrap_servers_only";

const SECURITY_PROTOCOLS: &[&str] = &["PLAINTEXT", "SSL", "SASL_PLAINTEXT", "SASL_SSL"];

/// Output settings, using underscore-separated option names.
///
/// A snapshot is built once at startup. [`OutputConfig::validate`] runs before
/// any producer is created; [`OutputConfig::normalized`] yields the copy the
/// output keeps for its lifetime.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default)]
    pub topic_id: String,
    #[serde(default)]
    pub message_key: Option<String>,
    /// Sent in the order they are configured.
    #[serde(default)]
    pub message_headers: Option<IndexMap<String, String>>,
    #[serde(default = "default_serializer")]
    pub key_serializer: String,
    #[serde(default = "default_serializer")]
    pub value_serializer: String,

    /// Absent means retry until delivered.
    #[serde(default)]
    pub retries: Option<i64>,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// When set, backoff doubles per retry up to this cap.
    #[serde(default)]
    pub retry_backoff_max_ms: Option<u64>,

    #[serde(default = "default_acks")]
    pub acks: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_buffer_memory")]
    pub buffer_memory: u64,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_compression_type")]
    pub compression_type: String,
    #[serde(default)]
    pub linger_ms: u64,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u32,
    #[serde(default = "default_metadata_max_age_ms")]
    pub metadata_max_age_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    #[serde(default = "default_send_buffer_bytes")]
    pub send_buffer_bytes: i32,
    #[serde(default = "default_receive_buffer_bytes")]
    pub receive_buffer_bytes: i32,
    #[serde(default)]
    pub connections_max_idle_ms: Option<u64>,
    /// Upper bound on one attempt, from enqueue to broker acknowledgement.
    #[serde(default)]
    pub delivery_timeout_ms: Option<u64>,
    #[serde(default = "default_client_dns_lookup")]
    pub client_dns_lookup: String,

    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    #[serde(default)]
    pub ssl_truststore_location: Option<String>,
    #[serde(default)]
    pub ssl_truststore_password: Option<String>,
    #[serde(default)]
    pub ssl_truststore_type: Option<String>,
    #[serde(default)]
    pub ssl_keystore_location: Option<String>,
    #[serde(default)]
    pub ssl_keystore_password: Option<String>,
    #[serde(default)]
    pub ssl_keystore_type: Option<String>,
    #[serde(default)]
    pub ssl_key_password: Option<String>,
    /// `Some("")` disables hostname verification, which differs from leaving
    /// the option unset.
    #[serde(default)]
    pub ssl_endpoint_identification_algorithm: Option<String>,

    #[serde(default)]
    pub sasl_mechanism: Option<String>,
    #[serde(default)]
    pub sasl_jaas_config: Option<String>,
    #[serde(default)]
    pub sasl_kerberos_service_name: Option<String>,
    #[serde(default)]
    pub sasl_oauthbearer_token_endpoint_url: Option<String>,
    #[serde(default)]
    pub sasl_oauthbearer_scope_claim_name: Option<String>,
    #[serde(default)]
    pub sasl_login_connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub sasl_login_read_timeout_ms: Option<u64>,
    #[serde(default)]
    pub sasl_login_retry_backoff_ms: Option<u64>,
    #[serde(default)]
    pub sasl_login_retry_backoff_max_ms: Option<u64>,
    #[serde(default)]
    pub sasl_login_callback_handler_class: Option<String>,
}

impl OutputConfig {
    pub fn new(topic_id: impl Into<String>) -> Self {
        Self {
            topic_id: topic_id.into(),
            ..Self::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("KAFKA_OUTPUT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Checks every option that can be rejected up front.
    pub fn validate(&self) -> Result<()> {
        if self.topic_id.trim().is_empty() {
            return Err(Error::Config("topic_id is required".to_string()));
        }
        if self.brokers().is_empty() {
            return Err(Error::Config("bootstrap_servers must not be empty".to_string()));
        }

        self.retry_limit()?;
        self.key_serializer()?;
        self.value_serializer()?;

        Template::parse(&self.topic_id)?;
        if let Some(key) = &self.message_key {
            Template::parse(key)?;
        }
        if let Some(headers) = &self.message_headers {
            for value in headers.values() {
                Template::parse(value)?;
            }
        }

        match self.client_dns_lookup.as_str() {
            DNS_LOOKUP_DEFAULT | DNS_LOOKUP_ALL_IPS | DNS_LOOKUP_CANONICAL => {}
            other => {
                return Err(Error::Config(format!(
                    "unsupported client_dns_lookup '{}'",
                    other
                )))
            }
        }

        let protocol = self.security_protocol.to_ascii_uppercase();
        if !SECURITY_PROTOCOLS.contains(&protocol.as_str()) {
            return Err(Error::Config(format!(
                "unsupported security_protocol '{}'",
                self.security_protocol
            )));
        }

        if let Some(max) = self.retry_backoff_max_ms {
            if max < self.retry_backoff_ms {
                return Err(Error::Config(format!(
                    "retry_backoff_max_ms ({}) must be >= retry_backoff_ms ({})",
                    max, self.retry_backoff_ms
                )));
            }
        }

        Ok(())
    }

    /// Returns the snapshot with deprecated values rewritten.
    pub fn normalized(mut self) -> Self {
        if self.client_dns_lookup == DNS_LOOKUP_DEFAULT {
            self.client_dns_lookup = DNS_LOOKUP_ALL_IPS.to_string();
        }
        self.security_protocol = self.security_protocol.to_ascii_uppercase();
        self
    }

    pub fn brokers(&self) -> Vec<String> {
        self.bootstrap_servers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn retry_limit(&self) -> Result<Retries> {
        match self.retries {
            None => Ok(Retries::Unbounded),
            Some(n) if n < 0 => Err(Error::Config(format!(
                "retries must be greater than or equal to zero, got {}",
                n
            ))),
            Some(n) => u32::try_from(n)
                .map(Retries::Limited)
                .map_err(|_| Error::Config(format!("retries value {} is too large", n))),
        }
    }

    pub fn key_serializer(&self) -> Result<Serializer> {
        Serializer::from_str(&self.key_serializer)
    }

    pub fn value_serializer(&self) -> Result<Serializer> {
        Serializer::from_str(&self.value_serializer)
    }

    pub fn backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        match self.retry_backoff_max_ms {
            Some(max) => Box::new(ExponentialBackoff::new(
                std::time::Duration::from_millis(self.retry_backoff_ms),
                std::time::Duration::from_millis(max),
            )),
            None => Box::new(FixedBackoff::new(std::time::Duration::from_millis(
                self.retry_backoff_ms,
            ))),
        }
    }

    pub fn tls_enabled(&self) -> bool {
        matches!(
            self.security_protocol.to_ascii_uppercase().as_str(),
            "SSL" | "SASL_SSL"
        )
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic_id: String::new(),
            message_key: None,
            message_headers: None,
            key_serializer: default_serializer(),
            value_serializer: default_serializer(),
            retries: None,
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_backoff_max_ms: None,
            acks: default_acks(),
            batch_size: default_batch_size(),
            buffer_memory: default_buffer_memory(),
            client_id: None,
            compression_type: default_compression_type(),
            linger_ms: 0,
            max_request_size: default_max_request_size(),
            metadata_max_age_ms: default_metadata_max_age_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            send_buffer_bytes: default_send_buffer_bytes(),
            receive_buffer_bytes: default_receive_buffer_bytes(),
            connections_max_idle_ms: None,
            delivery_timeout_ms: None,
            client_dns_lookup: default_client_dns_lookup(),
            security_protocol: default_security_protocol(),
            ssl_truststore_location: None,
            ssl_truststore_password: None,
            ssl_truststore_type: None,
            ssl_keystore_location: None,
            ssl_keystore_password: None,
            ssl_keystore_type: None,
            ssl_key_password: None,
            ssl_endpoint_identification_algorithm: None,
            sasl_mechanism: None,
            sasl_jaas_config: None,
            sasl_kerberos_service_name: None,
            sasl_oauthbearer_token_endpoint_url: None,
            sasl_oauthbearer_scope_claim_name: None,
            sasl_login_connect_timeout_ms: None,
            sasl_login_read_timeout_ms: None,
            sasl_login_retry_backoff_ms: None,
            sasl_login_retry_backoff_max_ms: None,
            sasl_login_callback_handler_class: None,
        }
    }
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_serializer() -> String {
    Serializer::String.class_name().to_string()
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_acks() -> String {
    "1".to_string()
}

fn default_batch_size() -> u32 {
    16384
}

fn default_buffer_memory() -> u64 {
    33_554_432 // 32MB
}

fn default_compression_type() -> String {
    "none".to_string()
}

fn default_max_request_size() -> u32 {
    1_048_576
}

fn default_metadata_max_age_ms() -> u64 {
    300_000
}

fn default_request_timeout_ms() -> u64 {
    40_000
}

fn default_reconnect_backoff_ms() -> u64 {
    50
}

fn default_send_buffer_bytes() -> i32 {
    131_072
}

fn default_receive_buffer_bytes() -> i32 {
    32_768
}

fn default_client_dns_lookup() -> String {
    DNS_LOOKUP_ALL_IPS.to_string()
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}
