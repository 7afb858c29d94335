//! Translation of [`OutputConfig`] options into Kafka producer properties.
//!
//! Option names use underscores (`sasl_login_connect_timeout_ms`), producer
//! properties use dots (`sasl.login.connect.timeout.ms`), and every property
//! value is a string. The resulting [`PropertyMap`] is what the producer is
//! built from; see [`client_config`](super::producer::client_config) for how
//! it is applied to librdkafka.

use std::collections::BTreeMap;
use std::fmt::Display;

use crate::config::{OutputConfig, DNS_LOOKUP_ALL_IPS, DNS_LOOKUP_DEFAULT};
use crate::kafka::retry::Retries;
use crate::Result;

/// String-typed producer properties, keyed by dotted name.
pub type PropertyMap = BTreeMap<String, String>;

/// Builds the producer property map for a configuration.
///
/// # Errors
///
/// Returns [`Error::Config`](crate::Error::Config) when the configuration
/// does not validate: negative retries, unknown serializers, a missing topic.
pub fn translate(config: &OutputConfig) -> Result<PropertyMap> {
    config.validate()?;

    let mut props = Properties::default();

    props.set("bootstrap_servers", config.brokers().join(","));
    props.set("acks", &config.acks);
    props.set("batch_size", config.batch_size);
    props.set("buffer_memory", config.buffer_memory);
    props.set_opt("client_id", config.client_id.as_ref());
    props.set("compression_type", &config.compression_type);
    props.set("linger_ms", config.linger_ms);
    props.set("max_request_size", config.max_request_size);
    props.set("metadata_max_age_ms", config.metadata_max_age_ms);
    props.set("request_timeout_ms", config.request_timeout_ms);
    props.set("reconnect_backoff_ms", config.reconnect_backoff_ms);
    props.set("retry_backoff_ms", config.retry_backoff_ms);
    props.set_opt("retry_backoff_max_ms", config.retry_backoff_max_ms);
    props.set("send_buffer_bytes", config.send_buffer_bytes);
    props.set("receive_buffer_bytes", config.receive_buffer_bytes);
    props.set_opt("connections_max_idle_ms", config.connections_max_idle_ms);
    props.set_opt("delivery_timeout_ms", config.delivery_timeout_ms);

    let dns_lookup = if config.client_dns_lookup == DNS_LOOKUP_DEFAULT {
        DNS_LOOKUP_ALL_IPS
    } else {
        config.client_dns_lookup.as_str()
    };
    props.set("client_dns_lookup", dns_lookup);

    if let Retries::Limited(n) = config.retry_limit()? {
        props.set("retries", n);
    }

    props.set("key_serializer", config.key_serializer()?.class_name());
    props.set("value_serializer", config.value_serializer()?.class_name());

    props.set("security_protocol", config.security_protocol.to_ascii_uppercase());

    if config.tls_enabled() {
        props.set_opt("ssl_truststore_location", config.ssl_truststore_location.as_ref());
        props.set_opt("ssl_truststore_password", config.ssl_truststore_password.as_ref());
        props.set_opt("ssl_truststore_type", config.ssl_truststore_type.as_ref());
        props.set_opt("ssl_keystore_location", config.ssl_keystore_location.as_ref());
        props.set_opt("ssl_keystore_password", config.ssl_keystore_password.as_ref());
        props.set_opt("ssl_keystore_type", config.ssl_keystore_type.as_ref());
        props.set_opt("ssl_key_password", config.ssl_key_password.as_ref());
        // An empty algorithm is forwarded as-is: it turns hostname verification off.
        props.set_opt(
            "ssl_endpoint_identification_algorithm",
            config.ssl_endpoint_identification_algorithm.as_ref(),
        );
    }

    if let Some(mechanism) = &config.sasl_mechanism {
        props.set("sasl_mechanism", mechanism);
        props.set_opt("sasl_jaas_config", config.sasl_jaas_config.as_ref());
        props.set_opt(
            "sasl_kerberos_service_name",
            config.sasl_kerberos_service_name.as_ref(),
        );
        props.set_opt(
            "sasl_oauthbearer_token_endpoint_url",
            config.sasl_oauthbearer_token_endpoint_url.as_ref(),
        );
        props.set_opt(
            "sasl_oauthbearer_scope_claim_name",
            config.sasl_oauthbearer_scope_claim_name.as_ref(),
        );
        props.set_opt(
            "sasl_login_connect_timeout_ms",
            config.sasl_login_connect_timeout_ms,
        );
        props.set_opt("sasl_login_read_timeout_ms", config.sasl_login_read_timeout_ms);
        props.set_opt("sasl_login_retry_backoff_ms", config.sasl_login_retry_backoff_ms);
        props.set_opt(
            "sasl_login_retry_backoff_max_ms",
            config.sasl_login_retry_backoff_max_ms,
        );
        props.set_opt(
            "sasl_login_callback_handler_class",
            config.sasl_login_callback_handler_class.as_ref(),
        );
    }

    Ok(props.into_inner())
}

/// `sasl_login_connect_timeout_ms` -> `sasl.login.connect.timeout.ms`
pub fn property_name(option: &str) -> String {
    option.replace('_', ".")
}

#[derive(Default)]
struct Properties(PropertyMap);

impl Properties {
    fn set(&mut self, option: &str, value: impl Display) {
        self.0.insert(property_name(option), value.to_string());
    }

    fn set_opt(&mut self, option: &str, value: Option<impl Display>) {
        if let Some(value) = value {
            self.set(option, value);
        }
    }

    fn into_inner(self) -> PropertyMap {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn get<'a>(props: &'a PropertyMap, name: &str) -> Option<&'a str> {
        props.get(name).map(String::as_str)
    }

    #[test]
    fn test_property_name() {
        assert_eq!(property_name("security_protocol"), "security.protocol");
        assert_eq!(
            property_name("sasl_login_connect_timeout_ms"),
            "sasl.login.connect.timeout.ms"
        );
    }

    #[test]
    fn test_defaults_translate() {
        let props = translate(&OutputConfig::new("events")).unwrap();

        assert_eq!(get(&props, "bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(get(&props, "acks"), Some("1"));
        assert_eq!(get(&props, "batch.size"), Some("16384"));
        assert_eq!(get(&props, "linger.ms"), Some("0"));
        assert_eq!(get(&props, "client.dns.lookup"), Some("use_all_dns_ips"));
        assert_eq!(get(&props, "security.protocol"), Some("PLAINTEXT"));
        assert_eq!(
            get(&props, "value.serializer"),
            Some("org.apache.kafka.common.serialization.StringSerializer")
        );
        // unbounded retries leave the client default alone
        assert_eq!(get(&props, "retries"), None);
        assert!(!props.keys().any(|k| k.starts_with("ssl.") || k.starts_with("sasl.")));
    }

    #[test]
    fn test_retries_forwarded_when_limited() {
        let config = OutputConfig {
            retries: Some(0),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();
        assert_eq!(get(&props, "retries"), Some("0"));
    }

    #[test]
    fn test_dns_lookup_default_rewritten() {
        let config = OutputConfig {
            client_dns_lookup: "default".to_string(),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();
        assert_eq!(get(&props, "client.dns.lookup"), Some("use_all_dns_ips"));
    }

    #[test]
    fn test_rejections() {
        let negative = OutputConfig {
            retries: Some(-1),
            ..OutputConfig::new("events")
        };
        assert!(matches!(translate(&negative), Err(Error::Config(_))));

        let unknown = OutputConfig {
            value_serializer: "com.example.Unknown".to_string(),
            ..OutputConfig::new("events")
        };
        assert!(matches!(translate(&unknown), Err(Error::Config(_))));

        assert!(matches!(
            translate(&OutputConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_ssl_empty_endpoint_identification_preserved() {
        let config = OutputConfig {
            security_protocol: "SSL".to_string(),
            ssl_truststore_location: Some("/etc/kafka/truststore.jks".to_string()),
            ssl_endpoint_identification_algorithm: Some(String::new()),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();

        assert_eq!(get(&props, "security.protocol"), Some("SSL"));
        assert_eq!(
            get(&props, "ssl.truststore.location"),
            Some("/etc/kafka/truststore.jks")
        );
        assert_eq!(get(&props, "ssl.endpoint.identification.algorithm"), Some(""));
    }

    #[test]
    fn test_ssl_endpoint_identification_absent_when_unset() {
        let config = OutputConfig {
            security_protocol: "SSL".to_string(),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();
        assert!(!props.contains_key("ssl.endpoint.identification.algorithm"));
    }

    #[test]
    fn test_sasl_oauth_options() {
        let config = OutputConfig {
            security_protocol: "SASL_PLAINTEXT".to_string(),
            sasl_mechanism: Some("OAUTHBEARER".to_string()),
            sasl_oauthbearer_token_endpoint_url: Some(
                "https://auth.example.com/token".to_string(),
            ),
            sasl_oauthbearer_scope_claim_name: Some("custom_scope".to_string()),
            sasl_login_connect_timeout_ms: Some(15000),
            sasl_login_read_timeout_ms: Some(5000),
            sasl_login_retry_backoff_ms: Some(500),
            sasl_login_retry_backoff_max_ms: Some(15000),
            sasl_login_callback_handler_class: Some(
                "org.example.OAuthCallbackHandler".to_string(),
            ),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();

        assert_eq!(get(&props, "sasl.mechanism"), Some("OAUTHBEARER"));
        assert_eq!(
            get(&props, "sasl.oauthbearer.token.endpoint.url"),
            Some("https://auth.example.com/token")
        );
        assert_eq!(
            get(&props, "sasl.oauthbearer.scope.claim.name"),
            Some("custom_scope")
        );
        assert_eq!(get(&props, "sasl.login.connect.timeout.ms"), Some("15000"));
        assert_eq!(get(&props, "sasl.login.read.timeout.ms"), Some("5000"));
        assert_eq!(get(&props, "sasl.login.retry.backoff.ms"), Some("500"));
        assert_eq!(get(&props, "sasl.login.retry.backoff.max.ms"), Some("15000"));
        assert_eq!(
            get(&props, "sasl.login.callback.handler.class"),
            Some("org.example.OAuthCallbackHandler")
        );
    }

    #[test]
    fn test_sasl_options_dropped_without_mechanism() {
        let config = OutputConfig {
            sasl_oauthbearer_token_endpoint_url: Some(
                "https://auth.example.com/token".to_string(),
            ),
            sasl_login_connect_timeout_ms: Some(15000),
            ..OutputConfig::new("events")
        };
        let props = translate(&config).unwrap();
        assert!(!props.keys().any(|k| k.starts_with("sasl.")));
    }
}
