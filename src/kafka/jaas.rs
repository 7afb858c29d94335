//! Credentials carried in a `sasl_jaas_config` login module entry.
//!
//! librdkafka has no JAAS support, so the options it understands are lifted
//! out of the entry and set as plain client properties:
//!
//! ```text
//! org.apache.kafka.common.security.plain.PlainLoginModule required
//!     username="alice" password="secret";
//! ```
//!
//! becomes `sasl.username=alice` and `sasl.password=secret`.

use tracing::debug;

/// JAAS option name to librdkafka property.
const JAAS_PROPERTIES: &[(&str, &str)] = &[
    ("username", "sasl.username"),
    ("password", "sasl.password"),
    ("clientId", "sasl.oauthbearer.client.id"),
    ("clientSecret", "sasl.oauthbearer.client.secret"),
    ("scope", "sasl.oauthbearer.scope"),
];

/// Splits a login module entry into its `key=value` options, in order.
///
/// The module class and control flag are skipped. Values may be quoted with
/// double quotes, in which case they can contain whitespace.
pub fn options(entry: &str) -> Vec<(String, String)> {
    let mut options = Vec::new();
    let mut rest = entry.trim().trim_end_matches(';');

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].split_whitespace().last().unwrap_or("");
        let after = rest[eq + 1..].trim_start();

        let (value, remaining) = match after.strip_prefix('"') {
            Some(quoted) => match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            },
            None => {
                let end = after.find(char::is_whitespace).unwrap_or(after.len());
                (&after[..end], &after[end..])
            }
        };

        if !key.is_empty() {
            options.push((key.to_string(), value.to_string()));
        }
        rest = remaining;
    }

    options
}

/// The librdkafka properties a login module entry translates to.
pub fn client_properties(entry: &str) -> Vec<(&'static str, String)> {
    options(entry)
        .into_iter()
        .filter_map(|(key, value)| {
            match JAAS_PROPERTIES.iter().find(|(option, _)| *option == key) {
                Some((_, property)) => Some((*property, value)),
                None => {
                    debug!(option = %key, "Ignoring JAAS option with no librdkafka counterpart");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_login_module() {
        let entry = r#"org.apache.kafka.common.security.plain.PlainLoginModule required username="alice" password="s3cr et";"#;

        assert_eq!(
            options(entry),
            vec![
                ("username".to_string(), "alice".to_string()),
                ("password".to_string(), "s3cr et".to_string()),
            ]
        );
        assert_eq!(
            client_properties(entry),
            vec![
                ("sasl.username", "alice".to_string()),
                ("sasl.password", "s3cr et".to_string()),
            ]
        );
    }

    #[test]
    fn test_oauth_login_module() {
        let entry = "org.apache.kafka.common.security.oauthbearer.OAuthBearerLoginModule required\n    clientId=shipper\n    clientSecret=\"abc123\"\n    scope=\"logs.write\"\n    unknownOption=\"x\";";

        assert_eq!(
            client_properties(entry),
            vec![
                ("sasl.oauthbearer.client.id", "shipper".to_string()),
                ("sasl.oauthbearer.client.secret", "abc123".to_string()),
                ("sasl.oauthbearer.scope", "logs.write".to_string()),
            ]
        );
    }

    #[test]
    fn test_entry_without_options() {
        assert!(options("com.example.NoOpLoginModule required;").is_empty());
        assert!(options("").is_empty());
    }
}
