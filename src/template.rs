//! Field-reference templates used for topic, key and header values.
//!
//! A template is a string with zero or more placeholders:
//!
//! - `%{name}` – the value of the top-level field `name`
//! - `%{[outer][inner]}` – a nested field
//! - `%{+FORMAT}` – the event's `@timestamp` (or the current time when the
//!   event has none) formatted with a strftime pattern
//!
//! Templates are compiled once when the output is registered, so rendering
//! against an event cannot fail. A placeholder whose field is missing is left
//! in the output verbatim.
//!
//! ```rust
//! use kafka_output::{Event, Template};
//!
//! let template = Template::parse("logs-%{service}").unwrap();
//! let event = Event::new().with_field("service", "billing");
//! assert_eq!(template.render(&event), "logs-billing");
//! ```

use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use std::fmt::Write;
use tracing::trace;

use crate::event::{value_to_string, Event};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(String),
    Timestamp(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("%{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                Error::Config(format!("unterminated placeholder in template '{}'", source))
            })?;

            let reference = after[..end].trim();
            if reference.is_empty() {
                return Err(Error::Config(format!(
                    "empty placeholder in template '{}'",
                    source
                )));
            }

            match reference.strip_prefix('+') {
                Some(format) => {
                    validate_time_format(source, format)?;
                    segments.push(Segment::Timestamp(format.to_string()));
                }
                None => segments.push(Segment::Field(reference.to_string())),
            }

            rest = &after[end + 1..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// True when rendering depends on the event.
    pub fn is_dynamic(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| !matches!(segment, Segment::Literal(_)))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn render(&self, event: &Event) -> String {
        if !self.is_dynamic() {
            return self.source.clone();
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(reference) => match event.get_path(reference) {
                    Some(value) => out.push_str(&value_to_string(value)),
                    None => {
                        trace!(field = %reference, "Template field missing from event");
                        out.push_str("%{");
                        out.push_str(reference);
                        out.push('}');
                    }
                },
                Segment::Timestamp(format) => {
                    let ts = event.timestamp().unwrap_or_else(Utc::now);
                    // format was validated in parse
                    let _ = write!(out, "{}", ts.format(format));
                }
            }
        }
        out
    }
}

fn validate_time_format(source: &str, format: &str) -> Result<()> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();

    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::Config(format!(
            "invalid time format '{}' in template '{}'",
            format, source
        )));
    }
    // a pattern without directives would render as the same literal forever
    if !items
        .iter()
        .any(|item| matches!(item, Item::Numeric(..) | Item::Fixed(_)))
    {
        return Err(Error::Config(format!(
            "time format '{}' in template '{}' has no strftime directive, e.g. %Y.%m.%d",
            format, source
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_template() {
        let template = Template::parse("plain-topic").unwrap();
        assert!(!template.is_dynamic());
        assert_eq!(template.render(&Event::new()), "plain-topic");
    }

    #[test]
    fn test_single_field() {
        let template = Template::parse("%{topic_name}").unwrap();
        let event = Event::new().with_field("topic_name", "my_topic");

        assert!(template.is_dynamic());
        assert_eq!(template.render(&event), "my_topic");
    }

    #[test]
    fn test_mixed_segments() {
        let template = Template::parse("app.%{[service][name]}.%{level}-log").unwrap();
        let event = Event::new()
            .with_field("service", json!({"name": "billing"}))
            .with_field("level", "warn");

        assert_eq!(template.render(&event), "app.billing.warn-log");
    }

    #[test]
    fn test_missing_field_keeps_placeholder() {
        let template = Template::parse("logs-%{missing}").unwrap();
        assert_eq!(template.render(&Event::new()), "logs-%{missing}");
    }

    #[test]
    fn test_non_string_values() {
        let template = Template::parse("%{code}/%{ok}/%{none}").unwrap();
        let event = Event::new()
            .with_field("code", 503)
            .with_field("ok", false)
            .with_field("none", serde_json::Value::Null);

        assert_eq!(template.render(&event), "503/false/");
    }

    #[test]
    fn test_timestamp_format() {
        let template = Template::parse("logs-%{+%Y.%m.%d}").unwrap();
        let event = Event::new().with_field("@timestamp", "2024-03-05T10:20:30Z");

        assert_eq!(template.render(&event), "logs-2024.03.05");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(Template::parse("logs-%{host"), Err(Error::Config(_))));
        assert!(matches!(Template::parse("logs-%{}"), Err(Error::Config(_))));
        assert!(matches!(Template::parse("logs-%{+%Q}"), Err(Error::Config(_))));
    }

    #[test]
    fn test_time_format_needs_a_directive() {
        for source in ["logs-%{+yyyy.MM.dd}", "logs-%{+%%}", "logs-%{+ }"] {
            assert!(
                matches!(Template::parse(source), Err(Error::Config(_))),
                "{}",
                source
            );
        }
        assert!(Template::parse("logs-%{+%s}").is_ok());
    }
}
