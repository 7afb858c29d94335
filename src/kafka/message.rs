use bytes::Bytes;

use crate::config::OutputConfig;
use crate::event::Event;
use crate::kafka::serializer::Serializer;
use crate::template::Template;
use crate::Result;

/// A message ready for the producer. Built fresh for every event.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMessage {
    pub topic: String,
    pub key: Option<Bytes>,
    /// In configured order.
    pub headers: Vec<(String, Bytes)>,
    pub value: Bytes,
}

impl ResolvedMessage {
    pub fn header(&self, name: &str) -> Option<&Bytes> {
        self.headers
            .iter()
            .find(|(header, _)| header == name)
            .map(|(_, value)| value)
    }
}

/// Turns events into [`ResolvedMessage`]s.
///
/// All templates are compiled in [`MessageBuilder::new`], so a bad template is
/// a registration error and [`MessageBuilder::build`] itself cannot fail.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    topic: Template,
    key: Option<Template>,
    headers: Vec<(String, Template)>,
    key_serializer: Serializer,
    value_serializer: Serializer,
}

impl MessageBuilder {
    pub fn new(config: &OutputConfig) -> Result<Self> {
        let topic = Template::parse(&config.topic_id)?;
        let key = config
            .message_key
            .as_deref()
            .map(Template::parse)
            .transpose()?;

        let mut headers = Vec::new();
        if let Some(configured) = &config.message_headers {
            for (name, value) in configured {
                headers.push((name.clone(), Template::parse(value)?));
            }
        }

        Ok(Self {
            topic,
            key,
            headers,
            key_serializer: config.key_serializer()?,
            value_serializer: config.value_serializer()?,
        })
    }

    pub fn build(&self, event: &Event) -> ResolvedMessage {
        let topic = self.topic.render(event);

        let key = self
            .key
            .as_ref()
            .map(|template| self.key_serializer.serialize(&template.render(event)));

        let headers = self
            .headers
            .iter()
            .map(|(name, template)| {
                (name.clone(), Bytes::from(template.render(event).into_bytes()))
            })
            .collect();

        let value = self.value_serializer.serialize(&event.to_string());

        ResolvedMessage {
            topic,
            key,
            headers,
            value,
        }
    }
}
