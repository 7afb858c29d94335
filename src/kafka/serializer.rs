use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

const STRING_SERIALIZER: &str = "org.apache.kafka.common.serialization.StringSerializer";
const BYTE_ARRAY_SERIALIZER: &str = "org.apache.kafka.common.serialization.ByteArraySerializer";

/// Wire encoding for message keys and values.
///
/// Identifiers are accepted either as the Kafka serializer class names or
/// as the short forms `string` and `byte_array`.
///
/// Keys and values are always rendered as text first, so both encodings
/// produce the UTF-8 bytes of that text. The variant is kept so the
/// configured class name is validated and reported back unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Serializer {
    #[default]
    String,
    ByteArray,
}

impl Serializer {
    pub fn class_name(&self) -> &'static str {
        match self {
            Serializer::String => STRING_SERIALIZER,
            Serializer::ByteArray => BYTE_ARRAY_SERIALIZER,
        }
    }

    /// Identity encoding of the rendered text for either variant.
    pub fn serialize(&self, text: &str) -> Bytes {
        Bytes::copy_from_slice(text.as_bytes())
    }
}

impl FromStr for Serializer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            STRING_SERIALIZER | "string" | "StringSerializer" => Ok(Serializer::String),
            BYTE_ARRAY_SERIALIZER | "byte_array" | "ByteArraySerializer" => {
                Ok(Serializer::ByteArray)
            }
            other => Err(Error::Config(format!("unknown serializer '{}'", other))),
        }
    }
}

impl fmt::Display for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(Serializer::from_str(STRING_SERIALIZER).unwrap(), Serializer::String);
        assert_eq!(Serializer::from_str("string").unwrap(), Serializer::String);
        assert_eq!(
            Serializer::from_str(BYTE_ARRAY_SERIALIZER).unwrap(),
            Serializer::ByteArray
        );
        assert_eq!(Serializer::from_str("byte_array").unwrap(), Serializer::ByteArray);
    }

    #[test]
    fn test_unknown_identifier() {
        for name in ["", "json", "org.apache.kafka.common.serialization.LongSerializer"] {
            assert!(matches!(Serializer::from_str(name), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_serialize() {
        assert_eq!(Serializer::String.serialize("héllo"), Bytes::from("héllo"));
        assert_eq!(Serializer::ByteArray.serialize("abc").as_ref(), b"abc");
    }

    #[test]
    fn test_encodings_produce_same_bytes() {
        for text in ["", "plain", "{\"k\":\"v\"}", "ünïcödé"] {
            assert_eq!(
                Serializer::String.serialize(text),
                Serializer::ByteArray.serialize(text)
            );
        }
        assert_ne!(Serializer::String.class_name(), Serializer::ByteArray.class_name());
    }
}
