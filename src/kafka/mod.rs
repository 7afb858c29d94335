pub mod failure;
pub mod jaas;
pub mod message;
pub mod producer;
pub mod properties;
pub mod retry;
pub mod serializer;


pub use failure::{classify, FailureCause, Retriability, SendError};
pub use message::{MessageBuilder, ResolvedMessage};
pub use producer::{client_config, KafkaProducer, MessageProducer};
pub use properties::{translate, PropertyMap};
pub use retry::{
    BackoffPolicy, ExponentialBackoff, FixedBackoff, RetrySender, Retries, SendOutcome, Sleeper,
    TokioSleeper,
};
pub use serializer::Serializer;
