pub mod config;
pub mod error;
pub mod event;
pub mod input;
pub mod output;
pub mod template;

pub mod kafka;

pub use config::OutputConfig;
pub use error::{Error, Result};
pub use event::Event;
pub use output::{BatchReport, KafkaOutput};
pub use template::Template;
