#![allow(dead_code)]

use async_trait::async_trait;
use kafka_output::kafka::{
    FailureCause, MessageProducer, PropertyMap, ResolvedMessage, SendError, Sleeper,
};
use kafka_output::{KafkaOutput, OutputConfig, Result};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Producer double: replays scripted results per topic, then acknowledges.
#[derive(Default)]
pub struct FakeProducer {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<(), SendError>>>>,
    failing_topics: Mutex<HashMap<String, FailureCause>>,
    sent: Mutex<Vec<ResolvedMessage>>,
    closes: AtomicUsize,
}

impl FakeProducer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails the next `times` sends to `topic` with `cause`.
    pub fn fail_next(&self, topic: &str, cause: FailureCause, times: usize) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(topic.to_string()).or_default();
        for _ in 0..times {
            script.push_back(Err(SendError::new(cause, "injected failure")));
        }
    }

    /// Fails every send to `topic` with `cause`.
    pub fn fail_always(&self, topic: &str, cause: FailureCause) {
        self.failing_topics
            .lock()
            .unwrap()
            .insert(topic.to_string(), cause);
    }

    /// Every attempt, in order, including failed ones.
    pub fn attempts(&self) -> Vec<ResolvedMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageProducer for FakeProducer {
    async fn send(&self, message: &ResolvedMessage) -> std::result::Result<(), SendError> {
        self.sent.lock().unwrap().push(message.clone());

        if let Some(cause) = self.failing_topics.lock().unwrap().get(&message.topic) {
            return Err(SendError::new(*cause, "injected failure"));
        }

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&message.topic)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records backoff requests instead of sleeping.
#[derive(Default)]
pub struct CountingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl CountingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// Registers an output against the fakes.
pub fn register_fake(
    config: OutputConfig,
    producer: Arc<FakeProducer>,
    sleeper: Arc<CountingSleeper>,
) -> Result<KafkaOutput> {
    KafkaOutput::register_with(
        config,
        move |_properties: &PropertyMap| Ok(producer as Arc<dyn MessageProducer>),
        sleeper,
    )
}

/// Get test configuration from environment variables
pub fn get_test_config(topic: &str) -> OutputConfig {
    OutputConfig {
        bootstrap_servers: env::var("TEST_KAFKA_BROKERS")
            .unwrap_or_else(|_| "localhost:9092".to_string()),
        acks: "all".to_string(),
        linger_ms: 0, // Immediate sending for tests
        retries: Some(3),
        ..OutputConfig::new(topic)
    }
}
