//! Kafka producer implementing [`notifier_core::MessageProducer`].

pub mod producer;

pub use producer::{KafkaConfig, KafkaProducer};
