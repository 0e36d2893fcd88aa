//! Message bus plumbing (`§4.11`, `§5`, `§6`): a `lapin`-backed AMQP
//! consumer/publisher plus an in-memory double used by tests and by
//! `facas-worker analyze` (one-shot runs never need a broker).

use std::sync::Arc;

use async_trait::async_trait;
use lapin::message::DeliveryResult;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, warn};

use crate::errors::BusError;

/// One dequeued message, carrying enough state to ack or nack itself.
pub struct InboundMessage {
    pub payload: Vec<u8>,
    ack: AckHandle,
}

enum AckHandle {
    Lapin(lapin::message::Delivery),
    InMemory,
}

impl InboundMessage {
    pub async fn ack(self) -> Result<(), BusError> {
        match self.ack {
            AckHandle::Lapin(delivery) => delivery
                .ack(BasicAckOptions::default())
                .await
                .map_err(|e| BusError::Consume(e.to_string())),
            AckHandle::InMemory => Ok(()),
        }
    }

    /// Nack without requeue (`§6`, `§7`): malformed messages never loop.
    pub async fn nack_no_requeue(self) -> Result<(), BusError> {
        match self.ack {
            AckHandle::Lapin(delivery) => delivery
                .nack(BasicNackOptions { requeue: false, multiple: false })
                .await
                .map_err(|e| BusError::Consume(e.to_string())),
            AckHandle::InMemory => Ok(()),
        }
    }
}

/// A consumed stream of inbound messages, bridged through a bounded
/// `mpsc` channel so both the `lapin` delegate callback and the in-memory
/// double feed the same `recv` loop in `worker.rs`.
pub struct MessageConsumer {
    receiver: mpsc::Receiver<InboundMessage>,
}

impl MessageConsumer {
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.receiver.recv().await
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

pub struct LapinBus {
    channel: Channel,
    prefetch: u16,
}

impl LapinBus {
    pub async fn connect(amqp_addr: &str, prefetch: u16) -> Result<Self, BusError> {
        let connection = Connection::connect(amqp_addr, ConnectionProperties::default())
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        let channel = connection.create_channel().await.map_err(|e| BusError::Connect(e.to_string()))?;
        channel
            .basic_qos(prefetch, lapin::options::BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(LapinBus { channel, prefetch })
    }

    /// Start consuming `queue`, bridging deliveries into an `mpsc` channel
    /// bounded by the configured prefetch so unfinished permits naturally
    /// throttle further deliveries (`§5` Backpressure).
    pub async fn consume(&self, queue: &str) -> Result<MessageConsumer, BusError> {
        self.channel
            .queue_declare(queue, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        let consumer = self
            .channel
            .basic_consume(queue, "facas-worker", BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        let (tx, rx) = mpsc::channel(self.prefetch.max(1) as usize);

        consumer.set_delegate(move |delivery: DeliveryResult| {
            let tx = tx.clone();
            async move {
                let delivery = match delivery {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => return,
                    Err(error) => {
                        error!(%error, "error receiving delivery from broker");
                        return;
                    }
                };
                let message = InboundMessage { payload: delivery.data.clone(), ack: AckHandle::Lapin(delivery) };
                if tx.send(message).await.is_err() {
                    warn!("consumer channel closed before delivery could be forwarded");
                }
            }
        });

        Ok(MessageConsumer { receiver: rx })
    }
}

#[async_trait]
impl Publisher for LapinBus {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?
            .await
            .map_err(|e| BusError::Publish(e.to_string()))?;
        Ok(())
    }
}

/// In-memory double used by unit tests and by `facas-worker analyze` for
/// one-shot local runs without a broker.
pub struct InMemoryBus {
    published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        InMemoryBus { published: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn feed(&self, payload: Vec<u8>) -> (MessageConsumer, mpsc::Sender<InboundMessage>) {
        let (tx, rx) = mpsc::channel(16);
        let sender = tx.clone();
        let message = InboundMessage { payload, ack: AckHandle::InMemory };
        let _ = tx.try_send(message);
        (MessageConsumer { receiver: rx }, sender)
    }

    pub async fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().await.clone()
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for InMemoryBus {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.published.lock().await.push((queue.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_bus_records_published_messages() {
        let bus = InMemoryBus::new();
        bus.publish("facas.analysis.result", b"payload".to_vec()).await.unwrap();
        let published = bus.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "facas.analysis.result");
    }

    #[tokio::test]
    async fn fed_message_is_received_and_acked() {
        let bus = InMemoryBus::new();
        let (mut consumer, _sender) = bus.feed(b"{}".to_vec());
        let message = consumer.recv().await.unwrap();
        assert_eq!(message.payload, b"{}");
        message.ack().await.unwrap();
    }
}
