//! Message broker subscriptions delivering crawled pages.

pub mod amqp;
pub mod nats;

use crate::config::QueueConfigType;
use crate::error::QueueError;
use async_trait::async_trait;

pub use amqp::AmqpSubscription;
pub use nats::NatsSubscription;

/// Settles a delivery with the broker
#[async_trait]
pub trait Acknowledge: Send + Sync {
    /// The message was handled
    async fn ack(&self) -> Result<(), QueueError>;

    /// The message was dropped; it must not be redelivered
    async fn reject(&self) -> Result<(), QueueError>;
}

/// Acknowledger for brokers without acknowledgements (core NATS)
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAck;

#[async_trait]
impl Acknowledge for NoAck {
    async fn ack(&self) -> Result<(), QueueError> {
        ::log::trace!("Broker has no acknowledgements, nothing to ack");
        Ok(())
    }

    async fn reject(&self) -> Result<(), QueueError> {
        ::log::trace!("Broker has no acknowledgements, nothing to reject");
        Ok(())
    }
}

/// A message received from the broker
pub struct Delivery {
    /// Raw message body
    pub payload: Vec<u8>,
    acker: Box<dyn Acknowledge>,
}

impl Delivery {
    pub fn new(payload: Vec<u8>, acker: impl Acknowledge + 'static) -> Self {
        Self {
            payload,
            acker: Box::new(acker),
        }
    }

    /// A delivery the broker does not expect to be settled
    pub fn unacknowledged(payload: Vec<u8>) -> Self {
        Self::new(payload, NoAck)
    }

    pub async fn ack(&self) -> Result<(), QueueError> {
        self.acker.ack().await
    }

    pub async fn reject(&self) -> Result<(), QueueError> {
        self.acker.reject().await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .finish_non_exhaustive()
    }
}

/// Stream of deliveries from one queue
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery, `None` once the subscription is closed
    async fn next(&mut self) -> Option<Result<Delivery, QueueError>>;
}

/// All broker subscriptions behind one type
pub enum SubscriptionBackend {
    Nats(NatsSubscription),
    Amqp(AmqpSubscription),
}

impl SubscriptionBackend {
    /// Connect to the broker described by `config` and start consuming
    pub async fn connect(config: &QueueConfigType) -> Result<Self, QueueError> {
        match config {
            QueueConfigType::Nats(cfg) => Ok(Self::Nats(NatsSubscription::connect(cfg).await?)),
            QueueConfigType::Amqp(cfg) => Ok(Self::Amqp(AmqpSubscription::connect(cfg).await?)),
        }
    }
}

#[async_trait]
impl Subscription for SubscriptionBackend {
    async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        match self {
            SubscriptionBackend::Nats(s) => s.next().await,
            SubscriptionBackend::Amqp(s) => s.next().await,
        }
    }
}
