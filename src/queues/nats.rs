use crate::config::NatsConfig;
use crate::error::QueueError;
use crate::queues::{Delivery, Subscription};
use async_nats::{Client, Subscriber};
use async_trait::async_trait;
use futures::StreamExt;

/// Queue-group subscription on a NATS subject
///
/// Every persister joins the same queue group, so each page is delivered to
/// exactly one of them. Core NATS has no acknowledgements.
pub struct NatsSubscription {
    // Dropping the client closes the connection
    _client: Client,
    subscriber: Subscriber,
}

impl NatsSubscription {
    pub async fn connect(config: &NatsConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(config.uri.as_str())
            .await
            .map_err(|e| QueueError::Connect {
                broker: "nats",
                source: Box::new(e),
            })?;
        ::log::info!("Connected to nats server at {}", config.uri);

        let subscriber = client
            .queue_subscribe(config.subject.clone(), config.queue_group.clone())
            .await
            .map_err(|e| QueueError::Subscribe {
                target: config.subject.clone(),
                source: Box::new(e),
            })?;
        ::log::info!(
            "Subscribed to {} in queue group {}",
            config.subject,
            config.queue_group
        );

        Ok(Self {
            _client: client,
            subscriber,
        })
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        let message = self.subscriber.next().await?;
        ::log::trace!("Received message on {}", message.subject);
        Some(Ok(Delivery::unacknowledged(message.payload.to_vec())))
    }
}
