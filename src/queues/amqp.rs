use crate::config::AmqpConfig;
use crate::error::QueueError;
use crate::queues::{Acknowledge, Delivery, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicQosOptions, BasicRejectOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};

const CONSUMER_TAG: &str = "persister";

#[async_trait]
impl Acknowledge for Acker {
    async fn ack(&self) -> Result<(), QueueError> {
        Acker::ack(self, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Acknowledge(Box::new(e)))
    }

    async fn reject(&self) -> Result<(), QueueError> {
        Acker::reject(self, BasicRejectOptions { requeue: false })
            .await
            .map_err(|e| QueueError::Acknowledge(Box::new(e)))
    }
}

/// Manual-ack consumer on a durable AMQP queue
pub struct AmqpSubscription {
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
}

impl AmqpSubscription {
    pub async fn connect(config: &AmqpConfig) -> Result<Self, QueueError> {
        let connect_error = |e: lapin::Error| QueueError::Connect {
            broker: "amqp",
            source: Box::new(e),
        };

        let connection = Connection::connect(&config.uri, ConnectionProperties::default())
            .await
            .map_err(connect_error)?;
        let channel = connection.create_channel().await.map_err(connect_error)?;
        ::log::info!("Connected to amqp broker");

        let subscribe_error = |e: lapin::Error| QueueError::Subscribe {
            target: config.queue.clone(),
            source: Box::new(e),
        };

        channel
            .basic_qos(config.prefetch, BasicQosOptions::default())
            .await
            .map_err(subscribe_error)?;
        channel
            .queue_declare(
                &config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(subscribe_error)?;
        let consumer = channel
            .basic_consume(
                &config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(subscribe_error)?;
        ::log::info!(
            "Consuming queue {} with prefetch {}",
            config.queue,
            config.prefetch
        );

        Ok(Self {
            _connection: connection,
            _channel: channel,
            consumer,
        })
    }
}

#[async_trait]
impl Subscription for AmqpSubscription {
    async fn next(&mut self) -> Option<Result<Delivery, QueueError>> {
        match self.consumer.next().await? {
            Ok(delivery) => {
                ::log::trace!("Received delivery {}", delivery.delivery_tag);
                Some(Ok(Delivery::new(delivery.data, delivery.acker)))
            }
            Err(e) => Some(Err(QueueError::Receive(Box::new(e)))),
        }
    }
}
