// Re-export modules
pub mod config;
pub mod error;
pub mod handler;
pub mod parsers;
pub mod queues;
pub mod records;
pub mod stores;
pub mod utils;
pub mod worker;

// Re-export commonly used types for convenience
pub use config::PersisterConfig;
pub use handler::{Outcome, PageHandler};
pub use parsers::extract_title;
pub use records::{PageMessage, PageRecord};
pub use utils::compute_path;
pub use worker::RunSummary;

use queues::SubscriptionBackend;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use stores::StoreBackend;

/// Main builder for a persister process
pub struct Persister {
    config: PersisterConfig,
}

impl Persister {
    /// Create a new Persister from a complete configuration
    pub fn new(config: PersisterConfig) -> Self {
        Self { config }
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::new(PersisterConfig::from_file(path)?))
    }

    /// Set the maximum number of messages handled at the same time (NATS only)
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        if let config::QueueConfigType::Nats(nats) = &mut self.config.queue {
            nats.max_concurrency = max_concurrency;
        }
        self
    }

    /// Set the timeout applied to every store operation
    pub fn with_operation_timeout(mut self, timeout_seconds: u64) -> Self {
        self.config.operation_timeout_secs = timeout_seconds;
        self
    }

    pub fn config(&self) -> &PersisterConfig {
        &self.config
    }

    /// Connect the stores and the broker, then persist pages until the
    /// subscription closes
    pub async fn run(self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        self.run_until(std::future::pending()).await
    }

    /// Same as [`Persister::run`], stopping early once `shutdown` completes.
    /// Deliveries already taken from the broker are persisted and settled
    /// before returning.
    pub async fn run_until<F>(self, shutdown: F) -> Result<RunSummary, Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let delay = self.config.startup_delay();
        if !delay.is_zero() {
            ::log::info!("Waiting {:?} before connecting", delay);
            tokio::select! {
                _ = &mut shutdown => return Ok(RunSummary::default()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let stores = StoreBackend::connect_all(&self.config.stores).await?;
        let handler = Arc::new(PageHandler::new(stores, self.config.operation_timeout()));

        let subscription = SubscriptionBackend::connect(&self.config.queue).await?;
        ::log::info!("Consumer initialized successfully");

        let start_time = Instant::now();
        let summary = worker::run_until(
            subscription,
            handler,
            self.config.max_concurrency(),
            shutdown,
        )
        .await;
        ::log::info!(
            "Consumer stopped - persisted {} and dropped {} messages in {:.2} seconds",
            summary.persisted,
            summary.dropped,
            start_time.elapsed().as_secs_f64()
        );

        Ok(summary)
    }
}
