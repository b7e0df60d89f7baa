use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Configuration for a NATS queue subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NatsConfig {
    /// URI of the NATS server
    pub uri: String,

    /// Subject the crawler publishes pages on
    #[serde(default = "default_nats_subject")]
    pub subject: String,

    /// Queue group shared by all persister instances
    #[serde(default = "default_nats_queue_group")]
    pub queue_group: String,

    /// Maximum number of messages handled at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

/// Configuration for an AMQP queue consumer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AmqpConfig {
    /// URI of the AMQP broker
    pub uri: String,

    /// Queue to consume
    #[serde(default = "default_amqp_queue")]
    pub queue: String,

    /// Number of unacknowledged deliveries the broker may push
    #[serde(default = "default_prefetch")]
    pub prefetch: u16,
}

/// Enum containing all queue configuration types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueConfigType {
    /// NATS queue subscription
    Nats(NatsConfig),

    /// AMQP consumer
    Amqp(AmqpConfig),
}

/// Configuration for the MongoDB store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MongoConfig {
    /// Connection string of the MongoDB deployment
    pub uri: String,

    #[serde(default = "default_mongo_database")]
    pub database: String,

    #[serde(default = "default_collection")]
    pub collection: String,
}

/// Configuration for the Elasticsearch store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster
    #[serde(default = "default_elasticsearch_url")]
    pub url: String,

    /// Index receiving the documents
    #[serde(default = "default_collection")]
    pub index: String,
}

/// Configuration for the filesystem store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilesystemConfig {
    /// Directory under which pages are written
    pub root: String,
}

/// Enum containing all store configuration types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfigType {
    /// MongoDB collection
    Mongo(MongoConfig),

    /// Elasticsearch index
    Elasticsearch(ElasticsearchConfig),

    /// Local directory tree
    Filesystem(FilesystemConfig),

    /// Process memory, for dry runs
    Memory,
}

/// Complete persister configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersisterConfig {
    /// Where pages come from
    pub queue: QueueConfigType,

    /// Where pages go, in write order
    pub stores: Vec<StoreConfigType>,

    /// Upper bound for a single store operation
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,

    /// Delay before connecting, to let the broker and stores come up
    #[serde(default)]
    pub startup_delay_secs: u64,
}

impl PersisterConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every endpoint parses and that pages have somewhere to go
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.queue {
            QueueConfigType::Nats(cfg) => check_url("nats.uri", &cfg.uri)?,
            QueueConfigType::Amqp(cfg) => check_url("amqp.uri", &cfg.uri)?,
        }

        if self.stores.is_empty() {
            return Err(ConfigError::Missing("stores"));
        }

        for store in &self.stores {
            match store {
                StoreConfigType::Mongo(cfg) => check_mongo_uri(&cfg.uri)?,
                StoreConfigType::Elasticsearch(cfg) => check_url("elasticsearch.url", &cfg.url)?,
                StoreConfigType::Filesystem(cfg) if cfg.root.is_empty() => {
                    return Err(ConfigError::Missing("filesystem.root"));
                }
                StoreConfigType::Filesystem(_) | StoreConfigType::Memory => {}
            }
        }

        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    /// Number of deliveries handled concurrently; AMQP consumers are sequential
    pub fn max_concurrency(&self) -> usize {
        match &self.queue {
            QueueConfigType::Nats(cfg) => cfg.max_concurrency.max(1),
            QueueConfigType::Amqp(_) => 1,
        }
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Missing(field));
    }
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source })?;
    Ok(())
}

/// Connection strings list several hosts (`mongo1:27017,mongo2:27017`), which
/// `Url` refuses; only the scheme is checked here, the driver parses the rest
fn check_mongo_uri(value: &str) -> Result<(), ConfigError> {
    const FIELD: &str = "mongo.uri";
    if value.is_empty() {
        return Err(ConfigError::Missing(FIELD));
    }
    if !MONGO_SCHEMES.iter().any(|scheme| value.starts_with(scheme)) {
        return Err(ConfigError::UnsupportedScheme {
            field: FIELD,
            uri: value.to_string(),
        });
    }
    Ok(())
}

const MONGO_SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

pub fn default_nats_subject() -> String {
    "contentSubject".to_string()
}

pub fn default_nats_queue_group() -> String {
    "contentQueue".to_string()
}

pub fn default_amqp_queue() -> String {
    "content".to_string()
}

/// Default value for max_concurrency
pub fn default_max_concurrency() -> usize {
    4
}

pub fn default_prefetch() -> u16 {
    1
}

pub fn default_mongo_database() -> String {
    "trandoshan".to_string()
}

/// Default collection / index name
pub fn default_collection() -> String {
    "resources".to_string()
}

pub fn default_elasticsearch_url() -> String {
    "http://localhost:9200".to_string()
}

pub fn default_operation_timeout_secs() -> u64 {
    5
}
