use std::time::Duration;
use thiserror::Error;

/// Why a single message was dropped
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("error while de-serializing payload: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("payload has an empty url")]
    EmptyUrl,

    #[error("error while deleting previous record from {store}: {source}")]
    Delete {
        store: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("error while writing record to {store}: {source}")]
    Write {
        store: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("{operation} on {store} timed out after {timeout:?}")]
    Timeout {
        store: &'static str,
        operation: &'static str,
        timeout: Duration,
    },
}

/// Failure reported by a backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("refusing to store outside of the storage root: {0}")]
    InvalidPath(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Failure talking to the message broker
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("error while connecting to {broker}: {source}")]
    Connect {
        broker: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("error while subscribing to {target}: {source}")]
    Subscribe {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("error while receiving delivery: {0}")]
    Receive(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("error while acknowledging delivery: {0}")]
    Acknowledge(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invalid or missing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing setting {0}")]
    Missing(&'static str),

    #[error("invalid url for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme for {field}: {uri}")]
    UnsupportedScheme { field: &'static str, uri: String },
}
