//! Backing stores receiving persisted pages.
//!
//! Every store exposes the same capability: look a page up by URL, delete every
//! page stored under a URL, and insert a new page. The handler composes those
//! three calls into the replace-by-URL policy, so stores stay free of policy.

pub mod elasticsearch;
pub mod filesystem;
pub mod memory;
pub mod mongo;

use crate::config::StoreConfigType;
use crate::error::StoreError;
use crate::records::PageRecord;
use async_trait::async_trait;

pub use elasticsearch::ElasticsearchStore;
pub use filesystem::FilesystemStore;
pub use memory::InMemoryStore;
pub use mongo::MongoStore;

/// Storage capability used by the message handler
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Return the stored page for `url`, if any
    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError>;

    /// Remove every page stored for `url`, returning how many were removed
    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError>;

    /// Write a new page
    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError>;
}

/// All store implementations behind one type
#[derive(Debug)]
pub enum StoreBackend {
    Mongo(MongoStore),
    Elasticsearch(ElasticsearchStore),
    Filesystem(FilesystemStore),
    InMemory(InMemoryStore),
}

impl StoreBackend {
    /// Connect the store described by `config`
    pub async fn connect(config: &StoreConfigType) -> Result<Self, StoreError> {
        let backend = match config {
            StoreConfigType::Mongo(cfg) => StoreBackend::Mongo(MongoStore::connect(cfg).await?),
            StoreConfigType::Elasticsearch(cfg) => {
                StoreBackend::Elasticsearch(ElasticsearchStore::connect(cfg).await?)
            }
            StoreConfigType::Filesystem(cfg) => {
                StoreBackend::Filesystem(FilesystemStore::new(&cfg.root))
            }
            StoreConfigType::Memory => StoreBackend::InMemory(InMemoryStore::new()),
        };

        ::log::info!("{} store successfully created", backend.name());
        Ok(backend)
    }

    /// Connect every configured store, keeping their order
    pub async fn connect_all(configs: &[StoreConfigType]) -> Result<Vec<Self>, StoreError> {
        let mut stores = Vec::with_capacity(configs.len());
        for config in configs {
            stores.push(Self::connect(config).await?);
        }
        Ok(stores)
    }
}

#[async_trait]
impl PageStore for StoreBackend {
    fn name(&self) -> &'static str {
        match self {
            StoreBackend::Mongo(s) => s.name(),
            StoreBackend::Elasticsearch(s) => s.name(),
            StoreBackend::Filesystem(s) => s.name(),
            StoreBackend::InMemory(s) => s.name(),
        }
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError> {
        match self {
            StoreBackend::Mongo(s) => s.find_by_url(url).await,
            StoreBackend::Elasticsearch(s) => s.find_by_url(url).await,
            StoreBackend::Filesystem(s) => s.find_by_url(url).await,
            StoreBackend::InMemory(s) => s.find_by_url(url).await,
        }
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError> {
        match self {
            StoreBackend::Mongo(s) => s.delete_by_url(url).await,
            StoreBackend::Elasticsearch(s) => s.delete_by_url(url).await,
            StoreBackend::Filesystem(s) => s.delete_by_url(url).await,
            StoreBackend::InMemory(s) => s.delete_by_url(url).await,
        }
    }

    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError> {
        match self {
            StoreBackend::Mongo(s) => s.insert(record).await,
            StoreBackend::Elasticsearch(s) => s.insert(record).await,
            StoreBackend::Filesystem(s) => s.insert(record).await,
            StoreBackend::InMemory(s) => s.insert(record).await,
        }
    }
}
