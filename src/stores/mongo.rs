use crate::config::MongoConfig;
use crate::error::StoreError;
use crate::records::PageRecord;
use crate::stores::PageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc};
use mongodb::{Client, Collection};
use serde::{Deserialize, Serialize};

/// Shape of a page inside the MongoDB collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageDocument {
    pub url: String,
    pub crawl_date: bson::DateTime,
    pub title: Option<String>,
    pub content: String,
}

impl From<&PageRecord> for PageDocument {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            crawl_date: bson::DateTime::from_millis(record.crawl_date.timestamp_millis()),
            title: record.title.clone(),
            content: record.content.clone(),
        }
    }
}

impl From<PageDocument> for PageRecord {
    fn from(doc: PageDocument) -> Self {
        Self {
            url: doc.url,
            content: doc.content,
            crawl_date: DateTime::<Utc>::from_timestamp_millis(doc.crawl_date.timestamp_millis())
                .unwrap_or_default(),
            title: doc.title,
        }
    }
}

/// Stores pages as documents of a fixed collection
#[derive(Debug, Clone)]
pub struct MongoStore {
    collection: Collection<PageDocument>,
}

impl MongoStore {
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(&config.uri).await?;
        let collection = client
            .database(&config.database)
            .collection::<PageDocument>(&config.collection);

        ::log::info!(
            "Using mongodb collection {}.{}",
            config.database,
            config.collection
        );
        Ok(Self { collection })
    }
}

#[async_trait]
impl PageStore for MongoStore {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError> {
        let found = self.collection.find_one(doc! { "url": url }).await?;
        Ok(found.map(PageRecord::from))
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError> {
        let result = self.collection.delete_many(doc! { "url": url }).await?;
        Ok(result.deleted_count)
    }

    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError> {
        self.collection
            .insert_one(PageDocument::from(record))
            .await?;
        Ok(())
    }
}
