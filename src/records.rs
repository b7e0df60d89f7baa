use crate::error::PersistError;
use crate::parsers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Crawled page as published on the content queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMessage {
    /// URL of the crawled page
    pub url: String,

    /// Raw page body, older producers publish it as `data`
    #[serde(alias = "data")]
    pub content: String,
}

impl PageMessage {
    /// Decode and validate a message payload
    pub fn from_slice(payload: &[u8]) -> Result<Self, PersistError> {
        let message: Self = serde_json::from_slice(payload)?;
        if message.url.is_empty() {
            return Err(PersistError::EmptyUrl);
        }
        Ok(message)
    }
}

/// A page as written to a backing store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRecord {
    /// URL of the page, used as the deduplication key
    pub url: String,

    /// Raw page body
    pub content: String,

    /// When the persister received the page
    pub crawl_date: DateTime<Utc>,

    /// Value of the `<title>` tag (if any)
    pub title: Option<String>,
}

impl PageRecord {
    /// Build the record for a message received at `crawl_date`
    pub fn from_message(message: PageMessage, crawl_date: DateTime<Utc>) -> Self {
        let title = parsers::extract_optional_title(&message.content);
        Self {
            url: message.url,
            content: message.content,
            crawl_date,
            title,
        }
    }
}
