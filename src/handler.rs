use crate::error::{PersistError, StoreError};
use crate::records::{PageMessage, PageRecord};
use crate::stores::PageStore;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;

/// Result of handling one message
#[derive(Debug)]
pub enum Outcome {
    /// Every store holds the new record
    Persisted,
    /// Processing stopped, the error has been logged
    Dropped(PersistError),
}

impl Outcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Outcome::Persisted)
    }
}

/// Turns queue payloads into stored pages
///
/// Each store gets the replace-by-URL treatment in order: look the URL up,
/// delete what is there, insert the new record. A failed lookup counts as
/// "not found"; any other failure stops the message, including for the
/// stores that come after.
pub struct PageHandler<S> {
    stores: Vec<S>,
    operation_timeout: Duration,
}

impl<S: PageStore> PageHandler<S> {
    pub fn new(stores: Vec<S>, operation_timeout: Duration) -> Self {
        Self {
            stores,
            operation_timeout,
        }
    }

    pub fn stores(&self) -> &[S] {
        &self.stores
    }

    /// Handle a payload received now
    pub async fn handle(&self, payload: &[u8]) -> Outcome {
        self.handle_at(payload, Utc::now()).await
    }

    /// Handle a payload, stamping the record with `crawl_date`
    pub async fn handle_at(&self, payload: &[u8], crawl_date: DateTime<Utc>) -> Outcome {
        match self.persist(payload, crawl_date).await {
            Ok(()) => Outcome::Persisted,
            Err(e) => {
                ::log::error!("Dropping message: {}", e);
                Outcome::Dropped(e)
            }
        }
    }

    async fn persist(&self, payload: &[u8], crawl_date: DateTime<Utc>) -> Result<(), PersistError> {
        let message = PageMessage::from_slice(payload)?;
        let record = PageRecord::from_message(message, crawl_date);

        for store in &self.stores {
            self.replace(store, &record).await?;
        }

        ::log::info!(
            "Persisted {} ({})",
            record.url,
            record.title.as_deref().unwrap_or("untitled")
        );
        Ok(())
    }

    async fn replace(&self, store: &S, record: &PageRecord) -> Result<(), PersistError> {
        let name = store.name();

        let existing = match self
            .bounded(name, "lookup", store.find_by_url(&record.url))
            .await
        {
            Ok(Ok(existing)) => existing,
            Ok(Err(e)) => {
                ::log::warn!("Error while looking up {} in {}: {}", record.url, name, e);
                None
            }
            Err(e) => {
                ::log::warn!("{}", e);
                None
            }
        };

        if existing.is_some() {
            let deleted = self
                .bounded(name, "delete", store.delete_by_url(&record.url))
                .await?
                .map_err(|source| PersistError::Delete {
                    store: name,
                    source,
                })?;
            ::log::debug!("Replacing {} record(s) of {} in {}", deleted, record.url, name);
        }

        self.bounded(name, "insert", store.insert(record))
            .await?
            .map_err(|source| PersistError::Write {
                store: name,
                source,
            })
    }

    /// Run a store operation under the operation timeout
    async fn bounded<T>(
        &self,
        store: &'static str,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<Result<T, StoreError>, PersistError> {
        tokio::time::timeout(self.operation_timeout, call)
            .await
            .map_err(|_| PersistError::Timeout {
                store,
                operation,
                timeout: self.operation_timeout,
            })
    }
}
