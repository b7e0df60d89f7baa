use crate::error::StoreError;
use crate::records::PageRecord;
use crate::stores::PageStore;
use async_trait::async_trait;
use std::sync::Mutex;

/// Keeps pages in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<PageRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored page, in insertion order
    pub fn records(&self) -> Vec<PageRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PageRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PageStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError> {
        Ok(self.lock().iter().find(|r| r.url == url).cloned())
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| r.url != url);
        Ok((before - records.len()) as u64)
    }

    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError> {
        self.lock().push(record.clone());
        Ok(())
    }
}
