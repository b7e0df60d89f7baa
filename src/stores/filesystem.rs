use crate::error::StoreError;
use crate::parsers;
use crate::records::PageRecord;
use crate::stores::PageStore;
use crate::utils::{compute_path, sanitize_url};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Writes raw page bodies under `<root>/<sanitized-url>/<unix-timestamp>`
///
/// Directories of different URLs nest (`a.onion` holds the directory of
/// `a.onion/page`), so only the timestamp files directly inside a URL's
/// directory belong to that URL.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the versions of `url`
    fn directory_for(&self, url: &str) -> Result<PathBuf, StoreError> {
        let directory = sanitize_url(url);
        check_relative(&directory)?;
        Ok(self.root.join(directory))
    }

    /// Timestamp files stored directly in `directory`, oldest first
    async fn versions(&self, directory: &Path) -> Result<Vec<(i64, PathBuf)>, StoreError> {
        let mut entries = match fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound || e.kind() == ErrorKind::NotADirectory => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let timestamp = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<i64>().ok());
            if let Some(timestamp) = timestamp {
                versions.push((timestamp, entry.path()));
            }
        }

        versions.sort_by_key(|(timestamp, _)| *timestamp);
        Ok(versions)
    }
}

/// Reject directories that would land outside of the storage root
fn check_relative(directory: &str) -> Result<(), StoreError> {
    let path = Path::new(directory);
    let escapes = path.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });

    if directory.is_empty() || escapes {
        return Err(StoreError::InvalidPath(directory.to_string()));
    }
    Ok(())
}

#[async_trait]
impl PageStore for FilesystemStore {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError> {
        let directory = self.directory_for(url)?;
        let Some((timestamp, path)) = self.versions(&directory).await?.pop() else {
            return Ok(None);
        };

        let bytes = fs::read(&path).await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        let crawl_date = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default();

        Ok(Some(PageRecord {
            url: url.to_string(),
            title: parsers::extract_optional_title(&content),
            content,
            crawl_date,
        }))
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError> {
        let directory = self.directory_for(url)?;
        let mut removed = 0;
        for (_, path) in self.versions(&directory).await? {
            fs::remove_file(&path).await?;
            removed += 1;
        }

        ::log::debug!("Removed {} file(s) from {}", removed, directory.display());
        Ok(removed)
    }

    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError> {
        let (directory, file_name) = compute_path(&record.url, record.crawl_date);
        check_relative(&directory)?;

        let storage_path = self.root.join(&directory);
        ::log::info!("Storing content on path: {}", storage_path.display());

        fs::create_dir_all(&storage_path).await?;
        fs::write(storage_path.join(file_name), record.content.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(url: &str, content: &str, timestamp: i64) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            content: content.to_string(),
            crawl_date: Utc.timestamp_opt(timestamp, 0).unwrap(),
            title: None,
        }
    }

    #[tokio::test]
    async fn test_insert_writes_expected_layout() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());

        store
            .insert(&record("https://example.onion/a/b/", "<p>hello</p>", 1570788418))
            .await
            .unwrap();

        let path = tmp.path().join("example.onion/a/b/1570788418");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_find_returns_latest_version() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        let url = "http://example.onion/page";

        assert!(store.find_by_url(url).await.unwrap().is_none());

        store.insert(&record(url, "old", 100)).await.unwrap();
        store
            .insert(&record(url, "<title>New</title>", 200))
            .await
            .unwrap();

        let found = store.find_by_url(url).await.unwrap().unwrap();
        assert_eq!(found.url, url);
        assert_eq!(found.content, "<title>New</title>");
        assert_eq!(found.title.as_deref(), Some("New"));
        assert_eq!(found.crawl_date.timestamp(), 200);
    }

    #[tokio::test]
    async fn test_delete_keeps_nested_urls() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());

        store
            .insert(&record("http://example.onion/", "root", 100))
            .await
            .unwrap();
        store
            .insert(&record("http://example.onion/child", "child", 100))
            .await
            .unwrap();

        assert_eq!(store.delete_by_url("http://example.onion/").await.unwrap(), 1);
        assert!(store.find_by_url("http://example.onion/").await.unwrap().is_none());

        let child = store
            .find_by_url("http://example.onion/child")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(child.content, "child");
    }

    #[tokio::test]
    async fn test_delete_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path());
        assert_eq!(store.delete_by_url("http://nowhere.onion").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let tmp = TempDir::new().unwrap();
        let store = FilesystemStore::new(tmp.path().join("root"));

        for url in ["http://../../etc", "/etc/passwd", "https://", "a/../../b"] {
            let err = store.insert(&record(url, "x", 1)).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath(_)), "{url} was accepted");
        }
        assert!(!tmp.path().join("root").exists());
    }
}
