use crate::config::ElasticsearchConfig;
use crate::error::StoreError;
use crate::parsers;
use crate::records::PageRecord;
use crate::stores::PageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

/// Document indexed for every page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDocument {
    pub url: String,
    pub content: String,
    pub time: DateTime<Utc>,
}

impl From<&PageRecord> for ResourceDocument {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            content: record.content.clone(),
            time: record.crawl_date,
        }
    }
}

impl From<ResourceDocument> for PageRecord {
    fn from(doc: ResourceDocument) -> Self {
        Self {
            title: parsers::extract_optional_title(&doc.content),
            url: doc.url,
            content: doc.content,
            crawl_date: doc.time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: ResourceDocument,
}

#[derive(Debug, Deserialize)]
struct DeleteByQueryResponse {
    #[serde(default)]
    deleted: u64,
}

/// Indexes pages into an Elasticsearch index over its REST API
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    index_url: Url,
}

impl ElasticsearchStore {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), config)
    }

    /// Build the store and make sure its index carries the page mapping
    pub async fn connect(config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        let store = Self::new(config)?;
        store.ensure_index().await?;
        Ok(store)
    }

    pub fn with_client(client: Client, config: &ElasticsearchConfig) -> Result<Self, StoreError> {
        let mut base = Url::parse(&config.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let index_url = base.join(&format!("{}/", config.index))?;

        Ok(Self { client, index_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.index_url.join(path)?)
    }

    /// Create the index with `url` mapped as an untruncated keyword
    ///
    /// Dynamic mapping would index `url` as text with a `url.keyword`
    /// sub-field capped at 256 characters, so longer URLs could never be
    /// matched again.
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        let mut index = self.index_url.clone();
        let path = index.path().trim_end_matches('/').to_string();
        index.set_path(&path);

        let response = self
            .client
            .put(index)
            .json(&Self::index_mapping())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            ::log::info!("Created elasticsearch index {}", self.index_url);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains(INDEX_EXISTS) {
            ::log::debug!("Elasticsearch index {} already exists", self.index_url);
            return Ok(());
        }
        Err(StoreError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    fn index_mapping() -> Value {
        json!({
            "mappings": {
                "properties": {
                    "url": { "type": "keyword" },
                    "content": { "type": "text" },
                    "time": { "type": "date" }
                }
            }
        })
    }

    fn url_query(url: &str) -> Value {
        json!({ "term": { "url": url } })
    }
}

const INDEX_EXISTS: &str = "resource_already_exists_exception";

/// Turn a non-success response into an error carrying its body
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::UnexpectedStatus {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl PageStore for ElasticsearchStore {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<PageRecord>, StoreError> {
        let body = json!({
            "size": 1,
            "sort": [{ "time": { "order": "desc" } }],
            "query": Self::url_query(url),
        });

        let response = self
            .client
            .post(self.endpoint("_search")?)
            .json(&body)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let result: SearchResponse = check_status(response).await?.json().await?;
        Ok(result
            .hits
            .hits
            .into_iter()
            .next()
            .map(|hit| hit.source.into()))
    }

    async fn delete_by_url(&self, url: &str) -> Result<u64, StoreError> {
        let mut endpoint = self.endpoint("_delete_by_query")?;
        endpoint.query_pairs_mut().append_pair("refresh", "true");

        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "query": Self::url_query(url) }))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(0);
        }

        let result: DeleteByQueryResponse = check_status(response).await?.json().await?;
        Ok(result.deleted)
    }

    async fn insert(&self, record: &PageRecord) -> Result<(), StoreError> {
        let mut endpoint = self.endpoint("_doc")?;
        endpoint.query_pairs_mut().append_pair("refresh", "true");

        let response = self
            .client
            .post(endpoint)
            .json(&ResourceDocument::from(record))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> ElasticsearchStore {
        ElasticsearchStore::new(&ElasticsearchConfig {
            url: server.uri(),
            index: "resources".to_string(),
        })
        .unwrap()
    }

    fn record() -> PageRecord {
        PageRecord {
            url: "http://example.onion".to_string(),
            content: "<title>Example</title>".to_string(),
            crawl_date: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            title: Some("Example".to_string()),
        }
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let store = ElasticsearchStore::new(&ElasticsearchConfig {
            url: "http://search.local/es".to_string(),
            index: "pages".to_string(),
        })
        .unwrap();
        assert_eq!(
            store.endpoint("_doc").unwrap().as_str(),
            "http://search.local/es/pages/_doc"
        );
    }

    #[tokio::test]
    async fn test_insert_forces_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/_doc"))
            .and(query_param("refresh", "true"))
            .and(body_partial_json(json!({
                "url": "http://example.onion",
                "content": "<title>Example</title>",
                "time": "2020-09-13T12:26:40Z",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"result": "created"})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).insert(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_reports_failure_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/_doc"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = store(&server).insert(&record()).await.unwrap_err();
        match err {
            StoreError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/_search"))
            .and(body_partial_json(json!({
                "query": { "term": { "url": "http://example.onion" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [{
                    "_source": {
                        "url": "http://example.onion",
                        "content": "<title>Example</title>",
                        "time": "2020-09-13T12:26:40Z"
                    }
                }]}
            })))
            .mount(&server)
            .await;

        let found = store(&server)
            .find_by_url("http://example.onion")
            .await
            .unwrap();
        assert_eq!(found, Some(record()));
    }

    #[tokio::test]
    async fn test_missing_index_means_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store(&server);
        assert!(store.find_by_url("http://a.onion").await.unwrap().is_none());
        assert_eq!(store.delete_by_url("http://a.onion").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_creates_keyword_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/resources"))
            .and(body_partial_json(json!({
                "mappings": { "properties": { "url": { "type": "keyword" } } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        ElasticsearchStore::connect(&ElasticsearchConfig {
            url: server.uri(),
            index: "resources".to_string(),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_connect_accepts_existing_index() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/resources"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "type": "resource_already_exists_exception" },
                "status": 400
            })))
            .mount(&server)
            .await;

        assert!(store(&server).ensure_index().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_reports_cluster_errors() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = store(&server).ensure_index().await.unwrap_err();
        assert!(matches!(err, StoreError::UnexpectedStatus { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_long_urls_match_exactly() {
        let long_url = format!("http://example.onion/{}", "a".repeat(300));
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/_delete_by_query"))
            .and(body_partial_json(json!({
                "query": { "term": { "url": long_url.as_str() } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": 1})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(store(&server).delete_by_url(&long_url).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/resources/_delete_by_query"))
            .and(query_param("refresh", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted": 2})))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(
            store(&server)
                .delete_by_url("http://example.onion")
                .await
                .unwrap(),
            2
        );
    }
}
