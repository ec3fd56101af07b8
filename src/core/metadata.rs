use crate::config::Config;
use crate::core::extractor::VideoId;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Opaque key-value metadata for a video. Empty when nothing could be fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataDocument(Map<String, Value>);

impl MetadataDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(|v| v.as_str())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Value> for MetadataDocument {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::empty(),
        }
    }
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, id: &VideoId) -> Result<MetadataDocument>;
}

/// Fetches metadata from an oEmbed-style endpoint.
pub struct HttpMetadataFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetadataFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.metadata_endpoint.clone(),
        })
    }

    pub fn request_url(&self, id: &VideoId) -> String {
        format!(
            "{}?url={}&format=json",
            self.endpoint,
            urlencoding::encode(&id.watch_url())
        )
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, id: &VideoId) -> Result<MetadataDocument> {
        let url = self.request_url(id);
        tracing::debug!("Fetching metadata: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::MetadataFetch(format!("HTTP {} for {}", status, id)));
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)?;
        Ok(MetadataDocument::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extractor::extract_video_id;
    use mockito::Server;
    use serde_json::json;

    fn fetcher_for(server: &Server) -> HttpMetadataFetcher {
        let config = Config {
            metadata_endpoint: format!("{}/oembed", server.url()),
            ..Config::default()
        };
        HttpMetadataFetcher::new(&config).unwrap()
    }

    #[test]
    fn test_request_url_encodes_watch_url() {
        let config = Config::default();
        let fetcher = HttpMetadataFetcher::new(&config).unwrap();
        let id = extract_video_id("dQw4w9WgXcQ").unwrap();

        assert_eq!(
            fetcher.request_url(&id),
            "https://www.youtube.com/oembed?url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3DdQw4w9WgXcQ&format=json"
        );
    }

    #[tokio::test]
    async fn test_fetch_document() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/oembed")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded(
                    "url".into(),
                    "https://www.youtube.com/watch?v=abc123".into(),
                ),
                mockito::Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"title": "Test Video", "author_name": "someone"}).to_string())
            .create_async()
            .await;

        let fetcher = fetcher_for(&server);
        let doc = fetcher
            .fetch(&extract_video_id("abc123").unwrap())
            .await
            .unwrap();

        assert_eq!(doc.title(), Some("Test Video"));
        assert_eq!(doc.get("author_name"), Some(&json!("someone")));
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/oembed")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let fetcher = fetcher_for(&server);
        let err = fetcher
            .fetch(&extract_video_id("abc123").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MetadataFetch(_)));
    }

    #[test]
    fn test_non_object_is_empty() {
        assert!(MetadataDocument::from(json!([1, 2, 3])).is_empty());
        assert!(MetadataDocument::from(Value::Null).is_empty());
    }
}
