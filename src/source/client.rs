use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};

use super::raw::SourcePage;

const USER_AGENT_STRING: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/100.0.4896.127 Safari/537.36";

/// A paginated, newest-first listing of recipes.
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Fetch one page. An empty `items` list marks the end of the listing.
    async fn fetch_page(&self, page: u32) -> Result<SourcePage>;
}

pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT_STRING)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl RecipeSource for HttpSource {
    async fn fetch_page(&self, page: u32) -> Result<SourcePage> {
        let source_error = |message: String| AppError::Source { page, message };

        let response = self
            .client
            .get(format!("{}/api/search", self.base_url))
            .query(&[("content", "recipe"), ("sort", "newest")])
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| source_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(source_error(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| source_error(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| source_error(format!("malformed page: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn fetches_and_decodes_a_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .and(query_param("content", "recipe"))
            .and(query_param("sort", "newest"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "r1", "url": "/recipe/r1", "pubDate": "2024-03-01"}]
            })))
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let page = source.fetch_page(2).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "r1");
    }

    #[tokio::test]
    async fn http_failures_are_transient_source_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = source.fetch_page(1).await.unwrap_err();

        assert!(matches!(err, AppError::Source { page: 1, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_bodies_are_source_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let source = HttpSource::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = source.fetch_page(3).await.unwrap_err();

        assert!(matches!(err, AppError::Source { page: 3, .. }));
    }
}
