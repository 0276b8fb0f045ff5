//! Remote byte retrieval.

use std::time::Duration;

use firma_core::{FetchConfig, PipelineError, PipelineResult};

/// Retrieves remote byte resources.
#[trait_variant::make(Send)]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`.
    ///
    /// Attempted once; failures are returned, not retried.
    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>>;
}

/// HTTP fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher from config.
    pub fn new(config: &FetchConfig) -> PipelineResult<Self> {
        Self::with_timeout(config.timeout(), &config.user_agent)
    }

    pub fn with_timeout(timeout: Duration, user_agent: &str) -> PipelineResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::fetch("<client>", format!("client build failed: {e}")))?;
        Ok(Self { http })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> PipelineResult<Vec<u8>> {
        tracing::debug!(url = %url, "fetching");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::fetch(url, describe(&e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::fetch(url, format!("HTTP {status}")));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PipelineError::fetch(url, format!("read body failed: {}", describe(&e))))?;

        tracing::debug!(url = %url, len = bytes.len(), "fetched");
        Ok(bytes.to_vec())
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_builder() {
        format!("invalid URL: {err}")
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use firma_core::ErrorKind;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_timeout(Duration::from_secs(5), "firma-test").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let base = serve(Router::new().route("/doc.pdf", get(|| async { b"%PDF-1.5".to_vec() }))).await;

        let body = fetcher().fetch(&format!("{base}/doc.pdf")).await.unwrap();
        assert_eq!(body, b"%PDF-1.5");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let base = serve(Router::new().route(
            "/gone",
            get(|| async { (StatusCode::NOT_FOUND, "nope") }),
        ))
        .await;

        let err = fetcher().fetch(&format!("{base}/gone")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/cert.p12");
        let err = fetcher().fetch(&url).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.to_string().contains(&url));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = fetcher().fetch("not a url").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn test_timeout() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let fetcher = HttpFetcher::with_timeout(Duration::from_millis(200), "firma-test").unwrap();
        let err = fetcher.fetch(&format!("{base}/slow")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
