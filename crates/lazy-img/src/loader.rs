//! Image loading
//!
//! Fetching is fire-and-forget from the element's point of view: it only
//! learns whether the load finished so it can mark the image loaded.

use std::future::Future;
use std::pin::Pin;

use url::Url;

/// Image load error
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("HTTP error: {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        LoadError::Network(err.to_string())
    }
}

/// Pending image load
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<(), LoadError>> + Send>>;

/// Fetches image resources
pub trait ImageLoader: Send + Sync {
    fn load(&self, url: &Url) -> LoadFuture;
}

/// HTTP(S) loader backed by a blocking reqwest client
///
/// Requests run on smol's blocking pool. `data:` URLs complete at once.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    client: reqwest::blocking::Client,
}

impl HttpImageLoader {
    pub fn new(user_agent: &str) -> Result<Self, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageLoader for HttpImageLoader {
    fn load(&self, url: &Url) -> LoadFuture {
        let client = self.client.clone();
        let url = url.clone();
        Box::pin(async move {
            match url.scheme() {
                "data" => return Ok(()),
                "http" | "https" => {}
                other => return Err(LoadError::UnsupportedScheme(other.to_string())),
            }

            smol::unblock(move || {
                tracing::info!("GET {}", url);
                let response = client.get(url.as_str()).send()?;
                let status = response.status();
                if !status.is_success() {
                    return Err(LoadError::Http { status: status.as_u16() });
                }
                let body = response.bytes()?;
                tracing::debug!("{}: {} bytes", url, body.len());
                Ok(())
            })
            .await
        })
    }
}

/// Loader that logs instead of fetching
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunLoader;

impl ImageLoader for DryRunLoader {
    fn load(&self, url: &Url) -> LoadFuture {
        tracing::info!("would fetch {}", url);
        Box::pin(async { Ok(()) })
    }
}
