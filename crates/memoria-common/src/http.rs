use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::error::{MemoriaError, Result};

/// HTTP client shared by the repository harvester and the document fetcher.
/// Only `http` and `https` URLs are let through.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MemoriaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Parses `url` and checks that it uses a web scheme.
    pub fn parse_url(url: &str) -> Result<Url> {
        let parsed = Url::parse(url)
            .map_err(|e| MemoriaError::InvalidArgument(format!("invalid URL {}: {}", url, e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(MemoriaError::InvalidArgument(format!(
                "unsupported URL scheme '{}' in {}",
                other, url
            ))),
        }
    }

    pub fn head(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let parsed = Self::parse_url(url)?;
        Ok(self.client.head(parsed))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder> {
        let parsed = Self::parse_url(url)?;
        Ok(self.client.get(parsed))
    }
}
