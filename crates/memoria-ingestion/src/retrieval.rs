//! Document retrieval: existence check and in-memory download.
//!
//! Network failures never escape this module as errors. `validate` turns
//! them into `false`, `fetch` into [`Download::Failed`].

use tracing::{debug, instrument, warn};

use memoria_common::{HttpClient, MemoriaError, Result};

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC: usize = 8 * 1024 * 1024;

/// Outcome of a download.
#[derive(Debug, Clone, PartialEq)]
pub enum Download {
    Complete(Vec<u8>),
    Failed,
}

impl Download {
    pub fn success(&self) -> bool {
        matches!(self, Download::Complete(_))
    }

    /// The downloaded bytes; empty for a failed download.
    pub fn buffer(&self) -> &[u8] {
        match self {
            Download::Complete(bytes) => bytes,
            Download::Failed => &[],
        }
    }

    pub fn into_buffer(self) -> Vec<u8> {
        match self {
            Download::Complete(bytes) => bytes,
            Download::Failed => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentFetcher {
    client: HttpClient,
}

impl DocumentFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// HEAD `url` and report whether the server answered with a success
    /// status. Malformed URLs and transport errors count as invalid.
    #[instrument(skip(self))]
    pub async fn validate(&self, url: &str) -> bool {
        let request = match self.client.head(url) {
            Ok(request) => request,
            Err(e) => {
                warn!(url, error = %e, "URL rejected before HEAD request");
                return false;
            }
        };

        match request.send().await {
            Ok(resp) => {
                let ok = resp.status().is_success();
                if !ok {
                    debug!(url, status = %resp.status(), "HEAD request did not succeed");
                }
                ok
            }
            Err(e) => {
                warn!(url, error = %e, "HEAD request failed");
                false
            }
        }
    }

    /// Download `url` into memory.
    ///
    /// Fails with `InvalidArgument` when [`DocumentFetcher::validate`] rejects
    /// the URL. Errors while the body is streaming are logged and reported as
    /// [`Download::Failed`].
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Download> {
        if !self.validate(url).await {
            return Err(MemoriaError::InvalidArgument(format!("Invalid URL: {}", url)));
        }

        match self.stream_body(url).await {
            Ok(buffer) => {
                debug!(url, bytes = buffer.len(), "Document downloaded");
                Ok(Download::Complete(buffer))
            }
            Err(e) => {
                warn!(url, error = %e, "Error downloading file");
                Ok(Download::Failed)
            }
        }
    }

    async fn stream_body(&self, url: &str) -> Result<Vec<u8>> {
        let mut resp = self.client.get(url)?.send().await?.error_for_status()?;

        // Content-Length is untrusted, reserve at most MAX_PREALLOC.
        let hint = resp.content_length().unwrap_or(0).min(MAX_PREALLOC as u64) as usize;
        let mut buffer = Vec::with_capacity(hint);
        while let Some(chunk) = resp.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_download_has_empty_buffer() {
        assert!(!Download::Failed.success());
        assert!(Download::Failed.buffer().is_empty());
        assert!(Download::Failed.into_buffer().is_empty());
        let ok = Download::Complete(b"%PDF-1.5".to_vec());
        assert!(ok.success());
        assert_eq!(ok.buffer(), b"%PDF-1.5");
    }

    /// Serve `connections` requests: HEAD gets an empty 200, GET gets a
    /// response announcing `content_length` bytes but sending only a few.
    async fn lying_server(content_length: u64, connections: usize) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for _ in 0..connections {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&chunk[..n]);
                }
                let response = if request.starts_with(b"HEAD") {
                    "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                } else {
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n%PDF-1.5"
                    )
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/theses/huge.pdf")
    }

    #[tokio::test]
    async fn test_bogus_content_length_is_a_failed_download() {
        let url = lying_server(1_000_000_000_000_000, 2).await;
        let fetcher = DocumentFetcher::new(HttpClient::new(&Default::default()).unwrap());
        let download = fetcher.fetch(&url).await.unwrap();
        assert_eq!(download, Download::Failed);
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_not_an_error() {
        let fetcher = DocumentFetcher::new(HttpClient::new(&Default::default()).unwrap());
        assert!(!fetcher.validate("not a url").await);
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, MemoriaError::InvalidArgument(_)));
    }
}
