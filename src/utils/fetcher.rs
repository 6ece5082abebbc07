use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// Most the buffer reserves up front from a declared Content-Length; past
/// this it grows with the bytes actually received.
const INITIAL_BUFFER_CAP: u64 = 1024 * 1024;

/// Downloaded document bytes. Lives only for the duration of one request.
#[derive(Debug)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawDocument, ServiceError>;
}

/// Fetches documents over HTTP(S) with a wall-clock timeout and a byte ceiling.
/// No retries: the first failure is reported to the caller.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &ServiceConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            timeout: config.download_timeout,
            max_bytes: config.max_download_bytes,
        })
    }

    async fn download(&self, url: &str) -> Result<RawDocument, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Upstream returned non-success status");
            return Err(ServiceError::DownloadFailed {
                status: Some(status.as_u16()),
                message: format!(
                    "upstream responded with HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown error")
                ),
            });
        }

        let declared = response.content_length();
        if let Some(declared) = declared {
            if declared > self.max_bytes {
                warn!(url = %url, declared, limit = self.max_bytes, "Declared Content-Length exceeds limit");
                return Err(ServiceError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        // Content-Length can be absent or wrong, so the ceiling is also
        // enforced on the bytes actually received, and the declared length
        // only seeds a capped initial capacity.
        let mut bytes =
            Vec::with_capacity(declared.unwrap_or(0).min(INITIAL_BUFFER_CAP) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.transport_error(url, e))?;
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                warn!(url = %url, received = bytes.len() + chunk.len(), limit = self.max_bytes, "Download exceeded size limit; aborting");
                return Err(ServiceError::PayloadTooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(RawDocument { bytes })
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            warn!(url = %url, "Download timed out in client");
            return ServiceError::DownloadTimeout {
                timeout: self.timeout,
            };
        }
        warn!(url = %url, "HTTP transport error: {}", e);
        ServiceError::DownloadFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawDocument, ServiceError> {
        debug!(url = %url, timeout_ms = self.timeout.as_millis() as u64, limit = self.max_bytes, "Starting download");
        let started = Instant::now();

        // Dropping the in-flight future on expiry releases the connection and
        // any partially received buffer.
        let document = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| {
                warn!(url = %url, elapsed_ms = started.elapsed().as_millis() as u64, "Download exceeded wall-clock timeout");
                ServiceError::DownloadTimeout {
                    timeout: self.timeout,
                }
            })??;

        info!(url = %url, bytes = document.len(), elapsed_ms = started.elapsed().as_millis() as u64, "Download completed");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::Body;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;
    use futures::stream;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    const LIMIT: u64 = 64 * 1024;

    /// Serves a handful of canned upstream behaviours on an ephemeral port.
    async fn spawn_upstream() -> SocketAddr {
        let app = Router::new()
            .route("/ok.bin", get(|| async { vec![7u8; 1024] }))
            .route(
                "/missing.pdf",
                get(|| async { (StatusCode::NOT_FOUND, "gone") }),
            )
            .route(
                "/declared-large.pdf",
                get(|| async {
                    let chunks =
                        stream::iter([Ok::<_, std::io::Error>(b"%PDF-1.7".to_vec())]);
                    (
                        [(header::CONTENT_LENGTH, (LIMIT * 2).to_string())],
                        Body::from_stream(chunks),
                    )
                        .into_response()
                }),
            )
            .route(
                "/streamed-large.pdf",
                get(|| async {
                    // Chunked, no Content-Length: only the running count can catch it.
                    let chunks = stream::iter(
                        (0..64).map(|_| Ok::<_, std::io::Error>(vec![0u8; 4096])),
                    );
                    Body::from_stream(chunks)
                }),
            )
            .route(
                "/hang.pdf",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    "too late"
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn fetcher(timeout: Duration) -> HttpFetcher {
        HttpFetcher::new(&ServiceConfig {
            download_timeout: timeout,
            max_download_bytes: LIMIT,
            ..ServiceConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn downloads_full_body() {
        let addr = spawn_upstream().await;
        let doc = fetcher(Duration::from_secs(5))
            .fetch(&format!("http://{addr}/ok.bin"))
            .await
            .unwrap();
        assert_eq!(doc.len(), 1024);
        assert!(doc.bytes.iter().all(|&b| b == 7));
    }

    #[tokio::test]
    async fn non_success_status_carries_upstream_code() {
        let addr = spawn_upstream().await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&format!("http://{addr}/missing.pdf"))
            .await
            .unwrap_err();
        match err {
            ServiceError::DownloadFailed { status, message } => {
                assert_eq!(status, Some(404));
                assert!(message.contains("404"));
            }
            other => panic!("expected DownloadFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn declared_oversize_is_rejected_up_front() {
        let addr = spawn_upstream().await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&format!("http://{addr}/declared-large.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge { limit: LIMIT }));
    }

    #[tokio::test]
    async fn streamed_oversize_is_cut_off() {
        let addr = spawn_upstream().await;
        let err = fetcher(Duration::from_secs(5))
            .fetch(&format!("http://{addr}/streamed-large.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PayloadTooLarge { limit: LIMIT }));
    }

    #[tokio::test]
    async fn slow_upstream_hits_timeout() {
        let addr = spawn_upstream().await;
        let timeout = Duration::from_millis(200);
        let started = Instant::now();
        let err = fetcher(timeout)
            .fetch(&format!("http://{addr}/hang.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DownloadTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn huge_declared_length_does_not_preallocate() {
        // Raw socket so the declared length can be arbitrarily far from the
        // bytes actually sent.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/pdf\r\nContent-Length: 70368744177664\r\n\r\n%PDF-1.7",
                )
                .await;
            let _ = socket.shutdown().await;
        });

        let fetcher = HttpFetcher::new(&ServiceConfig {
            download_timeout: Duration::from_secs(5),
            max_download_bytes: 1 << 50,
            ..ServiceConfig::default()
        })
        .unwrap();
        let err = fetcher
            .fetch(&format!("http://{addr}/lying.pdf"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::DownloadFailed { status: None, .. }),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_a_download_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetcher(Duration::from_secs(5))
            .fetch(&format!("http://{addr}/doc.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DownloadFailed { status: None, .. }));
    }

    #[tokio::test]
    async fn malformed_url_is_a_download_failure() {
        let err = fetcher(Duration::from_secs(5))
            .fetch("not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DownloadFailed { status: None, .. }));
    }
}
