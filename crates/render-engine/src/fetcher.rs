//! Resource fetching for job assets.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use slidecast_common::config::PipelineConfig;
use slidecast_common::error::FetchError;
use tokio::io::AsyncWriteExt;

/// Copies an asset addressed by URI into a local destination.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch `uri` into `dest` and return the written path.
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<PathBuf, FetchError>;
}

/// Where an asset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Local(PathBuf),
    Remote(String),
}

fn classify(uri: &str) -> Result<Source, FetchError> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(Source::Local(PathBuf::from(path)));
    }
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return Ok(Source::Remote(uri.to_string()));
    }
    match uri.split_once("://") {
        Some((scheme, _)) => Err(FetchError::Transport(format!(
            "unsupported scheme '{scheme}'"
        ))),
        None => Ok(Source::Local(PathBuf::from(uri))),
    }
}

/// Extension of the path component of a URI, ignoring query and fragment.
pub fn uri_extension(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Fetches over HTTP(S), or copies local paths and `file://` URIs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    attempt_timeout: Duration,
    attempts: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(attempt_timeout: Duration, attempts: u32, backoff: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            attempt_timeout,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Duration::from_secs(config.fetch_timeout_secs),
            config.fetch_attempts,
            Duration::from_millis(config.fetch_backoff_ms),
        )
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::Transport(format!("create {}: {e}", dest.display())))?;
        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::Transport(format!("write {}: {e}", dest.display())))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if written == 0 {
            return Err(FetchError::Transport("empty response body".to_string()));
        }
        tracing::debug!(url, bytes = written, "Downloaded asset");
        Ok(())
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, uri: &str, dest: &Path) -> Result<PathBuf, FetchError> {
        let url = match classify(uri)? {
            Source::Local(path) => return copy_local(&path, dest).await,
            Source::Remote(url) => url,
        };

        let mut last_error = FetchError::Transport("no attempts made".to_string());
        for attempt in 1..=self.attempts {
            let error = match tokio::time::timeout(self.attempt_timeout, self.download(&url, dest)).await {
                Ok(Ok(())) => return Ok(dest.to_path_buf()),
                Ok(Err(e)) => e,
                Err(_) => FetchError::Timeout {
                    secs: self.attempt_timeout.as_secs(),
                },
            };
            // Never leave a partial file behind.
            let _ = tokio::fs::remove_file(dest).await;

            if !error.is_retryable() {
                return Err(error);
            }
            tracing::warn!(uri, attempt, max_attempts = self.attempts, error = %error, "Fetch attempt failed");
            if attempt < self.attempts {
                tokio::time::sleep(self.backoff * attempt).await;
            }
            last_error = error;
        }
        Err(last_error)
    }
}

async fn copy_local(src: &Path, dest: &Path) -> Result<PathBuf, FetchError> {
    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Err(FetchError::NotFound(src.display().to_string()));
    }
    let copied = tokio::fs::copy(src, dest)
        .await
        .map_err(|e| FetchError::Transport(format!("copy {}: {e}", src.display())))?;
    tracing::debug!(src = %src.display(), bytes = copied, "Copied local asset");
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    #[derive(Debug, Clone, Copy)]
    enum Reply {
        Status(u16, &'static str),
        /// Headers promise more body than is ever sent.
        Stall,
    }

    /// Serves `replies` in order, repeating the last one, and counts
    /// connections.
    async fn serve(replies: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies[n.min(replies.len() - 1)];
                tokio::spawn(respond(socket, reply));
            }
        });
        (format!("http://{addr}/slides/asset.bin"), hits)
    }

    async fn respond(mut socket: TcpStream, reply: Reply) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        match reply {
            Reply::Status(code, body) => {
                let head = format!(
                    "HTTP/1.1 {code} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
            Reply::Stall => {
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\nConnection: close\r\n\r\npartial")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        }
    }

    fn fetcher(attempts: u32, backoff_ms: u64) -> HttpFetcher {
        HttpFetcher::new(Duration::from_millis(500), attempts, Duration::from_millis(backoff_ms))
    }

    #[tokio::test]
    async fn test_server_error_is_retried_until_success() {
        let (url, hits) = serve(vec![Reply::Status(500, "oops"), Reply::Status(200, "payload")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.bin");

        let written = fetcher(3, 10).fetch(&url, &dest).await.unwrap();

        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backoff_grows_linearly_and_attempts_are_bounded() {
        let (url, hits) = serve(vec![Reply::Status(503, "busy")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.bin");

        let started = std::time::Instant::now();
        let err = fetcher(3, 100).fetch(&url, &dest).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(ref m) if m.contains("503")), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // 100ms after the first attempt, 200ms after the second.
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let (url, hits) = serve(vec![Reply::Status(404, "")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.bin");

        let err = fetcher(3, 10).fetch(&url, &dest).await.unwrap_err();

        assert!(matches!(err, FetchError::NotFound(_)), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_stalled_body_times_out_and_removes_partial_file() {
        let (url, hits) = serve(vec![Reply::Stall]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.bin");

        let err = fetcher(2, 10).fetch(&url, &dest).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_empty_body_is_a_failure() {
        let (url, hits) = serve(vec![Reply::Status(200, "")]).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("asset.bin");

        let err = fetcher(2, 10).fetch(&url, &dest).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!dest.exists());
    }

    #[test]
    fn test_uri_extension() {
        assert_eq!(uri_extension("https://cdn.test/a/voice.MP3?sig=1").as_deref(), Some("mp3"));
        assert_eq!(uri_extension("file:///tmp/words.json").as_deref(), Some("json"));
        assert_eq!(uri_extension("slides/01.jpg#frag").as_deref(), Some("jpg"));
        assert_eq!(uri_extension("https://cdn.test/blob"), None);
        assert_eq!(uri_extension("https://cdn.test/.hidden"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("file:///tmp/a.png").unwrap(),
            Source::Local(PathBuf::from("/tmp/a.png"))
        );
        assert_eq!(
            classify("relative/a.png").unwrap(),
            Source::Local(PathBuf::from("relative/a.png"))
        );
        assert!(matches!(classify("https://x.test/a").unwrap(), Source::Remote(_)));
        assert!(matches!(classify("s3://bucket/a"), Err(FetchError::Transport(_))));
    }

    #[tokio::test]
    async fn test_local_copy() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("dest.txt");

        let fetcher = HttpFetcher::from_config(&PipelineConfig::default());
        let uri = format!("file://{}", src.display());
        let written = fetcher.fetch(&uri, &dest).await.unwrap();
        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::from_config(&PipelineConfig::default());
        let err = fetcher
            .fetch(
                dir.path().join("missing.png").to_str().unwrap(),
                &dir.path().join("out.png"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
