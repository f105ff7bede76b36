//! Caching API client
//!
//! A memoized, file-cached, retry-capable client for the read-only remote
//! API. The caching strategy is layered:
//!
//! 1. in-memory map keyed by exact URL (fastest, process lifetime);
//! 2. file cache named by the MD5 of the URL, fresh while
//!    `now - mtime < ttl`;
//! 3. HTTP GET with a per-request timeout, retrying server-class errors
//!    (500/502/503/504) with exponential backoff.
//!
//! The client is safe for concurrent use from many workers. Two workers
//! racing on the same cold URL may both hit the network; the second write
//! simply overwrites the first with identical data. This duplicate fetch is
//! a known inefficiency, not a correctness bug.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::error::{PokedbError, Result};

/// HTTP status codes retried as transient server failures
const SERVER_ERROR_CODES: [u16; 4] = [500, 502, 503, 504];

/// Base delay for exponential backoff between retries
const BASE_BACKOFF_MS: u64 = 500;

/// Upper bound on a single backoff sleep
const MAX_BACKOFF_MS: u64 = 5_000;

/// A fetched HTTP response, reduced to what the pipeline consumes
#[derive(Debug, Clone)]
pub struct FetchedPayload {
    pub status: u16,
    pub body: String,
}

/// The HTTP seam. Production uses [`HttpTransport`]; tests substitute a
/// counting mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPayload>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pokedb/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPayload> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchedPayload { status, body })
    }
}

/// Compute the cache file path for a URL: `{cache_dir}/{md5(url)}.json`
pub fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let digest = md5::compute(url.as_bytes());
    cache_dir.join(format!("{digest:x}.json"))
}

/// Fetch `url` through `transport`, retrying transient failures with
/// exponential backoff. Makes the initial attempt plus up to `max_retries`
/// retries. Shared by the API client and the scraper.
pub async fn fetch_with_retries(
    transport: &dyn Transport,
    url: &str,
    timeout: Duration,
    max_retries: u32,
) -> Result<String> {
    let attempts = max_retries.saturating_add(1);
    for attempt in 1..=attempts {
        match transport.fetch(url, timeout).await {
            Ok(payload) if (200..300).contains(&payload.status) => return Ok(payload.body),
            Ok(payload) if SERVER_ERROR_CODES.contains(&payload.status) => {
                if attempt == attempts {
                    return Err(PokedbError::Status {
                        url: url.to_string(),
                        status: payload.status,
                    });
                }
                debug!(url, status = payload.status, attempt, "retrying after server error");
            }
            Ok(payload) => {
                // Terminal client-class response; retrying cannot help.
                return Err(PokedbError::Status {
                    url: url.to_string(),
                    status: payload.status,
                });
            }
            Err(err) => {
                if attempt == attempts {
                    warn!(url, %err, "transport failed on final attempt");
                    return Err(PokedbError::RetriesExhausted {
                        url: url.to_string(),
                        attempts,
                    });
                }
                debug!(url, %err, attempt, "retrying after transport error");
            }
        }
        let backoff = (BASE_BACKOFF_MS << (attempt - 1)).min(MAX_BACKOFF_MS);
        tokio::time::sleep(Duration::from_millis(backoff)).await;
    }
    Err(PokedbError::RetriesExhausted {
        url: url.to_string(),
        attempts,
    })
}

/// A memoized and file-cached API client
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    memory: Mutex<HashMap<String, Arc<Value>>>,
    timeout: Duration,
    max_retries: u32,
    cache_dir: Option<PathBuf>,
    cache_ttl: Option<Duration>,
}

impl ApiClient {
    /// Build a client from the run configuration, creating the cache
    /// directory when file caching is enabled.
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::with_transport(
            transport,
            config.request_timeout(),
            config.max_retries,
            config.parser_cache_dir.as_deref().map(PathBuf::from),
            config.cache_ttl(),
        )
    }

    /// Build a client over an explicit transport (tests inject mocks here)
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        max_retries: u32,
        cache_dir: Option<PathBuf>,
        cache_ttl: Option<Duration>,
    ) -> Result<Self> {
        if let Some(dir) = &cache_dir {
            fs::create_dir_all(dir)?;
            debug!(dir = %dir.display(), "cache directory initialized");
        }
        Ok(ApiClient {
            transport,
            memory: Mutex::new(HashMap::new()),
            timeout,
            max_retries,
            cache_dir,
            cache_ttl,
        })
    }

    /// Fetch a URL as raw JSON, consulting memory, then file cache, then the
    /// network.
    pub async fn get_value(&self, url: &str) -> Result<Arc<Value>> {
        if let Some(hit) = self.memory_get(url) {
            debug!(url, "cache hit (memory)");
            return Ok(hit);
        }

        let file_path = self.fresh_cache_path(url);
        if let Some(path) = &file_path {
            if let Some(value) = self.read_file_cache(path) {
                debug!(url, "cache hit (file)");
                let value = Arc::new(value);
                self.memory_put(url, Arc::clone(&value));
                return Ok(value);
            }
        }

        debug!(url, "fetching from API");
        let body =
            fetch_with_retries(self.transport.as_ref(), url, self.timeout, self.max_retries)
                .await?;
        let value: Arc<Value> = Arc::new(serde_json::from_str(&body)?);

        self.memory_put(url, Arc::clone(&value));
        if let Some(path) = cache_file_target(self.cache_dir.as_deref(), self.cache_ttl, url) {
            if let Err(err) = fs::write(&path, body) {
                warn!(url, %err, "failed to write cache file");
            }
        }
        Ok(value)
    }

    /// Fetch a URL and decode it into a typed payload at the boundary
    pub async fn get<D: DeserializeOwned>(&self, url: &str) -> Result<D> {
        let value = self.get_value(url).await?;
        Ok(serde_json::from_value((*value).clone())?)
    }

    fn memory_get(&self, url: &str) -> Option<Arc<Value>> {
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned()
    }

    fn memory_put(&self, url: &str, value: Arc<Value>) {
        self.memory
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string(), value);
    }

    /// The cache file path for `url`, only when the file exists and is still
    /// fresh.
    fn fresh_cache_path(&self, url: &str) -> Option<PathBuf> {
        let path = cache_file_target(self.cache_dir.as_deref(), self.cache_ttl, url)?;
        let ttl = self.cache_ttl?;
        let age = fs::metadata(&path).ok()?.modified().ok()?.elapsed().ok()?;
        if age < ttl {
            Some(path)
        } else {
            debug!(url, "cache expired");
            None
        }
    }

    fn read_file_cache(&self, path: &Path) -> Option<Value> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                // Corrupt cache entries (torn writes) degrade to a refetch.
                warn!(path = %path.display(), %err, "discarding unreadable cache file");
                None
            }
        }
    }
}

/// Where a payload should be cached, when file caching is configured. A
/// missing or zero TTL disables the file layer, reads and writes alike.
fn cache_file_target(
    cache_dir: Option<&Path>,
    cache_ttl: Option<Duration>,
    url: &str,
) -> Option<PathBuf> {
    let dir = cache_dir?;
    let ttl = cache_ttl?;
    if ttl.is_zero() {
        return None;
    }
    Some(cache_path(dir, url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn payload(status: u16, body: &str) -> FetchedPayload {
        FetchedPayload {
            status,
            body: body.to_string(),
        }
    }

    fn client_with(
        mock: MockTransport,
        cache_dir: Option<PathBuf>,
        ttl: Option<Duration>,
    ) -> ApiClient {
        ApiClient::with_transport(
            Arc::new(mock),
            Duration::from_secs(5),
            3,
            cache_dir,
            ttl,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn memory_cache_serves_repeat_calls() {
        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 1}"#)));
        let client = client_with(mock, None, None);

        let first = client.get_value("https://example.test/a").await.unwrap();
        let second = client.get_value("https://example.test/a").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn file_cache_survives_client_restart() {
        let dir = TempDir::new().unwrap();
        let ttl = Some(Duration::from_secs(3600));

        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 7}"#)));
        let client = client_with(mock, Some(dir.path().to_path_buf()), ttl);
        client.get_value("https://example.test/b").await.unwrap();

        // A fresh client (empty memory map) must be served from disk.
        let cold = MockTransport::new();
        let client = client_with(cold, Some(dir.path().to_path_buf()), ttl);
        let value = client.get_value("https://example.test/b").await.unwrap();
        assert_eq!(value["id"], 7);
    }

    #[tokio::test]
    async fn expired_file_cache_triggers_refetch() {
        let dir = TempDir::new().unwrap();

        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 7}"#)));
        let client = client_with(
            mock,
            Some(dir.path().to_path_buf()),
            Some(Duration::from_secs(3600)),
        );
        client.get_value("https://example.test/c").await.unwrap();

        // A nanosecond TTL: the entry is stale by the time it is read back.
        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 8}"#)));
        let client = client_with(
            mock,
            Some(dir.path().to_path_buf()),
            Some(Duration::from_nanos(1)),
        );
        let value = client.get_value("https://example.test/c").await.unwrap();
        assert_eq!(value["id"], 8);
    }

    #[tokio::test]
    async fn zero_ttl_disables_the_file_layer() {
        let dir = TempDir::new().unwrap();

        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 7}"#)));
        let client = client_with(
            mock,
            Some(dir.path().to_path_buf()),
            Some(Duration::from_secs(0)),
        );
        client.get_value("https://example.test/z").await.unwrap();

        // Nothing is written: a zero TTL could never serve the file anyway.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        // And nothing is read: a fresh client hits the network again.
        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(200, r#"{"id": 8}"#)));
        let client = client_with(
            mock,
            Some(dir.path().to_path_buf()),
            Some(Duration::from_secs(0)),
        );
        let value = client.get_value("https://example.test/z").await.unwrap();
        assert_eq!(value["id"], 8);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_retried_until_success() {
        let mut mock = MockTransport::new();
        let mut calls = 0;
        mock.expect_fetch().times(3).returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Ok(payload(503, ""))
            } else {
                Ok(payload(200, r#"{"ok": true}"#))
            }
        });
        let client = client_with(mock, None, None);
        let value = client.get_value("https://example.test/flaky").await.unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhausted_is_terminal() {
        // max_retries of 3 allows three retries after the initial attempt,
        // four requests in total.
        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(4)
            .returning(|_, _| Ok(payload(502, "")));
        let client = client_with(mock, None, None);
        let err = client.get_value("https://example.test/down").await.unwrap_err();
        assert!(matches!(err, PokedbError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut mock = MockTransport::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(payload(404, "")));
        let client = client_with(mock, None, None);
        let err = client.get_value("https://example.test/missing").await.unwrap_err();
        assert!(matches!(err, PokedbError::Status { status: 404, .. }));
    }

    #[test]
    fn cache_paths_are_stable_hashes() {
        let dir = Path::new("/tmp/cache");
        let a = cache_path(dir, "https://example.test/a");
        let b = cache_path(dir, "https://example.test/a");
        let c = cache_path(dir, "https://example.test/b");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.extension().is_some_and(|ext| ext == "json"));
    }
}
