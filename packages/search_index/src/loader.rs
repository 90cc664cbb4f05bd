//! Load-once access to the index artifact.
//!
//! [`IndexLoader`] fetches the artifact from an [`IndexSource`] the first
//! time it is asked for, and every later caller gets the same
//! `Arc<SearchIndex>`. Callers that arrive while a load is in flight
//! await that same load instead of starting another.
//!
//! ```text
//! Uninitialized --get--> Loading --ok--> Ready
//!       ^                   |
//!       |                   +--err--> Failed --get--> Loading
//!       +------reset------- (any)
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chi_pb_search_index_models::SearchIndex;
use futures::future::{BoxFuture, FutureExt as _, Shared};

use crate::artifact;

/// Where an index artifact comes from.
#[async_trait::async_trait]
pub trait IndexSource: Send + Sync {
    /// Fetches and decodes the artifact.
    async fn fetch(&self) -> Result<SearchIndex, LoadError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Reads the artifact from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source for `path` (plain JSON or zstd).
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl IndexSource for FileSource {
    async fn fetch(&self) -> Result<SearchIndex, LoadError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || artifact::read_json(&path))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
            .map_err(|e| LoadError::Artifact(e.to_string()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Downloads the artifact over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// Creates a source for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> Result<Self, LoadError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .user_agent("chi-pb-search-index/0.1")
            .build()
            .map_err(|e| LoadError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { url, client })
    }
}

#[async_trait::async_trait]
impl IndexSource for HttpSource {
    async fn fetch(&self) -> Result<SearchIndex, LoadError> {
        log::info!("Downloading index from {}", self.url);

        let http_err = |e: reqwest::Error| LoadError::Http {
            url: self.url.clone(),
            message: e.to_string(),
        };

        let response = self.client.get(&self.url).send().await.map_err(http_err)?;

        if !response.status().is_success() {
            return Err(LoadError::HttpStatus {
                url: self.url.clone(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(http_err)?;

        #[allow(clippy::cast_precision_loss)]
        let mb = bytes.len() as f64 / 1_048_576.0;
        log::info!("  downloaded {mb:.1} MB");

        let url = self.url.clone();
        tokio::task::spawn_blocking(move || artifact::decode(&bytes, &url))
            .await
            .map_err(|e| LoadError::Task(e.to_string()))?
            .map_err(|e| LoadError::Artifact(e.to_string()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Picks an [`HttpSource`] for `http(s)://` locations and a
/// [`FileSource`] for everything else.
///
/// # Errors
///
/// Returns an error if an HTTP client is needed and cannot be built.
pub fn source_for(location: &str) -> Result<Arc<dyn IndexSource>, LoadError> {
    let lower = location.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Ok(Arc::new(HttpSource::new(location)?))
    } else {
        Ok(Arc::new(FileSource::new(location)))
    }
}

/// Errors from loading the index.
///
/// `Clone` so that one failed load can be reported to every caller that
/// was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The artifact could not be read or decoded.
    #[error("Failed to load index artifact: {0}")]
    Artifact(String),

    /// HTTP request failed.
    #[error("HTTP error fetching {url}: {message}")]
    Http {
        /// URL that was requested.
        url: String,
        /// Error description.
        message: String,
    },

    /// HTTP response had a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// URL that was requested.
        url: String,
        /// Status code.
        status: u16,
    },

    /// The blocking decode task panicked or was cancelled.
    #[error("Index load task failed: {0}")]
    Task(String),
}

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<SearchIndex>, LoadError>>>;

enum LoadState {
    Uninitialized,
    Loading { generation: u64, future: LoadFuture },
    Ready(Arc<SearchIndex>),
    Failed(LoadError),
}

struct Inner {
    state: LoadState,
    next_generation: u64,
}

/// Observable state of an [`IndexLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing has asked for the index yet, or it was reset.
    Uninitialized,
    /// A load is in flight.
    Loading,
    /// The index is cached.
    Ready,
    /// The last load failed; the next [`IndexLoader::get`] retries.
    Failed(LoadError),
}

/// Loads the index once and shares it.
pub struct IndexLoader {
    source: Arc<dyn IndexSource>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for IndexLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexLoader")
            .field("source", &self.source.describe())
            .field("status", &self.status())
            .finish()
    }
}

impl IndexLoader {
    /// Creates a loader that has not started loading yet.
    #[must_use]
    pub fn new(source: Arc<dyn IndexSource>) -> Self {
        Self {
            source,
            inner: Mutex::new(Inner {
                state: LoadState::Uninitialized,
                next_generation: 0,
            }),
        }
    }

    /// Creates a loader for a path or `http(s)://` URL.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client is needed and cannot be built.
    pub fn for_location(location: &str) -> Result<Self, LoadError> {
        Ok(Self::new(source_for(location)?))
    }

    /// Returns the index, loading it on first use.
    ///
    /// Concurrent callers share one in-flight load. A failure is
    /// returned to every waiter and the next call starts a fresh load.
    ///
    /// # Errors
    ///
    /// Returns the load error if the artifact could not be fetched or
    /// decoded.
    pub async fn get(&self) -> Result<Arc<SearchIndex>, LoadError> {
        let (generation, future) = {
            let mut inner = self.lock();
            match &inner.state {
                LoadState::Ready(index) => return Ok(Arc::clone(index)),
                LoadState::Loading { generation, future } => (*generation, future.clone()),
                LoadState::Uninitialized | LoadState::Failed(_) => {
                    let generation = inner.next_generation;
                    inner.next_generation += 1;
                    let future = self.start_load();
                    inner.state = LoadState::Loading {
                        generation,
                        future: future.clone(),
                    };
                    (generation, future)
                }
            }
        };

        let result = future.await;

        let mut inner = self.lock();
        let current = matches!(
            &inner.state,
            LoadState::Loading { generation: g, .. } if *g == generation
        );
        if current {
            inner.state = match &result {
                Ok(index) => LoadState::Ready(Arc::clone(index)),
                Err(e) => LoadState::Failed(e.clone()),
            };
        }

        result
    }

    /// Returns the cached index without loading.
    #[must_use]
    pub fn get_if_ready(&self) -> Option<Arc<SearchIndex>> {
        match &self.lock().state {
            LoadState::Ready(index) => Some(Arc::clone(index)),
            _ => None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        match &self.lock().state {
            LoadState::Uninitialized => LoadStatus::Uninitialized,
            LoadState::Loading { .. } => LoadStatus::Loading,
            LoadState::Ready(_) => LoadStatus::Ready,
            LoadState::Failed(e) => LoadStatus::Failed(e.clone()),
        }
    }

    /// Drops any cached index or failure. An in-flight load still
    /// completes for its own waiters but is not cached.
    pub fn reset(&self) {
        self.lock().state = LoadState::Uninitialized;
    }

    fn start_load(&self) -> LoadFuture {
        let source = Arc::clone(&self.source);
        async move {
            let description = source.describe();
            log::info!("Loading search index from {description}");
            match source.fetch().await {
                Ok(index) => {
                    log::info!(
                        "Loaded {} addresses, {} streets (generated {}, version {})",
                        index.metadata.total_addresses,
                        index.metadata.unique_streets,
                        index.metadata.generated_at,
                        index.metadata.version
                    );
                    Ok(Arc::new(index))
                }
                Err(e) => {
                    log::warn!("Failed to load search index from {description}: {e}");
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::builder::IndexBuilder;

    /// Counts fetches and fails the first `failures` of them.
    struct CountingSource {
        calls: AtomicUsize,
        failures: usize,
    }

    impl CountingSource {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                failures,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IndexSource for CountingSource {
        async fn fetch(&self) -> Result<SearchIndex, LoadError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call < self.failures {
                return Err(LoadError::Artifact(format!("attempt {call} failed")));
            }
            Ok(IndexBuilder::new("test").finish())
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let source = CountingSource::new(0);
        let loader = IndexLoader::new(source.clone());

        let (a, b, c) = tokio::join!(loader.get(), loader.get(), loader.get());
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(loader.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn ready_index_is_cached() {
        let source = CountingSource::new(0);
        let loader = IndexLoader::new(source.clone());

        let first = loader.get().await.unwrap();
        let second = loader.get().await.unwrap();

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(loader.get_if_ready().is_some());
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_then_retries() {
        let source = CountingSource::new(1);
        let loader = IndexLoader::new(source.clone());

        let (a, b) = tokio::join!(loader.get(), loader.get());
        assert_eq!(
            a.clone().unwrap_err(),
            LoadError::Artifact("attempt 0 failed".to_string())
        );
        assert_eq!(a, b);
        assert_eq!(source.calls(), 1);
        assert!(matches!(loader.status(), LoadStatus::Failed(_)));

        loader.get().await.unwrap();
        assert_eq!(source.calls(), 2);
        assert_eq!(loader.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn reset_forces_a_reload() {
        let source = CountingSource::new(0);
        let loader = IndexLoader::new(source.clone());

        loader.get().await.unwrap();
        loader.reset();
        assert_eq!(loader.status(), LoadStatus::Uninitialized);
        assert!(loader.get_if_ready().is_none());

        loader.get().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn loads_from_file() {
        let dir = std::env::temp_dir().join("chi_pb_loader_file_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("combined-index.json");
        artifact::write_json(&IndexBuilder::new("file-test").finish(), &path, true).unwrap();

        let location = artifact::compressed_path(&path).display().to_string();
        let loader = IndexLoader::for_location(&location).unwrap();
        let index = loader.get().await.unwrap();
        assert_eq!(index.metadata.version, "file-test");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_fails() {
        let loader = IndexLoader::for_location("/nonexistent/combined-index.json").unwrap();
        let result = loader.get().await;
        assert!(matches!(result, Err(LoadError::Artifact(_))));
        assert!(matches!(loader.status(), LoadStatus::Failed(_)));
    }

    #[test]
    fn picks_source_by_scheme() {
        assert_eq!(
            source_for("https://cdn.example.com/index.json").unwrap().describe(),
            "https://cdn.example.com/index.json"
        );
        assert_eq!(
            source_for("data/processed/combined-index.json").unwrap().describe(),
            "data/processed/combined-index.json"
        );
    }
}
