//! Fetching calendar payloads from every configured source.
//!
//! Local files are read on every fetch. Remote sources go through the
//! [`CacheStore`]: a fresh entry is served without touching the network, a
//! stale or missing one is downloaded (conditionally when validators are
//! known) and stored again. Remote fetches run concurrently under a semaphore
//! and share one deadline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheEntry, CacheError, CacheResult, CacheStore, DEFAULT_TTL, fingerprint};
use crate::error::{FetchError, FetchErrorCode, FetchResult};
use crate::source::{CalendarSource, Source};
use crate::transport::{Transport, TransportResponse, Validators};

/// Configuration for the [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Maximum number of remote fetches in flight.
    pub max_concurrent: usize,
    /// Deadline for a whole fetch cycle.
    pub timeout: Duration,
    /// Time-to-live of cache entries.
    pub ttl: Duration,
    /// Send `If-None-Match`/`If-Modified-Since` when validators are cached.
    pub conditional: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            timeout: Duration::from_secs(30),
            ttl: DEFAULT_TTL,
            conditional: true,
        }
    }
}

impl FetcherConfig {
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_conditional(mut self, conditional: bool) -> Self {
        self.conditional = conditional;
        self
    }
}

/// Where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// Read from a local file.
    Local,
    /// Served from a fresh cache entry.
    Cache,
    /// Downloaded; `changed` is false when the content matched the cache.
    Downloaded { changed: bool },
    /// The server confirmed the cached payload.
    NotModified,
}

/// A fetched payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSource {
    pub payload: String,
    pub origin: FetchOrigin,
}

/// The outcome for one source.
#[derive(Debug)]
pub struct SourceReport {
    pub calendar: CalendarSource,
    pub result: FetchResult<FetchedSource>,
}

/// Per-source outcomes of a fetch cycle, in source order.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub sources: Vec<SourceReport>,
}

impl FetchReport {
    /// Iterates over the sources that produced a payload.
    pub fn successes(&self) -> impl Iterator<Item = (&CalendarSource, &FetchedSource)> {
        self.sources
            .iter()
            .filter_map(|s| s.result.as_ref().ok().map(|f| (&s.calendar, f)))
    }

    /// Iterates over the sources that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&CalendarSource, &FetchError)> {
        self.sources
            .iter()
            .filter_map(|s| s.result.as_ref().err().map(|e| (&s.calendar, e)))
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

/// Fetches calendar payloads through the cache.
pub struct Fetcher {
    store: CacheStore,
    transport: Arc<dyn Transport>,
    config: FetcherConfig,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("store", &self.store)
            .field("transport", &self.transport.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Fetcher {
    /// Creates a fetcher with the default configuration.
    pub fn new(store: CacheStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            config: FetcherConfig::default(),
        }
    }

    /// Builder method to set the configuration.
    pub fn with_config(mut self, config: FetcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Fetches every source.
    ///
    /// Fails only when `sources` is empty or every source failed; otherwise
    /// the per-source failures are in the report.
    pub async fn fetch_all(&self, sources: &[CalendarSource]) -> FetchResult<FetchReport> {
        if sources.is_empty() {
            return Err(FetchError::invalid_source("no calendar sources configured"));
        }

        let deadline = Instant::now() + self.config.timeout;
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));

        let fetches = sources.iter().map(|calendar| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let key = calendar.key();
                let result = match timeout_at(deadline, self.fetch_one(calendar, &semaphore)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::timeout(format!(
                        "no answer within {}s",
                        self.config.timeout.as_secs()
                    ))),
                };
                let result = result.map_err(|e| e.with_source_key(key));
                SourceReport {
                    calendar: calendar.clone(),
                    result,
                }
            }
        });

        let report = FetchReport {
            sources: join_all(fetches).await,
        };

        for (calendar, err) in report.failures() {
            warn!(calendar = %calendar.name, error = %err, "Failed to fetch calendar");
        }
        info!(
            sources = sources.len(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "Fetch cycle finished"
        );

        if report.success_count() == 0 {
            let first = report
                .sources
                .iter()
                .find_map(|s| s.result.as_ref().err())
                .map(|e| e.code())
                .unwrap_or(FetchErrorCode::Internal);
            let details: Vec<String> = report.failures().map(|(_, e)| e.to_string()).collect();
            return Err(FetchError::new(
                first,
                format!("all {} sources failed: {}", sources.len(), details.join("; ")),
            ));
        }

        Ok(report)
    }

    async fn fetch_one(
        &self,
        calendar: &CalendarSource,
        semaphore: &Semaphore,
    ) -> FetchResult<FetchedSource> {
        match &calendar.source {
            Source::Local(path) => read_local(path).await,
            Source::Remote(url) => {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| FetchError::internal("fetch semaphore closed").with_source(e))?;
                self.fetch_remote(&calendar.key(), url).await
            }
        }
    }

    async fn fetch_remote(&self, key: &str, url: &Url) -> FetchResult<FetchedSource> {
        let lookup_key = key.to_string();
        let cached = match self.with_store(move |store| store.get(&lookup_key)).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lookup failed, fetching");
                None
            }
        };

        if let Some(entry) = &cached
            && entry.is_fresh(self.store.now())
        {
            debug!(key = %key, expires_at = %entry.expires_at, "Serving fresh cache entry");
            return Ok(FetchedSource {
                payload: entry.payload.clone(),
                origin: FetchOrigin::Cache,
            });
        }

        let validators = if self.config.conditional {
            cached
                .as_ref()
                .map(|entry| &entry.validators)
                .filter(|v| !v.is_empty())
        } else {
            None
        };

        debug!(
            key = %key,
            transport = self.transport.name(),
            cached = cached.is_some(),
            conditional = validators.is_some(),
            "Fetching remote calendar"
        );
        let response = self.transport.get(url, validators).await?;

        match response {
            TransportResponse::NotModified { validators } => {
                let Some(entry) = cached else {
                    return Err(FetchError::invalid_response(
                        "server answered 'not modified' to an unconditional request",
                    ));
                };
                debug!(key = %key, "Remote calendar not modified");
                self.extend(key, validators).await;
                Ok(FetchedSource {
                    payload: entry.payload,
                    origin: FetchOrigin::NotModified,
                })
            }
            TransportResponse::Modified { body, validators } => {
                let fingerprint = fingerprint(&body);
                let changed = cached
                    .as_ref()
                    .is_none_or(|entry| entry.fingerprint != fingerprint);
                if changed {
                    self.store_payload(key, &body, fingerprint, validators).await;
                } else {
                    debug!(key = %key, "Remote calendar unchanged");
                    self.extend(key, validators).await;
                }
                Ok(FetchedSource {
                    payload: body,
                    origin: FetchOrigin::Downloaded { changed },
                })
            }
        }
    }

    async fn store_payload(&self, key: &str, body: &str, fingerprint: String, validators: Validators) {
        let ttl = self.config.ttl;
        let (owned_key, payload) = (key.to_string(), body.to_string());
        let stored: CacheResult<CacheEntry> = self
            .with_store(move |store| store.put(&owned_key, payload, fingerprint, ttl, validators))
            .await;
        if let Err(e) = stored {
            warn!(key = %key, error = %e, "Failed to store cache entry");
        }
    }

    async fn extend(&self, key: &str, validators: Validators) {
        let ttl = self.config.ttl;
        let owned_key = key.to_string();
        let extended = self
            .with_store(move |store| store.refresh_expiration(&owned_key, ttl, Some(validators)))
            .await;
        if let Err(e) = extended {
            warn!(key = %key, error = %e, "Failed to extend cache entry");
        }
    }

    /// Runs a cache operation on the blocking pool.
    ///
    /// Once started the operation completes even if the calling future is
    /// dropped, so an entry is either fully written or untouched.
    async fn with_store<T, F>(&self, op: F) -> CacheResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CacheStore) -> CacheResult<T> + Send + 'static,
    {
        let store = self.store.clone();
        let dir = store.dir().to_path_buf();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| CacheError::Io {
                path: dir,
                source: std::io::Error::other(e),
            })?
    }
}

async fn read_local(path: &Path) -> FetchResult<FetchedSource> {
    let payload = tokio::fs::read_to_string(path).await.map_err(|e| {
        let code = match e.kind() {
            std::io::ErrorKind::NotFound => FetchErrorCode::NotFound,
            _ => FetchErrorCode::Io,
        };
        FetchError::new(code, format!("cannot read {}: {}", path.display(), e)).with_source(e)
    })?;
    debug!(path = %path.display(), bytes = payload.len(), "Read local calendar");
    Ok(FetchedSource {
        payload,
        origin: FetchOrigin::Local,
    })
}
