//! The route impact engine.
//!
//! Owns the feed source, the current [`FeedSnapshot`], the matching tables and
//! the result cache, and exposes the lifecycle and matching calls. Cloning an
//! [`Engine`] is cheap; clones share all state.

mod query;
mod stats;


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::join_all;
use moka::future::Cache as MokaCache;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::{CacheConfig, CacheKey, ResultCache};
use crate::domain::{GeoPoint, InvalidCoordinate};
use crate::feed::{DataLoadError, FeedConfig, FeedSnapshot, FeedSource};
use crate::matcher::{
    CoordinateMatch, CoordinateMatcher, FinalMatch, MatchConfig, MatchingTables, TextMatch,
    combine, is_consistent, match_text,
};

pub use query::{Coordinates, IncidentQuery};
pub use stats::EngineStatistics;

/// Errors from a direct coordinate query.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MatchError {
    /// Latitude or longitude unusable
    #[error("invalid coordinates: {0}")]
    InvalidCoordinate(#[from] InvalidCoordinate),

    /// No feed snapshot could be loaded
    #[error("transit feed unavailable: {0}")]
    FeedUnavailable(Arc<DataLoadError>),
}

/// Configuration for the whole engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub feed: FeedConfig,
    pub matching: MatchConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_matching(mut self, matching: MatchConfig) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// A snapshot as installed, tagged with the load that produced it.
#[derive(Clone)]
struct Installed {
    generation: u64,
    snapshot: Arc<FeedSnapshot>,
}

struct LoadFailure {
    error: Arc<DataLoadError>,
    at: Instant,
}

/// A cached coordinate result and the snapshot generation it was computed on.
#[derive(Clone)]
struct CachedMatch {
    generation: u64,
    result: Arc<CoordinateMatch>,
}

struct Inner {
    config: EngineConfig,
    source: Arc<dyn FeedSource>,
    tables: MatchingTables,
    /// Single entry; coalesces concurrent loads and expires with freshness.
    loads: MokaCache<(), Arc<FeedSnapshot>>,
    current: RwLock<Option<Installed>>,
    last_failure: RwLock<Option<LoadFailure>>,
    results: ResultCache<CacheKey, CachedMatch>,
    loads_completed: AtomicU64,
    coordinate_searches: AtomicU64,
}

/// Matches traffic incidents to the bus routes they affect.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    /// Create an engine. Nothing is loaded until the first call that needs
    /// the feed, or an explicit [`Engine::initialize`].
    pub fn new(config: EngineConfig, source: Arc<dyn FeedSource>, tables: MatchingTables) -> Self {
        let loads = MokaCache::builder()
            .max_capacity(1)
            .time_to_live(config.feed.freshness)
            .build();
        let results = ResultCache::new(&config.cache);

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                tables,
                loads,
                current: RwLock::new(None),
                last_failure: RwLock::new(None),
                results,
                loads_completed: AtomicU64::new(0),
                coordinate_searches: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn tables(&self) -> &MatchingTables {
        &self.inner.tables
    }

    /// Load the feed if it is not loaded and fresh.
    pub async fn initialize(&self) -> Result<Arc<FeedSnapshot>, Arc<DataLoadError>> {
        self.ensure_loaded().await
    }

    /// The current snapshot, loading it first if needed.
    ///
    /// Concurrent callers share one load. A snapshot younger than the
    /// freshness window is returned as is. If loading fails but an older
    /// snapshot exists, the older snapshot is returned. After a failure, no
    /// new load starts until the retry interval has passed.
    pub async fn ensure_loaded(&self) -> Result<Arc<FeedSnapshot>, Arc<DataLoadError>> {
        self.ready().await.map(|installed| installed.snapshot)
    }

    /// Force a fresh load, bypassing freshness and retry backoff.
    ///
    /// On success the result cache is cleared. On failure the previous
    /// snapshot, if any, stays in service and the error is returned.
    pub async fn reload(&self) -> Result<Arc<FeedSnapshot>, Arc<DataLoadError>> {
        *self.inner.last_failure.write().await = None;
        self.inner.loads.invalidate(&()).await;
        self.load_through_cache()
            .await
            .map(|installed| installed.snapshot)
    }

    /// The snapshot in service, without triggering a load.
    pub async fn snapshot(&self) -> Option<Arc<FeedSnapshot>> {
        self.installed().await.map(|installed| installed.snapshot)
    }

    /// Routes near a point, out to `radius_m` (or the configured default),
    /// never beyond the configured maximum search radius.
    pub async fn match_by_coordinate(
        &self,
        lat: f64,
        lng: f64,
        radius_m: Option<f64>,
    ) -> Result<Arc<CoordinateMatch>, MatchError> {
        let point = GeoPoint::new(lat, lng)?;
        let installed = self.ready().await.map_err(MatchError::FeedUnavailable)?;
        Ok(self.coordinate_match(&installed, point, radius_m).await)
    }

    /// Routes named by an incident's text. Uses the loaded feed, if any, to
    /// resolve route ids; never triggers a load.
    pub async fn match_by_text(
        &self,
        location_text: Option<&str>,
        description: Option<&str>,
    ) -> TextMatch {
        let installed = self.installed().await;
        match_text(
            &self.inner.tables,
            installed.as_ref().map(|i| i.snapshot.as_ref()),
            location_text,
            description,
        )
    }

    /// Match one incident using every signal it carries.
    ///
    /// Never fails. Without a feed only text matching runs and the result is
    /// marked `feed_ready: false`; invalid coordinates are ignored.
    pub async fn match_incident(&self, query: &IncidentQuery) -> FinalMatch {
        let ready = self.ready().await;
        if let Err(e) = &ready {
            debug!(error = %e, "Matching without transit feed");
        }
        let installed = ready.ok();

        let coordinate = match (query.point(), &installed) {
            (Some(Ok(point)), Some(installed)) => Some(
                self.coordinate_match(installed, point, query.search_radius_meters)
                    .await,
            ),
            (Some(Err(e)), _) => {
                debug!(error = %e, "Ignoring invalid incident coordinates");
                None
            }
            _ => None,
        };

        let text = match_text(
            &self.inner.tables,
            installed.as_ref().map(|i| i.snapshot.as_ref()),
            query.location_text.as_deref(),
            query.description.as_deref(),
        );

        combine(
            coordinate.as_deref(),
            Some(&text),
            &self.inner.config.matching,
            installed.is_some(),
        )
    }

    /// Match several incidents concurrently. Results are in query order.
    pub async fn match_batch(&self, queries: &[IncidentQuery]) -> Vec<FinalMatch> {
        join_all(queries.iter().map(|q| self.match_incident(q))).await
    }

    /// Drop all cached coordinate results.
    pub fn reset_cache(&self) {
        self.inner.results.clear();
        info!("Cleared coordinate match cache");
    }

    /// Current counters and load state.
    pub async fn statistics(&self) -> EngineStatistics {
        let installed = self.installed().await;
        let snapshot = installed.as_ref().map(|i| &i.snapshot);
        let last_error = self
            .inner
            .last_failure
            .read()
            .await
            .as_ref()
            .map(|f| f.error.to_string());

        EngineStatistics {
            is_loaded: snapshot.is_some(),
            last_loaded_at: snapshot.map(|s| s.loaded_at()),
            routes: snapshot.map_or(0, |s| s.route_count()),
            stops: snapshot.map_or(0, |s| s.stops().len()),
            route_shapes: snapshot.map_or(0, |s| s.geometry().len()),
            segments: snapshot.map_or(0, |s| s.geometry().segment_count()),
            load: snapshot.map(|s| s.stats().clone()),
            cache: self.inner.results.stats().await,
            loads_completed: self.inner.loads_completed.load(Ordering::Relaxed),
            coordinate_searches: self.inner.coordinate_searches.load(Ordering::Relaxed),
            last_error,
        }
    }

    async fn installed(&self) -> Option<Installed> {
        self.inner.current.read().await.clone()
    }

    async fn ready(&self) -> Result<Installed, Arc<DataLoadError>> {
        if let Some(error) = self.backoff_error().await {
            return self.installed().await.ok_or(error);
        }
        match self.load_through_cache().await {
            Ok(installed) => Ok(installed),
            Err(error) => self.installed().await.ok_or(error),
        }
    }

    /// The recorded failure, while still within the retry interval.
    async fn backoff_error(&self) -> Option<Arc<DataLoadError>> {
        let retry_after = self.inner.config.feed.retry_after;
        self.inner
            .last_failure
            .read()
            .await
            .as_ref()
            .filter(|f| f.at.elapsed() < retry_after)
            .map(|f| Arc::clone(&f.error))
    }

    async fn load_through_cache(&self) -> Result<Installed, Arc<DataLoadError>> {
        match self.inner.loads.try_get_with((), self.load_snapshot()).await {
            Ok(snapshot) => Ok(self.install(snapshot).await),
            Err(error) => {
                self.record_failure(&error).await;
                Err(error)
            }
        }
    }

    /// Parse and index the feed on a blocking thread, within the deadline.
    async fn load_snapshot(&self) -> Result<Arc<FeedSnapshot>, DataLoadError> {
        let source = Arc::clone(&self.inner.source);
        let config = self.inner.config.feed.clone();
        let timeout = config.load_timeout;
        debug!(source = %source.describe(), "Loading transit feed");

        let task = tokio::task::spawn_blocking(move || FeedSnapshot::load(source.as_ref(), &config));
        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result.map(Arc::new),
            Ok(Err(join_error)) => Err(DataLoadError::Task(join_error.to_string())),
            // The blocking task keeps running; its result is discarded.
            Err(_) => Err(DataLoadError::Timeout(timeout)),
        }
    }

    async fn install(&self, snapshot: Arc<FeedSnapshot>) -> Installed {
        if let Some(installed) = self
            .installed()
            .await
            .filter(|i| Arc::ptr_eq(&i.snapshot, &snapshot))
        {
            return installed;
        }

        let mut current = self.inner.current.write().await;
        if let Some(installed) = current
            .as_ref()
            .filter(|i| Arc::ptr_eq(&i.snapshot, &snapshot))
        {
            return installed.clone();
        }

        let generation = self.inner.loads_completed.fetch_add(1, Ordering::Relaxed) + 1;
        let installed = Installed {
            generation,
            snapshot,
        };
        *current = Some(installed.clone());
        drop(current);

        self.inner.results.clear();
        *self.inner.last_failure.write().await = None;
        info!(
            generation,
            routes = installed.snapshot.route_count(),
            stops = installed.snapshot.stops().len(),
            loaded_at = %installed.snapshot.loaded_at(),
            "Installed transit feed snapshot"
        );
        installed
    }

    /// Remember a failed load. Callers that shared the same attempt see the
    /// same error, which is logged once.
    async fn record_failure(&self, error: &Arc<DataLoadError>) {
        let mut failure = self.inner.last_failure.write().await;
        if failure
            .as_ref()
            .is_some_and(|f| Arc::ptr_eq(&f.error, error))
        {
            return;
        }
        warn!(
            error = %error,
            retry_after_secs = self.inner.config.feed.retry_after.as_secs(),
            "Transit feed load failed"
        );
        *failure = Some(LoadFailure {
            error: Arc::clone(error),
            at: Instant::now(),
        });
    }

    async fn coordinate_match(
        &self,
        installed: &Installed,
        point: GeoPoint,
        radius_m: Option<f64>,
    ) -> Arc<CoordinateMatch> {
        let matching = &self.inner.config.matching;
        let radius = matching.effective_radius(radius_m);
        let key = CacheKey::new(
            point.lat(),
            point.lng(),
            radius,
            self.inner.config.cache.coordinate_precision,
        );
        let generation = installed.generation;

        let cached = self
            .inner
            .results
            .get_valid(&key, |entry| {
                entry.generation == generation && is_consistent(&entry.result.routes)
            })
            .await;
        if let Some(entry) = cached {
            return entry.result;
        }

        self.inner.coordinate_searches.fetch_add(1, Ordering::Relaxed);
        let result = Arc::new(
            CoordinateMatcher::new(&installed.snapshot, &self.inner.tables, matching)
                .match_point(point, radius),
        );
        self.inner
            .results
            .insert(
                key,
                CachedMatch {
                    generation,
                    result: Arc::clone(&result),
                },
            )
            .await;
        result
    }
}
