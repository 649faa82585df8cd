//! # Path Engine
//!
//! Stateful coordinator that owns the path and serializes every structural
//! mutation through one lock, so clicks, removals and imports never
//! interleave. Elevation lookups run as independent tokio tasks; each result
//! re-enters through [`Path::apply_lookup`], which discards anything whose
//! ticket no longer names a live, pending endpoint.
//!
//! Subscribers receive a path snapshot after every structural mutation
//! (synchronously, before any lookup task for that mutation is spawned) and
//! after every lookup resolution that was applied.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::classifier;
use crate::codec;
use crate::elevation::ElevationSource;
use crate::path::{LookupOutcome, LookupTicket, Path};
use crate::{GeoPoint, Result};

/// Default steepness threshold in percent (the UI's initial setting).
pub const DEFAULT_MAX_GRADIENT: f64 = 2.0;

/// Subscriber callback invoked with a path snapshot on every change.
pub type PathChangedCallback = Arc<dyn Fn(&Path) + Send + Sync>;

/// Drawable description of one segment: endpoints plus the ramp color for
/// its gradient under the current threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    pub src: GeoPoint,
    pub dst: Option<GeoPoint>,
    pub color: &'static str,
}

struct EngineState {
    path: Path,
    max_gradient: f64,
    subscribers: Vec<PathChangedCallback>,
}

/// The path coordinator. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PathEngine {
    state: Arc<Mutex<EngineState>>,
    source: Arc<dyn ElevationSource>,
}

impl PathEngine {
    /// Create an engine with an empty path and the default threshold.
    pub fn new(source: Arc<dyn ElevationSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState {
                path: Path::new(),
                max_gradient: DEFAULT_MAX_GRADIENT,
                subscribers: Vec::new(),
            })),
            source,
        }
    }

    fn locked(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a change callback. It fires after every structural mutation
    /// and after every applied elevation resolution.
    pub fn subscribe(&self, callback: PathChangedCallback) {
        self.locked().subscribers.push(callback);
    }

    /// Current path snapshot.
    pub fn snapshot(&self) -> Path {
        self.locked().path.clone()
    }

    pub fn max_gradient(&self) -> f64 {
        self.locked().max_gradient
    }

    /// Handle a map click: extend the path, notify, then issue lookups for
    /// the endpoints the click left pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn point_clicked(&self, point: GeoPoint) {
        let (tickets, snapshot, subscribers) = {
            let mut state = self.locked();
            let tickets = state.path.add_point(point);
            (tickets, state.path.clone(), state.subscribers.clone())
        };
        notify_all(&subscribers, &snapshot);
        for ticket in tickets {
            self.spawn_lookup(ticket);
        }
    }

    /// Handle an undo request. Any lookup still in flight for the removed
    /// point goes stale and is discarded on arrival.
    pub fn remove_last_requested(&self) {
        let notify = {
            let mut state = self.locked();
            state
                .path
                .remove_last_point()
                .then(|| (state.path.clone(), state.subscribers.clone()))
        };
        if let Some((snapshot, subscribers)) = notify {
            notify_all(&subscribers, &snapshot);
        }
    }

    /// Update the steepness threshold used for classification and notify so
    /// renderers can recolor.
    pub fn max_gradient_changed(&self, max_gradient: f64) {
        let (snapshot, subscribers) = {
            let mut state = self.locked();
            state.max_gradient = max_gradient;
            (state.path.clone(), state.subscribers.clone())
        };
        notify_all(&subscribers, &snapshot);
    }

    /// Replace the path with an imported one. No elevation re-lookup is
    /// performed; on a malformed import the current path stays untouched.
    pub fn file_imported(&self, bytes: &[u8]) -> Result<()> {
        let imported = codec::deserialize(bytes)?;
        let (snapshot, subscribers) = {
            let mut state = self.locked();
            state.path = imported;
            (state.path.clone(), state.subscribers.clone())
        };
        notify_all(&subscribers, &snapshot);
        Ok(())
    }

    /// Serialize the current path for export.
    pub fn export(&self) -> Result<String> {
        codec::serialize(&self.locked().path)
    }

    /// Drawable segment descriptors under the current threshold.
    pub fn segment_descriptors(&self) -> Vec<SegmentDescriptor> {
        let state = self.locked();
        state
            .path
            .segments()
            .iter()
            .map(|seg| SegmentDescriptor {
                src: seg.src,
                dst: seg.dst,
                color: classifier::classify(seg.gradient, state.max_gradient),
            })
            .collect()
    }

    /// Total known distance of the path in meters.
    pub fn total_distance(&self) -> f64 {
        self.locked().path.total_distance()
    }

    /// Distance covered while climbing, in meters.
    pub fn ascent_distance(&self) -> f64 {
        self.locked().path.ascent_distance()
    }

    /// Distance covered while descending, in meters.
    pub fn descent_distance(&self) -> f64 {
        self.locked().path.descent_distance()
    }

    fn spawn_lookup(&self, ticket: LookupTicket) {
        let engine = self.clone();
        let lookup = self.source.lookup(ticket.point);
        tokio::spawn(async move {
            let result = lookup.await;
            if let Err(ref e) = result {
                warn!(
                    "elevation lookup failed for {},{}: {}",
                    ticket.point.lat, ticket.point.lng, e
                );
            }
            let notify = {
                let mut state = engine.locked();
                match state.path.apply_lookup(&ticket, result) {
                    LookupOutcome::Applied => {
                        Some((state.path.clone(), state.subscribers.clone()))
                    }
                    LookupOutcome::Stale => {
                        debug!(
                            "discarding stale elevation result for segment {}",
                            ticket.segment
                        );
                        None
                    }
                }
            };
            if let Some((snapshot, subscribers)) = notify {
                notify_all(&subscribers, &snapshot);
            }
        });
    }
}

fn notify_all(subscribers: &[PathChangedCallback], snapshot: &Path) {
    for subscriber in subscribers {
        subscriber(snapshot);
    }
}

// ============================================================================
// Global engine
// ============================================================================

/// Global engine slot for hosts that want a single shared instance.
pub static ENGINE: Lazy<Mutex<Option<PathEngine>>> = Lazy::new(|| Mutex::new(None));

/// Install a global engine backed by `source` and return a handle to it.
pub fn init_engine(source: Arc<dyn ElevationSource>) -> PathEngine {
    let engine = PathEngine::new(source);
    let mut slot = ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *slot = Some(engine.clone());
    engine
}

/// Run `f` against the global engine, if one has been installed.
pub fn with_engine<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&PathEngine) -> R,
{
    let slot = ENGINE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    slot.as_ref().map(f)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::BoxFuture;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::classifier::{ASCENT_RAMP, NEUTRAL_COLOR};
    use crate::PathError;

    /// Source that resolves immediately with an elevation derived from the
    /// latitude, so different points get different heights.
    struct FlatEarthSource;

    impl ElevationSource for FlatEarthSource {
        fn lookup(&self, point: GeoPoint) -> BoxFuture<'static, Result<f64>> {
            Box::pin(async move { Ok(point.lat * 100.0) })
        }
    }

    /// Source whose lookups block until a permit is released, so tests can
    /// order resolutions relative to structural mutations.
    struct GatedSource {
        gate: Arc<Semaphore>,
    }

    impl GatedSource {
        fn new() -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            (Self { gate: gate.clone() }, gate)
        }
    }

    impl ElevationSource for GatedSource {
        fn lookup(&self, point: GeoPoint) -> BoxFuture<'static, Result<f64>> {
            let gate = self.gate.clone();
            Box::pin(async move {
                let _permit = gate.acquire().await.map_err(|e| PathError::LookupFailed {
                    message: e.to_string(),
                })?;
                Ok(point.lat * 100.0)
            })
        }
    }

    struct FailingSource;

    impl ElevationSource for FailingSource {
        fn lookup(&self, _point: GeoPoint) -> BoxFuture<'static, Result<f64>> {
            Box::pin(async move {
                Err(PathError::LookupFailed {
                    message: "unreachable".to_string(),
                })
            })
        }
    }

    async fn settle() {
        // Let spawned lookup tasks run to completion.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clicks_build_and_resolve_path() {
        let engine = PathEngine::new(Arc::new(FlatEarthSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        engine.point_clicked(GeoPoint::new(35.720, 51.400));
        settle().await;

        let path = engine.snapshot();
        assert_eq!(path.len(), 1);
        let seg = path.last().unwrap();
        assert!(seg.src_elevation.is_known());
        assert!(seg.dst_elevation.is_known());
        assert!(seg.gradient.unwrap() > 0.0);
        assert!(engine.total_distance() > 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_structural_notification_is_synchronous() {
        let engine = PathEngine::new(Arc::new(GatedSource::new().0));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        engine.subscribe(Arc::new(move |path: &Path| {
            assert_eq!(path.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        // The lookup is still gated, so the one notification observed so far
        // is the structural one.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolution_notifies_again() {
        let (source, gate) = GatedSource::new();
        let engine = PathEngine::new(Arc::new(source));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        engine.subscribe(Arc::new(move |_: &Path| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        gate.add_permits(1);
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(engine.snapshot().last().unwrap().src_elevation.is_known());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_removed_segment_discards_late_result() {
        let (source, gate) = GatedSource::new();
        let engine = PathEngine::new(Arc::new(source));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        engine.subscribe(Arc::new(move |_: &Path| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        engine.remove_last_requested();
        let after_mutations = calls.load(Ordering::SeqCst);
        assert_eq!(after_mutations, 2);
        assert!(engine.snapshot().is_empty());

        // Release the lookup after removal: it must neither resurrect the
        // segment nor notify.
        gate.add_permits(1);
        settle().await;
        assert!(engine.snapshot().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), after_mutations);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_lookup_leaves_neutral_segment() {
        let engine = PathEngine::new(Arc::new(FailingSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        engine.point_clicked(GeoPoint::new(35.720, 51.400));
        settle().await;

        let path = engine.snapshot();
        let seg = path.last().unwrap();
        assert!(!seg.src_elevation.is_known());
        assert!(!seg.src_elevation.is_pending());
        assert_eq!(seg.gradient, None);

        let descriptors = engine.segment_descriptors();
        assert_eq!(descriptors[0].color, NEUTRAL_COLOR);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_descriptors_follow_threshold() {
        let engine = PathEngine::new(Arc::new(FlatEarthSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        engine.point_clicked(GeoPoint::new(35.720, 51.400));
        settle().await;

        // Tiny threshold: any climb classifies as steepest.
        engine.max_gradient_changed(1e-9);
        let descriptors = engine.segment_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].color, ASCENT_RAMP[5]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_import_round_trip() {
        let engine = PathEngine::new(Arc::new(FlatEarthSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        engine.point_clicked(GeoPoint::new(35.720, 51.400));
        settle().await;

        let exported = engine.export().unwrap();
        let original = engine.snapshot();

        let restored = PathEngine::new(Arc::new(FlatEarthSource));
        restored.file_imported(exported.as_bytes()).unwrap();
        assert_eq!(restored.snapshot(), original);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_malformed_import_keeps_existing_path() {
        let engine = PathEngine::new(Arc::new(FlatEarthSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        settle().await;
        let before = engine.snapshot();

        assert!(engine.file_imported(b"{broken").is_err());
        assert_eq!(engine.snapshot(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_global_engine_accessor() {
        let engine = init_engine(Arc::new(FlatEarthSource));
        engine.point_clicked(GeoPoint::new(35.713, 51.396));
        settle().await;

        let len = with_engine(|e| e.snapshot().len());
        assert_eq!(len, Some(1));
    }
}
