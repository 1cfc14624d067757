//! The accumulated event set and everything that changes it.
//!
//! Feed payloads are normalized into [`EarthquakeEvent`]s and merged by id
//! into an append-only set. Additions are written to the local store after a
//! quiet period; once a day records older than a year are pruned and the
//! result written immediately. Every write of the set goes through one
//! versioned writer on the blocking pool, so an older snapshot never lands
//! after a newer one. Storage problems are logged and otherwise ignored, so
//! the pipeline keeps working in memory.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Months, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::debounce::Debouncer;
use crate::filters::{FilterOptions, SortOption, derive_display};
use crate::geo::classify;
use crate::models::{Coordinates, EarthquakeEvent, Feature};
use crate::store::{EVENTS_KEY, KeyValueStore, LAST_PRUNE_KEY};

/// Only the first this-many features of a payload are ingested.
pub const FEATURE_CAP: usize = 1000;

/// Quiet period before accumulated events are written out.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Minimum time between retention prunes.
pub const PRUNE_PERIOD_MS: i64 = 24 * 60 * 60 * 1000;

/// Turn a raw feed payload into normalized records.
///
/// A payload without a `features` list yields an empty batch. Features that
/// cannot be read are skipped.
#[must_use]
pub fn normalize(payload: &serde_json::Value, user_location: Option<Coordinates>) -> Vec<EarthquakeEvent> {
    let Some(features) = payload.get("features").and_then(serde_json::Value::as_array) else {
        debug!("payload has no feature list");
        return Vec::new();
    };

    features
        .iter()
        .take(FEATURE_CAP)
        .filter_map(|raw| match Feature::deserialize(raw) {
            Ok(feature) if feature.is_usable() => {
                Some(EarthquakeEvent::from_feature(&feature, user_location))
            }
            Ok(feature) => {
                debug!(id = %feature.id, "skipping feature without id or coordinates");
                None
            }
            Err(e) => {
                debug!("skipping unreadable feature: {e}");
                None
            }
        })
        .collect()
}

/// One year before `now` on the calendar.
#[must_use]
pub fn one_year_before(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(12))
        .unwrap_or(now - chrono::Duration::days(365))
}

/// Sole writer of [`EVENTS_KEY`].
///
/// Writes are serialized, and one carrying a version at or below the last
/// written version is dropped.
struct HistoryWriter {
    store: Arc<dyn KeyValueStore>,
    written: Mutex<u64>,
}

impl HistoryWriter {
    fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            written: Mutex::new(0),
        }
    }

    /// Blocking. Run through [`write_snapshot`] from async code.
    fn write(&self, version: u64, events: &[EarthquakeEvent]) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if *written >= version {
            debug!(version, written = *written, "skipping superseded history write");
            return;
        }
        write_events(self.store.as_ref(), events);
        *written = version;
    }
}

/// Hand a snapshot to the writer on the blocking pool and wait for it.
async fn write_snapshot(writer: Arc<HistoryWriter>, version: u64, events: Arc<Vec<EarthquakeEvent>>) {
    let task = tokio::task::spawn_blocking(move || writer.write(version, &events));
    if let Err(e) = task.await {
        warn!("history write task failed: {e}");
    }
}

/// Owner of the accumulated event set.
pub struct EventPipeline {
    events: Arc<Vec<EarthquakeEvent>>,
    ids: HashSet<String>,
    store: Arc<dyn KeyValueStore>,
    writer: Arc<HistoryWriter>,
    /// Bumped on every change to `events`.
    version: u64,
    persist: Debouncer,
    last_prune_ms: i64,
}

impl EventPipeline {
    /// Build a pipeline from whatever the store holds.
    ///
    /// Missing or corrupt data starts an empty set with a zero prune time.
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let stored = match store.get(EVENTS_KEY) {
            Ok(Some(json)) => serde_json::from_str::<Vec<EarthquakeEvent>>(&json)
                .inspect_err(|e| warn!("ignoring corrupt stored events: {e}"))
                .unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to load stored earthquake data: {e}");
                Vec::new()
            }
        };

        let last_prune_ms = read_last_prune(store.as_ref()).unwrap_or(0);

        let mut pipeline = Self {
            events: Arc::new(Vec::with_capacity(stored.len())),
            ids: HashSet::with_capacity(stored.len()),
            writer: Arc::new(HistoryWriter::new(Arc::clone(&store))),
            store,
            version: 0,
            persist: Debouncer::new(PERSIST_DEBOUNCE),
            last_prune_ms,
        };

        let events = Arc::make_mut(&mut pipeline.events);
        for mut event in stored {
            if pipeline.ids.insert(event.id.clone()) {
                event.impact_level = classify(event.magnitude);
                events.push(event);
            }
        }

        info!(events = pipeline.events.len(), "restored event history");
        pipeline
    }

    /// Shared view of the accumulated set.
    #[must_use]
    pub fn events(&self) -> &Arc<Vec<EarthquakeEvent>> {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn last_prune_ms(&self) -> i64 {
        self.last_prune_ms
    }

    /// Whether a debounced write is waiting to run.
    #[must_use]
    pub fn has_pending_write(&self) -> bool {
        self.persist.is_pending()
    }

    /// Normalize a payload and merge it. Returns the number of new records.
    pub fn ingest(&mut self, payload: &serde_json::Value, user_location: Option<Coordinates>) -> usize {
        let batch = normalize(payload, user_location);
        self.merge(batch)
    }

    /// Append records whose id has not been seen. Existing records are never
    /// replaced. Returns the number added.
    ///
    /// Must be called from within a tokio runtime when anything is added,
    /// since the debounced write is spawned onto it.
    pub fn merge(&mut self, batch: Vec<EarthquakeEvent>) -> usize {
        let fresh: Vec<EarthquakeEvent> = batch
            .into_iter()
            .filter(|event| self.ids.insert(event.id.clone()))
            .collect();

        if fresh.is_empty() {
            return 0;
        }

        let added = fresh.len();
        Arc::make_mut(&mut self.events).extend(fresh);
        self.version += 1;
        debug!(added, total = self.events.len(), "merged new events");

        self.schedule_persist();
        added
    }

    fn schedule_persist(&mut self) {
        let write = write_snapshot(Arc::clone(&self.writer), self.version, Arc::clone(&self.events));
        debug!(
            version = self.version,
            delay_ms = self.persist.delay().as_millis(),
            "history write scheduled"
        );
        self.persist.schedule(write);
    }

    /// Drop records older than a year if the last prune was more than a day
    /// ago. Returns the number removed, or `None` when no prune was due.
    ///
    /// A stored prune time that is negative, unreadable or in the future
    /// counts as never pruned.
    pub async fn prune_if_due(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let now_ms = now.timestamp_millis();
        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || read_last_prune(store.as_ref()))
            .await
            .unwrap_or_else(|e| {
                warn!("prune time read task failed: {e}");
                None
            });

        let mut last = stored.unwrap_or(self.last_prune_ms);
        if last > now_ms {
            warn!(last_prune_ms = last, "ignoring prune time in the future");
            last = 0;
        }
        if now_ms.saturating_sub(last) <= PRUNE_PERIOD_MS {
            return None;
        }

        let cutoff = one_year_before(now).timestamp_millis();
        let before = self.events.len();

        if self.events.iter().any(|e| e.time <= cutoff) {
            let kept: Vec<EarthquakeEvent> =
                self.events.iter().filter(|e| e.time > cutoff).cloned().collect();
            self.ids = kept.iter().map(|e| e.id.clone()).collect();
            self.events = Arc::new(kept);
            self.version += 1;

            // Anything queued holds the pre-prune set.
            self.persist.cancel_and_wait().await;
            write_snapshot(Arc::clone(&self.writer), self.version, Arc::clone(&self.events)).await;
        }

        self.last_prune_ms = now_ms;
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.set(LAST_PRUNE_KEY, &now_ms.to_string())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("failed to record prune time: {e}"),
            Err(e) => warn!("prune time write task failed: {e}"),
        }

        let removed = before - self.events.len();
        info!(removed, remaining = self.events.len(), "retention prune complete");
        Some(removed)
    }

    /// Filtered, sorted and truncated view of the accumulated set.
    #[must_use]
    pub fn display(&self, filters: &FilterOptions, sort: SortOption) -> Vec<EarthquakeEvent> {
        derive_display(&self.events, filters, sort)
    }

    /// Stop the debounce timer. A write that was still waiting is performed
    /// now instead, so nothing is written once this returns.
    pub async fn shutdown(&mut self) {
        if self.persist.cancel_and_wait().await {
            debug!(version = self.version, "flushing pending write on shutdown");
        }
        // Also waits out a write already running on the blocking pool.
        write_snapshot(Arc::clone(&self.writer), self.version, Arc::clone(&self.events)).await;
    }
}

fn read_last_prune(store: &dyn KeyValueStore) -> Option<i64> {
    match store.get(LAST_PRUNE_KEY) {
        Ok(Some(raw)) => Some(raw.trim().parse::<i64>().map_or(0, |ms| ms.max(0))),
        Ok(None) => Some(0),
        Err(e) => {
            warn!("failed to read prune time: {e}");
            None
        }
    }
}

fn write_events(store: &dyn KeyValueStore, events: &[EarthquakeEvent]) {
    let json = match serde_json::to_string(events) {
        Ok(json) => json,
        Err(e) => {
            warn!("failed to serialize earthquake data: {e}");
            return;
        }
    };

    match store.set(EVENTS_KEY, &json) {
        Ok(()) => debug!(events = events.len(), "saved earthquake data"),
        Err(e) => warn!("failed to save earthquake data: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::errors::QuakeError;
    use crate::models::ImpactLevel;
    use crate::store::MemoryStore;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, QuakeError> {
            Err(QuakeError::Storage(std::io::Error::other("disk on fire")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), QuakeError> {
            Err(QuakeError::Storage(std::io::Error::other("disk on fire")))
        }
    }

    /// Memory store whose history writes take a while and report overlap.
    #[derive(Default)]
    struct SlowStore {
        inner: MemoryStore,
        history_writes: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl KeyValueStore for SlowStore {
        fn get(&self, key: &str) -> Result<Option<String>, QuakeError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), QuakeError> {
            if key != EVENTS_KEY {
                return self.inner.set(key, value);
            }
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            self.history_writes.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            let result = self.inner.set(key, value);
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn feature(id: &str, mag: f64, time: i64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "id": id,
            "properties": { "mag": mag, "time": time, "title": format!("M {mag}"), "place": "Somewhere", "tsunami": 0 },
            "geometry": { "type": "Point", "coordinates": [100.0, 15.0, 10.0] }
        })
    }

    fn payload(features: Vec<serde_json::Value>) -> serde_json::Value {
        json!({ "type": "FeatureCollection", "features": features })
    }

    fn record(id: &str, time: i64) -> EarthquakeEvent {
        let mut events = normalize(&payload(vec![feature(id, 3.0, time)]), None);
        events.remove(0)
    }

    fn memory_pipeline() -> (Arc<MemoryStore>, EventPipeline) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = EventPipeline::restore(store.clone());
        (store, pipeline)
    }

    fn stored_ids(store: &MemoryStore) -> Vec<String> {
        let json = store.get(EVENTS_KEY).unwrap().unwrap_or_else(|| "[]".into());
        let events: Vec<EarthquakeEvent> = serde_json::from_str(&json).unwrap();
        events.into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn test_normalize_end_to_end_example() {
        let raw = payload(vec![feature("a", 3.0, 100), feature("b", 6.0, 200)]);
        let events = normalize(&raw, None);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].impact_level, ImpactLevel::Minor);
        assert_eq!(events[1].impact_level, ImpactLevel::Major);
        assert!(events.iter().all(|e| e.distance_from_user.is_none()));
    }

    #[test]
    fn test_normalize_malformed_payload_is_empty() {
        assert!(normalize(&json!(null), None).is_empty());
        assert!(normalize(&json!({"type": "FeatureCollection"}), None).is_empty());
        assert!(normalize(&json!({"features": "nope"}), None).is_empty());
        assert!(normalize(&json!([1, 2, 3]), None).is_empty());
    }

    #[test]
    fn test_normalize_skips_bad_features() {
        let raw = payload(vec![
            feature("good", 2.0, 1),
            json!({"id": "no-geometry", "properties": {}}),
            json!({"id": "short", "geometry": {"coordinates": [1.0]}}),
        ]);
        let events = normalize(&raw, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "good");
    }

    #[test]
    fn test_normalize_caps_features() {
        let raw = payload((0..1500).map(|i| feature(&format!("e{i}"), 1.0, i)).collect());
        let events = normalize(&raw, None);
        assert_eq!(events.len(), FEATURE_CAP);
        assert_eq!(events.last().map(|e| e.id.as_str()), Some("e999"));
    }

    #[test]
    fn test_normalize_computes_distance_when_located() {
        let raw = payload(vec![feature("a", 3.0, 1)]);
        let events = normalize(&raw, Some(Coordinates::new(15.0, 100.0)));
        let distance = events[0].distance_from_user.unwrap();
        assert!(distance.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let (_store, mut pipeline) = memory_pipeline();
        let raw = payload(vec![feature("a", 3.0, 100), feature("b", 6.0, 200)]);

        assert_eq!(pipeline.ingest(&raw, None), 2);
        let after_first = Arc::clone(pipeline.events());

        assert_eq!(pipeline.ingest(&raw, None), 0);
        assert!(Arc::ptr_eq(&after_first, pipeline.events()));
        assert_eq!(pipeline.len(), 2);
    }

    #[tokio::test]
    async fn test_merge_adds_only_unseen() {
        let (_store, mut pipeline) = memory_pipeline();
        pipeline.ingest(&payload(vec![feature("a", 1.0, 1), feature("b", 1.0, 2)]), None);
        let n = pipeline.len();

        let added = pipeline.ingest(
            &payload(vec![
                feature("b", 1.0, 2),
                feature("c", 1.0, 3),
                feature("a", 1.0, 1),
                feature("d", 1.0, 4),
            ]),
            None,
        );

        assert_eq!(added, 2);
        assert_eq!(pipeline.len(), n + 2);
        assert!(pipeline.contains("c") && pipeline.contains("d"));
    }

    #[tokio::test]
    async fn test_distance_frozen_at_first_sight() {
        let (_store, mut pipeline) = memory_pipeline();
        let raw = payload(vec![feature("a", 3.0, 1)]);

        pipeline.ingest(&raw, None);
        pipeline.ingest(&raw, Some(Coordinates::new(0.0, 0.0)));

        assert_eq!(pipeline.events()[0].distance_from_user, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_is_debounced() {
        let (store, mut pipeline) = memory_pipeline();

        pipeline.ingest(&payload(vec![feature("a", 1.0, 1)]), None);
        tokio::time::sleep(Duration::from_millis(3000)).await;
        pipeline.ingest(&payload(vec![feature("b", 1.0, 2)]), None);
        tokio::time::sleep(Duration::from_millis(3000)).await;

        // 6s after the first merge but only 3s after the second
        assert!(store.get(EVENTS_KEY).unwrap().is_none());
        assert!(pipeline.has_pending_write());

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(stored_ids(&store), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_new_records_schedules_nothing() {
        let (store, mut pipeline) = memory_pipeline();
        let raw = payload(vec![feature("a", 1.0, 1)]);
        pipeline.ingest(&raw, None);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(stored_ids(&store), vec!["a"]);

        pipeline.ingest(&raw, None);
        assert!(!pipeline.has_pending_write());
    }

    #[tokio::test]
    async fn test_restore_round_trip() {
        let (store, mut pipeline) = memory_pipeline();
        pipeline.ingest(&payload(vec![feature("a", 5.0, 10), feature("b", 7.5, 20)]), None);
        pipeline.shutdown().await;

        let restored = EventPipeline::restore(store.clone());
        assert_eq!(restored.len(), 2);
        assert!(restored.contains("a") && restored.contains("b"));
        assert_eq!(restored.events()[1].impact_level, ImpactLevel::Severe);
    }

    #[test]
    fn test_restore_from_corrupt_store() {
        let store = Arc::new(MemoryStore::new());
        store.set(EVENTS_KEY, "{not json").unwrap();
        store.set(LAST_PRUNE_KEY, "yesterday").unwrap();

        let pipeline = EventPipeline::restore(store);
        assert!(pipeline.is_empty());
        assert_eq!(pipeline.last_prune_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broken_store_keeps_working_in_memory() {
        let mut pipeline = EventPipeline::restore(Arc::new(BrokenStore));
        assert!(pipeline.is_empty());

        assert_eq!(pipeline.ingest(&payload(vec![feature("a", 1.0, 1)]), None), 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(pipeline.len(), 1);

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(pipeline.prune_if_due(now).await, Some(1));
        assert!(pipeline.is_empty());
    }

    #[tokio::test]
    async fn test_prune_retention_window() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let year_and_day = one_year_before(now) - chrono::Duration::days(1);
        let six_months = now.checked_sub_months(Months::new(6)).unwrap();

        let seed = vec![
            record("old", year_and_day.timestamp_millis()),
            record("recent", six_months.timestamp_millis()),
        ];
        store.set(EVENTS_KEY, &serde_json::to_string(&seed).unwrap()).unwrap();
        let mut pipeline = EventPipeline::restore(store.clone());
        assert_eq!(pipeline.len(), 2);

        assert_eq!(pipeline.prune_if_due(now).await, Some(1));
        assert!(!pipeline.contains("old"));
        assert!(pipeline.contains("recent"));
        assert_eq!(stored_ids(&store), vec!["recent"]);
        assert_eq!(
            store.get(LAST_PRUNE_KEY).unwrap(),
            Some(now.timestamp_millis().to_string())
        );
    }

    #[tokio::test]
    async fn test_prune_runs_once_per_day() {
        let (store, mut pipeline) = memory_pipeline();
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();

        // Nothing to remove, but the timestamp still moves.
        assert_eq!(pipeline.prune_if_due(now).await, Some(0));
        assert!(store.get(EVENTS_KEY).unwrap().is_none());
        assert_eq!(pipeline.last_prune_ms(), now.timestamp_millis());

        let later = now + chrono::Duration::hours(23);
        assert_eq!(pipeline.prune_if_due(later).await, None);

        let next_day = now + chrono::Duration::hours(25);
        assert_eq!(pipeline.prune_if_due(next_day).await, Some(0));
    }

    #[tokio::test]
    async fn test_prune_with_corrupt_prune_time() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let future = (now + chrono::Duration::days(30)).timestamp_millis();

        for raw in [i64::MIN.to_string(), "-1".to_string(), future.to_string()] {
            let (store, mut pipeline) = memory_pipeline();
            store.set(LAST_PRUNE_KEY, &raw).unwrap();

            assert_eq!(pipeline.prune_if_due(now).await, Some(0), "stored prune time {raw}");
            assert_eq!(
                store.get(LAST_PRUNE_KEY).unwrap(),
                Some(now.timestamp_millis().to_string())
            );
        }

        let store = Arc::new(MemoryStore::new());
        store.set(LAST_PRUNE_KEY, &i64::MIN.to_string()).unwrap();
        assert_eq!(EventPipeline::restore(store).last_prune_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_supersedes_pending_write() {
        let (store, mut pipeline) = memory_pipeline();
        let now = Utc::now();
        let ancient = (now - chrono::Duration::days(800)).timestamp_millis();
        let fresh = (now - chrono::Duration::days(1)).timestamp_millis();

        pipeline.ingest(&payload(vec![feature("old", 1.0, ancient), feature("new", 1.0, fresh)]), None);
        assert!(pipeline.has_pending_write());

        pipeline.prune_if_due(now).await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(stored_ids(&store), vec!["new"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prune_waits_out_running_write() {
        let store = Arc::new(SlowStore::default());
        let mut pipeline = EventPipeline::restore(store.clone());
        pipeline.persist = Debouncer::new(Duration::from_millis(20));

        let now = Utc::now();
        let ancient = (now - chrono::Duration::days(800)).timestamp_millis();
        let fresh = (now - chrono::Duration::days(1)).timestamp_millis();
        pipeline.ingest(&payload(vec![feature("old", 1.0, ancient), feature("new", 1.0, fresh)]), None);

        // The debounced write of the unpruned set has reached the store.
        while store.history_writes.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(pipeline.prune_if_due(now).await, Some(1));
        pipeline.shutdown().await;

        assert_eq!(stored_ids(&store.inner), vec!["new"]);
        assert_eq!(store.history_writes.load(Ordering::SeqCst), 2);
        assert_eq!(store.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_superseded_write_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let writer = HistoryWriter::new(store.clone());

        writer.write(2, &[record("new", 2)]);
        writer.write(1, &[record("old", 1), record("new", 2)]);
        assert_eq!(stored_ids(&store), vec!["new"]);

        writer.write(3, &[record("newer", 3)]);
        assert_eq!(stored_ids(&store), vec!["newer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_write() {
        let (store, mut pipeline) = memory_pipeline();
        pipeline.ingest(&payload(vec![feature("a", 1.0, 1)]), None);

        pipeline.shutdown().await;
        assert_eq!(stored_ids(&store), vec!["a"]);
        assert!(!pipeline.has_pending_write());
    }

    #[tokio::test]
    async fn test_display_end_to_end_example() {
        let (_store, mut pipeline) = memory_pipeline();
        pipeline.ingest(&payload(vec![feature("a", 3.0, 100), feature("b", 6.0, 200)]), None);

        let mut filters = FilterOptions::default();
        filters.impact_levels.insert(ImpactLevel::Major);
        let shown = pipeline.display(&filters, SortOption::TimeDesc);

        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, "b");
    }
}
