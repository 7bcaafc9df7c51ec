// Snapshot persistence. One JSON file holding either the current
// per-resolution object format or a legacy flat point list, which gets
// migrated by replaying it through the store.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

use super::{Bucket, HistoryStore};
use crate::models::ChartDataPoint;

/// On-disk shapes this codec understands.
#[derive(Debug)]
pub enum PersistedShape {
    /// Object keyed by resolution label, each value a list of
    /// `{point, samples}` records. Buckets are validated individually.
    MultiResolution(BTreeMap<String, Vec<serde_json::Value>>),
    /// Flat list of historical points from before resolutions existed.
    LegacyFlatList(Vec<ChartDataPoint>),
    /// Neither known format; treated as empty history.
    Unrecognized,
}

/// Sniffs the snapshot shape. Top-level arrays are the legacy flat list
/// (malformed entries dropped), objects with array values are the
/// multi-resolution format, anything else is unrecognized.
pub fn classify(bytes: &[u8]) -> PersistedShape {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "history snapshot is not valid JSON");
            return PersistedShape::Unrecognized;
        }
    };

    match value {
        serde_json::Value::Array(items) => {
            let mut points = Vec::with_capacity(items.len());
            for item in items {
                match serde_json::from_value::<ChartDataPoint>(item) {
                    Ok(p) => points.push(p),
                    Err(e) => tracing::debug!(error = %e, "dropping malformed legacy point"),
                }
            }
            PersistedShape::LegacyFlatList(points)
        }
        serde_json::Value::Object(map) => {
            let mut series = BTreeMap::new();
            for (label, entry) in map {
                match entry {
                    serde_json::Value::Array(buckets) => {
                        series.insert(label, buckets);
                    }
                    _ => return PersistedShape::Unrecognized,
                }
            }
            PersistedShape::MultiResolution(series)
        }
        _ => PersistedShape::Unrecognized,
    }
}

/// Rebuilds a store from snapshot bytes. Legacy lists replay every point
/// through `append_sample`, reconstructing all four resolutions from the
/// flat history. Multi-resolution buckets are dropped when structurally
/// invalid (`samples < 1`, missing or non-numeric fields) or older than
/// their resolution's window at load time. An unrecognized shape yields an
/// empty store.
pub fn restore(bytes: &[u8], long_retention_ms: u64, now_ms: u64) -> HistoryStore {
    match classify(bytes) {
        PersistedShape::LegacyFlatList(points) => {
            tracing::info!(points = points.len(), "migrating legacy flat history");
            let mut store = HistoryStore::new(long_retention_ms);
            for point in &points {
                store.append_sample(point);
            }
            store
        }
        PersistedShape::MultiResolution(series) => {
            let mut store = HistoryStore::new(long_retention_ms);
            let mut dropped = 0usize;
            for s in &mut store.series {
                let Some(raw_buckets) = series.get(s.spec.label) else {
                    continue;
                };
                for raw in raw_buckets {
                    match serde_json::from_value::<Bucket>(raw.clone()) {
                        Ok(bucket)
                            if bucket.samples >= 1
                                && now_ms.saturating_sub(bucket.point.timestamp)
                                    <= s.spec.retention_ms =>
                        {
                            s.buckets.push_back(bucket);
                        }
                        Ok(_) | Err(_) => dropped += 1,
                    }
                }
            }
            if dropped > 0 {
                tracing::debug!(dropped, "dropped malformed or stale history buckets");
            }
            store
        }
        PersistedShape::Unrecognized => HistoryStore::new(long_retention_ms),
    }
}

/// Serializes the per-resolution bucket arrays. The caller passes a
/// point-in-time view (read-locked store), so the file never sees a
/// half-merged bucket.
pub fn snapshot_bytes(store: &HistoryStore) -> anyhow::Result<Vec<u8>> {
    let mut out: BTreeMap<&str, &VecDeque<Bucket>> = BTreeMap::new();
    for s in &store.series {
        out.insert(s.spec.label, &s.buckets);
    }
    Ok(serde_json::to_vec(&out)?)
}

/// Loads the snapshot file; a missing or unreadable file starts empty
/// rather than failing startup.
pub async fn load_file(path: &str, long_retention_ms: u64, now_ms: u64) -> HistoryStore {
    match tokio::fs::read(path).await {
        Ok(bytes) => restore(&bytes, long_retention_ms, now_ms),
        Err(e) => {
            tracing::info!(path, error = %e, "no history snapshot; starting empty");
            HistoryStore::new(long_retention_ms)
        }
    }
}

/// Writes the snapshot atomically (temp file + rename).
pub async fn save_file(path: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = format!("{path}.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
