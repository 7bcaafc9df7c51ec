// Multi-resolution rolling history. Four fixed-granularity series over one
// sample stream; an append merges into the newest bucket or opens a new one,
// then trims buckets that fell out of the retention window.

pub mod persist;
pub mod wire;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::models::{ChartDataPoint, TorrentRate};
use serde::{Deserialize, Serialize};

const MS_PER_MINUTE: u64 = 60_000;
const MS_PER_HOUR: u64 = 3_600_000;
const MS_PER_DAY: u64 = 86_400_000;

/// Fixed resolution labels, in series order.
pub const RESOLUTION_LABELS: [&str; 4] = ["1h", "1d", "1w", "1m"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionSpec {
    pub label: &'static str,
    /// Time quantum a sample timestamp is snapped to. Zero keeps every raw
    /// sample as its own bucket.
    pub bucket_ms: u64,
    pub retention_ms: u64,
}

/// Bucket widths and windows for the four resolutions. Only the longest
/// window is configurable.
pub fn resolution_specs(long_retention_ms: u64) -> [ResolutionSpec; 4] {
    [
        ResolutionSpec {
            label: "1h",
            bucket_ms: MS_PER_MINUTE,
            retention_ms: MS_PER_HOUR,
        },
        ResolutionSpec {
            label: "1d",
            bucket_ms: MS_PER_MINUTE,
            retention_ms: MS_PER_DAY,
        },
        ResolutionSpec {
            label: "1w",
            bucket_ms: 5 * MS_PER_MINUTE,
            retention_ms: 7 * MS_PER_DAY,
        },
        ResolutionSpec {
            label: "1m",
            bucket_ms: 30 * MS_PER_MINUTE,
            retention_ms: long_retention_ms,
        },
    ]
}

/// One aggregation slot: a running-average point plus how many raw samples
/// were folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub point: ChartDataPoint,
    pub samples: u32,
}

#[derive(Debug)]
pub struct ResolutionSeries {
    pub spec: ResolutionSpec,
    /// Oldest-first; timestamps strictly increasing as long as input order
    /// is non-decreasing.
    pub buckets: VecDeque<Bucket>,
}

/// In-process history store. Owned by one task tree behind a lock, mutated
/// only through `append_sample`, persisted periodically.
#[derive(Debug)]
pub struct HistoryStore {
    series: Vec<ResolutionSeries>,
    long_retention_ms: u64,
}

impl HistoryStore {
    pub fn new(long_retention_ms: u64) -> Self {
        Self {
            series: resolution_specs(long_retention_ms)
                .into_iter()
                .map(|spec| ResolutionSeries {
                    spec,
                    buckets: VecDeque::new(),
                })
                .collect(),
            long_retention_ms,
        }
    }

    pub fn long_retention_ms(&self) -> u64 {
        self.long_retention_ms
    }

    pub fn series(&self) -> &[ResolutionSeries] {
        &self.series
    }

    pub fn series_by_label(&self, label: &str) -> Option<&ResolutionSeries> {
        self.series.iter().find(|s| s.spec.label == label)
    }

    /// Folds one sample into every resolution, then evicts buckets that fell
    /// out of the window relative to the sample's timestamp.
    ///
    /// Inputs are expected in non-decreasing timestamp order; a sample older
    /// than the newest bucket opens a new out-of-order bucket rather than
    /// being re-sorted (accepted limitation, the only producer is a single
    /// timer). Scalar values are stored as-is; their validity is the
    /// producer's responsibility.
    pub fn append_sample(&mut self, sample: &ChartDataPoint) {
        for series in &mut self.series {
            series.append(sample);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.buckets.is_empty())
    }
}

impl ResolutionSeries {
    fn append(&mut self, sample: &ChartDataPoint) {
        let bucket_ts = if self.spec.bucket_ms == 0 {
            sample.timestamp
        } else {
            (sample.timestamp / self.spec.bucket_ms) * self.spec.bucket_ms
        };

        match self.buckets.back_mut() {
            Some(last) if last.point.timestamp == bucket_ts => merge_sample(last, sample),
            _ => {
                let mut point = sample.clone();
                point.timestamp = bucket_ts;
                self.buckets.push_back(Bucket { point, samples: 1 });
            }
        }

        // Keep only buckets strictly newer than the window start; a bucket
        // sitting exactly at sample_ts - retention is evicted. Signed math,
        // so a window wider than the whole timeline evicts nothing.
        let cutoff = sample.timestamp as i64 - self.spec.retention_ms as i64;
        while self
            .buckets
            .front()
            .is_some_and(|b| b.point.timestamp as i64 <= cutoff)
        {
            self.buckets.pop_front();
        }
    }
}

/// Incremental mean over every field for a bucket receiving its n-th sample.
/// Keyed maps average over the union of keys, an absent value on either side
/// contributing 0: a service that stops reporting mid-bucket is averaged
/// toward zero, not excluded. That understates latency after intermittent
/// outages and is kept as observed behavior.
fn merge_sample(bucket: &mut Bucket, sample: &ChartDataPoint) {
    let prev = bucket.samples as f64;
    let next = prev + 1.0;
    let point = &mut bucket.point;

    point.download_rate = (point.download_rate * prev + sample.download_rate) / next;
    point.upload_rate = (point.upload_rate * prev + sample.upload_rate) / next;
    point.load1 = (point.load1 * prev + sample.load1) / next;
    point.load5 = (point.load5 * prev + sample.load5) / next;
    point.load15 = (point.load15 * prev + sample.load15) / next;

    merge_keyed(&mut point.response_times, &sample.response_times, prev, next);
    merge_keyed(&mut point.memory_usage, &sample.memory_usage, prev, next);
    merge_torrents(&mut point.torrent_rates, &sample.torrent_rates, prev, next);

    bucket.samples += 1;
}

fn merge_keyed(
    target: &mut BTreeMap<String, f64>,
    incoming: &BTreeMap<String, f64>,
    prev: f64,
    next: f64,
) {
    let keys: BTreeSet<String> = target.keys().chain(incoming.keys()).cloned().collect();
    for key in keys {
        let current = target.get(&key).copied().unwrap_or(0.0);
        let sampled = incoming.get(&key).copied().unwrap_or(0.0);
        target.insert(key, (current * prev + sampled) / next);
    }
}

fn merge_torrents(
    target: &mut BTreeMap<String, TorrentRate>,
    incoming: &BTreeMap<String, TorrentRate>,
    prev: f64,
    next: f64,
) {
    let keys: BTreeSet<String> = target.keys().chain(incoming.keys()).cloned().collect();
    for key in keys {
        let current = target.get(&key);
        let sampled = incoming.get(&key);
        let name = sampled
            .map(|t| t.name.clone())
            .or_else(|| current.map(|t| t.name.clone()))
            .unwrap_or_default();
        let merged = TorrentRate {
            name,
            download_rate: (current.map_or(0.0, |t| t.download_rate) * prev
                + sampled.map_or(0.0, |t| t.download_rate))
                / next,
            upload_rate: (current.map_or(0.0, |t| t.upload_rate) * prev
                + sampled.map_or(0.0, |t| t.upload_rate))
                / next,
        };
        target.insert(key, merged);
    }
}
