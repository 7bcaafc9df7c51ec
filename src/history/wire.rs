// Columnar wire payload for /api/charts. Row-like points with nested maps
// serialize poorly (every key name repeated per point), so the payload is
// parallel arrays per resolution with shared name tables, rounded or
// quantized where full precision buys nothing on a chart.

use std::collections::{BTreeMap, BTreeSet};

use super::HistoryStore;
use crate::models::{ChartDataPoint, TorrentRate};
use serde::{Deserialize, Serialize};

/// Response-time quantum, ms. Encoded values are `round(ms / 10)`; decoding
/// multiplies back, so 123 ms comes back as 120 ms. Lossy by design.
pub const RESPONSE_TIME_QUANTUM_MS: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactPayload {
    /// Shared lookup tables; every resolution's keyed arrays use these, so
    /// the client never needs per-resolution key lists.
    pub service_names: Vec<String>,
    pub container_names: Vec<String>,
    /// Torrent id -> display name.
    pub torrent_names: BTreeMap<String, String>,
    /// Longest configured window, ms, so the client can derive axis bounds
    /// without hardcoding it.
    pub long_retention_ms: u64,
    pub resolutions: BTreeMap<String, CompactSeries>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactSeries {
    pub data_points: usize,
    pub timestamps: Vec<u64>,
    /// Bytes/sec, rounded to integers.
    pub download_rate: Vec<u64>,
    /// Bytes/sec, rounded to integers.
    pub upload_rate: Vec<u64>,
    /// Load average, two decimals.
    pub load1: Vec<f64>,
    pub samples: Vec<u32>,
    /// Per service, `round(ms / 10)`.
    pub response_times: BTreeMap<String, Vec<u32>>,
    /// Whole megabytes.
    pub memory_usage: BTreeMap<String, Vec<u32>>,
    /// Bytes/sec per torrent id, rounded.
    pub torrent_download: BTreeMap<String, Vec<u64>>,
    pub torrent_upload: BTreeMap<String, Vec<u64>>,
}

pub fn quantize_response_time(ms: f64) -> u32 {
    (ms / RESPONSE_TIME_QUANTUM_MS).round() as u32
}

/// Read-only transform of the store into the compact payload. Name tables
/// are the union of keys seen across all resolutions' buckets.
pub fn build_payload(store: &HistoryStore) -> CompactPayload {
    let mut service_names: BTreeSet<String> = BTreeSet::new();
    let mut container_names: BTreeSet<String> = BTreeSet::new();
    let mut torrent_names: BTreeMap<String, String> = BTreeMap::new();
    for series in &store.series {
        for bucket in &series.buckets {
            service_names.extend(bucket.point.response_times.keys().cloned());
            container_names.extend(bucket.point.memory_usage.keys().cloned());
            for (id, rate) in &bucket.point.torrent_rates {
                torrent_names
                    .entry(id.clone())
                    .or_insert_with(|| rate.name.clone());
            }
        }
    }

    let mut resolutions = BTreeMap::new();
    for series in &store.series {
        let mut out = CompactSeries {
            data_points: series.buckets.len(),
            ..Default::default()
        };
        for bucket in &series.buckets {
            let p = &bucket.point;
            out.timestamps.push(p.timestamp);
            out.download_rate.push(p.download_rate.round() as u64);
            out.upload_rate.push(p.upload_rate.round() as u64);
            out.load1.push((p.load1 * 100.0).round() / 100.0);
            out.samples.push(bucket.samples);
        }
        for name in &service_names {
            let column = series
                .buckets
                .iter()
                .map(|b| {
                    quantize_response_time(b.point.response_times.get(name).copied().unwrap_or(0.0))
                })
                .collect();
            out.response_times.insert(name.clone(), column);
        }
        for name in &container_names {
            let column = series
                .buckets
                .iter()
                .map(|b| b.point.memory_usage.get(name).copied().unwrap_or(0.0).round() as u32)
                .collect();
            out.memory_usage.insert(name.clone(), column);
        }
        for id in torrent_names.keys() {
            let download = series
                .buckets
                .iter()
                .map(|b| {
                    b.point
                        .torrent_rates
                        .get(id)
                        .map_or(0, |t| t.download_rate.round() as u64)
                })
                .collect();
            let upload = series
                .buckets
                .iter()
                .map(|b| {
                    b.point
                        .torrent_rates
                        .get(id)
                        .map_or(0, |t| t.upload_rate.round() as u64)
                })
                .collect();
            out.torrent_download.insert(id.clone(), download);
            out.torrent_upload.insert(id.clone(), upload);
        }
        resolutions.insert(series.spec.label.to_string(), out);
    }

    CompactPayload {
        service_names: service_names.into_iter().collect(),
        container_names: container_names.into_iter().collect(),
        torrent_names,
        long_retention_ms: store.long_retention_ms,
        resolutions,
    }
}

/// The payload's reciprocal, as a dashboard client would run it: zips the
/// parallel arrays back into points, multiplying quantized response times by
/// the quantum. A keyed array shorter than `data_points` (key appeared only
/// partway through history) defaults missing indices to 0.
pub fn decode_resolution(payload: &CompactPayload, label: &str) -> Vec<ChartDataPoint> {
    let Some(series) = payload.resolutions.get(label) else {
        return Vec::new();
    };

    (0..series.data_points)
        .map(|i| {
            let response_times = series
                .response_times
                .iter()
                .map(|(name, column)| {
                    let q = column.get(i).copied().unwrap_or(0);
                    (name.clone(), q as f64 * RESPONSE_TIME_QUANTUM_MS)
                })
                .collect();
            let memory_usage = series
                .memory_usage
                .iter()
                .map(|(name, column)| (name.clone(), column.get(i).copied().unwrap_or(0) as f64))
                .collect();
            let torrent_rates = series
                .torrent_download
                .iter()
                .map(|(id, download)| {
                    let upload = series
                        .torrent_upload
                        .get(id)
                        .and_then(|c| c.get(i))
                        .copied()
                        .unwrap_or(0);
                    let name = payload
                        .torrent_names
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| id.clone());
                    (
                        id.clone(),
                        TorrentRate {
                            name,
                            download_rate: download.get(i).copied().unwrap_or(0) as f64,
                            upload_rate: upload as f64,
                        },
                    )
                })
                .collect();

            ChartDataPoint {
                timestamp: series.timestamps.get(i).copied().unwrap_or(0),
                download_rate: series.download_rate.get(i).copied().unwrap_or(0) as f64,
                upload_rate: series.upload_rate.get(i).copied().unwrap_or(0) as f64,
                load1: series.load1.get(i).copied().unwrap_or(0.0),
                load5: 0.0,
                load15: 0.0,
                response_times,
                memory_usage,
                torrent_rates,
            }
        })
        .collect()
}
