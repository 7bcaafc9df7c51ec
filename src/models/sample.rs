// Raw sample / chart point models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One measurement tick from the collectors, and equally the running-average
/// point held by a history bucket (same shape; a bucket's timestamp is
/// snapped to its resolution's grid).
///
/// An absent key in `response_times` or `memory_usage` means "no measurement
/// this tick", not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataPoint {
    /// Milliseconds since epoch.
    pub timestamp: u64,
    /// Bytes per second.
    pub download_rate: f64,
    /// Bytes per second.
    pub upload_rate: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    /// Per-service HTTP latency, ms.
    #[serde(default)]
    pub response_times: BTreeMap<String, f64>,
    /// Per-container resident memory, MB.
    #[serde(default)]
    pub memory_usage: BTreeMap<String, f64>,
    /// Per-torrent transfer rates, keyed by the client's stable hash.
    #[serde(default)]
    pub torrent_rates: BTreeMap<String, TorrentRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentRate {
    pub name: String,
    /// Bytes per second.
    pub download_rate: f64,
    /// Bytes per second.
    pub upload_rate: f64,
}
