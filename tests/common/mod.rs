// Shared test helpers

use arrdash::models::*;
use std::collections::BTreeMap;

pub fn minimal_sample(timestamp: u64) -> ChartDataPoint {
    ChartDataPoint {
        timestamp,
        download_rate: 0.0,
        upload_rate: 0.0,
        load1: 0.0,
        load5: 0.0,
        load15: 0.0,
        response_times: BTreeMap::new(),
        memory_usage: BTreeMap::new(),
        torrent_rates: BTreeMap::new(),
    }
}

pub fn sample_with_rates(timestamp: u64, download_rate: f64, upload_rate: f64) -> ChartDataPoint {
    ChartDataPoint {
        download_rate,
        upload_rate,
        ..minimal_sample(timestamp)
    }
}
