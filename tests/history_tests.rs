// Multi-resolution store tests: bucketing, incremental averaging, eviction

mod common;

use arrdash::history::HistoryStore;
use arrdash::models::TorrentRate;
use common::{minimal_sample, sample_with_rates};

const HOUR_MS: u64 = 3_600_000;
const LONG_RETENTION_MS: u64 = 30 * 24 * HOUR_MS;

fn store() -> HistoryStore {
    HistoryStore::new(LONG_RETENTION_MS)
}

#[test]
fn two_samples_in_one_minute_share_a_bucket() {
    let mut store = store();
    store.append_sample(&sample_with_rates(60_000, 100.0, 10.0));
    store.append_sample(&sample_with_rates(60_001, 200.0, 30.0));

    let series = store.series_by_label("1h").unwrap();
    assert_eq!(series.buckets.len(), 1);
    let bucket = &series.buckets[0];
    assert_eq!(bucket.point.timestamp, 60_000);
    assert_eq!(bucket.samples, 2);
    assert_eq!(bucket.point.download_rate, 150.0);
    assert_eq!(bucket.point.upload_rate, 20.0);
}

#[test]
fn incremental_average_matches_true_mean() {
    let mut store = store();
    for (i, rate) in [100.0, 200.0, 300.0].into_iter().enumerate() {
        store.append_sample(&sample_with_rates(60_000 + i as u64, rate, 0.0));
    }

    let bucket = &store.series_by_label("1h").unwrap().buckets[0];
    assert_eq!(bucket.samples, 3);
    assert_eq!(bucket.point.download_rate, 200.0);
}

#[test]
fn bucket_at_exact_window_boundary_is_evicted() {
    let mut store = store();
    store.append_sample(&minimal_sample(0));
    store.append_sample(&minimal_sample(HOUR_MS));

    let series = store.series_by_label("1h").unwrap();
    assert_eq!(series.buckets.len(), 1);
    assert_eq!(series.buckets[0].point.timestamp, HOUR_MS);
}

#[test]
fn bucket_inside_window_survives_eviction() {
    let mut store = store();
    store.append_sample(&minimal_sample(60_000));
    store.append_sample(&minimal_sample(HOUR_MS));

    let series = store.series_by_label("1h").unwrap();
    let timestamps: Vec<u64> = series.buckets.iter().map(|b| b.point.timestamp).collect();
    assert_eq!(timestamps, vec![60_000, HOUR_MS]);
}

#[test]
fn longer_resolutions_keep_what_the_hourly_window_drops() {
    let mut store = store();
    store.append_sample(&minimal_sample(0));
    store.append_sample(&minimal_sample(HOUR_MS));

    assert_eq!(store.series_by_label("1h").unwrap().buckets.len(), 1);
    assert_eq!(store.series_by_label("1d").unwrap().buckets.len(), 2);
    assert_eq!(store.series_by_label("1w").unwrap().buckets.len(), 2);
    assert_eq!(store.series_by_label("1m").unwrap().buckets.len(), 2);
}

#[test]
fn single_append_fans_out_to_all_four_resolutions() {
    let mut store = store();
    store.append_sample(&sample_with_rates(90_000, 50.0, 5.0));

    for series in store.series() {
        assert_eq!(series.buckets.len(), 1, "resolution {}", series.spec.label);
        assert_eq!(series.buckets[0].samples, 1);
    }
    // bucket timestamps snap to each resolution's own grid
    assert_eq!(
        store.series_by_label("1h").unwrap().buckets[0].point.timestamp,
        60_000
    );
    assert_eq!(
        store.series_by_label("1w").unwrap().buckets[0].point.timestamp,
        0
    );
    assert_eq!(
        store.series_by_label("1m").unwrap().buckets[0].point.timestamp,
        0
    );
}

#[test]
fn merge_reaches_every_resolution_in_one_call() {
    let mut store = store();
    store.append_sample(&sample_with_rates(10_000, 100.0, 0.0));
    store.append_sample(&sample_with_rates(20_000, 300.0, 0.0));

    for series in store.series() {
        let bucket = &series.buckets[0];
        assert_eq!(bucket.samples, 2, "resolution {}", series.spec.label);
        assert_eq!(bucket.point.download_rate, 200.0);
    }
}

#[test]
fn missing_keyed_value_averages_as_zero() {
    let mut store = store();

    let mut first = minimal_sample(60_000);
    first.response_times.insert("Sonarr".into(), 30.0);
    store.append_sample(&first);

    // second tick has no Sonarr measurement
    store.append_sample(&minimal_sample(60_010));

    let mut third = minimal_sample(60_020);
    third.response_times.insert("Sonarr".into(), 30.0);
    store.append_sample(&third);

    let bucket = &store.series_by_label("1h").unwrap().buckets[0];
    assert_eq!(bucket.samples, 3);
    assert_eq!(bucket.point.response_times["Sonarr"], 20.0);
}

#[test]
fn key_appearing_mid_bucket_joins_the_union() {
    let mut store = store();
    store.append_sample(&minimal_sample(60_000));

    let mut second = minimal_sample(60_010);
    second.memory_usage.insert("gluetun".into(), 100.0);
    store.append_sample(&second);

    let bucket = &store.series_by_label("1h").unwrap().buckets[0];
    assert_eq!(bucket.point.memory_usage["gluetun"], 50.0);
}

#[test]
fn torrent_rates_merge_and_keep_display_name() {
    let mut store = store();

    let mut first = minimal_sample(60_000);
    first.torrent_rates.insert(
        "abc123".into(),
        TorrentRate {
            name: "ubuntu.iso".into(),
            download_rate: 400.0,
            upload_rate: 40.0,
        },
    );
    store.append_sample(&first);
    store.append_sample(&minimal_sample(60_010));

    let bucket = &store.series_by_label("1h").unwrap().buckets[0];
    let rate = &bucket.point.torrent_rates["abc123"];
    assert_eq!(rate.name, "ubuntu.iso");
    assert_eq!(rate.download_rate, 200.0);
    assert_eq!(rate.upload_rate, 20.0);
}

#[test]
fn out_of_order_sample_opens_a_new_bucket() {
    let mut store = store();
    store.append_sample(&minimal_sample(120_000));
    store.append_sample(&minimal_sample(60_000));

    // accepted limitation: no re-sorting, the stale sample lands at the tail
    let series = store.series_by_label("1h").unwrap();
    let timestamps: Vec<u64> = series.buckets.iter().map(|b| b.point.timestamp).collect();
    assert_eq!(timestamps, vec![120_000, 60_000]);
}

#[test]
fn empty_store_reports_empty() {
    let store = store();
    assert!(store.is_empty());
    assert_eq!(store.long_retention_ms(), LONG_RETENTION_MS);
}
