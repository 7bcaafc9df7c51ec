// Host metrics via sysinfo: load averages and interface throughput

use std::sync::Arc;
use std::time::Instant;
use sysinfo::Networks;
use tracing::instrument;

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadAverages {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Aggregate throughput across all interfaces, bytes/sec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThroughputStats {
    pub download_bytes_per_sec: f64,
    pub upload_bytes_per_sec: f64,
}

pub struct SysinfoRepo {
    networks: Arc<std::sync::Mutex<Networks>>,
    last_totals: Arc<std::sync::Mutex<Option<(u64, u64, Instant)>>>,
}

impl Default for SysinfoRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoRepo {
    pub fn new() -> Self {
        Self {
            networks: Arc::new(std::sync::Mutex::new(Networks::new_with_refreshed_list())),
            last_totals: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_load_averages"))]
    pub async fn get_load_averages(&self) -> anyhow::Result<LoadAverages> {
        tokio::task::spawn_blocking(|| {
            let avg = sysinfo::System::load_average();
            Ok(LoadAverages {
                one: avg.one,
                five: avg.five,
                fifteen: avg.fifteen,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }

    /// Throughput from cumulative interface counters since the previous
    /// call. The first call establishes the baseline and reports zero.
    #[instrument(skip(self), fields(repo = "sysinfo", operation = "get_throughput"))]
    pub async fn get_throughput(&self) -> anyhow::Result<ThroughputStats> {
        let networks = self.networks.clone();
        let last_totals = self.last_totals.clone();
        tokio::task::spawn_blocking(move || {
            let mut networks = networks
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo networks lock poisoned: {}", e))?;
            networks.refresh(true);

            let mut rx_total: u64 = 0;
            let mut tx_total: u64 = 0;
            for (_name, data) in networks.list() {
                rx_total += data.total_received();
                tx_total += data.total_transmitted();
            }

            let now = Instant::now();
            let mut out = ThroughputStats::default();
            if let Ok(mut guard) = last_totals.lock() {
                if let Some((prev_rx, prev_tx, prev_ts)) = *guard {
                    let dt_secs = now.duration_since(prev_ts).as_secs_f64();
                    if dt_secs > 0.0 {
                        out.download_bytes_per_sec =
                            rx_total.saturating_sub(prev_rx) as f64 / dt_secs;
                        out.upload_bytes_per_sec =
                            tx_total.saturating_sub(prev_tx) as f64 / dt_secs;
                    }
                }
                *guard = Some((rx_total, tx_total, now));
            }
            Ok(out)
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}
