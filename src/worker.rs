// Background worker: sample collection, health checks, and periodic history
// saves run as independent tickers in one task. Each tick body is wrapped in
// a Result boundary so one failed pass never cancels future ticks of any
// timer; failures surface in the snapshot cache's error field.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tokio::time::{Duration, interval};
use tracing::{Instrument, warn};

use crate::config::AppConfig;
use crate::docker_repo::DockerRepo;
use crate::history::{HistoryStore, persist};
use crate::models::{
    ChartDataPoint, CheckResult, HealthSnapshot, HealthUpdate, PushMessage, ServiceStatus,
    TorrentRate, VpnStatus,
};
use crate::probe_repo::ProbeRepo;
use crate::sysinfo_repo::SysinfoRepo;

/// Milliseconds since epoch; a pre-epoch clock reads as 0 rather than
/// killing the tick.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}

/// Repos, shared state, and channels for the worker.
pub struct WorkerDeps {
    pub sysinfo_repo: Arc<SysinfoRepo>,
    pub docker_repo: Arc<DockerRepo>,
    pub probe_repo: Arc<ProbeRepo>,
    pub store: Arc<RwLock<HistoryStore>>,
    pub health: Arc<RwLock<HealthSnapshot>>,
    pub push_tx: broadcast::Sender<PushMessage>,
    pub config: AppConfig,
}

pub fn spawn(
    deps: WorkerDeps,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        sample_interval_ms = deps.config.monitoring.sample_interval_ms
    );
    tokio::spawn(
        async move {
            run(deps, shutdown_rx).await;
        }
        .instrument(span),
    )
}

async fn run(deps: WorkerDeps, mut shutdown_rx: tokio::sync::oneshot::Receiver<()>) {
    let mut sample_tick = interval(Duration::from_millis(
        deps.config.monitoring.sample_interval_ms,
    ));
    sample_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut check_tick = interval(Duration::from_secs(
        deps.config.monitoring.check_interval_secs,
    ));
    check_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut save_tick = interval(Duration::from_secs(deps.config.history.save_interval_secs));
    save_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = sample_tick.tick() => {
                if let Err(e) = collect_sample(&deps).await {
                    warn!(error = %e, operation = "collect_sample", "sample tick failed");
                    record_tick_error(&deps.health, &e).await;
                }
            }
            _ = check_tick.tick() => {
                if let Err(e) = run_checks(&deps).await {
                    warn!(error = %e, operation = "run_checks", "check tick failed");
                    record_tick_error(&deps.health, &e).await;
                }
            }
            _ = save_tick.tick() => {
                // Skipped on failure; the next cycle retries with fresh data
                if let Err(e) = save_history(&deps).await {
                    warn!(error = %e, operation = "save_history", "history save failed");
                }
            }
            _ = &mut shutdown_rx => {
                if let Err(e) = save_history(&deps).await {
                    warn!(error = %e, operation = "save_history", "final history save failed");
                }
                tracing::debug!("Worker shutting down");
                break;
            }
        }
    }
}

/// Composes one sample from all producers (issued concurrently, awaited
/// together), folds it into the store, and pushes it to connected clients.
/// Individual probe failures become missing keys, not tick failures.
async fn collect_sample(deps: &WorkerDeps) -> anyhow::Result<()> {
    let timestamp = now_ms();

    let (loads, throughput, memory_usage, response_times, torrent_rates) = tokio::join!(
        deps.sysinfo_repo.get_load_averages(),
        deps.sysinfo_repo.get_throughput(),
        deps.docker_repo.memory_usage_mb(),
        collect_response_times(deps),
        collect_torrent_rates(deps),
    );
    let loads = loads?;
    let throughput = throughput?;

    let sample = ChartDataPoint {
        timestamp,
        download_rate: throughput.download_bytes_per_sec,
        upload_rate: throughput.upload_bytes_per_sec,
        load1: loads.one,
        load5: loads.five,
        load15: loads.fifteen,
        response_times,
        memory_usage,
        torrent_rates,
    };

    deps.store.write().await.append_sample(&sample);

    if deps
        .push_tx
        .send(PushMessage::ChartPoint(sample))
        .is_err()
    {
        tracing::debug!(operation = "push_chart_point", "no connected push clients");
    }
    Ok(())
}

/// Latency per configured service; a failed probe contributes no key.
async fn collect_response_times(deps: &WorkerDeps) -> BTreeMap<String, f64> {
    let probes = deps.config.services.iter().map(|svc| {
        let probe_repo = deps.probe_repo.clone();
        async move {
            let status = probe_repo.probe_service(&svc.name, &svc.url).await;
            status.response_time_ms.map(|ms| (svc.name.clone(), ms))
        }
    });
    futures_util::future::join_all(probes)
        .await
        .into_iter()
        .flatten()
        .collect()
}

async fn collect_torrent_rates(deps: &WorkerDeps) -> BTreeMap<String, TorrentRate> {
    let Some(torrent) = &deps.config.torrent else {
        return BTreeMap::new();
    };
    deps.probe_repo
        .torrent_rates(
            &torrent.url,
            torrent.username.as_deref(),
            torrent.password.as_deref(),
        )
        .await
}

/// One health pass: probe every service and the VPN gateway, derive check
/// results, merge into the snapshot cache, and push only when something
/// actually changed.
async fn run_checks(deps: &WorkerDeps) -> anyhow::Result<()> {
    let probes = deps.config.services.iter().map(|svc| {
        let probe_repo = deps.probe_repo.clone();
        async move {
            (
                svc.name.clone(),
                probe_repo.probe_service(&svc.name, &svc.url).await,
            )
        }
    });
    let services: BTreeMap<String, ServiceStatus> =
        futures_util::future::join_all(probes).await.into_iter().collect();

    let vpn = match &deps.config.vpn {
        Some(v) if v.enabled => deps.probe_repo.probe_vpn(&v.url).await,
        _ => VpnStatus::Disabled,
    };

    let checks = integration_checks(&services, &vpn);

    let update = HealthUpdate {
        vpn: Some(vpn),
        services: Some(services),
        checks: Some(checks),
        git_ref: None,
        error: None,
    };

    let outcome = {
        let mut health = deps.health.write().await;
        health.apply_update(update, now_ms())
    };

    if outcome.changed {
        tracing::debug!(changed_keys = ?outcome.changed_keys, "health changed");
        let snapshot = deps.health.read().await.clone();
        let _ = deps.push_tx.send(PushMessage::Health(snapshot));
    }
    Ok(())
}

/// Cross-service checks derived from the probe results. Exposed for unit tests.
pub fn integration_checks(
    services: &BTreeMap<String, ServiceStatus>,
    vpn: &VpnStatus,
) -> Vec<CheckResult> {
    let down: Vec<&str> = services
        .iter()
        .filter(|(_, s)| !s.up)
        .map(|(name, _)| name.as_str())
        .collect();
    let mut checks = vec![CheckResult {
        name: "services-reachable".into(),
        ok: down.is_empty(),
        message: if down.is_empty() {
            format!("all {} services reachable", services.len())
        } else {
            format!("down: {}", down.join(", "))
        },
    }];

    match vpn {
        VpnStatus::Disabled => {}
        VpnStatus::Unknown => checks.push(CheckResult {
            name: "vpn-connected".into(),
            ok: false,
            message: "gateway unreachable".into(),
        }),
        VpnStatus::Probed(status) => {
            checks.push(CheckResult {
                name: "vpn-connected".into(),
                ok: true,
                message: format!("exit ip {}", status.public_ip),
            });
            checks.push(CheckResult {
                name: "vpn-port-forwarded".into(),
                ok: status.port_forwarded.is_some(),
                message: match status.port_forwarded {
                    Some(port) => format!("port {}", port),
                    None => "no forwarded port".into(),
                },
            });
        }
    }
    checks
}

async fn save_history(deps: &WorkerDeps) -> anyhow::Result<()> {
    let bytes = {
        let store = deps.store.read().await;
        persist::snapshot_bytes(&store)?
    };
    persist::save_file(&deps.config.history.path, bytes).await?;
    tracing::debug!(operation = "save_history", "history snapshot written");
    Ok(())
}

async fn record_tick_error(health: &Arc<RwLock<HealthSnapshot>>, err: &anyhow::Error) {
    let mut health = health.write().await;
    health.apply_update(
        HealthUpdate {
            error: Some(err.to_string()),
            ..Default::default()
        },
        now_ms(),
    );
}
