use anyhow::Result;
use arrdash::*;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let now_ms = worker::now_ms();

    let store = history::persist::load_file(
        &app_config.history.path,
        app_config.long_retention_ms(),
        now_ms,
    )
    .await;
    let store = Arc::new(RwLock::new(store));

    let vpn_enabled = app_config.vpn.as_ref().is_some_and(|v| v.enabled);
    let health = Arc::new(RwLock::new(models::HealthSnapshot::initializing(
        now_ms,
        vpn_enabled,
    )));

    let (push_tx, _) =
        broadcast::channel::<models::PushMessage>(app_config.publishing.broadcast_capacity);

    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let docker_repo = Arc::new(docker_repo::DockerRepo::connect()?);
    let probe_repo = Arc::new(probe_repo::ProbeRepo::new(
        app_config.monitoring.probe_timeout_ms,
    )?);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let worker_handle = worker::spawn(
        worker::WorkerDeps {
            sysinfo_repo,
            docker_repo,
            probe_repo,
            store: store.clone(),
            health: health.clone(),
            push_tx: push_tx.clone(),
            config: app_config.clone(),
        },
        shutdown_rx,
    );

    let app = routes::app(store, health, push_tx, &app_config);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let in_container = std::path::Path::new("/.dockerenv").exists()
        || std::env::var("CONTAINER").as_deref() == Ok("1");

    if in_container {
        // In Docker: run server until error or SIGTERM (no signal handler; avoids immediate exit)
        axum::serve(listener, app).await?;
    } else {
        tokio::select! {
            result = axum::serve(listener, app) => {
                result?;
            }
            _ = async {
                #[cfg(unix)]
                {
                    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(_) => {
                            let _ = tokio::signal::ctrl_c().await;
                            return;
                        }
                    };
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                #[cfg(not(unix))]
                {
                    let _ = tokio::signal::ctrl_c().await;
                }
            } => {
                tracing::info!("Received shutdown signal");
                let _ = shutdown_tx.send(());
                let _ = worker_handle.await;
            }
        }
    }

    Ok(())
}
