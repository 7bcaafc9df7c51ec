// Per-container memory via bollard streaming stats. One stats stream per
// running container feeds a cached live map; the periodic sampler only
// reads the cache, so a slow Docker daemon never stalls a tick.

use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use bollard::models::ContainerStatsResponse;
use futures_util::StreamExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

pub struct DockerRepo {
    docker: Docker,
    /// Container id -> (name, resident MB).
    live_memory: Arc<RwLock<HashMap<String, (String, f64)>>>,
    active_streams: Arc<RwLock<HashMap<String, tokio::task::JoinHandle<()>>>>,
}

impl DockerRepo {
    pub fn connect() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_unix_defaults()?;
        Ok(Self {
            docker,
            live_memory: Arc::new(RwLock::new(HashMap::new())),
            active_streams: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Current resident memory per running container, MB, keyed by name.
    /// Reconciles stats streams against the running set first; containers
    /// that stopped since the last call drop out of the map. On a daemon
    /// error the previous cached values are returned.
    pub async fn memory_usage_mb(&self) -> BTreeMap<String, f64> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = match self.docker.list_containers(Some(filter)).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Docker list_containers failed: {}", e);
                return self.cached().await;
            }
        };

        let mut running_ids = Vec::with_capacity(containers.len());
        let mut id_to_name = HashMap::with_capacity(containers.len());
        for c in &containers {
            let id = c.id.as_ref().cloned().unwrap_or_default();
            let name = c
                .names
                .as_ref()
                .and_then(|n| n.first())
                .cloned()
                .unwrap_or_else(|| id.clone());
            let name = name.trim_start_matches('/').to_string();
            running_ids.push(id.clone());
            id_to_name.insert(id, name);
        }
        let running_set: HashSet<String> = running_ids.iter().cloned().collect();

        let current_keys: Vec<String> = {
            let r = self.active_streams.read().await;
            r.keys().cloned().collect()
        };

        let to_add: Vec<(String, String)> = running_ids
            .into_iter()
            .filter(|id| !current_keys.contains(id))
            .map(|id| {
                let name = id_to_name.get(&id).cloned().unwrap_or_else(|| id.clone());
                (id, name)
            })
            .collect();
        let to_remove: Vec<String> = current_keys
            .into_iter()
            .filter(|id| !running_set.contains(id))
            .collect();

        let new_handles: Vec<(String, tokio::task::JoinHandle<()>)> = {
            let mut out = Vec::with_capacity(to_add.len());
            for (id, name) in to_add {
                let handle = self.start_monitoring(id.clone(), name).await;
                out.push((id, handle));
            }
            out
        };

        {
            let mut streams = self.active_streams.write().await;
            for (id, handle) in new_handles {
                streams.insert(id, handle);
            }
            for id in &to_remove {
                if let Some(handle) = streams.remove(id) {
                    handle.abort();
                }
            }
        }
        if !to_remove.is_empty() {
            let mut live = self.live_memory.write().await;
            for id in &to_remove {
                live.remove(id);
            }
        }

        self.cached().await
    }

    async fn start_monitoring(&self, id: String, name: String) -> tokio::task::JoinHandle<()> {
        let docker = self.docker.clone();
        let live_memory = self.live_memory.clone();
        let active_streams = self.active_streams.clone();

        tokio::spawn(async move {
            let options = StatsOptions {
                stream: true,
                ..Default::default()
            };
            let mut stream = docker.stats(&id, Some(options));

            while let Some(result) = stream.next().await {
                match result {
                    Ok(s) => {
                        if let Some(mb) = resident_mb(&s) {
                            live_memory
                                .write()
                                .await
                                .insert(id.clone(), (name.clone(), mb));
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Stats stream error for container {}: {}", name, e);
                        break;
                    }
                }
            }
            tracing::info!("Stats stream ended for container {}", name);
            active_streams.write().await.remove(&id);
        })
    }

    async fn cached(&self) -> BTreeMap<String, f64> {
        let live = self.live_memory.read().await;
        live.values()
            .map(|(name, mb)| (name.clone(), *mb))
            .collect()
    }
}

/// Resident memory from a raw stats frame, MB. None until the daemon
/// reports a usage figure for the container.
fn resident_mb(s: &ContainerStatsResponse) -> Option<f64> {
    let usage = s.memory_stats.as_ref()?.usage?;
    Some(usage as f64 / BYTES_PER_MB)
}
