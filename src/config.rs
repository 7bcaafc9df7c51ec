use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub history: HistoryConfig,
    pub monitoring: MonitoringConfig,
    pub publishing: PublishingConfig,
    /// Managed services to probe (download clients, indexers, managers).
    #[serde(default)]
    pub services: Vec<ServiceEndpoint>,
    pub vpn: Option<VpnConfig>,
    pub torrent: Option<TorrentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Compiled dashboard assets served as the fallback route.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_static_dir() -> String {
    "public".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Snapshot file path (JSON).
    pub path: String,
    /// Window of the longest (30-minute bucket) resolution.
    #[serde(default = "default_long_retention_days")]
    pub long_retention_days: u32,
    #[serde(default = "default_save_interval_secs")]
    pub save_interval_secs: u64,
}

fn default_long_retention_days() -> u32 {
    30
}

fn default_save_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    /// Per-probe timeout; a slow service shows up as down, not as a stalled tick.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_sample_interval_ms() -> u64 {
    10_000
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max push messages kept in the broadcast channel (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VpnConfig {
    pub enabled: bool,
    /// Gluetun control server base URL.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TorrentConfig {
    /// qBittorrent WebUI base URL.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn long_retention_ms(&self) -> u64 {
        self.history.long_retention_days as u64 * 24 * 60 * 60 * 1000
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.history.path.is_empty(),
            "history.path must be non-empty"
        );
        anyhow::ensure!(
            self.history.long_retention_days > 0,
            "history.long_retention_days must be > 0, got {}",
            self.history.long_retention_days
        );
        anyhow::ensure!(
            self.history.save_interval_secs > 0,
            "history.save_interval_secs must be > 0, got {}",
            self.history.save_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.sample_interval_ms > 0,
            "monitoring.sample_interval_ms must be > 0, got {}",
            self.monitoring.sample_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.check_interval_secs > 0,
            "monitoring.check_interval_secs must be > 0, got {}",
            self.monitoring.check_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.probe_timeout_ms > 0,
            "monitoring.probe_timeout_ms must be > 0, got {}",
            self.monitoring.probe_timeout_ms
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        for svc in &self.services {
            anyhow::ensure!(!svc.name.is_empty(), "services[].name must be non-empty");
            anyhow::ensure!(
                !svc.url.is_empty(),
                "services[].url must be non-empty for {}",
                svc.name
            );
        }
        if let Some(vpn) = &self.vpn {
            anyhow::ensure!(
                !vpn.enabled || !vpn.url.is_empty(),
                "vpn.url must be non-empty when vpn.enabled"
            );
        }
        if let Some(torrent) = &self.torrent {
            anyhow::ensure!(!torrent.url.is_empty(), "torrent.url must be non-empty");
        }
        Ok(())
    }
}
