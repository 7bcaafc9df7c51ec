// Outbound HTTP probes: per-service latency and reachability, Gluetun VPN
// state, qBittorrent transfer rates. Every call carries the shared client
// timeout; a failed probe yields an absent value, never an error upward.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::models::{GluetunStatus, ServiceStatus, TorrentRate, VpnStatus};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

pub struct ProbeRepo {
    client: reqwest::Client,
}

impl ProbeRepo {
    pub fn new(timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            // qBittorrent authenticates with a session cookie
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }

    /// Times a GET against the service URL. Timeouts and connection errors
    /// come back as a down status with no latency.
    pub async fn probe_service(&self, name: &str, url: &str) -> ServiceStatus {
        let started = Instant::now();
        match self.check_ok(url).await {
            Ok(()) => ServiceStatus {
                up: true,
                response_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                detail: None,
            },
            Err(e) => {
                tracing::debug!(service = name, error = %e, "service probe failed");
                ServiceStatus {
                    up: false,
                    response_time_ms: None,
                    detail: Some(e.to_string()),
                }
            }
        }
    }

    /// Gluetun control-server state. An unreachable gateway reports
    /// Unknown, keeping the last-known distinction visible to the client.
    pub async fn probe_vpn(&self, base_url: &str) -> VpnStatus {
        match self.fetch_vpn(base_url).await {
            Ok(status) => VpnStatus::Probed(status),
            Err(e) => {
                tracing::debug!(error = %e, "vpn probe failed");
                VpnStatus::Unknown
            }
        }
    }

    /// Per-torrent rates from qBittorrent, keyed by info-hash. Logs in
    /// first when credentials are configured; the session cookie lives in
    /// the shared client.
    pub async fn torrent_rates(
        &self,
        base_url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> BTreeMap<String, TorrentRate> {
        match self.fetch_torrents(base_url, username, password).await {
            Ok(rates) => rates,
            Err(e) => {
                tracing::debug!(error = %e, "torrent rates probe failed");
                BTreeMap::new()
            }
        }
    }

    async fn check_ok(&self, url: &str) -> Result<(), ProbeError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status()));
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProbeError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status()));
        }
        Ok(resp.json::<T>().await?)
    }

    async fn fetch_vpn(&self, base_url: &str) -> Result<GluetunStatus, ProbeError> {
        #[derive(Deserialize)]
        struct IpResponse {
            public_ip: String,
            #[serde(default)]
            country: String,
        }
        #[derive(Deserialize)]
        struct PortResponse {
            port: u16,
        }

        let ip: IpResponse = self
            .get_json(&format!("{base_url}/v1/publicip/ip"))
            .await?;
        // Port forwarding is optional on the gateway; 0 or an error means none
        let port = self
            .get_json::<PortResponse>(&format!("{base_url}/v1/openvpn/portforwarded"))
            .await
            .ok()
            .map(|p| p.port)
            .filter(|p| *p != 0);

        Ok(GluetunStatus {
            public_ip: ip.public_ip,
            country: ip.country,
            port_forwarded: port,
        })
    }

    async fn fetch_torrents(
        &self,
        base_url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<BTreeMap<String, TorrentRate>, ProbeError> {
        #[derive(Deserialize)]
        struct TorrentInfo {
            hash: String,
            name: String,
            dlspeed: f64,
            upspeed: f64,
        }

        if let (Some(user), Some(pass)) = (username, password) {
            let resp = self
                .client
                .post(format!("{base_url}/api/v2/auth/login"))
                .form(&[("username", user), ("password", pass)])
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ProbeError::Status(resp.status()));
            }
        }

        let infos: Vec<TorrentInfo> = self
            .get_json(&format!("{base_url}/api/v2/torrents/info?filter=active"))
            .await?;
        Ok(infos
            .into_iter()
            .map(|t| {
                (
                    t.hash,
                    TorrentRate {
                        name: t.name,
                        download_rate: t.dlspeed,
                        upload_rate: t.upspeed,
                    },
                )
            })
            .collect())
    }
}
