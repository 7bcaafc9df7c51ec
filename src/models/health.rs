// Point-in-time health snapshot with partial-merge updates

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// VPN gateway state. A dedicated variant per situation so callers switch
/// explicitly instead of sniffing for optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum VpnStatus {
    /// No gateway configured.
    Disabled,
    /// Configured but not yet (or no longer) reachable.
    Unknown,
    /// Last successful probe of the Gluetun control server.
    Probed(GluetunStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GluetunStatus {
    pub public_ip: String,
    pub country: String,
    pub port_forwarded: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub up: bool,
    /// Probe latency, ms. None when the probe failed.
    pub response_time_ms: Option<f64>,
    /// Failure detail for down services.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub ok: bool,
    pub message: String,
}

/// Last-known-value cache for probe results. One instance per process,
/// mutated in place by `apply_update`, never reset until restart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub updated_at: u64,
    pub updating: bool,
    /// Most recent tick failure, shown as a banner by the dashboard.
    pub error: Option<String>,
    pub git_ref: Option<String>,
    pub vpn: VpnStatus,
    pub services: BTreeMap<String, ServiceStatus>,
    pub checks: Vec<CheckResult>,
}

/// Partial update for the snapshot; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct HealthUpdate {
    pub vpn: Option<VpnStatus>,
    pub services: Option<BTreeMap<String, ServiceStatus>>,
    pub checks: Option<Vec<CheckResult>>,
    pub git_ref: Option<String>,
    pub error: Option<String>,
}

/// What `apply_update` changed, so callers can skip push notifications on a
/// no-op refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub changed: bool,
    pub changed_keys: Vec<String>,
}

impl HealthSnapshot {
    /// Placeholder values shown until the first check pass completes.
    pub fn initializing(now_ms: u64, vpn_enabled: bool) -> Self {
        Self {
            updated_at: now_ms,
            updating: true,
            error: None,
            git_ref: None,
            vpn: if vpn_enabled {
                VpnStatus::Unknown
            } else {
                VpnStatus::Disabled
            },
            services: BTreeMap::new(),
            checks: Vec::new(),
        }
    }

    /// Shallow per-key merge with change detection. The bookkeeping keys
    /// (`updatedAt`, `updating`, `error`, `gitRef`) are always refreshed and
    /// never counted as a change; `error` is cleared when the update carries
    /// none.
    pub fn apply_update(&mut self, update: HealthUpdate, now_ms: u64) -> UpdateOutcome {
        let mut changed_keys = Vec::new();

        if let Some(vpn) = update.vpn {
            if self.vpn != vpn {
                changed_keys.push("vpn".to_string());
            }
            self.vpn = vpn;
        }
        if let Some(services) = update.services {
            if self.services != services {
                changed_keys.push("services".to_string());
            }
            self.services = services;
        }
        if let Some(checks) = update.checks {
            if self.checks != checks {
                changed_keys.push("checks".to_string());
            }
            self.checks = checks;
        }

        if update.git_ref.is_some() {
            self.git_ref = update.git_ref;
        }
        self.error = update.error;
        self.updated_at = now_ms;
        self.updating = false;

        UpdateOutcome {
            changed: !changed_keys.is_empty(),
            changed_keys,
        }
    }
}
