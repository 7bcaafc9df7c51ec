// Health snapshot cache tests: partial merge, change detection

use arrdash::models::{
    CheckResult, GluetunStatus, HealthSnapshot, HealthUpdate, ServiceStatus, VpnStatus,
};
use std::collections::BTreeMap;

fn service_map(up: bool) -> BTreeMap<String, ServiceStatus> {
    let mut services = BTreeMap::new();
    services.insert(
        "Sonarr".to_string(),
        ServiceStatus {
            up,
            response_time_ms: up.then_some(42.0),
            detail: (!up).then(|| "connection refused".to_string()),
        },
    );
    services
}

fn full_update() -> HealthUpdate {
    HealthUpdate {
        vpn: Some(VpnStatus::Probed(GluetunStatus {
            public_ip: "203.0.113.7".into(),
            country: "Netherlands".into(),
            port_forwarded: Some(51820),
        })),
        services: Some(service_map(true)),
        checks: Some(vec![CheckResult {
            name: "services-reachable".into(),
            ok: true,
            message: "all 1 services reachable".into(),
        }]),
        git_ref: None,
        error: None,
    }
}

#[test]
fn initializing_snapshot_has_placeholders() {
    let snapshot = HealthSnapshot::initializing(1_000, true);
    assert!(snapshot.updating);
    assert_eq!(snapshot.updated_at, 1_000);
    assert_eq!(snapshot.vpn, VpnStatus::Unknown);
    assert!(snapshot.services.is_empty());

    let disabled = HealthSnapshot::initializing(1_000, false);
    assert_eq!(disabled.vpn, VpnStatus::Disabled);
}

#[test]
fn first_update_reports_all_facets_changed() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    let outcome = snapshot.apply_update(full_update(), 2_000);

    assert!(outcome.changed);
    assert_eq!(outcome.changed_keys, vec!["vpn", "services", "checks"]);
    assert_eq!(snapshot.updated_at, 2_000);
    assert!(!snapshot.updating);
}

#[test]
fn identical_second_update_reports_unchanged() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(full_update(), 2_000);
    let outcome = snapshot.apply_update(full_update(), 3_000);

    assert!(!outcome.changed);
    assert!(outcome.changed_keys.is_empty());
    // bookkeeping still refreshed on the no-op pass
    assert_eq!(snapshot.updated_at, 3_000);
}

#[test]
fn service_flap_is_detected() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(full_update(), 2_000);

    let mut update = full_update();
    update.services = Some(service_map(false));
    let outcome = snapshot.apply_update(update, 3_000);

    assert!(outcome.changed);
    assert_eq!(outcome.changed_keys, vec!["services"]);
    assert!(!snapshot.services["Sonarr"].up);
}

#[test]
fn absent_fields_keep_previous_values() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(full_update(), 2_000);

    let outcome = snapshot.apply_update(HealthUpdate::default(), 3_000);
    assert!(!outcome.changed);
    assert!(matches!(snapshot.vpn, VpnStatus::Probed(_)));
    assert_eq!(snapshot.services.len(), 1);
}

#[test]
fn bookkeeping_keys_never_count_as_change() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(full_update(), 2_000);

    let update = HealthUpdate {
        git_ref: Some("a1b2c3d".into()),
        error: Some("probe pass failed".into()),
        ..Default::default()
    };
    let outcome = snapshot.apply_update(update, 3_000);

    assert!(!outcome.changed);
    assert_eq!(snapshot.git_ref.as_deref(), Some("a1b2c3d"));
    assert_eq!(snapshot.error.as_deref(), Some("probe pass failed"));
}

#[test]
fn error_clears_when_update_carries_none() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(
        HealthUpdate {
            error: Some("boom".into()),
            ..Default::default()
        },
        2_000,
    );
    assert!(snapshot.error.is_some());

    snapshot.apply_update(HealthUpdate::default(), 3_000);
    assert!(snapshot.error.is_none());
}

#[test]
fn git_ref_survives_updates_without_one() {
    let mut snapshot = HealthSnapshot::initializing(1_000, true);
    snapshot.apply_update(
        HealthUpdate {
            git_ref: Some("a1b2c3d".into()),
            ..Default::default()
        },
        2_000,
    );
    snapshot.apply_update(HealthUpdate::default(), 3_000);
    assert_eq!(snapshot.git_ref.as_deref(), Some("a1b2c3d"));
}

#[test]
fn vpn_status_serializes_as_tagged_variant() {
    let disabled = serde_json::to_value(VpnStatus::Disabled).unwrap();
    assert_eq!(disabled["state"], "disabled");

    let probed = serde_json::to_value(VpnStatus::Probed(GluetunStatus {
        public_ip: "203.0.113.7".into(),
        country: "Netherlands".into(),
        port_forwarded: None,
    }))
    .unwrap();
    assert_eq!(probed["state"], "probed");
    assert_eq!(probed["publicIp"], "203.0.113.7");
}
