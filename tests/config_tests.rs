// Config loading and validation tests

use arrdash::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"
static_dir = "public"

[history]
path = "data/history.json"
long_retention_days = 30
save_interval_secs = 60

[monitoring]
sample_interval_ms = 10000
check_interval_secs = 30
probe_timeout_ms = 5000

[publishing]
broadcast_capacity = 64

[[services]]
name = "Sonarr"
url = "http://sonarr:8989"

[[services]]
name = "Radarr"
url = "http://radarr:7878"

[vpn]
enabled = true
url = "http://gluetun:8000"

[torrent]
url = "http://qbittorrent:8080"
username = "admin"
password = "adminadmin"
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.history.path, "data/history.json");
    assert_eq!(config.history.long_retention_days, 30);
    assert_eq!(config.monitoring.sample_interval_ms, 10000);
    assert_eq!(config.publishing.broadcast_capacity, 64);
    assert_eq!(config.services.len(), 2);
    assert_eq!(config.services[0].name, "Sonarr");
    assert!(config.vpn.as_ref().unwrap().enabled);
    assert_eq!(
        config.torrent.as_ref().unwrap().username.as_deref(),
        Some("admin")
    );
}

#[test]
fn test_long_retention_ms_derives_from_days() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("valid");
    assert_eq!(config.long_retention_ms(), 30 * 24 * 60 * 60 * 1000);
}

#[test]
fn test_config_defaults_when_omitted() {
    let minimal = r#"
[server]
port = 8081
host = "0.0.0.0"

[history]
path = "data/history.json"

[monitoring]

[publishing]
broadcast_capacity = 64
"#;
    let config = AppConfig::load_from_str(minimal).expect("minimal config");
    assert_eq!(config.server.static_dir, "public");
    assert_eq!(config.history.long_retention_days, 30);
    assert_eq!(config.history.save_interval_secs, 60);
    assert_eq!(config.monitoring.sample_interval_ms, 10_000);
    assert_eq!(config.monitoring.check_interval_secs, 30);
    assert_eq!(config.monitoring.probe_timeout_ms, 5_000);
    assert!(config.services.is_empty());
    assert!(config.vpn.is_none());
    assert!(config.torrent.is_none());
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_history_path() {
    let bad = VALID_CONFIG.replace("path = \"data/history.json\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("history.path"));
}

#[test]
fn test_config_validation_rejects_zero_retention() {
    let bad = VALID_CONFIG.replace("long_retention_days = 30", "long_retention_days = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("long_retention_days"));
}

#[test]
fn test_config_validation_rejects_zero_save_interval() {
    let bad = VALID_CONFIG.replace("save_interval_secs = 60", "save_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("save_interval_secs"));
}

#[test]
fn test_config_validation_rejects_zero_sample_interval() {
    let bad = VALID_CONFIG.replace("sample_interval_ms = 10000", "sample_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("sample_interval_ms"));
}

#[test]
fn test_config_validation_rejects_zero_probe_timeout() {
    let bad = VALID_CONFIG.replace("probe_timeout_ms = 5000", "probe_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("probe_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 64", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("broadcast_capacity"));
}

#[test]
fn test_config_validation_rejects_unnamed_service() {
    let bad = VALID_CONFIG.replace("name = \"Sonarr\"", "name = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("services[].name"));
}

#[test]
fn test_config_validation_rejects_enabled_vpn_without_url() {
    let bad = VALID_CONFIG.replace("url = \"http://gluetun:8000\"", "url = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("vpn.url"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.history.path, "data/history.json");
}
