use retry_backoff::config::Config;
use retry_backoff::DEFAULT_BACKOFF;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_path_vendorless() {
    let path = Config::config_path().unwrap();
    let s = path.display().to_string();
    assert!(s.contains("retry-backoff"));
    assert!(s.ends_with("config.yaml"));
}

#[test]
fn test_load_yaml_bounds() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "min_ms: 50\nmax_ms: 2000\n").unwrap();
    let cfg = Config::load_from(&path).unwrap();
    let policy = cfg.policy().unwrap();
    assert_eq!(policy.min(), Duration::from_millis(50));
    assert_eq!(policy.max(), Duration::from_secs(2));
}

#[test]
fn test_empty_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "").unwrap();
    let cfg = Config::load_from(&path).unwrap();
    assert_eq!(cfg.policy().unwrap(), DEFAULT_BACKOFF);
}

#[test]
fn test_bad_yaml_reports_context() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "min_ms: [not a number\n").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(format!("{err:#}").contains("parse config yaml"));
}

#[test]
fn test_save_roundtrip_and_permissions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.yaml");
    let cfg = Config { min_ms: Some(30), max_ms: Some(900) };
    cfg.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), cfg);
    #[cfg(unix)]
    {
        let meta = fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }
}
