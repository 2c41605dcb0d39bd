use serde_json::json;
use std::fs;
use tempfile::TempDir;
use bridge_launcher::{config::DEFAULT_CONFIG_FILE, LaunchError, LauncherConfigManager};

#[test]
fn test_settings_file_loaded_from_project_dir() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join(DEFAULT_CONFIG_FILE);

    let settings = json!({
        "bridgeServiceDir": "sovereign-bridge",
        "build": { "command": "make", "args": ["server"] },
        "run": {
            "command": "./server",
            "args": ["--log-level", "*:DEBUG"],
            "env": { "GOMAXPROCS": "2" }
        },
        "strictIdentifiers": true
    });
    fs::write(&config_path, serde_json::to_string_pretty(&settings)?)?;
    println!("📝 Created test settings at: {:?}", config_path);

    let manager = LauncherConfigManager::new(Some(temp_dir.path().to_path_buf()))?;
    assert_eq!(manager.get_config_path(), config_path.as_path());

    let config = manager.config();
    assert_eq!(config.bridge_service_dir, "sovereign-bridge");
    assert_eq!(config.build.to_string(), "make server");
    assert_eq!(config.run.env.get("GOMAXPROCS").map(String::as_str), Some("2"));
    assert!(config.strict_identifiers);
    assert_eq!(config.project_marker, "mx-chain-go");
    assert_eq!(config.env_file_name, ".env");

    println!("✅ Settings loaded with defaults filled in");
    Ok(())
}

#[test]
fn test_missing_settings_file_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let manager = LauncherConfigManager::new(Some(temp_dir.path().to_path_buf()))?;

    assert!(!manager.get_config_path().exists());
    assert_eq!(manager.config().build.to_string(), "go build");
    assert_eq!(manager.config().run.to_string(), "./server");
    Ok(())
}

#[test]
fn test_malformed_settings_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("launcher.json");
    fs::write(&config_path, "{ \"build\": ")?;

    let err = LauncherConfigManager::from_file(config_path).unwrap_err();
    assert!(matches!(err, LaunchError::ConfigurationError { .. }));
    assert!(err.to_string().contains("failed to parse"));
    Ok(())
}

#[test]
fn test_explicit_settings_file_must_exist() {
    let temp_dir = TempDir::new().unwrap();
    let err = LauncherConfigManager::from_file(temp_dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, LaunchError::ConfigurationError { .. }));
}
