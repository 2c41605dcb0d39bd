use crate::errors::{LaunchError, LaunchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Settings file looked up in the project directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "bridge-launcher.json";

fn default_project_marker() -> String {
    "mx-chain-go".to_string()
}

fn default_bridge_service_dir() -> String {
    "mx-chain-sovereign-bridge-go".to_string()
}

fn default_server_subdir() -> String {
    "server/cmd/server".to_string()
}

fn default_env_file_name() -> String {
    ".env".to_string()
}

fn default_build_command() -> CommandConfig {
    CommandConfig::new("go", &["build"])
}

fn default_run_command() -> CommandConfig {
    CommandConfig::new("./server", &[])
}

/// A child process invocation: program, arguments and extra environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CommandConfig {
    pub fn new(command: &str, args: &[&str]) -> Self {
        Self {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: HashMap::new(),
        }
    }
}

impl fmt::Display for CommandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Launcher settings. Every field has a default matching the standard
/// sovereign bridge checkout layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Directory name searched for in the working directory when no
    /// bridge directory is given explicitly
    #[serde(rename = "projectMarker", default = "default_project_marker")]
    pub project_marker: String,
    /// Sibling directory of the project checkout holding the bridge service
    #[serde(rename = "bridgeServiceDir", default = "default_bridge_service_dir")]
    pub bridge_service_dir: String,
    /// Server directory relative to the bridge service directory
    #[serde(rename = "serverSubdir", default = "default_server_subdir")]
    pub server_subdir: String,
    #[serde(rename = "envFileName", default = "default_env_file_name")]
    pub env_file_name: String,
    #[serde(default = "default_build_command")]
    pub build: CommandConfig,
    #[serde(default = "default_run_command")]
    pub run: CommandConfig,
    /// Treat an identifier missing from the env file as an error
    #[serde(rename = "strictIdentifiers", default)]
    pub strict_identifiers: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            project_marker: default_project_marker(),
            bridge_service_dir: default_bridge_service_dir(),
            server_subdir: default_server_subdir(),
            env_file_name: default_env_file_name(),
            build: default_build_command(),
            run: default_run_command(),
            strict_identifiers: false,
        }
    }
}

impl LauncherConfig {
    fn validate(&self) -> LaunchResult<()> {
        let required = [
            ("projectMarker", &self.project_marker),
            ("bridgeServiceDir", &self.bridge_service_dir),
            ("envFileName", &self.env_file_name),
            ("build.command", &self.build.command),
            ("run.command", &self.run.command),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(LaunchError::ConfigurationError {
                    reason: format!("'{field}' must not be empty"),
                });
            }
        }
        Ok(())
    }
}

/// Loads launcher settings from disk, falling back to defaults
#[derive(Debug, Clone)]
pub struct LauncherConfigManager {
    config_path: PathBuf,
    config: LauncherConfig,
}

impl LauncherConfigManager {
    /// Look for the default settings file in `project_dir` (or the current
    /// directory). A missing file yields the defaults.
    pub fn new(project_dir: Option<PathBuf>) -> LaunchResult<Self> {
        let config_path = if let Some(dir) = project_dir {
            dir.join(DEFAULT_CONFIG_FILE)
        } else {
            PathBuf::from(DEFAULT_CONFIG_FILE)
        };

        let config = if config_path.exists() {
            Self::read_config(&config_path)?
        } else {
            tracing::debug!("no settings file at {config_path:?}, using defaults");
            LauncherConfig::default()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load an explicitly named settings file, which must exist.
    pub fn from_file(config_path: PathBuf) -> LaunchResult<Self> {
        if !config_path.exists() {
            return Err(LaunchError::ConfigurationError {
                reason: format!("settings file {config_path:?} does not exist"),
            });
        }
        let config = Self::read_config(&config_path)?;
        Ok(Self {
            config_path,
            config,
        })
    }

    fn read_config(path: &Path) -> LaunchResult<LauncherConfig> {
        let content =
            std::fs::read_to_string(path).map_err(|e| LaunchError::ConfigurationError {
                reason: format!("failed to read {path:?}: {e}"),
            })?;
        let config: LauncherConfig =
            serde_json::from_str(&content).map_err(|e| LaunchError::ConfigurationError {
                reason: format!("failed to parse {path:?}: {e}"),
            })?;
        config.validate()?;
        tracing::info!("loaded launcher settings from {path:?}");
        Ok(config)
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn into_config(self) -> LauncherConfig {
        self.config
    }

    /// Get the path to the settings file (for debugging)
    pub fn get_config_path(&self) -> &Path {
        &self.config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_checkout_layout() {
        let config = LauncherConfig::default();
        assert_eq!(config.project_marker, "mx-chain-go");
        assert_eq!(config.bridge_service_dir, "mx-chain-sovereign-bridge-go");
        assert_eq!(config.server_subdir, "server/cmd/server");
        assert_eq!(config.env_file_name, ".env");
        assert_eq!(config.build.to_string(), "go build");
        assert_eq!(config.run.to_string(), "./server");
        assert!(!config.strict_identifiers);
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let config: LauncherConfig = serde_json::from_str(
            r#"{ "run": { "command": "./bridge", "args": ["--log-level", "debug"] } }"#,
        )
        .unwrap();
        assert_eq!(config.run.to_string(), "./bridge --log-level debug");
        assert_eq!(config.build.to_string(), "go build");
        assert_eq!(config.env_file_name, ".env");
    }

    #[test]
    fn test_empty_command_rejected() {
        let config: LauncherConfig =
            serde_json::from_str(r#"{ "build": { "command": "  " } }"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("build.command"));
    }
}
