use crate::config::LauncherConfig;
use crate::errors::{LaunchError, LaunchResult};
use std::path::{Component, Path, PathBuf};

/// Filesystem locations the launcher works with, all derived from the
/// bridge service directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgePaths {
    pub bridge_service_dir: PathBuf,
    /// Directory the build and run commands execute in
    pub server_dir: PathBuf,
    pub env_file: PathBuf,
}

impl BridgePaths {
    /// Derive paths from an explicitly supplied bridge service directory.
    pub fn from_bridge_dir(bridge_dir: &Path, config: &LauncherConfig) -> LaunchResult<Self> {
        if !bridge_dir.is_dir() {
            return Err(LaunchError::BridgeDirMissing {
                path: bridge_dir.to_path_buf(),
            });
        }
        Ok(Self::derive(bridge_dir.to_path_buf(), config))
    }

    /// Locate the bridge service as a sibling of the project checkout that
    /// contains `working_dir`.
    ///
    /// The checkout is the first path component containing
    /// `config.project_marker`. Its parent gets `config.bridge_service_dir`
    /// joined onto it. When no component matches, this fails instead of
    /// guessing.
    pub fn from_working_dir(working_dir: &Path, config: &LauncherConfig) -> LaunchResult<Self> {
        let project_parent = project_parent(working_dir, &config.project_marker).ok_or_else(
            || LaunchError::ProjectRootNotFound {
                marker: config.project_marker.clone(),
                working_dir: working_dir.to_path_buf(),
            },
        )?;

        let bridge_service_dir = project_parent.join(&config.bridge_service_dir);
        tracing::debug!(
            "resolved bridge service directory {bridge_service_dir:?} from {working_dir:?}"
        );
        Ok(Self::derive(bridge_service_dir, config))
    }

    fn derive(bridge_service_dir: PathBuf, config: &LauncherConfig) -> Self {
        let server_dir = config
            .server_subdir
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(bridge_service_dir.clone(), |dir, segment| dir.join(segment));
        let env_file = server_dir.join(&config.env_file_name);

        Self {
            bridge_service_dir,
            server_dir,
            env_file,
        }
    }
}

fn project_parent(working_dir: &Path, marker: &str) -> Option<PathBuf> {
    if marker.is_empty() {
        return None;
    }
    let mut parent = PathBuf::new();
    for component in working_dir.components() {
        if let Component::Normal(name) = component {
            if name.to_string_lossy().contains(marker) {
                return Some(parent);
            }
        }
        parent.push(component);
    }
    None
}

/// Expand a leading `~` to the user's home directory. Anything else is
/// returned unchanged.
pub fn expand_home(value: &str) -> String {
    let rest = match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return value.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.to_string_lossy()),
        None => value.to_string(),
    }
}
