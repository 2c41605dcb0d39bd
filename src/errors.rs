use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop a launch, from path resolution to the running service.
#[derive(Error, Debug)]
pub enum LaunchError {
    // Path and Configuration Errors
    #[error("Project marker '{marker}' not found in working directory {working_dir:?}")]
    ProjectRootNotFound { marker: String, working_dir: PathBuf },

    #[error("Bridge service directory does not exist: {path:?}")]
    BridgeDirMissing { path: PathBuf },

    #[error("Configuration error: {reason}")]
    ConfigurationError { reason: String },

    // Env File Errors
    #[error("Env file not found: {path:?}")]
    EnvFileNotFound { path: PathBuf },

    #[error("Env file I/O error on {path:?}: {source}")]
    EnvFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Value for '{identifier}' contains a double quote: {value}")]
    InvalidValue { identifier: String, value: String },

    #[error("No line in the env file starts with '{identifier}'")]
    IdentifierNotFound { identifier: String },

    // Build Errors
    #[error("Failed to start build command '{command}': {source}")]
    BuildSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Build failed with exit code {exit_code:?}")]
    BuildFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    // Run Errors
    #[error("Failed to start service command '{command}': {source}")]
    ServiceSpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Service exited with exit code {exit_code:?}")]
    ServiceFailed { exit_code: Option<i32> },

    #[error("Service was interrupted")]
    ServiceInterrupted,
}

/// Coarse grouping of launch errors, one per pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad command-line or settings input
    Argument,
    /// The bridge service directory could not be located
    Path,
    /// Reading or writing the env file failed
    Io,
    /// The build step failed or could not start
    Build,
    /// The service failed, could not start, or was interrupted
    Run,
}

impl LaunchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LaunchError::ConfigurationError { .. }
            | LaunchError::InvalidValue { .. }
            | LaunchError::IdentifierNotFound { .. } => ErrorCategory::Argument,

            LaunchError::ProjectRootNotFound { .. } | LaunchError::BridgeDirMissing { .. } => {
                ErrorCategory::Path
            }

            LaunchError::EnvFileNotFound { .. } | LaunchError::EnvFileIo { .. } => {
                ErrorCategory::Io
            }

            LaunchError::BuildSpawnFailed { .. } | LaunchError::BuildFailed { .. } => {
                ErrorCategory::Build
            }

            LaunchError::ServiceSpawnFailed { .. }
            | LaunchError::ServiceFailed { .. }
            | LaunchError::ServiceInterrupted => ErrorCategory::Run,
        }
    }

    /// Whether the launcher already announced this failure through a
    /// [`LaunchEvent`](crate::LaunchEvent)
    pub fn reported_by_launcher(&self) -> bool {
        matches!(self.category(), ErrorCategory::Build | ErrorCategory::Run)
    }

    /// Generate user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            LaunchError::ProjectRootNotFound {
                marker,
                working_dir,
            } => {
                format!("📁 Could not find '{marker}' in {}. Run from inside the checkout or pass --bridge-dir.", working_dir.display())
            }

            LaunchError::BridgeDirMissing { path } => {
                format!(
                    "📁 Bridge service directory {} does not exist. Check --bridge-dir.",
                    path.display()
                )
            }

            LaunchError::EnvFileNotFound { path } => {
                format!("📝 No env file at {}. Is the bridge service checked out?", path.display())
            }

            LaunchError::InvalidValue { identifier, .. } => {
                format!("⚠️ The value for {identifier} contains a double quote and cannot be written safely.")
            }

            LaunchError::IdentifierNotFound { identifier } => {
                format!("⚠️ {identifier} is missing from the env file (strict mode).")
            }

            LaunchError::BuildFailed { exit_code, .. } => {
                format!("❌ Error during build (exit code {}).", display_code(*exit_code))
            }

            LaunchError::ServiceFailed { exit_code } => {
                format!("❌ Error running service (exit code {}).", display_code(*exit_code))
            }

            LaunchError::ServiceInterrupted => "🛑 Service interrupted.".to_string(),

            _ => format!("❌ {self}"),
        }
    }
}

pub(crate) fn display_code(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

pub type LaunchResult<T> = Result<T, LaunchError>;

/// Process exit status for a finished run, plus the console message still
/// owed to the user. Success is 0 and every failure is 1.
pub fn exit_status(result: &anyhow::Result<()>) -> (u8, Option<String>) {
    let Err(e) = result else {
        return (0, None);
    };
    let message = match e.downcast_ref::<LaunchError>() {
        Some(launch_err) if launch_err.reported_by_launcher() => None,
        Some(launch_err) => Some(launch_err.user_message()),
        None => Some(format!("❌ {e:#}")),
    };
    (1, message)
}
