use crate::config::{CommandConfig, LauncherConfig};
use crate::env_file::{BridgeSettings, EnvFile, PatchReport};
use crate::errors::{display_code, LaunchError, LaunchResult};
use crate::paths::BridgePaths;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Where the launcher stands after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStage {
    Build,
    Run,
    Done,
    Failed,
}

/// Progress reported while building and running the bridge service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    BuildStarted { command: String },
    BuildSucceeded,
    BuildFailed { exit_code: Option<i32> },
    ServiceStarted { pid: Option<u32> },
    ServiceExited,
    ServiceFailed { exit_code: Option<i32> },
    ServiceInterrupted,
}

impl LaunchEvent {
    pub fn stage(&self) -> LaunchStage {
        match self {
            LaunchEvent::BuildStarted { .. } => LaunchStage::Build,
            LaunchEvent::BuildSucceeded | LaunchEvent::ServiceStarted { .. } => LaunchStage::Run,
            LaunchEvent::ServiceExited => LaunchStage::Done,
            LaunchEvent::BuildFailed { .. }
            | LaunchEvent::ServiceFailed { .. }
            | LaunchEvent::ServiceInterrupted => LaunchStage::Failed,
        }
    }

    fn is_failure(&self) -> bool {
        self.stage() == LaunchStage::Failed
    }
}

impl fmt::Display for LaunchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchEvent::BuildStarted { command } => write!(f, "🔨 Building: {command}"),
            LaunchEvent::BuildSucceeded => write!(f, "✅ Build successful."),
            LaunchEvent::BuildFailed { exit_code } => {
                write!(f, "❌ Error during build (exit code {}).", display_code(*exit_code))
            }
            LaunchEvent::ServiceStarted { pid: Some(pid) } => {
                write!(f, "🚀 Bridge service started (pid {pid}).")
            }
            LaunchEvent::ServiceStarted { pid: None } => write!(f, "🚀 Bridge service started."),
            LaunchEvent::ServiceExited => write!(f, "✅ Bridge service exited cleanly."),
            LaunchEvent::ServiceFailed { exit_code } => {
                write!(f, "❌ Error running service (exit code {}).", display_code(*exit_code))
            }
            LaunchEvent::ServiceInterrupted => write!(f, "🛑 Bridge service interrupted."),
        }
    }
}

/// Rewrite the env file at `paths.env_file` with `settings` and save it.
pub fn prepare_env(
    paths: &BridgePaths,
    settings: &BridgeSettings,
    strict: bool,
) -> LaunchResult<PatchReport> {
    let mut env_file = EnvFile::load(&paths.env_file)?;
    let report = env_file.apply(settings, strict)?;
    env_file.save()?;
    Ok(report)
}

/// Builds the bridge server, then runs it in the foreground.
///
/// Both commands execute in `server_dir`; the launcher's own working
/// directory is never changed.
#[derive(Debug, Clone)]
pub struct Launcher {
    server_dir: PathBuf,
    build: CommandConfig,
    run: CommandConfig,
}

impl Launcher {
    pub fn new(server_dir: PathBuf, build: CommandConfig, run: CommandConfig) -> Self {
        Self {
            server_dir,
            build,
            run,
        }
    }

    pub fn from_config(paths: &BridgePaths, config: &LauncherConfig) -> Self {
        Self::new(
            paths.server_dir.clone(),
            config.build.clone(),
            config.run.clone(),
        )
    }

    /// Run the build, and on success the service. Every event is passed to
    /// `observer` in order. A failed build never starts the service, and
    /// Ctrl-C stops a running one.
    pub async fn launch<F>(&self, observer: F) -> LaunchResult<()>
    where
        F: FnMut(&LaunchEvent),
    {
        self.launch_until(observer, ctrl_c()).await
    }

    /// Same as [`launch`](Self::launch), but the service is stopped when
    /// `interrupt` completes instead of on Ctrl-C.
    pub async fn launch_until<F, I>(&self, mut observer: F, interrupt: I) -> LaunchResult<()>
    where
        F: FnMut(&LaunchEvent),
        I: Future<Output = ()>,
    {
        self.build(&mut observer).await?;
        self.run(&mut observer, interrupt).await
    }

    async fn build<F>(&self, observer: &mut F) -> LaunchResult<()>
    where
        F: FnMut(&LaunchEvent),
    {
        emit(
            observer,
            LaunchEvent::BuildStarted {
                command: self.build.to_string(),
            },
        );

        let output = self
            .command(&self.build)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| {
                tracing::error!("failed to start build command '{}': {source}", self.build);
                emit(observer, LaunchEvent::BuildFailed { exit_code: None });
                LaunchError::BuildSpawnFailed {
                    command: self.build.to_string(),
                    source,
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!("build stdout:\n{}", stdout.trim_end());
        }

        if output.status.success() {
            emit(observer, LaunchEvent::BuildSucceeded);
            return Ok(());
        }

        let exit_code = output.status.code();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            tracing::error!("build stderr:\n{}", stderr.trim_end());
        }
        emit(observer, LaunchEvent::BuildFailed { exit_code });
        Err(LaunchError::BuildFailed { exit_code, stderr })
    }

    async fn run<F, I>(&self, observer: &mut F, interrupt: I) -> LaunchResult<()>
    where
        F: FnMut(&LaunchEvent),
        I: Future<Output = ()>,
    {
        let mut child = self
            .command(&self.run)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                tracing::error!("failed to start service command '{}': {source}", self.run);
                emit(observer, LaunchEvent::ServiceFailed { exit_code: None });
                LaunchError::ServiceSpawnFailed {
                    command: self.run.to_string(),
                    source,
                }
            })?;

        emit(observer, LaunchEvent::ServiceStarted { pid: child.id() });

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            () = interrupt => None,
        };

        match waited {
            Some(Ok(status)) if status.success() => {
                emit(observer, LaunchEvent::ServiceExited);
                Ok(())
            }
            Some(Ok(status)) => {
                let exit_code = status.code();
                emit(observer, LaunchEvent::ServiceFailed { exit_code });
                Err(LaunchError::ServiceFailed { exit_code })
            }
            Some(Err(e)) => {
                tracing::error!("failed waiting for service: {e}");
                emit(observer, LaunchEvent::ServiceFailed { exit_code: None });
                Err(LaunchError::ServiceFailed { exit_code: None })
            }
            None => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("failed to stop service after interrupt: {e}");
                }
                emit(observer, LaunchEvent::ServiceInterrupted);
                Err(LaunchError::ServiceInterrupted)
            }
        }
    }

    fn command(&self, config: &CommandConfig) -> Command {
        let mut cmd = Command::new(self.program_path(&config.command));
        cmd.args(&config.args);
        cmd.current_dir(&self.server_dir);
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Relative programs with a directory part (`./server`) are taken
    /// relative to the server directory; bare names go through `PATH`.
    fn program_path(&self, program: &str) -> PathBuf {
        let path = Path::new(program);
        if path.is_relative() && path.components().count() > 1 {
            self.server_dir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

fn emit<F>(observer: &mut F, event: LaunchEvent)
where
    F: FnMut(&LaunchEvent),
{
    if event.is_failure() {
        tracing::error!("{event}");
    } else {
        tracing::info!("{event}");
    }
    observer(&event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_path_resolution() {
        let launcher = Launcher::new(
            PathBuf::from("/srv/bridge/server/cmd/server"),
            CommandConfig::new("go", &["build"]),
            CommandConfig::new("./server", &[]),
        );
        assert_eq!(
            launcher.program_path("./server"),
            PathBuf::from("/srv/bridge/server/cmd/server/./server")
        );
        assert_eq!(launcher.program_path("go"), PathBuf::from("go"));
        assert_eq!(launcher.program_path("/usr/bin/env"), PathBuf::from("/usr/bin/env"));
    }

    #[test]
    fn test_event_stages() {
        assert_eq!(LaunchEvent::BuildSucceeded.stage(), LaunchStage::Run);
        assert_eq!(LaunchEvent::ServiceExited.stage(), LaunchStage::Done);
        assert_eq!(
            LaunchEvent::BuildFailed { exit_code: Some(1) }.stage(),
            LaunchStage::Failed
        );
        assert_eq!(LaunchEvent::ServiceInterrupted.stage(), LaunchStage::Failed);
    }

    #[test]
    fn test_event_messages() {
        assert!(LaunchEvent::BuildSucceeded
            .to_string()
            .contains("Build successful"));
        assert!(LaunchEvent::ServiceStarted { pid: Some(42) }
            .to_string()
            .contains("service started (pid 42)"));
        assert_eq!(
            LaunchEvent::ServiceFailed { exit_code: Some(7) }.to_string(),
            "❌ Error running service (exit code 7)."
        );
    }
}
