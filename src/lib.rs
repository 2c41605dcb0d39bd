//! Configure and launch the sovereign bridge service.
//!
//! The launcher rewrites the wallet, proxy and contract address entries of
//! the bridge server's `.env` file, builds the server and runs it in the
//! foreground.

// Error types shared by every stage
pub mod errors;

// Launcher settings file
pub mod config;

// Locating the bridge service checkout
pub mod paths;

// Env file patching
pub mod env_file;

// Build-and-run of the bridge server
pub mod launcher;

// Re-export key types for convenience
pub use config::{CommandConfig, LauncherConfig, LauncherConfigManager};
pub use env_file::{patch_lines, BridgeSettings, EnvFile, Identifier, PatchReport};
pub use errors::{exit_status, ErrorCategory, LaunchError, LaunchResult};
pub use launcher::{prepare_env, LaunchEvent, LaunchStage, Launcher};
pub use paths::{expand_home, BridgePaths};
