use crate::errors::{LaunchError, LaunchResult};
use crate::paths::expand_home;
use regex::{NoExpand, Regex};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Env file keys rewritten by the launcher, in the order they are patched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identifier {
    WalletPath,
    MultiversxProxy,
    MultisigScAddress,
    EsdtSafeScAddress,
}

impl Identifier {
    pub const ALL: [Identifier; 4] = [
        Identifier::WalletPath,
        Identifier::MultiversxProxy,
        Identifier::MultisigScAddress,
        Identifier::EsdtSafeScAddress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Identifier::WalletPath => "WALLET_PATH",
            Identifier::MultiversxProxy => "MULTIVERSX_PROXY",
            Identifier::MultisigScAddress => "MULTISIG_SC_ADDRESS",
            Identifier::EsdtSafeScAddress => "ESDT_SAFE_SC_ADDRESS",
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values written into the env file for one launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub wallet_path: String,
    pub proxy_url: String,
    pub esdt_safe_address: String,
    pub multisig_address: String,
}

impl BridgeSettings {
    /// Build settings from raw arguments. `~` is expanded in the wallet
    /// path and proxy URL; addresses are taken verbatim.
    pub fn new(
        wallet_path: &str,
        proxy_url: &str,
        esdt_safe_address: &str,
        multisig_address: &str,
    ) -> Self {
        Self {
            wallet_path: expand_home(wallet_path),
            proxy_url: expand_home(proxy_url),
            esdt_safe_address: esdt_safe_address.to_string(),
            multisig_address: multisig_address.to_string(),
        }
    }

    pub fn value_for(&self, identifier: Identifier) -> &str {
        match identifier {
            Identifier::WalletPath => &self.wallet_path,
            Identifier::MultiversxProxy => &self.proxy_url,
            Identifier::MultisigScAddress => &self.multisig_address,
            Identifier::EsdtSafeScAddress => &self.esdt_safe_address,
        }
    }

    /// Identifier/value pairs in patch order
    pub fn entries(&self) -> impl Iterator<Item = (Identifier, &str)> + '_ {
        Identifier::ALL
            .into_iter()
            .map(move |identifier| (identifier, self.value_for(identifier)))
    }

    fn validate(&self) -> LaunchResult<()> {
        for (identifier, value) in self.entries() {
            if value.contains('"') {
                return Err(LaunchError::InvalidValue {
                    identifier: identifier.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn quoted_span() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""(.*?)""#).expect("quoted span pattern is valid"))
}

/// Replace the first quoted span of every line starting with `identifier`.
///
/// Returns a new list of the same length. Lines that do not start with the
/// identifier, or that have no quoted span, are copied unchanged.
pub fn patch_lines(lines: &[String], identifier: &str, value: &str) -> Vec<String> {
    let replacement = format!("\"{value}\"");
    lines
        .iter()
        .map(|line| {
            if line.starts_with(identifier) {
                quoted_span()
                    .replacen(line, 1, NoExpand(&replacement))
                    .into_owned()
            } else {
                line.clone()
            }
        })
        .collect()
}

fn count_matches(lines: &[String], identifier: &str) -> usize {
    lines
        .iter()
        .filter(|line| line.starts_with(identifier))
        .count()
}

/// How many lines each identifier matched during a patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub matches: Vec<(Identifier, usize)>,
}

impl PatchReport {
    pub fn matched(&self, identifier: Identifier) -> usize {
        self.matches
            .iter()
            .find(|(id, _)| *id == identifier)
            .map_or(0, |(_, count)| *count)
    }

    pub fn missing(&self) -> Vec<Identifier> {
        self.matches
            .iter()
            .filter(|(_, count)| *count == 0)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// An env file held in memory as lines, each with its original terminator
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl EnvFile {
    pub fn load(path: &Path) -> LaunchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LaunchError::EnvFileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                LaunchError::EnvFileIo {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let lines = content.split_inclusive('\n').map(str::to_string).collect();
        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contents(&self) -> String {
        self.lines.concat()
    }

    /// Apply all four settings in order.
    ///
    /// In strict mode an identifier that matches no line is an error and the
    /// in-memory lines are left untouched. Otherwise it is logged and skipped.
    pub fn apply(&mut self, settings: &BridgeSettings, strict: bool) -> LaunchResult<PatchReport> {
        settings.validate()?;

        let mut lines = self.lines.clone();
        let mut matches = Vec::with_capacity(Identifier::ALL.len());
        for (identifier, value) in settings.entries() {
            let count = count_matches(&lines, identifier.as_str());
            matches.push((identifier, count));
            lines = patch_lines(&lines, identifier.as_str(), value);
        }
        let report = PatchReport { matches };

        for identifier in report.missing() {
            if strict {
                return Err(LaunchError::IdentifierNotFound {
                    identifier: identifier.to_string(),
                });
            }
            tracing::warn!("{identifier} not found in {:?}, leaving it unchanged", self.path);
        }

        self.lines = lines;
        Ok(report)
    }

    /// Write the lines back over the original file.
    ///
    /// Goes through a temp file in the same directory that is synced and
    /// renamed into place, keeping the original permissions. A symlinked
    /// path is resolved first so the link target is what gets replaced.
    pub fn save(&self) -> LaunchResult<()> {
        let io_err = |source| LaunchError::EnvFileIo {
            path: self.path.clone(),
            source,
        };

        let target = match std::fs::canonicalize(&self.path) {
            Ok(target) => target,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(io_err(e)),
        };

        let file_name = target.file_name().ok_or_else(|| {
            io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "env file path has no file name",
            ))
        })?;
        let temp_filename = format!(
            "{}.tmp.{}.{}",
            file_name.to_string_lossy(),
            std::process::id(),
            chrono::Utc::now().timestamp()
        );
        let temp_path = match target.parent() {
            Some(parent) => parent.join(temp_filename),
            None => PathBuf::from(temp_filename),
        };

        let result = self.write_temp(&temp_path).and_then(|()| {
            if let Ok(metadata) = std::fs::metadata(&target) {
                std::fs::set_permissions(&temp_path, metadata.permissions())?;
            }
            std::fs::rename(&temp_path, &target)
        });

        if let Err(e) = result {
            if let Err(cleanup_err) = std::fs::remove_file(&temp_path) {
                tracing::debug!("could not remove temp file {temp_path:?}: {cleanup_err}");
            }
            return Err(io_err(e));
        }

        tracing::info!("wrote {} lines to {:?}", self.lines.len(), self.path);
        Ok(())
    }

    fn write_temp(&self, temp_path: &Path) -> std::io::Result<()> {
        std::fs::write(temp_path, self.contents())?;
        sync_file(temp_path)
    }
}

/// Sync file to disk for durability
fn sync_file(file_path: &Path) -> std::io::Result<()> {
    let file = File::open(file_path)?;

    #[cfg(unix)]
    {
        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        if unsafe { libc::fsync(file.as_raw_fd()) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    #[cfg(not(unix))]
    {
        file.sync_all()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.split_inclusive('\n').map(str::to_string).collect()
    }

    #[test]
    fn test_wallet_path_replaced() {
        let input = lines("WALLET_PATH=\"/old/path\"");
        let output = patch_lines(&input, "WALLET_PATH", "/home/user/key.pem");
        assert_eq!(output, vec!["WALLET_PATH=\"/home/user/key.pem\"".to_string()]);
    }

    #[test]
    fn test_multisig_address_replaced() {
        let input = lines("MULTISIG_SC_ADDRESS=\"erd1old...\"\n");
        let output = patch_lines(&input, "MULTISIG_SC_ADDRESS", "erd1new...");
        assert_eq!(output, vec!["MULTISIG_SC_ADDRESS=\"erd1new...\"\n".to_string()]);
    }

    #[test]
    fn test_only_first_quoted_span_changes() {
        let input = lines("WALLET_PATH=\"a\" # was \"b\"\n");
        let output = patch_lines(&input, "WALLET_PATH", "c");
        assert_eq!(output[0], "WALLET_PATH=\"c\" # was \"b\"\n");
    }

    #[test]
    fn test_non_matching_lines_untouched() {
        let input = lines("# WALLET_PATH=\"x\"\n  WALLET_PATH=\"y\"\nOTHER=\"z\"\r\n\n");
        let output = patch_lines(&input, "WALLET_PATH", "new");
        assert_eq!(output, input);
    }

    #[test]
    fn test_matching_line_without_quotes_untouched() {
        let input = lines("WALLET_PATH=/bare/path\n");
        assert_eq!(patch_lines(&input, "WALLET_PATH", "new"), input);
    }

    #[test]
    fn test_value_is_literal() {
        let input = lines("MULTIVERSX_PROXY=\"old\"\n");
        let output = patch_lines(&input, "MULTIVERSX_PROXY", "$1${0}\\n");
        assert_eq!(output[0], "MULTIVERSX_PROXY=\"$1${0}\\n\"\n");
    }

    #[test]
    fn test_patch_is_idempotent() {
        let input = lines("ESDT_SAFE_SC_ADDRESS=\"erd1a\"\nX=\"1\"\n");
        let once = patch_lines(&input, "ESDT_SAFE_SC_ADDRESS", "erd1b");
        let twice = patch_lines(&once, "ESDT_SAFE_SC_ADDRESS", "erd1b");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prefix_match_covers_longer_keys() {
        let input = lines("WALLET_PATH_BACKUP=\"old\"\n");
        let output = patch_lines(&input, "WALLET_PATH", "new");
        assert_eq!(output[0], "WALLET_PATH_BACKUP=\"new\"\n");
    }

    #[test]
    fn test_quote_in_value_rejected() {
        let settings = BridgeSettings::new("/k.pem", "http://p", "erd1\"x", "erd1m");
        let err = settings.validate().unwrap_err();
        assert!(matches!(
            err,
            LaunchError::InvalidValue { ref identifier, .. } if identifier == "ESDT_SAFE_SC_ADDRESS"
        ));
    }

    #[test]
    fn test_entries_follow_patch_order() {
        let settings = BridgeSettings::new("/k.pem", "http://p", "erd1esdt", "erd1multisig");
        let entries: Vec<_> = settings.entries().collect();
        assert_eq!(
            entries,
            vec![
                (Identifier::WalletPath, "/k.pem"),
                (Identifier::MultiversxProxy, "http://p"),
                (Identifier::MultisigScAddress, "erd1multisig"),
                (Identifier::EsdtSafeScAddress, "erd1esdt"),
            ]
        );
    }
}
