// Runtime settings, read from the environment with sensible defaults.

use std::path::PathBuf;

use crate::store::DEFAULT_ACCOUNTS_FILE;

/// Environment variable overriding where saved accounts are kept.
pub const ACCOUNTS_FILE_VAR: &str = "AZQUEUE_ACCOUNTS_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub accounts_file: PathBuf,
}

impl Settings {
    /// Build settings from `AZQUEUE_ACCOUNTS_FILE`, falling back to
    /// `azure_storage_info.dat` in the working directory.
    pub fn from_env() -> Self {
        Self::from_accounts_file(std::env::var(ACCOUNTS_FILE_VAR).ok())
    }

    fn from_accounts_file(value: Option<String>) -> Self {
        let accounts_file = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(|v| expand_home(&v))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ACCOUNTS_FILE));
        Settings { accounts_file }
    }
}

/// Expand a leading `~/` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_working_directory_file() {
        assert_eq!(
            Settings::from_accounts_file(None).accounts_file,
            PathBuf::from("azure_storage_info.dat")
        );
        assert_eq!(
            Settings::from_accounts_file(Some("  ".into())).accounts_file,
            PathBuf::from("azure_storage_info.dat")
        );
    }

    #[test]
    fn explicit_path_is_used() {
        assert_eq!(
            Settings::from_accounts_file(Some("/tmp/accounts.dat".into())).accounts_file,
            PathBuf::from("/tmp/accounts.dat")
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                Settings::from_accounts_file(Some("~/queues.dat".into())).accounts_file,
                home.join("queues.dat")
            );
        }
    }
}
