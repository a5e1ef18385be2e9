//! Secret loading from the runtime `.env` file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;

/// Slack bot token (`xoxb-`), used for the Web API.
pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
/// Slack app-level token (`xapp-`), used to open Socket Mode.
pub const SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";
/// Atlassian account email.
pub const JIRA_EMAIL: &str = "JIRA_EMAIL";
/// Atlassian API token.
pub const JIRA_API_TOKEN: &str = "JIRA_API_TOKEN";

/// Keys that must be present before the bridge starts.
pub const REQUIRED_KEYS: &[&str] = &[SLACK_BOT_TOKEN, SLACK_APP_TOKEN, JIRA_EMAIL, JIRA_API_TOKEN];

/// Secrets loaded from the `.env` file.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Build credentials from a key-value map.
    pub fn from_map(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Returns a credential value for a key, if present and non-blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns a required credential or an error when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the key is absent or blank.
    pub fn require(&self, key: &str) -> anyhow::Result<String> {
        self.get(key)
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("credential {key} is not set in .env"))
    }

    /// Keys from [`REQUIRED_KEYS`] that are absent or blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none())
            .collect()
    }

    /// Fail unless every key in [`REQUIRED_KEYS`] is set.
    ///
    /// # Errors
    ///
    /// Returns an error naming all missing keys.
    pub fn require_all(&self) -> anyhow::Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        Err(anyhow::anyhow!(
            "missing required credentials: {}",
            missing.join(", ")
        ))
    }
}

/// Load the `.env` file at `path`.
///
/// The file must exist and must not be readable by group or other.
///
/// # Errors
///
/// Returns an error when the file is absent, too widely readable, or holds a
/// line `dotenvy` cannot parse.
pub fn load_credentials(path: &Path) -> anyhow::Result<Credentials> {
    let metadata = fs::metadata(path).map_err(|e| {
        anyhow::anyhow!(
            "credentials file does not exist or is unreadable: {} ({e})",
            path.display()
        )
    })?;
    ensure_owner_only(path, &metadata)?;

    let vars = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .collect::<Result<BTreeMap<_, _>, _>>()
        .with_context(|| format!("malformed entry in {}", path.display()))?;

    Ok(Credentials { vars })
}

/// Set `path` to mode 0600. No-op off Unix.
///
/// # Errors
///
/// Returns an error if the mode cannot be changed.
pub fn restrict_to_owner(path: &Path) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to chmod 600 {}", path.display()))?;
    }

    Ok(())
}

#[cfg(unix)]
fn ensure_owner_only(path: &Path, metadata: &fs::Metadata) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode() & 0o777;
    anyhow::ensure!(
        mode & 0o077 == 0,
        "credentials file {} has mode {mode:o}, expected 0600; run `chmod 600 {}`",
        path.display(),
        path.display()
    );
    Ok(())
}

#[cfg(not(unix))]
fn ensure_owner_only(_path: &Path, _metadata: &fs::Metadata) -> anyhow::Result<()> {
    Ok(())
}
