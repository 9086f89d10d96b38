use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(s) = path.to_str() {
        if let Some(stripped) = s.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if s == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

/// Configuration for gitcore
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitcoreConfig {
    /// Name written into author/committer lines
    #[serde(default = "defaults::author_name")]
    pub author_name: String,
    /// Email written into author/committer lines
    #[serde(default = "defaults::author_email")]
    pub author_email: String,
    /// Timezone offset recorded on commits, e.g. `+0000`
    #[serde(default = "defaults::timezone_offset")]
    pub timezone_offset: String,
    /// Upper bound for a single HTTP exchange with a remote
    #[serde(default = "defaults::http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,
    /// Branch that HEAD points at and that `clone` writes
    #[serde(default = "defaults::default_branch")]
    pub default_branch: String,
}

impl Default for GitcoreConfig {
    fn default() -> Self {
        Self {
            author_name: defaults::author_name(),
            author_email: defaults::author_email(),
            timezone_offset: defaults::timezone_offset(),
            http_timeout_secs: defaults::http_timeout_secs(),
            user_agent: defaults::user_agent(),
            default_branch: defaults::default_branch(),
        }
    }
}

impl GitcoreConfig {
    /// Load configuration from the config file (if any) and environment variables
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading gitcore config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        if let Ok(name) = env::var("GITCORE_AUTHOR_NAME") {
            config.author_name = name;
        }

        if let Ok(email) = env::var("GITCORE_AUTHOR_EMAIL") {
            config.author_email = email;
        }

        if let Ok(branch) = env::var("GITCORE_DEFAULT_BRANCH") {
            config.default_branch = branch;
        }

        if let Ok(timeout) = env::var("GITCORE_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout
                .parse()
                .context("Failed to parse GITCORE_HTTP_TIMEOUT_SECS as u64")?;
        }
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: GitcoreConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = env::var("GITCORE_CONFIG") {
            return Ok(expand_tilde(&PathBuf::from(path)));
        }
        dirs::home_dir()
            .map(|home| home.join(".config/gitcore/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

mod defaults {
    pub(crate) fn author_name() -> String {
        "gitcore".to_string()
    }

    pub(crate) fn author_email() -> String {
        "gitcore@localhost".to_string()
    }

    pub(crate) fn timezone_offset() -> String {
        "+0000".to_string()
    }

    pub(crate) fn http_timeout_secs() -> u64 {
        60
    }

    pub(crate) fn user_agent() -> String {
        format!("gitcore/{}", env!("CARGO_PKG_VERSION"))
    }

    pub(crate) fn default_branch() -> String {
        "main".to_string()
    }
}
