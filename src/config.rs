use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file structure for BuildLens.
///
/// Holds the Concourse host to resolve builds against and output preferences.
/// Configuration files are loaded from the current directory, the user config
/// directory, or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Concourse host configuration
    #[serde(default)]
    pub concourse: ConcourseConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConcourseConfig {
    /// Short name of the host, used in the master name (`concourse-<name>`)
    #[serde(default = "default_name")]
    pub name: String,

    /// Concourse web base URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Local user name for the password grant
    pub username: Option<String>,

    /// Local user password for the password grant
    pub password: Option<String>,

    /// Pre-issued bearer token
    pub token: Option<String>,

    /// Teams this host is scoped to; all teams when unset
    pub teams: Option<Vec<String>>,

    /// Resource types (besides `git`) whose metadata is collected; all when unset
    pub resource_filter_regex: Option<String>,

    /// Number of recent builds listed per job
    #[serde(default = "default_build_lookback_limit")]
    pub build_lookback_limit: usize,

    /// Upper bound on waiting for resource metadata; unbounded when unset
    pub metadata_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for ConcourseConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            url: default_url(),
            username: None,
            password: None,
            token: None,
            teams: None,
            resource_filter_regex: None,
            build_lookback_limit: default_build_lookback_limit(),
            metadata_timeout_secs: None,
        }
    }
}

impl ConcourseConfig {
    pub fn metadata_timeout(&self) -> Option<Duration> {
        self.metadata_timeout_secs.map(Duration::from_secs)
    }

    /// Whether `team` is within the configured team scope.
    pub fn includes_team(&self, team: &str) -> bool {
        self.teams
            .as_ref()
            .map_or(true, |teams| teams.iter().any(|t| t == team))
    }
}

fn default_name() -> String {
    "default".to_string()
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_build_lookback_limit() -> usize {
    200
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./buildlens.toml
    /// 3. ./buildlens.json
    /// 4. ./buildlens.yaml
    /// 5. ./buildlens.yml
    /// 6. `<user config dir>/buildlens/buildlens.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["buildlens.toml", "buildlens.json", "buildlens.yaml", "buildlens.yml"]
            .into_iter()
            .map(PathBuf::from)
            .chain(Self::user_config_path());

        for path in candidates {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("buildlens").join("buildlens.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}
