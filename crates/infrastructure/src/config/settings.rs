//! Run settings
//!
//! Loaded from `kustforge.yaml` (or the file named by `KUSTFORGE_CONFIG`),
//! then overridden by environment variables. Every field has a default, so
//! an absent file yields a usable configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use kustforge_application::ports::{FileSystem, FileSystemError};
use kustforge_application::{ApplyMode, EngineConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ConfigError;
use crate::serialization::from_yaml;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "KUSTFORGE_CONFIG";

/// Settings file read when `KUSTFORGE_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "kustforge.yaml";

/// Directory holding snapshot history, relative to the template root.
pub const DEFAULT_STATE_DIR: &str = ".kustforge";

const MODE_ENV: &str = "KUSTFORGE_MODE";
const REGION_ENV: &str = "KUSTFORGE_REGION";
const AWS_REGION_ENV: &str = "AWS_REGION";
const MAX_CONCURRENCY_ENV: &str = "KUSTFORGE_MAX_CONCURRENCY";

/// What a run does with the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Render and report the diff against the current snapshot.
    #[default]
    Diff,
    /// Render and commit a new snapshot.
    Apply,
    /// Restore the previous snapshot.
    Rollback,
}

impl RunMode {
    /// The render mode, or `None` for rollback.
    #[must_use]
    pub const fn apply_mode(self) -> Option<ApplyMode> {
        match self {
            Self::Diff => Some(ApplyMode::DiffOnly),
            Self::Apply => Some(ApplyMode::Apply),
            Self::Rollback => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Diff => "diff",
            Self::Apply => "apply",
            Self::Rollback => "rollback",
        })
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diff" => Ok(Self::Diff),
            "apply" => Ok(Self::Apply),
            "rollback" => Ok(Self::Rollback),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Retry budget for throttled calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    pub max_delay_ms: u64,
    /// Growth factor between delays.
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Builds the engine's retry policy.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
        )
    }
}

/// Run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// What to do.
    pub mode: RunMode,
    /// Region used for remote calls.
    pub region: Option<String>,
    /// Concurrent remote lookups.
    pub max_concurrency: usize,
    /// Renew sessions this many seconds before they expire.
    pub refresh_skew_secs: u32,
    /// Expire resolved values after this many seconds. Unset keeps them for
    /// the whole run.
    pub cache_ttl_secs: Option<u32>,
    /// Throttling retry budget.
    pub retry: RetrySettings,
    /// Directory holding snapshot history.
    pub state_dir: PathBuf,
    /// Snapshots kept per template. Unset keeps all.
    pub history_limit: Option<usize>,
    /// Alias table file.
    pub aliases: Option<PathBuf>,
    /// Offline resource inventory.
    pub inventory: Option<PathBuf>,
    /// Root for template discovery and output files.
    pub template_root: PathBuf,
    /// Explicit templates relative to `template_root`. Empty means discover.
    pub templates: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            region: None,
            max_concurrency: kustforge_application::engine::DEFAULT_MAX_CONCURRENCY,
            refresh_skew_secs: 300,
            cache_ttl_secs: None,
            retry: RetrySettings::default(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            history_limit: None,
            aliases: None,
            inventory: None,
            template_root: PathBuf::from("."),
            templates: Vec::new(),
        }
    }
}

impl Settings {
    /// Parses settings from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or a value is out of range.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Self = from_yaml(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load<F: FileSystem>(fs: &F, path: &Path) -> Result<Self, ConfigError> {
        match fs.read_file(path).await {
            Ok(bytes) => Self::from_yaml_str(&String::from_utf8_lossy(&bytes), path),
            Err(FileSystemError::NotFound(_)) => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Applies `KUSTFORGE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(MODE_ENV) {
            self.mode = value.parse().map_err(|_| ConfigError::InvalidEnv {
                name: MODE_ENV.to_string(),
                value,
            })?;
        }

        if let Some(region) = lookup(REGION_ENV).or_else(|| lookup(AWS_REGION_ENV)) {
            self.region = Some(region);
        }

        if let Some(value) = lookup(MAX_CONCURRENCY_ENV) {
            self.max_concurrency = value
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ConfigError::InvalidEnv {
                    name: MAX_CONCURRENCY_ENV.to_string(),
                    value,
                })?;
        }

        Ok(())
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unusable value.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be a finite number >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Engine tuning derived from these settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_concurrency: self.max_concurrency,
            retry: self.retry.policy(),
        }
    }

    /// Session refresh margin.
    #[must_use]
    pub fn refresh_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.refresh_skew_secs))
    }

    /// Cache entry lifetime, if any.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<chrono::Duration> {
        self.cache_ttl_secs
            .map(|secs| chrono::Duration::seconds(i64::from(secs)))
    }

    /// State directory resolved against the template root.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        if self.state_dir.is_absolute() {
            self.state_dir.clone()
        } else {
            self.template_root.join(&self.state_dir)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::persistence::TokioFileSystem;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mode, RunMode::Diff);
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.refresh_skew(), chrono::Duration::minutes(5));
        assert_eq!(settings.cache_ttl(), None);
        assert_eq!(settings.state_path(), PathBuf::from("./.kustforge"));
        assert_eq!(settings.engine_config().retry.max_attempts(), 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml_str(
            "mode: apply\nmax_concurrency: 2\nretry:\n  max_attempts: 5\ncache_ttl_secs: 60\n",
            Path::new("kustforge.yaml"),
        )
        .unwrap();

        assert_eq!(settings.mode, RunMode::Apply);
        assert_eq!(settings.max_concurrency, 2);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.initial_delay_ms, 200);
        assert_eq!(settings.cache_ttl(), Some(chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let err = Settings::from_yaml_str("max_concurrency: 0\n", Path::new("k.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_mode_is_a_parse_error() {
        let err = Settings::from_yaml_str("mode: destroy\n", Path::new("k.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("KUSTFORGE_MODE", "Rollback"),
                ("AWS_REGION", "eu-west-1"),
                ("KUSTFORGE_MAX_CONCURRENCY", "3"),
            ]))
            .unwrap();

        assert_eq!(settings.mode, RunMode::Rollback);
        assert_eq!(settings.region.as_deref(), Some("eu-west-1"));
        assert_eq!(settings.max_concurrency, 3);
    }

    #[test]
    fn test_kustforge_region_wins_over_aws_region() {
        let mut settings = Settings::default();
        settings
            .apply_env(env(&[
                ("KUSTFORGE_REGION", "us-east-2"),
                ("AWS_REGION", "eu-west-1"),
            ]))
            .unwrap();
        assert_eq!(settings.region.as_deref(), Some("us-east-2"));
    }

    #[test]
    fn test_bad_env_value() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(env(&[("KUSTFORGE_MAX_CONCURRENCY", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));

        let err = settings
            .apply_env(env(&[("KUSTFORGE_MODE", "yolo")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&TokioFileSystem::new(), &dir.path().join("kustforge.yaml"))
            .await
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kustforge.yaml");
        std::fs::write(&path, "history_limit: 4\ntemplates:\n  - app.yaml.template\n").unwrap();

        let settings = Settings::load(&TokioFileSystem::new(), &path).await.unwrap();

        assert_eq!(settings.history_limit, Some(4));
        assert_eq!(settings.templates, vec![PathBuf::from("app.yaml.template")]);
    }
}
