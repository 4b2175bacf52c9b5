//! Configuration management for docwarden.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::manager::ManagerConfig;
use crate::process::{LaunchConfig, LaunchStrategy};
use crate::reaper::TtlPolicy;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capacity, TTL and history settings.
    pub manager: ManagerSection,
    /// How the office application is started and stopped.
    pub launcher: LauncherSection,
    /// Periodic sweep settings.
    pub reaper: ReaperSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Session manager section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSection {
    /// Maximum number of simultaneously open documents.
    pub max_concurrent_docs: usize,
    /// Idle minutes before a non-exempt session is closed, per context.
    pub ttl_minutes: TtlSection,
    /// Number of session history events kept in memory.
    pub history_limit: usize,
}

impl Default for ManagerSection {
    fn default() -> Self {
        Self {
            max_concurrent_docs: 4,
            ttl_minutes: TtlSection::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Per-context TTL in minutes. `null` means no TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlSection {
    pub human_validation: Option<u64>,
    pub collaborative: Option<u64>,
    pub automated: Option<u64>,
    pub background: Option<u64>,
}

impl Default for TtlSection {
    fn default() -> Self {
        Self {
            human_validation: None,
            collaborative: None,
            automated: Some(10),
            background: Some(5),
        }
    }
}

impl TtlSection {
    fn to_policy(&self) -> TtlPolicy {
        let minutes = |m: Option<u64>| m.map(|m| Duration::from_secs(m.saturating_mul(60)));
        TtlPolicy {
            human_validation: minutes(self.human_validation),
            collaborative: minutes(self.collaborative),
            automated: minutes(self.automated),
            background: minutes(self.background),
        }
    }
}

/// Launcher section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSection {
    /// Argv templates tried in order; `{path}` is replaced by the document.
    pub strategies: Vec<Vec<String>>,
    /// Extra environment for launched processes.
    pub env: BTreeMap<String, String>,
    /// Time a process must survive after spawn to count as started.
    pub startup_grace_ms: u64,
    /// Wait between the graceful and the forced stop.
    pub terminate_grace_ms: u64,
    /// Wait after the forced stop before giving up.
    pub kill_settle_ms: u64,
}

impl Default for LauncherSection {
    fn default() -> Self {
        let defaults = LaunchConfig::default();
        Self {
            strategies: defaults
                .strategies
                .iter()
                .map(|s| std::iter::once(s.program.clone()).chain(s.args.iter().cloned()).collect())
                .collect(),
            env: defaults.env,
            startup_grace_ms: defaults.startup_grace.as_millis() as u64,
            terminate_grace_ms: defaults.terminate_grace.as_millis() as u64,
            kill_settle_ms: defaults.kill_settle.as_millis() as u64,
        }
    }
}

/// Reaper section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSection {
    /// Seconds between periodic sweeps; 0 disables them.
    pub interval_secs: u64,
}

impl Default for ReaperSection {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(max) = std::env::var("DOCWARDEN_MAX_CONCURRENT") {
            if let Ok(max) = max.parse() {
                self.manager.max_concurrent_docs = max;
            }
        }

        if let Ok(level) = std::env::var("DOCWARDEN_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(max) = args.max_concurrent {
            self.manager.max_concurrent_docs = max;
        }

        if let Some(secs) = args.sweep_interval {
            self.reaper.interval_secs = secs;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manager.max_concurrent_docs == 0 {
            return Err(ConfigError::Invalid("manager.max_concurrent_docs must be at least 1".into()));
        }
        if self.launcher.strategies.is_empty() {
            return Err(ConfigError::Invalid("launcher.strategies must not be empty".into()));
        }
        if self.launcher.strategies.iter().any(|argv| argv.is_empty()) {
            return Err(ConfigError::Invalid("launcher.strategies entries need a program".into()));
        }
        Ok(())
    }

    pub fn to_manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            max_concurrent_docs: self.manager.max_concurrent_docs,
            ttl: self.manager.ttl_minutes.to_policy(),
            history_limit: self.manager.history_limit,
        }
    }

    pub fn to_launch_config(&self) -> LaunchConfig {
        LaunchConfig {
            strategies: self
                .launcher
                .strategies
                .iter()
                .filter_map(|argv| LaunchStrategy::from_argv(argv))
                .collect(),
            env: self.launcher.env.clone(),
            startup_grace: Duration::from_millis(self.launcher.startup_grace_ms),
            terminate_grace: Duration::from_millis(self.launcher.terminate_grace_ms),
            kill_settle: Duration::from_millis(self.launcher.kill_settle_ms),
        }
    }

    /// Periodic sweep interval, `None` when disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.reaper.interval_secs > 0).then(|| Duration::from_secs(self.reaper.interval_secs))
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A setting is out of range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionContext;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.manager.max_concurrent_docs, 4);
        assert_eq!(config.manager.ttl_minutes.automated, Some(10));
        assert_eq!(config.manager.ttl_minutes.background, Some(5));
        assert!(config.manager.ttl_minutes.human_validation.is_none());
        assert_eq!(config.launcher.strategies.len(), 3);
        assert_eq!(config.launcher.strategies[0], vec!["libreoffice", "{path}"]);
        assert_eq!(config.launcher.env.get("DISPLAY").map(String::as_str), Some(":0"));
        assert_eq!(config.reaper.interval_secs, 30);
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "manager": {
                "max_concurrent_docs": 6,
                "ttl_minutes": { "automated": 2, "collaborative": 60 }
            },
            "launcher": {
                "strategies": [["soffice", "--view", "{path}"]],
                "startup_grace_ms": 500
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.manager.max_concurrent_docs, 6);
        assert_eq!(config.manager.ttl_minutes.automated, Some(2));
        assert_eq!(config.manager.ttl_minutes.collaborative, Some(60));
        // Unlisted fields keep their defaults.
        assert_eq!(config.manager.ttl_minutes.background, Some(5));

        let launch = config.to_launch_config();
        assert_eq!(launch.strategies.len(), 1);
        assert_eq!(launch.strategies[0].program, "soffice");
        assert_eq!(launch.startup_grace, Duration::from_millis(500));
        assert_eq!(launch.terminate_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let json = format!(r#"{{ "manager": {{ "ttl_minutes": {{ "automated": {} }} }} }}"#, u64::MAX);
        let config: Config = serde_json::from_str(&json).unwrap();

        let manager = config.to_manager_config();
        assert_eq!(
            manager.ttl.ttl(SessionContext::Automated),
            Some(Duration::from_secs(u64::MAX))
        );
    }

    #[test]
    fn test_null_ttl_disables_expiry() {
        let json = r#"{ "manager": { "ttl_minutes": { "automated": null } } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let ttl = config.to_manager_config().ttl;
        assert_eq!(ttl.ttl(SessionContext::Automated), None);
        assert_eq!(ttl.ttl(SessionContext::Background), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            max_concurrent: Some(2),
            sweep_interval: Some(0),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.manager.max_concurrent_docs, 2);
        assert!(config.sweep_interval().is_none());
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.manager.max_concurrent_docs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.launcher.strategies = vec![vec![]];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_manager_config() {
        let config = Config::default();
        assert_eq!(config.to_manager_config(), ManagerConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"max_concurrent_docs\""));
        assert!(json.contains("\"interval_secs\""));
    }
}
