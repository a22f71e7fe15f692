//! Configuration types for Retrace

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ReplayError, Result};

/// Main configuration for a replay run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplayConfig {
    /// Which service is being replayed
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Startup delay and pacing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Local cache and checkpoint locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Where captured trace documents are fetched from
    #[serde(default)]
    pub source: SourceConfig,

    /// Completion notification target
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Identity of the service under replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Account identity, e.g. `replayer@project.iam`; the part before `@`
    /// prefixes object paths
    #[serde(default)]
    pub namespace: String,

    /// Service name
    #[serde(default = "default_service")]
    pub service: String,

    /// Capture environment the traces were recorded in
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Version of the build under test; resolved from git when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_service() -> String {
    "app".to_string()
}

fn default_environment() -> String {
    "default".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            service: default_service(),
            environment: default_environment(),
            version: None,
        }
    }
}

impl IdentityConfig {
    /// Object-store prefix holding this service's captured documents:
    /// `{namespace before '@'}/{environment}/{service}/`
    pub fn object_prefix(&self) -> String {
        let account = self
            .namespace
            .split('@')
            .next()
            .unwrap_or_default();
        format!("{}/{}/{}/", account, self.environment, self.service)
    }
}

/// Pacing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Seconds to wait before replay starts, letting the service boot
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    /// Milliseconds to pause between traces
    #[serde(default = "default_inter_trace_pause_ms")]
    pub inter_trace_pause_ms: u64,

    /// Pause after the export pipeline shuts down, before notifying
    #[serde(default = "default_completion_grace", with = "humantime_serde")]
    pub completion_grace: Duration,
}

fn default_startup_delay_secs() -> u64 {
    5
}

fn default_inter_trace_pause_ms() -> u64 {
    10
}

fn default_completion_grace() -> Duration {
    Duration::from_secs(10)
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            startup_delay_secs: default_startup_delay_secs(),
            inter_trace_pause_ms: default_inter_trace_pause_ms(),
            completion_grace: default_completion_grace(),
        }
    }
}

impl TimingConfig {
    /// Timing with every delay set to zero
    pub fn immediate() -> Self {
        Self {
            startup_delay_secs: 0,
            inter_trace_pause_ms: 0,
            completion_grace: Duration::ZERO,
        }
    }

    /// Startup delay as a duration
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    /// Inter-trace pause as a duration
    pub fn inter_trace_pause(&self) -> Duration {
        Duration::from_millis(self.inter_trace_pause_ms)
    }
}

/// Local file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Cached copy of the fetched trace document
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Directory holding per-domain checkpoint files
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_cache_path() -> PathBuf {
    std::env::temp_dir().join("retrace-replay.json")
}

fn default_checkpoint_dir() -> PathBuf {
    std::env::temp_dir()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

/// Object store holding captured documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the storage JSON API
    #[serde(default = "default_source_endpoint")]
    pub endpoint: String,

    /// Bucket name
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bearer token (prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_source_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_bucket() -> String {
    "retrace-captures".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_source_endpoint(),
            bucket: default_bucket(),
            token: None,
            timeout: default_request_timeout(),
        }
    }
}

/// Completion notification target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Publish URL; when unset the completion is only logged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Bearer token (prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            timeout: default_request_timeout(),
        }
    }
}

/// Builder for ReplayConfig
pub struct ConfigBuilder {
    config: ReplayConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ReplayConfig::default(),
        }
    }

    /// Set namespace and service
    pub fn identity(mut self, namespace: impl Into<String>, service: impl Into<String>) -> Self {
        self.config.identity.namespace = namespace.into();
        self.config.identity.service = service.into();
        self
    }

    /// Set the version under test
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.identity.version = Some(version.into());
        self
    }

    /// Set timing configuration
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    /// Set storage configuration
    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    /// Set source configuration
    pub fn source(mut self, source: SourceConfig) -> Self {
        self.config.source = source;
        self
    }

    /// Set notification configuration
    pub fn notify(mut self, notify: NotifyConfig) -> Self {
        self.config.notify = notify;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ReplayConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `retrace.toml`, then the file named by `RETRACE_CONFIG_PATH`
    /// 3. `RETRACE_`-prefixed environment variables, nested keys split on
    ///    `__` (e.g. `RETRACE_TIMING__INTER_TRACE_PAUSE_MS=50`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid or the result
    /// fails validation.
    pub fn load() -> Result<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the same sources as [`ReplayConfig::load`]
    /// without validating identity fields.
    ///
    /// Useful for maintenance commands that only touch local storage.
    pub fn load_unvalidated() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("retrace.toml"));

        if let Ok(path) = std::env::var("RETRACE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ReplayConfig = figment
            .merge(Env::prefixed("RETRACE_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                ReplayError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Toml},
        };

        let config: ReplayConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                ReplayError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if identity fields are missing.
    pub fn validate(&self) -> Result<()> {
        if self.identity.namespace.split('@').next().unwrap_or_default().is_empty() {
            return Err(ReplayError::Configuration(
                "identity.namespace must be set".to_string(),
            ));
        }
        if self.identity.service.is_empty() {
            return Err(ReplayError::Configuration(
                "identity.service must be set".to_string(),
            ));
        }
        Ok(())
    }
}
