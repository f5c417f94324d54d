//! Configuration management for movecar.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::admission::{
    ThrottlePolicy, WindowPolicy, DEFAULT_MAX_EVENTS, DEFAULT_MIN_GAP_SECS, DEFAULT_WINDOW_SECS,
};
use crate::error::{MovecarError, Result};
use crate::notify::DEFAULT_BARK_BASE_URL;

/// Deployment environment variables kept for compatibility, with the
/// configuration key each one overrides.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("RATE_LIMIT_WINDOW", "submission.window_secs"),
    ("RATE_LIMIT_COUNT", "submission.max_events"),
    ("NOTIFY_MIN_INTERVAL_SEC", "notification.min_interval_secs"),
    ("APP_SECRET", "app_secret"),
];

/// Main configuration for the movecar service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovecarConfig {
    /// Message submission rate limiting
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Push notification throttling
    #[serde(default)]
    pub notification: NotificationConfig,

    /// Background eviction of idle admission state
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Secret keying client address hashes
    #[serde(default)]
    pub app_secret: String,
}

/// Submission rate limit configuration.
///
/// Values are signed so that a bad deployment value reaches the policy
/// clamps instead of failing the whole load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Trailing window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,

    /// Submissions admitted per window for one client and code
    #[serde(default = "default_max_events")]
    pub max_events: i64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_events: default_max_events(),
        }
    }
}

impl SubmissionConfig {
    /// The clamped limiter policy for these values.
    pub fn policy(&self) -> WindowPolicy {
        WindowPolicy::from_raw(self.window_secs, self.max_events)
    }
}

fn default_window_secs() -> i64 {
    DEFAULT_WINDOW_SECS
}

fn default_max_events() -> i64 {
    DEFAULT_MAX_EVENTS
}

/// Notification throttle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum seconds between notifications once the free allowance is spent
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: i64,

    /// Evict throttle entries idle this long (at least four gaps); unset keeps them forever
    #[serde(default)]
    pub idle_eviction_secs: Option<u64>,

    /// Bark server for owners who have not configured their own
    #[serde(default = "default_bark_base_url")]
    pub bark_base_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            idle_eviction_secs: None,
            bark_base_url: default_bark_base_url(),
        }
    }
}

impl NotificationConfig {
    /// The clamped throttle policy for these values.
    pub fn policy(&self) -> ThrottlePolicy {
        let policy = ThrottlePolicy::from_raw(self.min_interval_secs);
        match self.idle_eviction_secs {
            Some(secs) => policy.with_idle_eviction(Duration::from_secs(secs)),
            None => policy,
        }
    }
}

fn default_min_interval_secs() -> i64 {
    DEFAULT_MIN_GAP_SECS
}

fn default_bark_base_url() -> String {
    DEFAULT_BARK_BASE_URL.to_string()
}

/// Sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Run the background sweeper
    #[serde(default)]
    pub enabled: bool,

    /// Seconds between sweeps
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval(),
        }
    }
}

impl SweepConfig {
    /// Sweep period, never shorter than one second.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

fn default_sweep_interval() -> u64 {
    300
}

impl MovecarConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration file");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| MovecarError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load configuration from an optional file and the process environment.
    ///
    /// Later sources win: defaults, the file, `MOVECAR__SECTION__FIELD`
    /// variables, then the legacy deployment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, |name| std::env::var(name).ok())
    }

    /// Like [`MovecarConfig::load`], resolving legacy variables through `lookup`.
    pub fn load_with<F>(file: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();

        if let Some(path) = file {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix("MOVECAR").separator("__"));

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(*key, lookup(*var))?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Render the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| MovecarError::Config(format!("Failed to render configuration: {}", e)))
    }
}
