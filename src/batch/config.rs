//! Batch orchestrator configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use super::aggregator::Progress;
use super::cancel::CancellationSignal;
use crate::curriculum::CurriculumIndex;

/// Default number of concurrent workers.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Default per-item time budget.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// Callback invoked after every completed item.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for one batch run.
#[derive(Clone)]
pub struct BatchConfig {
    /// Identifier echoed in the report.
    pub session_id: String,
    /// Number of items validated concurrently.
    pub max_parallel: usize,
    /// Whether to report items sharing an id.
    pub check_for_duplicates: bool,
    /// Per-item time budget. `None` disables the timeout.
    ///
    /// An expired item is reported as `VALIDATION_TIMEOUT`, but its blocking
    /// thread runs until the validator returns. Runtimes that must not wait
    /// for such threads on exit should use `Runtime::shutdown_background`.
    pub item_timeout: Option<Duration>,
    /// Invoked after each completed item.
    pub progress_callback: Option<ProgressCallback>,
    /// Reference data for the metadata tier and coverage analysis.
    pub curriculum_index: Option<Arc<CurriculumIndex>>,
    /// Cooperative cancellation checked before each item.
    pub cancellation: CancellationSignal,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            max_parallel: DEFAULT_MAX_PARALLEL,
            check_for_duplicates: true,
            item_timeout: Some(DEFAULT_ITEM_TIMEOUT),
            progress_callback: None,
            curriculum_index: None,
            cancellation: CancellationSignal::new(),
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("session_id", &self.session_id)
            .field("max_parallel", &self.max_parallel)
            .field("check_for_duplicates", &self.check_for_duplicates)
            .field("item_timeout", &self.item_timeout)
            .field("progress_callback", &self.progress_callback.is_some())
            .field("curriculum_index", &self.curriculum_index.is_some())
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl BatchConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CERTIFY_MAX_PARALLEL`: Concurrent workers (default: 4)
    /// - `CERTIFY_CHECK_DUPLICATES`: Report duplicate item ids (default: true)
    /// - `CERTIFY_ITEM_TIMEOUT_SECS`: Per-item timeout, `0` disables it (default: 30)
    /// - `CERTIFY_SESSION_ID`: Session id (default: random UUID)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CERTIFY_MAX_PARALLEL") {
            config.max_parallel = parse_env_value(&val, "CERTIFY_MAX_PARALLEL")?;
        }

        if let Ok(val) = std::env::var("CERTIFY_CHECK_DUPLICATES") {
            config.check_for_duplicates = parse_env_bool(&val, "CERTIFY_CHECK_DUPLICATES")?;
        }

        if let Ok(val) = std::env::var("CERTIFY_ITEM_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "CERTIFY_ITEM_TIMEOUT_SECS")?;
            config.item_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(val) = std::env::var("CERTIFY_SESSION_ID") {
            if !val.trim().is_empty() {
                config.session_id = val.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallel == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_parallel must be greater than 0".to_string(),
            ));
        }

        if self.session_id.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "session_id cannot be empty".to_string(),
            ));
        }

        if self.item_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::ValidationFailed(
                "item_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder method to set the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Builder method to set the number of workers.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }

    /// Builder method to enable or disable duplicate-id detection.
    pub fn with_duplicate_check(mut self, enabled: bool) -> Self {
        self.check_for_duplicates = enabled;
        self
    }

    /// Builder method to set the per-item timeout.
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Builder method to set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Builder method to set the curriculum index.
    pub fn with_curriculum_index(mut self, index: Arc<CurriculumIndex>) -> Self {
        self.curriculum_index = Some(index);
        self
    }

    /// Builder method to share a cancellation signal with the caller.
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.max_parallel, 4);
        assert!(config.check_for_duplicates);
        assert_eq!(config.item_timeout, Some(Duration::from_secs(30)));
        assert!(config.progress_callback.is_none());
        assert!(config.curriculum_index.is_none());
        assert!(Uuid::parse_str(&config.session_id).is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = BatchConfig::new()
            .with_session_id("upload-42")
            .with_max_parallel(16)
            .with_duplicate_check(false)
            .with_item_timeout(None)
            .with_progress_callback(|_| {})
            .with_curriculum_index(Arc::new(CurriculumIndex::new()));

        assert_eq!(config.session_id, "upload-42");
        assert_eq!(config.max_parallel, 16);
        assert!(!config.check_for_duplicates);
        assert!(config.item_timeout.is_none());
        assert!(config.progress_callback.is_some());
        assert!(config.curriculum_index.is_some());
    }

    #[test]
    fn test_validation_invalid_max_parallel() {
        let result = BatchConfig::default().with_max_parallel(0).validate();
        assert!(result.unwrap_err().to_string().contains("max_parallel"));
    }

    #[test]
    fn test_validation_zero_timeout() {
        let result = BatchConfig::default()
            .with_item_timeout(Some(Duration::ZERO))
            .validate();
        assert!(result.unwrap_err().to_string().contains("item_timeout"));
    }

    #[test]
    fn test_validation_empty_session() {
        let result = BatchConfig::default().with_session_id("  ").validate();
        assert!(matches!(result, Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn test_parse_env_helpers() {
        assert_eq!(parse_env_value::<usize>(" 8 ", "K").unwrap(), 8);
        assert!(matches!(
            parse_env_value::<usize>("many", "K"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(parse_env_bool("Yes", "K").unwrap());
        assert!(!parse_env_bool("off", "K").unwrap());
        assert!(parse_env_bool("maybe", "K").is_err());
    }

    #[test]
    fn test_debug_hides_callback() {
        let config = BatchConfig::default().with_progress_callback(|_| {});
        let debug = format!("{:?}", config);
        assert!(debug.contains("progress_callback: true"));
    }
}
