//! Engine settings and their loading from TOML.

use std::fs;
use std::sync::Arc;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::defaults::{
    default_catch_handler_panics, default_log_filter_string, default_log_format,
    default_max_input_bytes, default_reply_on_failure, default_resolver_conflicts,
};
use crate::error::ConfigError;
use crate::logging::LogFormat;
use crate::policy::ResolverConflictPolicy;

/// Settings shared by the dispatch engine and its telemetry.
///
/// Every field is optional in serialized form; missing fields take the
/// values from [`crate::defaults`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    log_filter: String,
    log_format: LogFormat,
    max_input_bytes: usize,
    catch_handler_panics: bool,
    reply_on_failure: bool,
    resolver_conflicts: ResolverConflictPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            max_input_bytes: default_max_input_bytes(),
            catch_handler_panics: default_catch_handler_panics(),
            reply_on_failure: default_reply_on_failure(),
            resolver_conflicts: default_resolver_conflicts(),
        }
    }
}

impl EngineSettings {
    /// Parses and validates settings from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(document)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses, and validates settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// as [`EngineSettings::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let document = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        Self::from_toml_str(&document)
    }

    /// Checks field values that serde cannot constrain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the input limit is zero or the
    /// log filter is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_input_bytes == 0 {
            return Err(ConfigError::invalid(
                "max_input_bytes",
                "must be greater than zero",
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::invalid("log_filter", "must not be empty"));
        }
        Ok(())
    }

    /// Filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for the tracing subscriber.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Longest accepted raw input line, in bytes.
    #[must_use]
    pub const fn max_input_bytes(&self) -> usize {
        self.max_input_bytes
    }

    /// Whether handler panics become invocation failures.
    #[must_use]
    pub const fn catch_handler_panics(&self) -> bool {
        self.catch_handler_panics
    }

    /// Whether default actor replies are installed at build time.
    #[must_use]
    pub const fn reply_on_failure(&self) -> bool {
        self.reply_on_failure
    }

    /// How equal-priority resolver ambiguity is treated.
    #[must_use]
    pub const fn resolver_conflicts(&self) -> ResolverConflictPolicy {
        self.resolver_conflicts
    }

    /// Replaces the log filter.
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Replaces the log format.
    #[must_use]
    pub const fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Replaces the input size limit.
    #[must_use]
    pub const fn with_max_input_bytes(mut self, limit: usize) -> Self {
        self.max_input_bytes = limit;
        self
    }

    /// Enables or disables catching handler panics.
    #[must_use]
    pub const fn with_catch_handler_panics(mut self, enabled: bool) -> Self {
        self.catch_handler_panics = enabled;
        self
    }

    /// Enables or disables default actor replies.
    #[must_use]
    pub const fn with_reply_on_failure(mut self, enabled: bool) -> Self {
        self.reply_on_failure = enabled;
        self
    }

    /// Replaces the resolver conflict policy.
    #[must_use]
    pub const fn with_resolver_conflicts(mut self, policy: ResolverConflictPolicy) -> Self {
        self.resolver_conflicts = policy;
        self
    }
}
