use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating [`EngineSettings`](crate::EngineSettings).
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Read {
        /// File that failed to load.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
    /// The settings document is not valid TOML for the settings schema.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value outside its accepted range.
    #[error("invalid value for '{field}': {message}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}
