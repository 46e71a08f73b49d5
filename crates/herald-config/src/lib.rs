//! Settings for the herald dispatch engine.
//!
//! [`EngineSettings`] gathers the knobs shared by the engine and its
//! telemetry: log filter and format, the input size limit, panic handling,
//! default failure replies, and the resolver conflict policy. Settings are
//! plain serde types and load from TOML documents or files.

pub mod defaults;
mod error;
mod logging;
mod policy;
mod settings;

pub use defaults::{DEFAULT_LOG_FILTER, DEFAULT_MAX_INPUT_BYTES};
pub use error::ConfigError;
pub use logging::{LogFormat, LogFormatParseError};
pub use policy::ResolverConflictPolicy;
pub use settings::EngineSettings;
