//! Default values for [`EngineSettings`](crate::EngineSettings) fields.

use crate::logging::LogFormat;
use crate::policy::ResolverConflictPolicy;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default limit on the size of a raw input line, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 4096;

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default input size limit.
#[must_use]
pub const fn default_max_input_bytes() -> usize {
    DEFAULT_MAX_INPUT_BYTES
}

/// Handler panics become invocation failures unless disabled.
#[must_use]
pub const fn default_catch_handler_panics() -> bool {
    true
}

/// Default actor replies are opt-in.
#[must_use]
pub const fn default_reply_on_failure() -> bool {
    false
}

/// Resolver conflicts are rejected unless configured otherwise.
#[must_use]
pub const fn default_resolver_conflicts() -> ResolverConflictPolicy {
    ResolverConflictPolicy::Reject
}
