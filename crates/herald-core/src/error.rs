//! Failure taxonomy for registration and dispatch.
//!
//! Three error families exist:
//!
//! - [`CommandError`]: dispatch-time failures, always routed through the
//!   exception dispatcher by their [`ErrorKind`];
//! - [`RegistrationError`]: structural configuration mistakes reported
//!   synchronously to the code performing registration;
//! - [`DispatchError`]: what the dispatch caller sees when a failure could not
//!   be handled.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::path::CommandPath;
use crate::permission::Permission;

/// Shared error raised by a command or exception handler.
///
/// The original error is kept whole, so callers can recover their own types
/// with [`SharedCause::downcast_ref`].
#[derive(Clone)]
pub struct SharedCause(Arc<anyhow::Error>);

impl SharedCause {
    /// Returns the wrapped error as `E` when it has that type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Returns the wrapped error.
    #[must_use]
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

impl From<anyhow::Error> for SharedCause {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Display for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for SharedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl StdError for SharedCause {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// Key of a failure category in the kind ancestry table.
///
/// Kinds are plain names; their parent relationships live in
/// [`KindAncestry`](crate::KindAncestry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorKind(&'static str);

impl ErrorKind {
    /// Root of every failure.
    pub const FAILURE: Self = Self("failure");
    /// Input could not be matched or split into arguments.
    pub const PARSE: Self = Self("parse");
    /// No command matches the input.
    pub const NO_SUCH_COMMAND: Self = Self("no_such_command");
    /// A required parameter received no input.
    pub const NOT_ENOUGH_ARGUMENTS: Self = Self("not_enough_arguments");
    /// Input remained after every parameter was filled.
    pub const TOO_MANY_ARGUMENTS: Self = Self("too_many_arguments");
    /// A quoted token was never closed.
    pub const UNCLOSED_QUOTE: Self = Self("unclosed_quote");
    /// The raw input exceeded the configured limit.
    pub const INPUT_TOO_LONG: Self = Self("input_too_long");
    /// A token could not be converted to the parameter type.
    pub const INVALID_VALUE: Self = Self("invalid_value");
    /// A token was not a valid number.
    pub const INVALID_NUMBER: Self = Self("invalid_number");
    /// A token was not a valid boolean.
    pub const INVALID_BOOLEAN: Self = Self("invalid_boolean");
    /// A token named no variant of an enumeration.
    pub const INVALID_ENUM_VALUE: Self = Self("invalid_enum_value");
    /// No resolver can produce the parameter type.
    pub const UNRESOLVABLE_PARAMETER: Self = Self("unresolvable_parameter");
    /// A validator rejected a resolved value.
    pub const VALIDATION: Self = Self("validation");
    /// A number fell outside its permitted range.
    pub const NUMBER_NOT_IN_RANGE: Self = Self("number_not_in_range");
    /// A string length fell outside its permitted range.
    pub const INVALID_LENGTH: Self = Self("invalid_length");
    /// The actor lacks a required permission.
    pub const NO_PERMISSION: Self = Self("no_permission");
    /// A command condition rejected the dispatch.
    pub const CONDITION: Self = Self("condition");
    /// The actor used the command again before its cooldown expired.
    pub const COOLDOWN: Self = Self("cooldown");
    /// The handler body failed.
    pub const INVOCATION: Self = Self("invocation");
    /// The handler aborted with a message for the actor.
    pub const MESSAGE: Self = Self("message");

    /// Declares an application-defined kind.
    ///
    /// Custom kinds must be registered with a parent before handlers can be
    /// routed to them by ancestry; unregistered kinds fall back to
    /// [`ErrorKind::FAILURE`].
    #[must_use]
    pub const fn custom(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the kind name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Parent links of the built-in taxonomy, child first.
pub(crate) const BUILTIN_ANCESTRY: &[(ErrorKind, ErrorKind)] = &[
    (ErrorKind::PARSE, ErrorKind::FAILURE),
    (ErrorKind::NO_SUCH_COMMAND, ErrorKind::PARSE),
    (ErrorKind::NOT_ENOUGH_ARGUMENTS, ErrorKind::PARSE),
    (ErrorKind::TOO_MANY_ARGUMENTS, ErrorKind::PARSE),
    (ErrorKind::UNCLOSED_QUOTE, ErrorKind::PARSE),
    (ErrorKind::INPUT_TOO_LONG, ErrorKind::PARSE),
    (ErrorKind::INVALID_VALUE, ErrorKind::PARSE),
    (ErrorKind::INVALID_NUMBER, ErrorKind::INVALID_VALUE),
    (ErrorKind::INVALID_BOOLEAN, ErrorKind::INVALID_VALUE),
    (ErrorKind::INVALID_ENUM_VALUE, ErrorKind::INVALID_VALUE),
    (ErrorKind::UNRESOLVABLE_PARAMETER, ErrorKind::FAILURE),
    (ErrorKind::VALIDATION, ErrorKind::FAILURE),
    (ErrorKind::NUMBER_NOT_IN_RANGE, ErrorKind::VALIDATION),
    (ErrorKind::INVALID_LENGTH, ErrorKind::VALIDATION),
    (ErrorKind::NO_PERMISSION, ErrorKind::FAILURE),
    (ErrorKind::CONDITION, ErrorKind::FAILURE),
    (ErrorKind::COOLDOWN, ErrorKind::CONDITION),
    (ErrorKind::INVOCATION, ErrorKind::FAILURE),
    (ErrorKind::MESSAGE, ErrorKind::FAILURE),
];

/// Failures raised while matching, resolving, authorizing or invoking.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// No command matches the input.
    #[error("unknown command '{input}'")]
    NoSuchCommand {
        /// Raw input that failed to match.
        input: String,
        /// Longest literal prefix that did match.
        matched_prefix: CommandPath,
    },

    /// A required parameter received no input.
    #[error("missing required argument '{parameter}'")]
    NotEnoughArguments {
        /// Name of the first unfilled required parameter.
        parameter: String,
    },

    /// Input remained after every parameter was filled.
    #[error("too many arguments; usage: {usage}")]
    TooManyArguments {
        /// Usage string of the matched command.
        usage: String,
        /// Tokens that were not consumed.
        surplus: Vec<String>,
    },

    /// A quoted token was never closed.
    #[error("unclosed quote starting at byte {offset}")]
    UnclosedQuote {
        /// Byte offset of the opening quote.
        offset: usize,
    },

    /// The raw input exceeded the configured limit.
    #[error("input of {size} bytes exceeds the {max_size} byte limit")]
    InputTooLong {
        /// Size of the rejected input.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },

    /// A token could not be converted to the parameter type.
    #[error("invalid value '{input}' for '{parameter}': {message}")]
    InvalidValue {
        /// Parameter being resolved.
        parameter: String,
        /// Offending input.
        input: String,
        /// Why the input was rejected.
        message: String,
    },

    /// A token was not a valid number.
    #[error("expected a number for '{parameter}', found '{input}'")]
    InvalidNumber {
        /// Parameter being resolved.
        parameter: String,
        /// Offending input.
        input: String,
    },

    /// A token was not a valid boolean.
    #[error("expected true or false for '{parameter}', found '{input}'")]
    InvalidBoolean {
        /// Parameter being resolved.
        parameter: String,
        /// Offending input.
        input: String,
    },

    /// A token named no variant of an enumeration.
    #[error("'{input}' is not a valid '{parameter}' (expected one of: {})", expected.join(", "))]
    InvalidEnumValue {
        /// Parameter being resolved.
        parameter: String,
        /// Offending input.
        input: String,
        /// Accepted variant names.
        expected: Vec<String>,
    },

    /// No resolver can produce the parameter type.
    #[error("no resolver can produce '{type_tag}' for parameter '{parameter}'")]
    UnresolvableParameter {
        /// Parameter being resolved.
        parameter: String,
        /// Declared type.
        type_tag: String,
    },

    /// A validator rejected a resolved value.
    #[error("invalid value for '{parameter}': {message}")]
    Validation {
        /// Parameter being validated.
        parameter: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A number fell outside its permitted range.
    #[error("'{parameter}' must be between {min} and {max}, found {value}")]
    NumberNotInRange {
        /// Parameter being validated.
        parameter: String,
        /// Resolved value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// A string length fell outside its permitted range.
    #[error("'{parameter}' must be between {min} and {max} characters long, found {length}")]
    InvalidLength {
        /// Parameter being validated.
        parameter: String,
        /// Length of the resolved value in characters.
        length: usize,
        /// Inclusive lower bound.
        min: usize,
        /// Inclusive upper bound.
        max: usize,
    },

    /// The actor lacks a required permission.
    #[error("missing permission: {permission}")]
    NoPermission {
        /// Display form of the failing predicate.
        permission: String,
    },

    /// A command condition rejected the dispatch.
    #[error("{message}")]
    Condition {
        /// Why the command may not run.
        message: String,
    },

    /// The actor used the command again before its cooldown expired.
    #[error(
        "you must wait {} more second(s) before using '{path}' again",
        .remaining.as_millis().div_ceil(1000)
    )]
    Cooldown {
        /// Path of the cooling command.
        path: CommandPath,
        /// Time left until the command may be used again.
        remaining: Duration,
    },

    /// The handler body failed.
    #[error("command '{path}' failed: {source}")]
    Invocation {
        /// Path of the command whose handler failed.
        path: CommandPath,
        /// Error raised by the handler.
        source: SharedCause,
    },

    /// The handler aborted with a message for the actor.
    #[error("{message}")]
    Message {
        /// Message to show the actor.
        message: String,
    },

    /// Application-defined failure.
    #[error("{message}")]
    Custom {
        /// Registered kind of the failure.
        kind: ErrorKind,
        /// Message describing the failure.
        message: String,
    },
}

impl CommandError {
    /// Returns the kind used to route this failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchCommand { .. } => ErrorKind::NO_SUCH_COMMAND,
            Self::NotEnoughArguments { .. } => ErrorKind::NOT_ENOUGH_ARGUMENTS,
            Self::TooManyArguments { .. } => ErrorKind::TOO_MANY_ARGUMENTS,
            Self::UnclosedQuote { .. } => ErrorKind::UNCLOSED_QUOTE,
            Self::InputTooLong { .. } => ErrorKind::INPUT_TOO_LONG,
            Self::InvalidValue { .. } => ErrorKind::INVALID_VALUE,
            Self::InvalidNumber { .. } => ErrorKind::INVALID_NUMBER,
            Self::InvalidBoolean { .. } => ErrorKind::INVALID_BOOLEAN,
            Self::InvalidEnumValue { .. } => ErrorKind::INVALID_ENUM_VALUE,
            Self::UnresolvableParameter { .. } => ErrorKind::UNRESOLVABLE_PARAMETER,
            Self::Validation { .. } => ErrorKind::VALIDATION,
            Self::NumberNotInRange { .. } => ErrorKind::NUMBER_NOT_IN_RANGE,
            Self::InvalidLength { .. } => ErrorKind::INVALID_LENGTH,
            Self::NoPermission { .. } => ErrorKind::NO_PERMISSION,
            Self::Condition { .. } => ErrorKind::CONDITION,
            Self::Cooldown { .. } => ErrorKind::COOLDOWN,
            Self::Invocation { .. } => ErrorKind::INVOCATION,
            Self::Message { .. } => ErrorKind::MESSAGE,
            Self::Custom { kind, .. } => *kind,
        }
    }

    /// Creates an unknown command error.
    pub fn no_such_command(input: impl Into<String>, matched_prefix: CommandPath) -> Self {
        Self::NoSuchCommand {
            input: input.into(),
            matched_prefix,
        }
    }

    /// Creates a missing argument error.
    pub fn not_enough_arguments(parameter: impl Into<String>) -> Self {
        Self::NotEnoughArguments {
            parameter: parameter.into(),
        }
    }

    /// Creates a surplus argument error.
    pub fn too_many_arguments(usage: impl Into<String>, surplus: Vec<String>) -> Self {
        Self::TooManyArguments {
            usage: usage.into(),
            surplus,
        }
    }

    /// Creates a generic conversion error.
    pub fn invalid_value(
        parameter: impl Into<String>,
        input: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            parameter: parameter.into(),
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid number error.
    pub fn invalid_number(parameter: impl Into<String>, input: impl Into<String>) -> Self {
        Self::InvalidNumber {
            parameter: parameter.into(),
            input: input.into(),
        }
    }

    /// Creates an invalid boolean error.
    pub fn invalid_boolean(parameter: impl Into<String>, input: impl Into<String>) -> Self {
        Self::InvalidBoolean {
            parameter: parameter.into(),
            input: input.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates a permission error from the failing predicate.
    #[must_use]
    pub fn no_permission(permission: &Permission) -> Self {
        Self::NoPermission {
            permission: permission.to_string(),
        }
    }

    /// Creates a condition failure.
    pub fn condition(message: impl Into<String>) -> Self {
        Self::Condition {
            message: message.into(),
        }
    }

    /// Wraps an error raised by a handler body.
    #[must_use]
    pub fn invocation(path: CommandPath, error: anyhow::Error) -> Self {
        Self::Invocation {
            path,
            source: SharedCause::from(error),
        }
    }

    /// Creates a message failure for the actor.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Creates an application-defined failure.
    pub fn custom(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Custom {
            kind,
            message: message.into(),
        }
    }
}

/// Structural configuration mistakes reported during registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The command would make matching ambiguous.
    #[error("command '{path}' conflicts with an existing command: {reason}")]
    ConflictingCommand {
        /// Path of the command being registered.
        path: CommandPath,
        /// Description of the clash.
        reason: String,
    },

    /// Two resolvers of equal priority both apply to a parameter.
    #[error(
        "resolvers '{first}' and '{second}' (priority {priority}) both apply to parameter \
         '{parameter}' of type '{type_tag}'"
    )]
    ConflictingResolvers {
        /// Parameter being bound.
        parameter: String,
        /// Declared type.
        type_tag: String,
        /// Shared priority.
        priority: i32,
        /// Label of the first applicable entry.
        first: String,
        /// Label of the competing entry.
        second: String,
    },

    /// No resolver applies to a statically typed parameter.
    #[error("no resolver is registered for parameter '{parameter}' of type '{type_tag}'")]
    UnresolvableParameter {
        /// Parameter being bound.
        parameter: String,
        /// Declared type.
        type_tag: String,
    },

    /// The descriptor itself is malformed.
    #[error("invalid command descriptor '{path}': {reason}")]
    InvalidDescriptor {
        /// Path of the descriptor.
        path: CommandPath,
        /// What is wrong with it.
        reason: String,
    },

    /// An error kind was registered under a parent that does not exist.
    #[error("error kind '{kind}' names unknown parent '{parent}'")]
    UnknownErrorKind {
        /// Kind being registered.
        kind: ErrorKind,
        /// Missing parent.
        parent: ErrorKind,
    },

    /// An error kind registration would create an ancestry cycle.
    #[error("error kind '{kind}' cannot descend from '{parent}' without a cycle")]
    ErrorKindCycle {
        /// Kind being registered.
        kind: ErrorKind,
        /// Requested parent.
        parent: ErrorKind,
    },
}

impl RegistrationError {
    /// Creates a conflicting command error.
    pub fn conflicting_command(path: &CommandPath, reason: impl Into<String>) -> Self {
        Self::ConflictingCommand {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(path: &CommandPath, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

/// Failures surfaced to the caller of `dispatch`.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No exception handler is registered for the failure or its ancestors.
    #[error("unhandled {} failure: {}", .0.kind(), .0)]
    Unhandled(#[source] CommandError),

    /// The exception handler chosen for a failure itself failed.
    #[error("exception handler for '{handler_kind}' failed while handling '{original}': {source}")]
    HandlerFailed {
        /// Kind the failing handler was registered for.
        handler_kind: ErrorKind,
        /// Failure the handler was processing.
        original: CommandError,
        /// Secondary failure raised by the handler.
        source: SharedCause,
    },
}

impl DispatchError {
    /// Returns the original command failure.
    #[must_use]
    pub const fn command_error(&self) -> &CommandError {
        match self {
            Self::Unhandled(error) | Self::HandlerFailed { original: error, .. } => error,
        }
    }
}
