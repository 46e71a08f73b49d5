//! Command dispatch for hosts that accept typed, permission-checked commands.
//!
//! This crate is the stable entry point over `herald-core` and
//! `herald-config`. It re-exports the registration and dispatch surface and
//! owns [`telemetry`], which installs the process-wide tracing subscriber
//! described by [`EngineSettings`].
//!
//! ```
//! use herald::{
//!     Actor, CommandDescriptor, DispatcherBuilder, EngineSettings, HandlerOutput,
//!     ParameterDescriptor, TypeTag,
//! };
//!
//! struct Console;
//!
//! impl Actor for Console {
//!     fn name(&self) -> &str {
//!         "console"
//!     }
//!
//!     fn has_permission(&self, _permission: &str) -> bool {
//!         true
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = EngineSettings::from_toml_str("reply_on_failure = true")?;
//! let mut builder = DispatcherBuilder::with_settings(settings);
//! builder.register(
//!     CommandDescriptor::new("echo")
//!         .parameter(ParameterDescriptor::value("message", TypeTag::STRING).greedy())
//!         .handler(|invocation| {
//!             if let Some(message) = invocation.get::<String>("message") {
//!                 invocation.actor().reply(message);
//!             }
//!             Ok(HandlerOutput::Unit)
//!         }),
//! )?;
//! let dispatcher = builder.build();
//! assert!(dispatcher.dispatch(&Console, "echo hello there")?.is_invoked());
//! # Ok(())
//! # }
//! ```

pub mod telemetry;

pub use herald_config::{
    ConfigError, DEFAULT_LOG_FILTER, DEFAULT_MAX_INPUT_BYTES, EngineSettings, LogFormat,
    ResolverConflictPolicy,
};
pub use herald_core::{
    Actor, ActorName, Arguments, BUILTIN_FACTORY_PRIORITY, BUILTIN_PRIORITY, BoundParameter,
    CommandCondition, CommandDescriptor, CommandError, CommandPath, ContextResolver,
    ContextResolverFactory, CooldownCondition, DEFAULT_PRIORITY, DefaultValue, DispatchError,
    DispatchOutcome, Dispatcher, DispatcherBuilder, EnumVariant, ErrorKind, ExceptionHandler,
    Execution, FailureContext, GENERIC_FAILURE_REPLY, HandlerOutput, HandlerPanic, Invocation,
    InvocationInfo, LengthValidator, ParameterDescriptor, ParameterValidator, Pending,
    Permission, RangeValidator, RegistrationError, RequirePermission, ResolveContext,
    ResolverEntry, SharedCause, Token, TokenCursor, TypeTag, Value, ValueResolver,
    ValueResolverFactory, parse_bool,
};
