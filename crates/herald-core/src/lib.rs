//! Platform-independent command dispatch engine.
//!
//! `herald-core` turns a raw command line into a validated, fully typed call
//! of a registered handler. Commands are described with
//! [`CommandDescriptor`]s and registered on a [`DispatcherBuilder`]; the
//! frozen [`Dispatcher`] then:
//!
//! 1. tokenizes the input and walks it through the command tree, preferring
//!    literals over parameters and backtracking where needed;
//! 2. checks command and group permissions;
//! 3. resolves every parameter through the priority-ordered resolver
//!    registry and runs its validators, falling back to lower-priority
//!    commands that accept the same input when this fails;
//! 4. runs the registered [`CommandCondition`]s, cooldowns included;
//! 5. invokes the handler;
//! 6. routes any failure to the nearest registered exception handler along
//!    the failure-kind ancestry.
//!
//! The engine knows nothing about the platform issuing commands: adapters
//! supply an [`Actor`] and the raw input string.

mod actor;
mod arguments;
mod condition;
mod descriptor;
mod dispatcher;
mod error;
mod exception;
mod execution;
mod matcher;
mod path;
mod permission;
mod pipeline;
mod resolver;
mod token;
mod tree;
mod types;
mod unwind;
mod validator;

pub use actor::Actor;
pub use arguments::Arguments;
pub use condition::{CommandCondition, CooldownCondition};
pub use descriptor::{
    CommandDescriptor, DefaultProvider, DefaultValue, Handler, HandlerOutput, Invocation,
    ParameterCategory, ParameterDescriptor, Pending,
};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherBuilder};
pub use error::{CommandError, DispatchError, ErrorKind, RegistrationError, SharedCause};
pub use exception::{
    ExceptionDispatcher, ExceptionHandler, FailureContext, GENERIC_FAILURE_REPLY, KindAncestry,
    reply_with_generic_failure, reply_with_message,
};
pub use execution::{BoundParameter, Execution};
pub use path::CommandPath;
pub use permission::Permission;
pub use resolver::{
    BUILTIN_FACTORY_PRIORITY, BUILTIN_PRIORITY, ContextResolver, ContextResolverFactory,
    DEFAULT_PRIORITY, EnumResolverFactory, ListResolverFactory, ResolveContext, ResolverEntry,
    ResolverRegistry, ValueResolver, ValueResolverFactory, parse_bool,
};
pub use token::{Token, TokenCursor, tokenize};
pub use tree::{CommandNode, CommandTree, NodeId, NodeKind};
pub use types::{ActorName, EnumVariant, InvocationInfo, TypeTag, Value};
pub use unwind::HandlerPanic;
pub use validator::{LengthValidator, ParameterValidator, RangeValidator, RequirePermission};

pub use herald_config::{EngineSettings, ResolverConflictPolicy};

#[cfg(test)]
mod tests;
