//! Command and parameter descriptors: the inbound registration surface.
//!
//! Descriptors are plain data assembled with fluent builders. The dispatcher
//! validates them, binds a resolver to every parameter and inserts them into
//! the command tree.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::Actor;
use crate::arguments::Arguments;
use crate::error::{CommandError, RegistrationError};
use crate::path::CommandPath;
use crate::permission::Permission;
use crate::resolver::ResolveContext;
use crate::types::{TypeTag, Value};
use crate::validator::ParameterValidator;

/// Handler body invoked with the fully resolved arguments.
pub type Handler = Arc<dyn Fn(&Invocation<'_>) -> anyhow::Result<HandlerOutput> + Send + Sync>;

/// Closure producing a default value for each dispatch.
pub type DefaultProvider =
    Arc<dyn Fn(&ResolveContext<'_>) -> Result<Value, CommandError> + Send + Sync>;

/// View of a dispatch handed to the handler.
pub struct Invocation<'a> {
    actor: &'a dyn Actor,
    path: &'a CommandPath,
    input: &'a str,
    arguments: &'a Arguments,
}

impl<'a> Invocation<'a> {
    pub(crate) const fn new(
        actor: &'a dyn Actor,
        path: &'a CommandPath,
        input: &'a str,
        arguments: &'a Arguments,
    ) -> Self {
        Self {
            actor,
            path,
            input,
            arguments,
        }
    }

    /// Returns the actor that issued the command.
    #[must_use]
    pub const fn actor(&self) -> &'a dyn Actor {
        self.actor
    }

    /// Returns the canonical path of the matched command.
    #[must_use]
    pub const fn path(&self) -> &'a CommandPath {
        self.path
    }

    /// Returns the raw input line.
    #[must_use]
    pub const fn input(&self) -> &'a str {
        self.input
    }

    /// Returns every resolved argument.
    #[must_use]
    pub const fn arguments(&self) -> &'a Arguments {
        self.arguments
    }

    /// Shorthand for `arguments().get::<T>(name)`.
    #[must_use]
    pub fn get<T: std::any::Any>(&self, name: &str) -> Option<&'a T> {
        self.arguments.get::<T>(name)
    }
}

/// Result of a handler body.
#[derive(Debug)]
pub enum HandlerOutput {
    /// The handler completed without a result.
    Unit,
    /// The handler produced a value for the caller.
    Value(Value),
    /// The handler deferred its work to the platform's scheduler.
    Deferred(Pending),
}

/// Deferred computation returned by a handler.
///
/// The engine never runs it; the platform adapter completes it on whatever
/// scheduler it owns.
pub struct Pending(Box<dyn FnOnce() -> anyhow::Result<HandlerOutput> + Send>);

impl Pending {
    /// Wraps a deferred computation.
    pub fn new<F>(work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<HandlerOutput> + Send + 'static,
    {
        Self(Box::new(work))
    }

    /// Runs the deferred computation.
    ///
    /// # Errors
    ///
    /// Returns whatever error the computation raises.
    pub fn complete(self) -> anyhow::Result<HandlerOutput> {
        (self.0)()
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pending(..)")
    }
}

/// Source of a value for an omitted optional parameter.
#[derive(Clone)]
pub enum DefaultValue {
    /// Text parsed by the parameter's own resolver.
    Input(String),
    /// A ready value.
    Value(Value),
    /// A closure evaluated for every dispatch.
    Provider(DefaultProvider),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(text) => f.debug_tuple("Input").field(text).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

/// Whether a parameter reads tokens or ambient context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterCategory {
    /// Filled from input tokens; appears in the command tree.
    Value,
    /// Filled from the dispatch context; consumes no tokens.
    Context,
}

/// Declaration of a single handler parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    type_tag: TypeTag,
    category: ParameterCategory,
    optional: bool,
    default: Option<DefaultValue>,
    greedy: bool,
    validators: Vec<Arc<dyn ParameterValidator>>,
    permission: Permission,
    description: Option<String>,
}

impl ParameterDescriptor {
    fn with_category(
        name: impl Into<String>,
        type_tag: TypeTag,
        category: ParameterCategory,
    ) -> Self {
        Self {
            name: name.into(),
            type_tag,
            category,
            optional: false,
            default: None,
            greedy: false,
            validators: Vec::new(),
            permission: Permission::Always,
            description: None,
        }
    }

    /// Declares a parameter filled from input tokens.
    #[must_use]
    pub fn value(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self::with_category(name, type_tag, ParameterCategory::Value)
    }

    /// Declares a parameter filled from the dispatch context.
    #[must_use]
    pub fn context(name: impl Into<String>, type_tag: TypeTag) -> Self {
        Self::with_category(name, type_tag, ParameterCategory::Context)
    }

    /// Marks the parameter optional without a default.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Makes the parameter optional, parsing `input` when it is omitted.
    #[must_use]
    pub fn default_input(mut self, input: impl Into<String>) -> Self {
        self.optional = true;
        self.default = Some(DefaultValue::Input(input.into()));
        self
    }

    /// Makes the parameter optional, using `value` when it is omitted.
    #[must_use]
    pub fn default_value(mut self, value: Value) -> Self {
        self.optional = true;
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Makes the parameter optional, calling `provider` when it is omitted.
    #[must_use]
    pub fn default_with<F>(mut self, provider: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        self.optional = true;
        self.default = Some(DefaultValue::Provider(Arc::new(provider)));
        self
    }

    /// Lets the parameter absorb every remaining token.
    #[must_use]
    pub const fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    /// Appends a validator run after resolution.
    #[must_use]
    pub fn validator(mut self, validator: impl ParameterValidator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Requires `permission` before this parameter is resolved.
    ///
    /// Repeated calls stack with AND.
    #[must_use]
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = std::mem::take(&mut self.permission).and(permission);
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Returns the parameter category.
    #[must_use]
    pub const fn category(&self) -> ParameterCategory {
        self.category
    }

    /// Returns `true` for token-consuming parameters.
    #[must_use]
    pub fn is_value(&self) -> bool {
        self.category == ParameterCategory::Value
    }

    /// Returns `true` for context parameters.
    #[must_use]
    pub fn is_context(&self) -> bool {
        self.category == ParameterCategory::Context
    }

    /// Returns `true` when the parameter may be omitted.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns the default source, if any.
    #[must_use]
    pub const fn default_source(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Returns `true` when the parameter absorbs the remaining input.
    #[must_use]
    pub const fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Returns the validators in declaration order.
    #[must_use]
    pub fn validators(&self) -> &[Arc<dyn ParameterValidator>] {
        &self.validators
    }

    /// Returns the parameter-scoped permission declared on the descriptor.
    #[must_use]
    pub const fn permission_requirement(&self) -> &Permission {
        &self.permission
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Renders the usage fragment for this parameter.
    ///
    /// Context parameters have no usage fragment.
    #[must_use]
    pub fn usage(&self) -> Option<String> {
        if self.is_context() {
            return None;
        }
        let ellipsis = if self.greedy { "..." } else { "" };
        let fragment = if self.optional {
            format!("[{}{ellipsis}]", self.name)
        } else {
            format!("<{}{ellipsis}>", self.name)
        };
        Some(fragment)
    }

    pub(crate) const fn mark_greedy(&mut self) {
        self.greedy = true;
    }

    pub(crate) fn has_same_shape(&self, other: &Self) -> bool {
        self.name == other.name && self.type_tag == other.type_tag && self.greedy == other.greedy
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("type_tag", &self.type_tag)
            .field("category", &self.category)
            .field("optional", &self.optional)
            .field("default", &self.default)
            .field("greedy", &self.greedy)
            .field("validators", &self.validators.len())
            .field("permission", &self.permission)
            .finish_non_exhaustive()
    }
}

/// Declaration of a command: path, aliases, parameters, handler and
/// permission.
///
/// # Example
///
/// ```
/// use herald_core::{CommandDescriptor, HandlerOutput, ParameterDescriptor, TypeTag};
///
/// let teleport = CommandDescriptor::new("teleport")
///     .alias("tp")
///     .parameter(ParameterDescriptor::value("x", TypeTag::INT))
///     .parameter(ParameterDescriptor::value("y", TypeTag::INT))
///     .parameter(ParameterDescriptor::value("z", TypeTag::INT).default_input("10"))
///     .handler(|_| Ok(HandlerOutput::Unit));
/// assert_eq!(teleport.usage(), "teleport <x> <y> [z]");
/// ```
#[derive(Clone)]
pub struct CommandDescriptor {
    path: CommandPath,
    aliases: Vec<String>,
    parameters: Vec<ParameterDescriptor>,
    permission: Permission,
    description: Option<String>,
    priority: i32,
    cooldown: Option<Duration>,
    handler: Option<Handler>,
}

impl CommandDescriptor {
    /// Starts a descriptor for `path`.
    #[must_use]
    pub fn new(path: impl Into<CommandPath>) -> Self {
        Self {
            path: path.into(),
            aliases: Vec::new(),
            parameters: Vec::new(),
            permission: Permission::Always,
            description: None,
            priority: 0,
            cooldown: None,
            handler: None,
        }
    }

    /// Adds an alternative name for the final path segment.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Requires `permission` to run the command.
    ///
    /// Repeated calls stack with AND.
    #[must_use]
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = std::mem::take(&mut self.permission).and(permission);
        self
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ranks the command against others that accept the same input.
    ///
    /// Lower values are tried first; the default is `0`. Commands sharing a
    /// final literal may only accept the same number of arguments when their
    /// priorities differ.
    #[must_use]
    pub const fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Makes each actor wait `period` between uses of the command.
    ///
    /// A zero period disables the cooldown.
    #[must_use]
    pub const fn cooldown(mut self, period: Duration) -> Self {
        self.cooldown = Some(period);
        self
    }

    /// Sets the handler body.
    #[must_use]
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<HandlerOutput> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Returns the command path.
    #[must_use]
    pub const fn path(&self) -> &CommandPath {
        &self.path
    }

    /// Returns the aliases of the final segment.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Returns the command permission.
    #[must_use]
    pub const fn permission_requirement(&self) -> &Permission {
        &self.permission
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the command priority.
    #[must_use]
    pub const fn priority_rank(&self) -> i32 {
        self.priority
    }

    /// Returns the cooldown period, if one was set.
    #[must_use]
    pub const fn cooldown_period(&self) -> Option<Duration> {
        self.cooldown
    }

    /// Renders the usage line, e.g. `teleport <x> <y> [z]`.
    #[must_use]
    pub fn usage(&self) -> String {
        render_usage(&self.path, self.parameters.iter())
    }

    /// Checks the descriptor for structural mistakes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidDescriptor`] for an empty path, a
    /// missing handler, a blank alias, duplicate parameter names, a required
    /// value parameter after an optional one, or a greedy value parameter
    /// that is not the last value parameter.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let invalid = |reason: &str| RegistrationError::invalid_descriptor(&self.path, reason);

        if self.path.is_empty() {
            return Err(invalid("command path is empty"));
        }
        if self.handler.is_none() {
            return Err(invalid("no handler was supplied"));
        }
        if let Some(alias) = self.aliases.iter().find(|alias| !is_single_segment(alias)) {
            return Err(invalid(&format!("alias '{alias}' must be a single word")));
        }

        let mut names = HashSet::new();
        for parameter in &self.parameters {
            if parameter.name.trim().is_empty() {
                return Err(invalid("parameter names must not be blank"));
            }
            if !names.insert(parameter.name.as_str()) {
                return Err(invalid(&format!(
                    "parameter '{}' is declared more than once",
                    parameter.name
                )));
            }
        }

        check_value_order(self.parameters.iter()).map_err(|reason| invalid(&reason))
    }

    pub(crate) fn handler_ref(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("permission", &self.permission)
            .field("description", &self.description)
            .field("priority", &self.priority)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

fn is_single_segment(alias: &str) -> bool {
    !alias.is_empty() && !alias.chars().any(char::is_whitespace)
}

/// Checks ordering rules over value parameters.
pub(crate) fn check_value_order<'a>(
    parameters: impl Iterator<Item = &'a ParameterDescriptor>,
) -> Result<(), String> {
    let values: Vec<&ParameterDescriptor> = parameters.filter(|p| p.is_value()).collect();
    let mut seen_optional: Option<&str> = None;
    for (index, parameter) in values.iter().enumerate() {
        if parameter.optional {
            seen_optional.get_or_insert(parameter.name.as_str());
        } else if let Some(optional) = seen_optional {
            return Err(format!(
                "required parameter '{}' follows optional parameter '{optional}'",
                parameter.name
            ));
        }
        if parameter.greedy && index + 1 != values.len() {
            return Err(format!(
                "greedy parameter '{}' must be the last value parameter",
                parameter.name
            ));
        }
    }
    Ok(())
}

pub(crate) fn render_usage<'a>(
    path: &CommandPath,
    parameters: impl Iterator<Item = &'a ParameterDescriptor>,
) -> String {
    let mut usage = path.to_string();
    for fragment in parameters.filter_map(ParameterDescriptor::usage) {
        usage.push(' ');
        usage.push_str(&fragment);
    }
    usage
}
