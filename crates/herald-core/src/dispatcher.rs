//! The dispatcher and its builder.
//!
//! A [`DispatcherBuilder`] collects resolvers, commands, error kinds,
//! exception handlers, conditions and group permissions.
//! [`DispatcherBuilder::build`] freezes it into a [`Dispatcher`], which only
//! offers `&self` methods and may be shared across threads.

use std::fmt;
use std::sync::Arc;

use herald_config::EngineSettings;
use tracing::{debug, debug_span, trace};

use crate::actor::Actor;
use crate::condition::{CommandCondition, CooldownCondition};
use crate::descriptor::{CommandDescriptor, HandlerOutput};
use crate::error::{CommandError, DispatchError, ErrorKind, RegistrationError};
use crate::exception::{ExceptionDispatcher, FailureContext};
use crate::execution::Execution;
use crate::matcher::Matcher;
use crate::path::{CommandPath, fold_case};
use crate::permission::Permission;
use crate::pipeline::ExecutionContext;
use crate::resolver::{REGISTRY_TARGET, ResolverEntry, ResolverRegistry};
use crate::token::{TokenCursor, tokenize};
use crate::tree::{CommandNode, CommandTree, NodeId};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = "herald_core::dispatch";

/// Successful outcome of [`Dispatcher::dispatch`].
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran and returned this output.
    Invoked(HandlerOutput),
    /// The dispatch failed and an exception handler accepted the failure.
    Handled {
        /// Kind of the failure.
        kind: ErrorKind,
        /// Kind the accepting handler is registered under.
        handler_kind: ErrorKind,
    },
}

impl DispatchOutcome {
    /// Returns `true` when the handler ran.
    #[must_use]
    pub const fn is_invoked(&self) -> bool {
        matches!(self, Self::Invoked(_))
    }
}

/// Mutable registration surface.
///
/// # Example
///
/// ```
/// use herald_core::{
///     Actor, CommandDescriptor, DispatchOutcome, DispatcherBuilder, HandlerOutput,
///     ParameterDescriptor, TypeTag, Value,
/// };
///
/// struct Console;
///
/// impl Actor for Console {
///     fn name(&self) -> &str {
///         "console"
///     }
///
///     fn has_permission(&self, _permission: &str) -> bool {
///         true
///     }
/// }
///
/// let mut builder = DispatcherBuilder::new();
/// builder
///     .register(
///         CommandDescriptor::new("add")
///             .parameter(ParameterDescriptor::value("a", TypeTag::INT))
///             .parameter(ParameterDescriptor::value("b", TypeTag::INT))
///             .handler(|invocation| {
///                 let a = invocation.get::<i64>("a").copied().unwrap_or_default();
///                 let b = invocation.get::<i64>("b").copied().unwrap_or_default();
///                 Ok(HandlerOutput::Value(Value::new(a + b)))
///             }),
///     )
///     .unwrap();
/// let dispatcher = builder.build();
///
/// let outcome = dispatcher.dispatch(&Console, "add 2 3").unwrap();
/// let DispatchOutcome::Invoked(HandlerOutput::Value(sum)) = outcome else {
///     panic!("expected a value");
/// };
/// assert_eq!(sum.downcast_ref::<i64>(), Some(&5));
/// ```
pub struct DispatcherBuilder {
    settings: EngineSettings,
    registry: ResolverRegistry,
    tree: CommandTree,
    exceptions: ExceptionDispatcher,
    conditions: Vec<Arc<dyn CommandCondition>>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    /// Creates a builder with default settings and the built-in resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    /// Creates a builder with `settings` and the built-in resolvers.
    #[must_use]
    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            registry: ResolverRegistry::with_builtins(settings.resolver_conflicts()),
            settings,
            tree: CommandTree::default(),
            exceptions: ExceptionDispatcher::default(),
            conditions: vec![Arc::new(CooldownCondition::new())],
        }
    }

    /// Returns the settings the dispatcher will run with.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the resolver registry.
    #[must_use]
    pub const fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    /// Returns the command tree built so far.
    #[must_use]
    pub const fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Adds a resolver entry.
    ///
    /// Resolvers bind when a command is registered, so entries must be added
    /// before the commands that use them.
    ///
    /// # Errors
    ///
    /// See [`ResolverRegistry::register`].
    pub fn register_resolver(&mut self, entry: ResolverEntry) -> Result<(), RegistrationError> {
        self.registry.register(entry)
    }

    /// Validates `descriptor`, binds its parameters and inserts it into the
    /// tree.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidDescriptor`] for malformed
    /// descriptors, [`RegistrationError::UnresolvableParameter`] or
    /// [`RegistrationError::ConflictingResolvers`] when binding fails, and
    /// [`RegistrationError::ConflictingCommand`] when the command would make
    /// matching ambiguous. The tree is unchanged on error.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistrationError> {
        let execution = Execution::bind(&descriptor, &self.registry)?;
        let inserted = self.tree.insert(execution)?;
        debug!(
            target: REGISTRY_TARGET,
            path = %inserted.path(),
            usage = inserted.usage(),
            "registered command"
        );
        Ok(())
    }

    /// Registers `handler` for failures of `kind` and its descendants.
    ///
    /// A later registration for the same kind replaces the earlier one.
    pub fn register_exception_handler<F>(&mut self, kind: ErrorKind, handler: F) -> &mut Self
    where
        F: Fn(&CommandError, &FailureContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if self.exceptions.set_handler(kind, Arc::new(handler)).is_some() {
            debug!(target: REGISTRY_TARGET, kind = %kind, "replaced exception handler");
        }
        self
    }

    /// Adds a condition checked before every handler runs.
    ///
    /// Conditions run in registration order after the built-in cooldown
    /// check.
    pub fn register_condition(&mut self, condition: impl CommandCondition + 'static) -> &mut Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Declares an application error kind below `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownErrorKind`] when `parent` is not
    /// known and [`RegistrationError::ErrorKindCycle`] when the link would
    /// create a cycle.
    pub fn register_error_kind(
        &mut self,
        kind: ErrorKind,
        parent: ErrorKind,
    ) -> Result<(), RegistrationError> {
        self.exceptions.register_kind(kind, parent)
    }

    /// Requires `permission` for every command below `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidDescriptor`] for an empty path.
    pub fn group_permission(
        &mut self,
        path: impl Into<CommandPath>,
        permission: Permission,
    ) -> Result<(), RegistrationError> {
        self.tree.restrict(&path.into(), permission)
    }

    /// Freezes the builder into a dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        let Self {
            settings,
            tree,
            mut exceptions,
            conditions,
            ..
        } = self;
        if settings.reply_on_failure() {
            exceptions.install_default_replies();
        }
        debug!(
            target: REGISTRY_TARGET,
            commands = tree.executions().count(),
            "dispatcher built"
        );
        Dispatcher {
            settings,
            tree,
            exceptions,
            conditions,
        }
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("settings", &self.settings)
            .field("registry", &self.registry)
            .field("commands", &self.tree.executions().count())
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

/// Frozen command dispatcher.
pub struct Dispatcher {
    settings: EngineSettings,
    tree: CommandTree,
    exceptions: ExceptionDispatcher,
    conditions: Vec<Arc<dyn CommandCondition>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("tree", &self.tree)
            .field("exceptions", &self.exceptions)
            .field("conditions", &self.conditions.len())
            .finish()
    }
}

impl Dispatcher {
    /// Returns the settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Returns the command tree.
    #[must_use]
    pub const fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Iterates over registered commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Execution> {
        self.tree.executions().map(|execution| &**execution)
    }

    /// Matches, resolves, authorizes and invokes `input` on behalf of
    /// `actor`.
    ///
    /// When several commands accept the input they are tried in priority
    /// order; the first one the actor may run and whose arguments resolve is
    /// checked against the conditions and invoked. If none qualifies, the
    /// failure of the first is reported. Every failure is routed through the
    /// exception handlers first.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unhandled`] when no handler accepts the
    /// failure and [`DispatchError::HandlerFailed`] when the chosen handler
    /// fails.
    pub fn dispatch(
        &self,
        actor: &dyn Actor,
        input: &str,
    ) -> Result<DispatchOutcome, DispatchError> {
        let span = debug_span!(target: DISPATCH_TARGET, "dispatch", actor = actor.name());
        let _entered = span.enter();

        let mut matched_path = None;
        match self.execute(actor, input, &mut matched_path) {
            Ok(output) => {
                trace!(target: DISPATCH_TARGET, "handler completed");
                Ok(DispatchOutcome::Invoked(output))
            }
            Err(error) => {
                let kind = error.kind();
                debug!(target: DISPATCH_TARGET, kind = %kind, %error, "dispatch failed");
                let context = FailureContext::new(actor, input, matched_path);
                self.exceptions
                    .route(error, &context)
                    .map(|handler_kind| DispatchOutcome::Handled { kind, handler_kind })
            }
        }
    }

    fn execute<'d>(
        &'d self,
        actor: &dyn Actor,
        input: &str,
        matched_path: &mut Option<&'d CommandPath>,
    ) -> Result<HandlerOutput, CommandError> {
        let max_size = self.settings.max_input_bytes();
        if input.len() > max_size {
            return Err(CommandError::InputTooLong {
                size: input.len(),
                max_size,
            });
        }

        let tokens = tokenize(input)?;
        let candidates = Matcher::new(&self.tree, &tokens, input).find()?;
        let mut rejected: Option<CommandError> = None;
        for found in candidates {
            let execution: &'d Execution = found.execution;
            let mut context = ExecutionContext::new(
                actor,
                execution,
                input,
                TokenCursor::at(&tokens, found.position),
            );
            match context.prepare(&self.tree.path_permissions(execution.path())) {
                Ok(()) => {
                    *matched_path = Some(execution.path());
                    debug!(
                        target: DISPATCH_TARGET,
                        path = %execution.path(),
                        priority = execution.priority(),
                        tokens = tokens.len(),
                        "matched command"
                    );
                    context.check_conditions(&self.conditions)?;
                    return context.invoke(self.settings.catch_handler_panics());
                }
                Err(error) => {
                    trace!(
                        target: DISPATCH_TARGET,
                        path = %execution.path(),
                        kind = %error.kind(),
                        "candidate rejected"
                    );
                    if rejected.is_none() {
                        *matched_path = Some(execution.path());
                        rejected = Some(error);
                    }
                }
            }
        }
        Err(rejected.unwrap_or_else(|| {
            CommandError::no_such_command(input.trim(), CommandPath::default())
        }))
    }

    /// Lists literal completions for the last token of `partial`.
    ///
    /// Only literals leading to at least one command the actor may run are
    /// offered. Completion stops at the first parameter position.
    #[must_use]
    pub fn suggest(&self, actor: &dyn Actor, partial: &str) -> Vec<String> {
        let Ok(tokens) = tokenize(partial) else {
            return Vec::new();
        };
        let completing_new = partial.is_empty() || partial.ends_with(char::is_whitespace);
        let (walked, prefix) = match tokens.split_last() {
            Some((last, walked)) if !completing_new => (walked, fold_case(last.text())),
            _ => (tokens.as_slice(), String::new()),
        };

        let mut current = NodeId::ROOT;
        for token in walked {
            let Some(next) = self.tree.node(current).and_then(|node| node.literal(token.text()))
            else {
                return Vec::new();
            };
            if !self.permits_node(actor, next) {
                return Vec::new();
            }
            current = next;
        }

        let Some(node) = self.tree.node(current) else {
            return Vec::new();
        };
        node.literals()
            .filter(|(key, _)| key.starts_with(&prefix))
            .filter(|(_, id)| self.is_visible(actor, *id))
            .map(|(key, _)| key.to_owned())
            .collect()
    }

    fn permits_node(&self, actor: &dyn Actor, id: NodeId) -> bool {
        self.tree
            .node(id)
            .is_some_and(|node| node.permission().evaluate(actor))
    }

    fn is_visible(&self, actor: &dyn Actor, id: NodeId) -> bool {
        let Some(node) = self.tree.node(id) else {
            return false;
        };
        if !node.permission().evaluate(actor) {
            return false;
        }
        let runnable = node
            .execution()
            .is_some_and(|execution| execution.permission().evaluate(actor));
        runnable
            || literal_children(node).any(|child| self.is_visible(actor, child))
            || has_parameter_execution(&self.tree, node, actor)
    }
}

fn literal_children(node: &CommandNode) -> impl Iterator<Item = NodeId> + '_ {
    node.literals().map(|(_, id)| id)
}

fn has_parameter_execution(tree: &CommandTree, node: &CommandNode, actor: &dyn Actor) -> bool {
    node.parameters().iter().any(|&child| {
        tree.node(child).is_some_and(|parameter| {
            parameter
                .execution()
                .is_some_and(|execution| execution.permission().evaluate(actor))
                || has_parameter_execution(tree, parameter, actor)
        })
    })
}
