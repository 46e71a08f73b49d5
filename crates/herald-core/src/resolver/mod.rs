//! Priority-ordered registry of value and context resolvers.
//!
//! Value resolvers turn tokens into [`Value`]s; context resolvers produce
//! values from the dispatch context alone. Entries carry a priority (lower
//! runs first) and an applicability predicate over a
//! [`ParameterDescriptor`]. Factory entries build a resolver per descriptor
//! and serve dynamic types such as `list<T>` and enumerations.
//!
//! Binding happens once per parameter at command registration. The first
//! applicable entry wins; a second applicable entry of the same priority is a
//! conflict unless the registry runs with
//! [`ResolverConflictPolicy::FirstRegisteredWins`].

mod builtins;

use std::fmt;
use std::sync::Arc;

use herald_config::ResolverConflictPolicy;
use tracing::trace;

use crate::actor::Actor;
use crate::arguments::Arguments;
use crate::descriptor::{ParameterCategory, ParameterDescriptor};
use crate::error::{CommandError, RegistrationError};
use crate::path::CommandPath;
use crate::token::TokenCursor;
use crate::types::{TypeTag, Value};

pub use builtins::{
    BUILTIN_FACTORY_PRIORITY, BUILTIN_PRIORITY, EnumResolverFactory, ListResolverFactory,
    parse_bool,
};

/// Tracing target for registration and binding.
pub(crate) const REGISTRY_TARGET: &str = "herald_core::registry";

/// Priority of entries that do not set one explicitly.
pub const DEFAULT_PRIORITY: i32 = 0;

/// Everything a resolver may read besides the token cursor.
pub struct ResolveContext<'a> {
    actor: &'a dyn Actor,
    path: &'a CommandPath,
    input: &'a str,
    arguments: &'a Arguments,
    parameter: &'a ParameterDescriptor,
}

impl<'a> ResolveContext<'a> {
    pub(crate) const fn new(
        actor: &'a dyn Actor,
        path: &'a CommandPath,
        input: &'a str,
        arguments: &'a Arguments,
        parameter: &'a ParameterDescriptor,
    ) -> Self {
        Self {
            actor,
            path,
            input,
            arguments,
            parameter,
        }
    }

    /// Returns the actor that issued the command.
    #[must_use]
    pub const fn actor(&self) -> &'a dyn Actor {
        self.actor
    }

    /// Returns the path of the matched command.
    #[must_use]
    pub const fn path(&self) -> &'a CommandPath {
        self.path
    }

    /// Returns the raw input line.
    #[must_use]
    pub const fn input(&self) -> &'a str {
        self.input
    }

    /// Returns the arguments resolved so far.
    #[must_use]
    pub const fn arguments(&self) -> &'a Arguments {
        self.arguments
    }

    /// Returns the parameter being resolved.
    #[must_use]
    pub const fn parameter(&self) -> &'a ParameterDescriptor {
        self.parameter
    }
}

/// Converts tokens into a value.
pub trait ValueResolver: Send + Sync {
    /// Reads tokens from `cursor` and produces a value.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] when the tokens cannot be converted.
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError>;

    /// Returns `true` when the resolver reads every remaining token itself.
    ///
    /// Parameters bound to such a resolver are inserted into the command
    /// tree as greedy.
    fn consumes_remaining(&self) -> bool {
        false
    }
}

/// Produces a value from the dispatch context alone.
pub trait ContextResolver: Send + Sync {
    /// Produces the value.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] when the value is unavailable.
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, CommandError>;
}

/// Builds a value resolver for a specific parameter.
pub trait ValueResolverFactory: Send + Sync {
    /// Returns a resolver for `parameter`, or `None` when the factory does
    /// not apply after all.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] when binding a nested resolver fails.
    fn create(
        &self,
        parameter: &ParameterDescriptor,
        registry: &ResolverRegistry,
    ) -> Result<Option<Arc<dyn ValueResolver>>, RegistrationError>;
}

/// Builds a context resolver for a specific parameter.
pub trait ContextResolverFactory: Send + Sync {
    /// Returns a resolver for `parameter`, or `None` when the factory does
    /// not apply after all.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistrationError`] when binding a nested resolver fails.
    fn create(
        &self,
        parameter: &ParameterDescriptor,
        registry: &ResolverRegistry,
    ) -> Result<Option<Arc<dyn ContextResolver>>, RegistrationError>;
}

struct FnValueResolver<F>(F);

impl<F> ValueResolver for FnValueResolver<F>
where
    F: Fn(&mut TokenCursor<'_>, &ResolveContext<'_>) -> Result<Value, CommandError> + Send + Sync,
{
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        (self.0)(cursor, context)
    }
}

struct FnContextResolver<F>(F);

impl<F> ContextResolver for FnContextResolver<F>
where
    F: Fn(&ResolveContext<'_>) -> Result<Value, CommandError> + Send + Sync,
{
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, CommandError> {
        (self.0)(context)
    }
}

type Applicability = Arc<dyn Fn(&ParameterDescriptor) -> bool + Send + Sync>;

#[derive(Clone)]
enum EntryKind {
    Value(Arc<dyn ValueResolver>),
    ValueFactory(Arc<dyn ValueResolverFactory>),
    Context(Arc<dyn ContextResolver>),
    ContextFactory(Arc<dyn ContextResolverFactory>),
}

impl EntryKind {
    const fn category(&self) -> ParameterCategory {
        match self {
            Self::Value(_) | Self::ValueFactory(_) => ParameterCategory::Value,
            Self::Context(_) | Self::ContextFactory(_) => ParameterCategory::Context,
        }
    }
}

/// A registry entry: priority, applicability and a resolver or factory.
///
/// # Example
///
/// ```
/// use herald_core::{CommandError, ResolverEntry, TypeTag, Value};
///
/// let upper = ResolverEntry::value_fn(TypeTag::new("shout"), |cursor, context| {
///     let token = cursor.require(context.parameter().name())?;
///     Ok(Value::new(token.text().to_uppercase()))
/// })
/// .with_priority(-10);
/// assert_eq!(upper.priority(), -10);
/// ```
#[derive(Clone)]
pub struct ResolverEntry {
    priority: i32,
    label: String,
    type_tag: Option<TypeTag>,
    applies: Applicability,
    kind: EntryKind,
}

impl ResolverEntry {
    fn keyed(type_tag: TypeTag, kind: EntryKind) -> Self {
        let key = type_tag.clone();
        Self {
            priority: DEFAULT_PRIORITY,
            label: type_tag.to_string(),
            type_tag: Some(type_tag),
            applies: Arc::new(move |parameter: &ParameterDescriptor| parameter.type_tag() == &key),
            kind,
        }
    }

    fn predicated<P>(label: impl Into<String>, applies: P, kind: EntryKind) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
    {
        Self {
            priority: DEFAULT_PRIORITY,
            label: label.into(),
            type_tag: None,
            applies: Arc::new(applies),
            kind,
        }
    }

    /// Registers `resolver` for parameters declared with exactly `type_tag`.
    #[must_use]
    pub fn value(type_tag: TypeTag, resolver: impl ValueResolver + 'static) -> Self {
        Self::keyed(type_tag, EntryKind::Value(Arc::new(resolver)))
    }

    /// Registers a closure for parameters declared with exactly `type_tag`.
    #[must_use]
    pub fn value_fn<F>(type_tag: TypeTag, resolver: F) -> Self
    where
        F: Fn(&mut TokenCursor<'_>, &ResolveContext<'_>) -> Result<Value, CommandError>
            + Send
            + Sync
            + 'static,
    {
        Self::value(type_tag, FnValueResolver(resolver))
    }

    /// Registers `resolver` for every value parameter matching `applies`.
    #[must_use]
    pub fn value_when<P>(
        label: impl Into<String>,
        applies: P,
        resolver: impl ValueResolver + 'static,
    ) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::predicated(label, applies, EntryKind::Value(Arc::new(resolver)))
    }

    /// Registers a factory consulted for value parameters matching `applies`.
    #[must_use]
    pub fn value_factory<P>(
        label: impl Into<String>,
        applies: P,
        factory: impl ValueResolverFactory + 'static,
    ) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::predicated(label, applies, EntryKind::ValueFactory(Arc::new(factory)))
    }

    /// Registers `resolver` for context parameters declared with exactly
    /// `type_tag`.
    #[must_use]
    pub fn context(type_tag: TypeTag, resolver: impl ContextResolver + 'static) -> Self {
        Self::keyed(type_tag, EntryKind::Context(Arc::new(resolver)))
    }

    /// Registers a closure for context parameters declared with exactly
    /// `type_tag`.
    #[must_use]
    pub fn context_fn<F>(type_tag: TypeTag, resolver: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<Value, CommandError> + Send + Sync + 'static,
    {
        Self::context(type_tag, FnContextResolver(resolver))
    }

    /// Registers `resolver` for every context parameter matching `applies`.
    #[must_use]
    pub fn context_when<P>(
        label: impl Into<String>,
        applies: P,
        resolver: impl ContextResolver + 'static,
    ) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::predicated(label, applies, EntryKind::Context(Arc::new(resolver)))
    }

    /// Registers a factory consulted for context parameters matching
    /// `applies`.
    #[must_use]
    pub fn context_factory<P>(
        label: impl Into<String>,
        applies: P,
        factory: impl ContextResolverFactory + 'static,
    ) -> Self
    where
        P: Fn(&ParameterDescriptor) -> bool + Send + Sync + 'static,
    {
        Self::predicated(label, applies, EntryKind::ContextFactory(Arc::new(factory)))
    }

    /// Overrides the priority. Lower values are consulted first.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns the priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns whether the entry serves value or context parameters.
    #[must_use]
    pub const fn category(&self) -> ParameterCategory {
        self.kind.category()
    }
}

impl fmt::Debug for ResolverEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverEntry")
            .field("priority", &self.priority)
            .field("label", &self.label)
            .field("category", &self.category())
            .finish_non_exhaustive()
    }
}

/// A resolver chosen for one parameter.
#[derive(Clone)]
pub(crate) enum Bound {
    Value(Arc<dyn ValueResolver>),
    Context(Arc<dyn ContextResolver>),
}

/// Ordered resolver entries for both parameter categories.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    value: Vec<ResolverEntry>,
    context: Vec<ResolverEntry>,
    policy: ResolverConflictPolicy,
}

impl ResolverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new(policy: ResolverConflictPolicy) -> Self {
        Self {
            value: Vec::new(),
            context: Vec::new(),
            policy,
        }
    }

    /// Creates a registry holding the built-in resolvers.
    #[must_use]
    pub fn with_builtins(policy: ResolverConflictPolicy) -> Self {
        let mut registry = Self::new(policy);
        for entry in builtins::entries() {
            registry.insert(entry);
        }
        registry
    }

    /// Returns the conflict policy.
    #[must_use]
    pub const fn policy(&self) -> ResolverConflictPolicy {
        self.policy
    }

    /// Adds an entry after every entry of equal or lower priority.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::ConflictingResolvers`] when the registry
    /// rejects conflicts and an entry keyed on the same type already exists
    /// at the same priority.
    pub fn register(&mut self, entry: ResolverEntry) -> Result<(), RegistrationError> {
        if self.policy == ResolverConflictPolicy::Reject
            && let Some(existing) = self.duplicate_of(&entry)
        {
            return Err(RegistrationError::ConflictingResolvers {
                parameter: String::from("*"),
                type_tag: entry.label.clone(),
                priority: entry.priority,
                first: existing.label.clone(),
                second: entry.label,
            });
        }
        trace!(
            target: REGISTRY_TARGET,
            label = %entry.label,
            priority = entry.priority,
            "registering resolver"
        );
        self.insert(entry);
        Ok(())
    }

    /// Returns the entries for `category` in lookup order.
    pub fn entries(&self, category: ParameterCategory) -> impl Iterator<Item = &ResolverEntry> {
        self.list(category).iter()
    }

    fn duplicate_of(&self, entry: &ResolverEntry) -> Option<&ResolverEntry> {
        let tag = entry.type_tag.as_ref()?;
        self.list(entry.category()).iter().find(|existing| {
            existing.priority == entry.priority && existing.type_tag.as_ref() == Some(tag)
        })
    }

    fn insert(&mut self, entry: ResolverEntry) {
        let list = match entry.category() {
            ParameterCategory::Value => &mut self.value,
            ParameterCategory::Context => &mut self.context,
        };
        let position = list.partition_point(|existing| existing.priority <= entry.priority);
        list.insert(position, entry);
    }

    const fn list(&self, category: ParameterCategory) -> &Vec<ResolverEntry> {
        match category {
            ParameterCategory::Value => &self.value,
            ParameterCategory::Context => &self.context,
        }
    }

    /// Finds the value resolver for `parameter`.
    ///
    /// Returns `Ok(None)` when no entry applies.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::ConflictingResolvers`] when two entries of
    /// the winning priority apply and the policy rejects conflicts, or any
    /// error raised by a factory.
    pub fn resolve_value(
        &self,
        parameter: &ParameterDescriptor,
    ) -> Result<Option<Arc<dyn ValueResolver>>, RegistrationError> {
        let bound = self.lookup(ParameterCategory::Value, parameter)?;
        Ok(bound.and_then(|bound| match bound {
            Bound::Value(resolver) => Some(resolver),
            Bound::Context(_) => None,
        }))
    }

    /// Finds the context resolver for `parameter`.
    ///
    /// Returns `Ok(None)` when no entry applies.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::ConflictingResolvers`] when two entries of
    /// the winning priority apply and the policy rejects conflicts, or any
    /// error raised by a factory.
    pub fn resolve_context(
        &self,
        parameter: &ParameterDescriptor,
    ) -> Result<Option<Arc<dyn ContextResolver>>, RegistrationError> {
        let bound = self.lookup(ParameterCategory::Context, parameter)?;
        Ok(bound.and_then(|bound| match bound {
            Bound::Context(resolver) => Some(resolver),
            Bound::Value(_) => None,
        }))
    }

    pub(crate) fn lookup(
        &self,
        category: ParameterCategory,
        parameter: &ParameterDescriptor,
    ) -> Result<Option<Bound>, RegistrationError> {
        let mut winner: Option<(&ResolverEntry, Bound)> = None;
        for entry in self.list(category) {
            if let Some((first, _)) = &winner
                && entry.priority != first.priority
            {
                break;
            }
            let Some(candidate) = self.candidate(entry, parameter)? else {
                continue;
            };
            match &winner {
                None => {
                    if self.policy == ResolverConflictPolicy::FirstRegisteredWins {
                        return Ok(Some(candidate));
                    }
                    winner = Some((entry, candidate));
                }
                Some((first, _)) => {
                    return Err(RegistrationError::ConflictingResolvers {
                        parameter: parameter.name().to_owned(),
                        type_tag: parameter.type_tag().to_string(),
                        priority: entry.priority,
                        first: first.label.clone(),
                        second: entry.label.clone(),
                    });
                }
            }
        }
        Ok(winner.map(|(_, bound)| bound))
    }

    fn candidate(
        &self,
        entry: &ResolverEntry,
        parameter: &ParameterDescriptor,
    ) -> Result<Option<Bound>, RegistrationError> {
        if !(entry.applies)(parameter) {
            return Ok(None);
        }
        let bound = match &entry.kind {
            EntryKind::Value(resolver) => Some(Bound::Value(Arc::clone(resolver))),
            EntryKind::Context(resolver) => Some(Bound::Context(Arc::clone(resolver))),
            EntryKind::ValueFactory(factory) => factory.create(parameter, self)?.map(Bound::Value),
            EntryKind::ContextFactory(factory) => {
                factory.create(parameter, self)?.map(Bound::Context)
            }
        };
        Ok(bound)
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("value", &self.value)
            .field("context", &self.context)
            .field("policy", &self.policy)
            .finish()
    }
}
