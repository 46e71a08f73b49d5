//! Routing of dispatch failures to exception handlers.
//!
//! Failure kinds form a tree recorded in a [`KindAncestry`] table. A failure
//! is handled by the handler registered for its own kind or, failing that, the
//! nearest ancestor that has one. Failures nobody handles, and handlers that
//! fail themselves, surface to the dispatch caller as a [`DispatchError`].

use std::collections::HashMap;
use std::fmt;
use std::iter;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::actor::Actor;
use crate::error::{
    BUILTIN_ANCESTRY, CommandError, DispatchError, ErrorKind, RegistrationError, SharedCause,
};
use crate::path::CommandPath;
use crate::unwind;

/// Tracing target for failure routing.
const EXCEPTION_TARGET: &str = "herald_core::exception";

/// Reply sent for handler failures when default replies are enabled.
pub const GENERIC_FAILURE_REPLY: &str = "An error occurred while executing this command.";

/// Exception handler registered for an [`ErrorKind`].
pub type ExceptionHandler =
    Arc<dyn Fn(&CommandError, &FailureContext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// What an exception handler knows about the failed dispatch.
pub struct FailureContext<'a> {
    actor: &'a dyn Actor,
    input: &'a str,
    path: Option<&'a CommandPath>,
}

impl<'a> FailureContext<'a> {
    pub(crate) const fn new(
        actor: &'a dyn Actor,
        input: &'a str,
        path: Option<&'a CommandPath>,
    ) -> Self {
        Self { actor, input, path }
    }

    /// Returns the actor that issued the command.
    #[must_use]
    pub const fn actor(&self) -> &'a dyn Actor {
        self.actor
    }

    /// Returns the raw input line.
    #[must_use]
    pub const fn input(&self) -> &'a str {
        self.input
    }

    /// Returns the matched command path, when matching got that far.
    #[must_use]
    pub const fn path(&self) -> Option<&'a CommandPath> {
        self.path
    }
}

/// Parent links between failure kinds.
///
/// Seeded with the built-in taxonomy rooted at [`ErrorKind::FAILURE`]. Kinds
/// missing from the table are treated as direct children of the root.
#[derive(Debug, Clone)]
pub struct KindAncestry {
    parents: HashMap<ErrorKind, ErrorKind>,
}

impl Default for KindAncestry {
    fn default() -> Self {
        Self {
            parents: BUILTIN_ANCESTRY.iter().copied().collect(),
        }
    }
}

impl KindAncestry {
    /// Returns `true` when `kind` is the root or has a registered parent.
    #[must_use]
    pub fn is_known(&self, kind: ErrorKind) -> bool {
        kind == ErrorKind::FAILURE || self.parents.contains_key(&kind)
    }

    /// Returns the parent of `kind`; `None` only for the root.
    #[must_use]
    pub fn parent(&self, kind: ErrorKind) -> Option<ErrorKind> {
        if kind == ErrorKind::FAILURE {
            return None;
        }
        Some(
            self.parents
                .get(&kind)
                .copied()
                .unwrap_or(ErrorKind::FAILURE),
        )
    }

    /// Iterates from `kind` up to the root, both included.
    pub fn lineage(&self, kind: ErrorKind) -> impl Iterator<Item = ErrorKind> + '_ {
        iter::successors(Some(kind), |current| self.parent(*current)).take(self.parents.len() + 2)
    }

    /// Returns `true` when `ancestor` is `kind` or one of its ancestors.
    #[must_use]
    pub fn is_a(&self, kind: ErrorKind, ancestor: ErrorKind) -> bool {
        self.lineage(kind).any(|current| current == ancestor)
    }

    /// Records `parent` as the parent of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownErrorKind`] when `parent` is not
    /// known, and [`RegistrationError::ErrorKindCycle`] when `kind` is the
    /// root or an ancestor of `parent`.
    pub fn register(
        &mut self,
        kind: ErrorKind,
        parent: ErrorKind,
    ) -> Result<(), RegistrationError> {
        if !self.is_known(parent) {
            return Err(RegistrationError::UnknownErrorKind { kind, parent });
        }
        if kind == ErrorKind::FAILURE || self.is_a(parent, kind) {
            return Err(RegistrationError::ErrorKindCycle { kind, parent });
        }
        self.parents.insert(kind, parent);
        Ok(())
    }
}

/// Exception handlers keyed by failure kind.
#[derive(Clone, Default)]
pub struct ExceptionDispatcher {
    ancestry: KindAncestry,
    handlers: HashMap<ErrorKind, ExceptionHandler>,
}

impl ExceptionDispatcher {
    /// Returns the kind ancestry table.
    #[must_use]
    pub const fn ancestry(&self) -> &KindAncestry {
        &self.ancestry
    }

    /// Registers a new kind under `parent`.
    ///
    /// # Errors
    ///
    /// See [`KindAncestry::register`].
    pub fn register_kind(
        &mut self,
        kind: ErrorKind,
        parent: ErrorKind,
    ) -> Result<(), RegistrationError> {
        self.ancestry.register(kind, parent)
    }

    /// Sets the handler for `kind`, returning the handler it replaces.
    pub fn set_handler(
        &mut self,
        kind: ErrorKind,
        handler: ExceptionHandler,
    ) -> Option<ExceptionHandler> {
        self.handlers.insert(kind, handler)
    }

    /// Returns `true` when a handler is registered for exactly `kind`.
    #[must_use]
    pub fn has_handler(&self, kind: ErrorKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Finds the nearest handler for `kind` and the kind it is registered
    /// under.
    #[must_use]
    pub fn handler_for(&self, kind: ErrorKind) -> Option<(ErrorKind, &ExceptionHandler)> {
        self.ancestry
            .lineage(kind)
            .find_map(|current| self.handlers.get(&current).map(|handler| (current, handler)))
    }

    /// Installs the default actor replies for kinds without a handler.
    ///
    /// The root replies with the failure's message and handler failures reply
    /// with [`GENERIC_FAILURE_REPLY`].
    pub fn install_default_replies(&mut self) {
        if !self.has_handler(ErrorKind::FAILURE) {
            self.set_handler(ErrorKind::FAILURE, reply_with_message());
        }
        if !self.has_handler(ErrorKind::INVOCATION) {
            self.set_handler(ErrorKind::INVOCATION, reply_with_generic_failure());
        }
    }

    /// Routes `error` to its nearest handler.
    ///
    /// Returns the kind of the handler that accepted the failure.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unhandled`] when no handler exists for the
    /// kind or its ancestors, and [`DispatchError::HandlerFailed`] when the
    /// chosen handler returns an error or panics.
    pub fn route(
        &self,
        error: CommandError,
        context: &FailureContext<'_>,
    ) -> Result<ErrorKind, DispatchError> {
        let kind = error.kind();
        let Some((handler_kind, handler)) = self.handler_for(kind) else {
            warn!(
                target: EXCEPTION_TARGET,
                kind = %kind,
                %error,
                "no exception handler for failure"
            );
            return Err(DispatchError::Unhandled(error));
        };

        debug!(
            target: EXCEPTION_TARGET,
            kind = %kind,
            handler = %handler_kind,
            "routing failure"
        );
        let source = match unwind::catch(|| handler(&error, context)) {
            Ok(Ok(())) => return Ok(handler_kind),
            Ok(Err(secondary)) => SharedCause::from(secondary),
            Err(caught) => SharedCause::from(anyhow::Error::new(caught)),
        };
        warn!(
            target: EXCEPTION_TARGET,
            kind = %kind,
            handler = %handler_kind,
            %source,
            "exception handler failed"
        );
        Err(DispatchError::HandlerFailed {
            handler_kind,
            original: error,
            source,
        })
    }
}

impl fmt::Debug for ExceptionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&ErrorKind> = self.handlers.keys().collect();
        kinds.sort();
        f.debug_struct("ExceptionDispatcher")
            .field("ancestry", &self.ancestry)
            .field("handlers", &kinds)
            .finish()
    }
}

/// Handler that sends the failure's message to the actor.
#[must_use]
pub fn reply_with_message() -> ExceptionHandler {
    Arc::new(|error: &CommandError, context: &FailureContext<'_>| {
        context.actor().error(&error.to_string());
        Ok(())
    })
}

/// Handler that logs the failure and sends the actor a generic reply.
#[must_use]
pub fn reply_with_generic_failure() -> ExceptionHandler {
    Arc::new(|error: &CommandError, context: &FailureContext<'_>| {
        warn!(
            target: EXCEPTION_TARGET,
            actor = context.actor().name(),
            input = context.input(),
            %error,
            "command handler failed"
        );
        context.actor().error(GENERIC_FAILURE_REPLY);
        Ok(())
    })
}
