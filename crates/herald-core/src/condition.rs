//! Checks run on the selected command after its arguments resolve and
//! before its handler is invoked.
//!
//! Conditions are registered on the [`DispatcherBuilder`](crate::DispatcherBuilder)
//! and run for every command in registration order. A [`CooldownCondition`]
//! is always installed first; it only acts on commands declared with a
//! cooldown.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::descriptor::Invocation;
use crate::error::CommandError;
use crate::execution::Execution;
use crate::path::CommandPath;

const CONDITION_TARGET: &str = "herald_core::condition";

/// Last gate before a handler runs.
///
/// A failing condition stops the dispatch; its error is routed through the
/// exception handlers like any other dispatch failure.
pub trait CommandCondition: Send + Sync {
    /// Lets the dispatch proceed or rejects it.
    ///
    /// # Errors
    ///
    /// Returns the failure to route, typically built with
    /// [`CommandError::condition`] or an application kind.
    fn test(&self, command: &Execution, invocation: &Invocation<'_>) -> Result<(), CommandError>;
}

impl<F> CommandCondition for F
where
    F: Fn(&Execution, &Invocation<'_>) -> Result<(), CommandError> + Send + Sync,
{
    fn test(&self, command: &Execution, invocation: &Invocation<'_>) -> Result<(), CommandError> {
        self(command, invocation)
    }
}

/// Enforces per-actor cooldowns declared with
/// [`CommandDescriptor::cooldown`](crate::CommandDescriptor::cooldown).
///
/// The first use starts the cooldown; further uses by the same actor fail
/// with [`CommandError::Cooldown`] until it expires. Actors are told apart
/// by [`Actor::name`](crate::Actor::name).
#[derive(Default)]
pub struct CooldownCondition {
    expiries: Mutex<HashMap<(String, CommandPath), Instant>>,
}

impl CooldownCondition {
    /// Creates a condition with no cooldowns running.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn admit(
        &self,
        actor: &str,
        path: &CommandPath,
        period: Duration,
        now: Instant,
    ) -> Result<(), CommandError> {
        let mut expiries = self.expiries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (actor.to_owned(), path.clone());
        if let Some(&expiry) = expiries.get(&key)
            && expiry > now
        {
            return Err(CommandError::Cooldown {
                path: path.clone(),
                remaining: expiry.saturating_duration_since(now),
            });
        }

        expiries.retain(|_, expiry| *expiry > now);
        if let Some(expiry) = now.checked_add(period) {
            trace!(
                target: CONDITION_TARGET,
                actor,
                path = %path,
                ?period,
                "cooldown started"
            );
            expiries.insert(key, expiry);
        }
        Ok(())
    }
}

impl CommandCondition for CooldownCondition {
    fn test(&self, command: &Execution, invocation: &Invocation<'_>) -> Result<(), CommandError> {
        let Some(period) = command.cooldown() else {
            return Ok(());
        };
        self.admit(
            invocation.actor().name(),
            command.path(),
            period,
            Instant::now(),
        )
    }
}

impl fmt::Debug for CooldownCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self
            .expiries
            .lock()
            .map_or(0, |expiries| expiries.len());
        f.debug_struct("CooldownCondition")
            .field("running", &running)
            .finish()
    }
}
