//! Permission predicates evaluated against an [`Actor`].
//!
//! A [`Permission`] is a small predicate tree built from leaf checks and
//! boolean combinators. Evaluation is pure and short-circuits: `All` stops at
//! the first failing branch and `Any` at the first succeeding one.

use std::fmt;

use crate::actor::Actor;

/// Boolean permission predicate.
///
/// # Example
///
/// ```
/// use herald_core::{Actor, Permission};
///
/// struct Admin;
///
/// impl Actor for Admin {
///     fn name(&self) -> &str {
///         "admin"
///     }
///
///     fn has_permission(&self, permission: &str) -> bool {
///         permission.starts_with("server.")
///     }
/// }
///
/// let rule = Permission::node("server.warp").and(Permission::node("chat.mute").negate());
/// assert!(rule.evaluate(&Admin));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Permission {
    /// Always holds.
    #[default]
    Always,
    /// Holds when the actor has the named permission.
    Node(String),
    /// Holds when every branch holds. An empty list always holds.
    All(Vec<Permission>),
    /// Holds when at least one branch holds. An empty list never holds.
    Any(Vec<Permission>),
    /// Holds when the inner predicate does not.
    Not(Box<Permission>),
}

impl Permission {
    /// Creates a leaf check for a permission string.
    #[must_use]
    pub fn node(permission: impl Into<String>) -> Self {
        Self::Node(permission.into())
    }

    /// Creates a conjunction.
    #[must_use]
    pub fn all(branches: impl IntoIterator<Item = Self>) -> Self {
        Self::All(branches.into_iter().collect())
    }

    /// Creates a disjunction.
    #[must_use]
    pub fn any(branches: impl IntoIterator<Item = Self>) -> Self {
        Self::Any(branches.into_iter().collect())
    }

    /// Negates this predicate.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Stacks another requirement onto this one with AND.
    ///
    /// `Always` is the identity, and nested conjunctions are flattened so
    /// stacked requirements stay a single level deep.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Always, other) => other,
            (this, Self::Always) => this,
            (Self::All(mut left), Self::All(right)) => {
                left.extend(right);
                Self::All(left)
            }
            (Self::All(mut left), other) => {
                left.push(other);
                Self::All(left)
            }
            (this, Self::All(right)) => {
                let mut branches = Vec::with_capacity(right.len() + 1);
                branches.push(this);
                branches.extend(right);
                Self::All(branches)
            }
            (this, other) => Self::All(vec![this, other]),
        }
    }

    /// Returns `true` for the trivial predicate.
    #[must_use]
    pub const fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Evaluates the predicate for `actor`.
    #[must_use]
    pub fn evaluate(&self, actor: &dyn Actor) -> bool {
        match self {
            Self::Always => true,
            Self::Node(permission) => actor.has_permission(permission),
            Self::All(branches) => branches.iter().all(|branch| branch.evaluate(actor)),
            Self::Any(branches) => branches.iter().any(|branch| branch.evaluate(actor)),
            Self::Not(inner) => !inner.evaluate(actor),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("*"),
            Self::Node(permission) => f.write_str(permission),
            Self::All(branches) => write_joined(f, branches, " && "),
            Self::Any(branches) => write_joined(f, branches, " || "),
            Self::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    branches: &[Permission],
    separator: &str,
) -> fmt::Result {
    let parts: Vec<String> = branches.iter().map(ToString::to_string).collect();
    write!(f, "({})", parts.join(separator))
}
