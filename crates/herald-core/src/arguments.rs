//! Resolved arguments accumulated during a dispatch.

use std::any::Any;

use crate::types::Value;

/// Ordered map of parameter names to resolved values.
///
/// Parameters whose input was omitted and that have no default are absent.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: Vec<(String, Value)>,
}

impl Arguments {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns the value resolved for `name` as `T`.
    ///
    /// Returns `None` when the argument is absent or has another type.
    #[must_use]
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.value(name).and_then(Value::downcast_ref::<T>)
    }

    /// Returns the type-erased value resolved for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, value)| value)
    }

    /// Returns `true` when an argument named `name` was resolved.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.value(name).is_some()
    }

    /// Returns the number of resolved arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over arguments in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }
}
