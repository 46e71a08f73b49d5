//! Command paths: the identity key of a registered command.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered sequence of literal segment names identifying a command.
///
/// Paths compare and hash case-insensitively, so `Teleport Here` and
/// `teleport here` name the same command.
///
/// # Example
///
/// ```
/// use herald_core::CommandPath;
///
/// let path = CommandPath::parse("Warp  set");
/// assert_eq!(path.segments(), ["Warp", "set"]);
/// assert_eq!(path, CommandPath::parse("warp SET"));
/// ```
#[derive(Debug, Clone, Default, Eq)]
pub struct CommandPath {
    segments: Vec<String>,
}

impl CommandPath {
    /// Creates a path from explicit segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a path string on runs of whitespace.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        Self::new(input.split_whitespace())
    }

    /// Returns the literal segments in order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` when the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` when `self` is a (non-strict) prefix of `other`.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.len() <= other.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(left, right)| fold_case(left) == fold_case(right))
    }
}

/// Normalises a literal discriminator for case-insensitive comparison.
pub(crate) fn fold_case(segment: &str) -> String {
    segment.to_lowercase()
}

impl PartialEq for CommandPath {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_prefix_of(other)
    }
}

impl Hash for CommandPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.len().hash(state);
        for segment in &self.segments {
            fold_case(segment).hash(state);
        }
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(" "))
    }
}

impl From<&str> for CommandPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<Vec<String>> for CommandPath {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}
