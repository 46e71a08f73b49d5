//! Runtime type descriptors and type-erased resolved values.
//!
//! Handlers declare parameter types with a [`TypeTag`] supplied explicitly at
//! registration; resolvers produce [`Value`]s that handlers read back with a
//! typed downcast.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::path::CommandPath;

/// Runtime descriptor for a parameter type.
///
/// A tag is a name plus optional type arguments (`list<int>`) and an optional
/// closed set of variants (enumerations). Tags carrying arguments or variants
/// are *dynamic*: resolvers for them are produced by factories.
///
/// # Example
///
/// ```
/// use herald_core::TypeTag;
///
/// let tag = TypeTag::list(TypeTag::INT);
/// assert_eq!(tag.to_string(), "list<int>");
/// assert!(tag.is_dynamic());
/// assert!(!TypeTag::INT.is_dynamic());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeTag {
    name: Cow<'static, str>,
    arguments: Vec<TypeTag>,
    variants: Vec<String>,
}

impl TypeTag {
    /// A single token read as text.
    pub const STRING: Self = Self::named("string");
    /// A signed 64-bit integer.
    pub const INT: Self = Self::named("int");
    /// A signed 32-bit integer.
    pub const I32: Self = Self::named("i32");
    /// An unsigned 32-bit integer.
    pub const U32: Self = Self::named("u32");
    /// A finite 64-bit float.
    pub const FLOAT: Self = Self::named("float");
    /// A boolean.
    pub const BOOL: Self = Self::named("bool");
    /// The identity of the actor issuing the command (context only).
    pub const ACTOR: Self = Self::named("actor");
    /// Metadata about the running invocation (context only).
    pub const INVOCATION: Self = Self::named("invocation");

    /// Creates a tag from a static name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            arguments: Vec::new(),
            variants: Vec::new(),
        }
    }

    /// Creates a tag from an owned name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            arguments: Vec::new(),
            variants: Vec::new(),
        }
    }

    /// Creates a `list<element>` tag.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::named("list").with_argument(element)
    }

    /// Creates an enumeration tag with a closed set of variant names.
    #[must_use]
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Cow::Owned(name.into()),
            arguments: Vec::new(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a type argument.
    #[must_use]
    pub fn with_argument(mut self, argument: Self) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Returns the tag name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type arguments.
    #[must_use]
    pub fn arguments(&self) -> &[Self] {
        &self.arguments
    }

    /// Returns the enumeration variants, empty for non-enumerations.
    #[must_use]
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Returns the element tag of a `list<T>`.
    #[must_use]
    pub fn element(&self) -> Option<&Self> {
        if self.is_list() {
            self.arguments.first()
        } else {
            None
        }
    }

    /// Returns `true` for `list<T>` tags.
    #[must_use]
    pub fn is_list(&self) -> bool {
        self.name == "list" && self.arguments.len() == 1
    }

    /// Returns `true` for enumeration tags.
    #[must_use]
    pub fn is_enumeration(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Returns `true` when resolvers for this tag come from factories.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !self.arguments.is_empty() || !self.variants.is_empty()
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.arguments.is_empty() {
            return Ok(());
        }
        let arguments: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        write!(f, "<{}>", arguments.join(", "))
    }
}

/// A type-erased resolved argument value.
///
/// Cloning is cheap: the payload is shared.
///
/// # Example
///
/// ```
/// use herald_core::Value;
///
/// let value = Value::new(42_i64);
/// assert_eq!(value.downcast_ref::<i64>(), Some(&42));
/// assert!(value.downcast_ref::<String>().is_none());
/// ```
#[derive(Clone)]
pub struct Value(Arc<dyn Any + Send + Sync>);

impl Value {
    /// Wraps a value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrows the payload as `T` when it has that type.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.0).downcast_ref::<T>()
    }

    /// Returns `true` when the payload has type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        (*self.0).is::<T>()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.downcast_ref::<String>() {
            return f.debug_tuple("Value").field(text).finish();
        }
        if let Some(number) = self.downcast_ref::<i64>() {
            return f.debug_tuple("Value").field(number).finish();
        }
        if let Some(flag) = self.downcast_ref::<bool>() {
            return f.debug_tuple("Value").field(flag).finish();
        }
        if let Some(items) = self.downcast_ref::<Vec<Self>>() {
            return f.debug_tuple("Value").field(items).finish();
        }
        f.write_str("Value(..)")
    }
}

/// A resolved enumeration variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    /// Position of the variant in the declared variant list.
    pub index: usize,
    /// Canonical variant name as declared.
    pub name: String,
}

/// Identity of the actor that issued a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorName(pub String);

/// Metadata describing the invocation being resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationInfo {
    /// Path of the matched command.
    pub path: CommandPath,
    /// Raw input line as received.
    pub input: String,
}
