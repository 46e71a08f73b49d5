//! Resolvers registered with every dispatcher.

use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    ContextResolver, ResolveContext, ResolverEntry, ResolverRegistry, ValueResolver,
    ValueResolverFactory,
};
use crate::descriptor::ParameterDescriptor;
use crate::error::{CommandError, RegistrationError};
use crate::path::fold_case;
use crate::token::TokenCursor;
use crate::types::{ActorName, EnumVariant, InvocationInfo, TypeTag, Value};

/// Priority of the built-in direct resolvers.
pub const BUILTIN_PRIORITY: i32 = 100;

/// Priority of the built-in factories.
pub const BUILTIN_FACTORY_PRIORITY: i32 = 200;

pub(super) fn entries() -> Vec<ResolverEntry> {
    vec![
        ResolverEntry::value(TypeTag::STRING, StringResolver).with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value(TypeTag::INT, IntegerResolver::<i64>::new())
            .with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value(TypeTag::I32, IntegerResolver::<i32>::new())
            .with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value(TypeTag::U32, IntegerResolver::<u32>::new())
            .with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value(TypeTag::FLOAT, FloatResolver).with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value(TypeTag::BOOL, BoolResolver).with_priority(BUILTIN_PRIORITY),
        ResolverEntry::value_factory(
            "enum",
            |parameter: &ParameterDescriptor| parameter.type_tag().is_enumeration(),
            EnumResolverFactory,
        )
        .with_priority(BUILTIN_FACTORY_PRIORITY),
        ResolverEntry::value_factory(
            "list",
            |parameter: &ParameterDescriptor| parameter.type_tag().is_list(),
            ListResolverFactory,
        )
        .with_priority(BUILTIN_FACTORY_PRIORITY),
        ResolverEntry::context(TypeTag::ACTOR, ActorResolver).with_priority(BUILTIN_PRIORITY),
        ResolverEntry::context(TypeTag::INVOCATION, InvocationResolver)
            .with_priority(BUILTIN_PRIORITY),
    ]
}

/// Parses `true`/`yes` and `false`/`no`/`nope`, ignoring ASCII case.
#[must_use]
pub fn parse_bool(text: &str) -> Option<bool> {
    const TRUE: &[&str] = &["true", "yes"];
    const FALSE: &[&str] = &["false", "no", "nope"];

    if TRUE.iter().any(|word| word.eq_ignore_ascii_case(text)) {
        Some(true)
    } else if FALSE.iter().any(|word| word.eq_ignore_ascii_case(text)) {
        Some(false)
    } else {
        None
    }
}

struct StringResolver;

impl ValueResolver for StringResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let token = cursor.require(context.parameter().name())?;
        Ok(Value::new(token.text().to_owned()))
    }
}

struct IntegerResolver<T>(PhantomData<fn() -> T>);

impl<T> IntegerResolver<T> {
    const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> ValueResolver for IntegerResolver<T>
where
    T: FromStr + Send + Sync + 'static,
{
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let name = context.parameter().name();
        let token = cursor.require(name)?;
        token
            .text()
            .parse::<T>()
            .map(Value::new)
            .map_err(|_| CommandError::invalid_number(name, token.text()))
    }
}

struct FloatResolver;

impl ValueResolver for FloatResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let name = context.parameter().name();
        let token = cursor.require(name)?;
        match token.text().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(Value::new(number)),
            _ => Err(CommandError::invalid_number(name, token.text())),
        }
    }
}

struct BoolResolver;

impl ValueResolver for BoolResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let name = context.parameter().name();
        let token = cursor.require(name)?;
        parse_bool(token.text())
            .map(Value::new)
            .ok_or_else(|| CommandError::invalid_boolean(name, token.text()))
    }
}

/// Builds resolvers for enumeration tags.
///
/// Tokens match variant names case-insensitively and resolve to an
/// [`EnumVariant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnumResolverFactory;

impl ValueResolverFactory for EnumResolverFactory {
    fn create(
        &self,
        parameter: &ParameterDescriptor,
        _registry: &ResolverRegistry,
    ) -> Result<Option<Arc<dyn ValueResolver>>, RegistrationError> {
        let variants = parameter.type_tag().variants();
        if variants.is_empty() {
            return Ok(None);
        }
        Ok(Some(Arc::new(EnumResolver {
            variants: variants.to_vec(),
        })))
    }
}

struct EnumResolver {
    variants: Vec<String>,
}

impl ValueResolver for EnumResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let name = context.parameter().name();
        let token = cursor.require(name)?;
        let wanted = fold_case(token.text());
        self.variants
            .iter()
            .position(|variant| fold_case(variant) == wanted)
            .and_then(|index| {
                self.variants.get(index).map(|variant| EnumVariant {
                    index,
                    name: variant.clone(),
                })
            })
            .map(Value::new)
            .ok_or_else(|| CommandError::InvalidEnumValue {
                parameter: name.to_owned(),
                input: token.text().to_owned(),
                expected: self.variants.clone(),
            })
    }
}

/// Builds resolvers for `list<T>` tags from the resolver bound to `T`.
///
/// The list consumes every remaining token and resolves to a `Vec<Value>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListResolverFactory;

impl ValueResolverFactory for ListResolverFactory {
    fn create(
        &self,
        parameter: &ParameterDescriptor,
        registry: &ResolverRegistry,
    ) -> Result<Option<Arc<dyn ValueResolver>>, RegistrationError> {
        let Some(element) = parameter.type_tag().element() else {
            return Ok(None);
        };
        let element_parameter = ParameterDescriptor::value(parameter.name(), element.clone());
        let resolver = registry.resolve_value(&element_parameter)?;
        Ok(resolver.map(|element| Arc::new(ListResolver { element }) as Arc<dyn ValueResolver>))
    }
}

struct ListResolver {
    element: Arc<dyn ValueResolver>,
}

impl ValueResolver for ListResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let mut items = Vec::new();
        while !cursor.is_exhausted() {
            let before = cursor.offset();
            items.push(self.element.resolve(cursor, context)?);
            if cursor.offset() == before {
                break;
            }
        }
        Ok(Value::new(items))
    }

    fn consumes_remaining(&self) -> bool {
        true
    }
}

struct ActorResolver;

impl ContextResolver for ActorResolver {
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, CommandError> {
        Ok(Value::new(ActorName(context.actor().name().to_owned())))
    }
}

struct InvocationResolver;

impl ContextResolver for InvocationResolver {
    fn resolve(&self, context: &ResolveContext<'_>) -> Result<Value, CommandError> {
        Ok(Value::new(InvocationInfo {
            path: context.path().clone(),
            input: context.input().to_owned(),
        }))
    }
}
