//! Resolution, validation, authorization and invocation of a matched command.

use std::sync::Arc;

use tracing::trace;

use crate::actor::Actor;
use crate::arguments::Arguments;
use crate::condition::CommandCondition;
use crate::descriptor::{DefaultValue, HandlerOutput, Invocation, ParameterDescriptor};
use crate::error::CommandError;
use crate::execution::{Binding, BoundParameter, Execution};
use crate::permission::Permission;
use crate::resolver::{ResolveContext, ValueResolver};
use crate::token::{Token, TokenCursor};
use crate::types::Value;
use crate::unwind;

const PIPELINE_TARGET: &str = "herald_core::pipeline";

/// Per-dispatch state: dropped when the dispatch returns.
pub(crate) struct ExecutionContext<'a> {
    actor: &'a dyn Actor,
    execution: &'a Execution,
    input: &'a str,
    cursor: TokenCursor<'a>,
    arguments: Arguments,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) const fn new(
        actor: &'a dyn Actor,
        execution: &'a Execution,
        input: &'a str,
        cursor: TokenCursor<'a>,
    ) -> Self {
        Self {
            actor,
            execution,
            input,
            cursor,
            arguments: Arguments::new(),
        }
    }

    /// Checks the command-level permissions before anything is resolved.
    pub(crate) fn authorize(&self, group: &[&Permission]) -> Result<(), CommandError> {
        let required = group
            .iter()
            .copied()
            .chain(std::iter::once(self.execution.permission()));
        for permission in required {
            if !permission.evaluate(self.actor) {
                return Err(CommandError::no_permission(permission));
            }
        }
        Ok(())
    }

    /// Authorizes the command and resolves its arguments.
    ///
    /// A failure here rejects this command in favour of the next candidate.
    pub(crate) fn prepare(&mut self, group: &[&Permission]) -> Result<(), CommandError> {
        self.authorize(group)?;
        self.resolve_all()
    }

    /// Runs every condition in order, stopping at the first failure.
    pub(crate) fn check_conditions(
        &self,
        conditions: &[Arc<dyn CommandCondition>],
    ) -> Result<(), CommandError> {
        let invocation =
            Invocation::new(self.actor, self.execution.path(), self.input, &self.arguments);
        conditions
            .iter()
            .try_for_each(|condition| condition.test(self.execution, &invocation))
    }

    /// Resolves and validates every parameter in declaration order.
    pub(crate) fn resolve_all(&mut self) -> Result<(), CommandError> {
        let execution = self.execution;
        for parameter in execution.parameters() {
            self.resolve_parameter(parameter)?;
        }
        if self.cursor.is_exhausted() {
            return Ok(());
        }
        let surplus = self
            .cursor
            .remaining()
            .iter()
            .map(|token| token.text().to_owned())
            .collect();
        Err(CommandError::too_many_arguments(execution.usage(), surplus))
    }

    /// Runs the handler.
    pub(crate) fn invoke(&self, catch_panics: bool) -> Result<HandlerOutput, CommandError> {
        let path = self.execution.path();
        let invocation = Invocation::new(self.actor, path, self.input, &self.arguments);
        let handler = self.execution.handler();
        let outcome = if catch_panics {
            unwind::catch(|| handler(&invocation))
                .unwrap_or_else(|caught| Err(anyhow::Error::new(caught)))
        } else {
            handler(&invocation)
        };
        outcome.map_err(|error| {
            error
                .downcast::<CommandError>()
                .unwrap_or_else(|other| CommandError::invocation(path.clone(), other))
        })
    }

    fn resolve_parameter(&mut self, parameter: &BoundParameter) -> Result<(), CommandError> {
        let descriptor = parameter.descriptor();
        self.authorize_parameter(descriptor)?;

        let resolved = {
            let context = ResolveContext::new(
                self.actor,
                self.execution.path(),
                self.input,
                &self.arguments,
                descriptor,
            );
            match parameter.binding() {
                Binding::Context(resolver) => Some(resolver.resolve(&context)?),
                Binding::Deferred => {
                    return Err(CommandError::UnresolvableParameter {
                        parameter: descriptor.name().to_owned(),
                        type_tag: descriptor.type_tag().to_string(),
                    });
                }
                Binding::Value(resolver) => {
                    resolve_value(resolver.as_ref(), &mut self.cursor, &context)?
                }
            }
        };

        let Some(value) = resolved else {
            trace!(
                target: PIPELINE_TARGET,
                parameter = descriptor.name(),
                "optional parameter omitted"
            );
            return Ok(());
        };
        for validator in descriptor.validators() {
            validator.validate(&value, self.actor, descriptor)?;
        }
        self.arguments.insert(descriptor.name(), value);
        Ok(())
    }

    fn authorize_parameter(&self, descriptor: &ParameterDescriptor) -> Result<(), CommandError> {
        let declared = std::iter::once(descriptor.permission_requirement());
        let from_validators = descriptor
            .validators()
            .iter()
            .filter_map(|validator| validator.permission());
        for permission in declared.chain(from_validators) {
            if !permission.evaluate(self.actor) {
                return Err(CommandError::no_permission(permission));
            }
        }
        Ok(())
    }
}

fn resolve_value(
    resolver: &dyn ValueResolver,
    cursor: &mut TokenCursor<'_>,
    context: &ResolveContext<'_>,
) -> Result<Option<Value>, CommandError> {
    let descriptor = context.parameter();
    if cursor.is_exhausted() {
        if !descriptor.is_optional() {
            return Err(CommandError::not_enough_arguments(descriptor.name()));
        }
        return resolve_default(resolver, context);
    }

    if descriptor.is_greedy() && !resolver.consumes_remaining() {
        let joined = [Token::synthetic(cursor.join_remaining())];
        let mut single = TokenCursor::new(&joined);
        return resolver.resolve(&mut single, context).map(Some);
    }

    resolver.resolve(cursor, context).map(Some)
}

fn resolve_default(
    resolver: &dyn ValueResolver,
    context: &ResolveContext<'_>,
) -> Result<Option<Value>, CommandError> {
    match context.parameter().default_source() {
        None => Ok(None),
        Some(DefaultValue::Value(value)) => Ok(Some(value.clone())),
        Some(DefaultValue::Provider(provider)) => provider(context).map(Some),
        Some(DefaultValue::Input(text)) => {
            let tokens = [Token::synthetic(text.clone())];
            let mut cursor = TokenCursor::new(&tokens);
            resolver.resolve(&mut cursor, context).map(Some)
        }
    }
}
