//! Executions: registered commands with their parameters bound to resolvers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::descriptor::{
    CommandDescriptor, Handler, ParameterDescriptor, check_value_order, render_usage,
};
use crate::error::RegistrationError;
use crate::path::CommandPath;
use crate::permission::Permission;
use crate::resolver::{ContextResolver, REGISTRY_TARGET, ResolverRegistry, ValueResolver};

/// How a parameter obtains its value at dispatch time.
#[derive(Clone)]
pub(crate) enum Binding {
    Value(Arc<dyn ValueResolver>),
    Context(Arc<dyn ContextResolver>),
    /// Dynamic type with no resolver; fails when dispatched.
    Deferred,
}

/// A parameter together with the resolver chosen for it.
#[derive(Clone)]
pub struct BoundParameter {
    descriptor: ParameterDescriptor,
    binding: Binding,
}

impl BoundParameter {
    /// Returns the parameter descriptor as bound.
    ///
    /// Parameters bound to a resolver that consumes the remaining input are
    /// reported as greedy.
    #[must_use]
    pub const fn descriptor(&self) -> &ParameterDescriptor {
        &self.descriptor
    }

    /// Returns `true` when no resolver was available at registration.
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self.binding, Binding::Deferred)
    }

    pub(crate) const fn binding(&self) -> &Binding {
        &self.binding
    }
}

impl fmt::Debug for BoundParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = match self.binding {
            Binding::Value(_) => "value",
            Binding::Context(_) => "context",
            Binding::Deferred => "deferred",
        };
        f.debug_struct("BoundParameter")
            .field("descriptor", &self.descriptor)
            .field("binding", &binding)
            .finish()
    }
}

/// A registered command ready to run.
pub struct Execution {
    path: CommandPath,
    aliases: Vec<String>,
    parameters: Vec<BoundParameter>,
    handler: Handler,
    permission: Permission,
    usage: String,
    description: Option<String>,
    priority: i32,
    cooldown: Option<Duration>,
}

impl Execution {
    /// Validates `descriptor` and binds every parameter through `registry`.
    pub(crate) fn bind(
        descriptor: &CommandDescriptor,
        registry: &ResolverRegistry,
    ) -> Result<Self, RegistrationError> {
        descriptor.validate()?;
        let path = descriptor.path();
        let handler = descriptor
            .handler_ref()
            .cloned()
            .ok_or_else(|| RegistrationError::invalid_descriptor(path, "no handler was supplied"))?;

        let parameters = descriptor
            .parameters()
            .iter()
            .map(|parameter| bind_parameter(parameter, registry))
            .collect::<Result<Vec<_>, _>>()?;
        check_value_order(parameters.iter().map(BoundParameter::descriptor))
            .map_err(|reason| RegistrationError::invalid_descriptor(path, reason))?;

        let usage = render_usage(path, parameters.iter().map(BoundParameter::descriptor));
        debug!(
            target: REGISTRY_TARGET,
            path = %path,
            usage = %usage,
            "bound command parameters"
        );
        Ok(Self {
            path: path.clone(),
            aliases: descriptor.aliases().to_vec(),
            parameters,
            handler,
            permission: descriptor.permission_requirement().clone(),
            usage,
            description: descriptor.description_text().map(ToOwned::to_owned),
            priority: descriptor.priority_rank(),
            cooldown: descriptor.cooldown_period().filter(|period| !period.is_zero()),
        })
    }

    /// Returns the canonical command path.
    #[must_use]
    pub const fn path(&self) -> &CommandPath {
        &self.path
    }

    /// Returns the aliases of the final path segment.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Returns every parameter in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[BoundParameter] {
        &self.parameters
    }

    /// Returns the command's own permission.
    #[must_use]
    pub const fn permission(&self) -> &Permission {
        &self.permission
    }

    /// Returns the usage line, e.g. `teleport <x> <y> [z]`.
    #[must_use]
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the priority; lower values are tried first.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the per-actor cooldown, if any.
    #[must_use]
    pub const fn cooldown(&self) -> Option<Duration> {
        self.cooldown
    }

    pub(crate) const fn handler(&self) -> &Handler {
        &self.handler
    }

    pub(crate) fn value_parameters(&self) -> impl Iterator<Item = &BoundParameter> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.descriptor.is_value())
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Execution")
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("permission", &self.permission)
            .field("usage", &self.usage)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

fn bind_parameter(
    parameter: &ParameterDescriptor,
    registry: &ResolverRegistry,
) -> Result<BoundParameter, RegistrationError> {
    let unresolvable = || RegistrationError::UnresolvableParameter {
        parameter: parameter.name().to_owned(),
        type_tag: parameter.type_tag().to_string(),
    };
    let mut descriptor = parameter.clone();

    let binding = if parameter.is_context() {
        let resolver = registry.resolve_context(parameter)?.ok_or_else(unresolvable)?;
        Binding::Context(resolver)
    } else {
        match registry.resolve_value(parameter)? {
            Some(resolver) => {
                if resolver.consumes_remaining() {
                    descriptor.mark_greedy();
                }
                Binding::Value(resolver)
            }
            None if parameter.type_tag().is_dynamic() => {
                debug!(
                    target: REGISTRY_TARGET,
                    parameter = parameter.name(),
                    type_tag = %parameter.type_tag(),
                    "deferring unresolvable dynamic parameter"
                );
                Binding::Deferred
            }
            None => return Err(unresolvable()),
        }
    };

    Ok(BoundParameter {
        descriptor,
        binding,
    })
}
