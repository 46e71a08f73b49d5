//! Resolver selection, built-in resolvers, defaults and validators.

use std::sync::Arc;

use rstest::rstest;

use super::support::{TestActor, dispatcher_with, echoing, returned_text};
use crate::{
    Actor, ActorName, BoundParameter, CommandDescriptor, CommandError, CommandPath, DispatchError,
    DispatchOutcome, DispatcherBuilder, EngineSettings, EnumVariant, ErrorKind, Execution,
    HandlerOutput, InvocationInfo, LengthValidator, ParameterDescriptor, ParameterValidator,
    RangeValidator, RegistrationError, ResolveContext, ResolverConflictPolicy, ResolverEntry,
    ResolverRegistry, TokenCursor, TypeTag, Value, ValueResolver, ValueResolverFactory,
};

fn unhandled(result: Result<DispatchOutcome, DispatchError>) -> CommandError {
    match result {
        Err(DispatchError::Unhandled(error)) => error,
        other => panic!("expected an unhandled failure, got {other:?}"),
    }
}

/// Resolves any token to a fixed label so tests can see which entry won.
struct Labelled(&'static str);

impl ValueResolver for Labelled {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        cursor.require(context.parameter().name())?;
        Ok(Value::new(self.0.to_owned()))
    }
}

fn is_coordinate(parameter: &ParameterDescriptor) -> bool {
    parameter.type_tag().name() == "coordinate"
}

#[rstest]
#[case::int(TypeTag::INT, "-42", "n=-42")]
#[case::i32(TypeTag::I32, "7", "n=7")]
#[case::u32(TypeTag::U32, "4000000000", "n=4000000000")]
#[case::float(TypeTag::FLOAT, "2.5", "n=2.5")]
#[case::bool_yes(TypeTag::BOOL, "YES", "n=true")]
#[case::bool_nope(TypeTag::BOOL, "nope", "n=false")]
#[case::string(TypeTag::STRING, "text", "n=text")]
fn builtin_resolvers_parse_tokens(
    #[case] type_tag: TypeTag,
    #[case] token: &str,
    #[case] expected: &str,
) {
    let dispatcher = dispatcher_with(vec![
        echoing("value").parameter(ParameterDescriptor::value("n", type_tag)),
    ]);
    let actor = TestActor::named("steve");
    let outcome = dispatcher
        .dispatch(&actor, &format!("value {token}"))
        .expect("value dispatches");
    assert_eq!(returned_text(outcome), expected);
}

#[rstest]
#[case::int_text(TypeTag::INT, "abc", ErrorKind::INVALID_NUMBER)]
#[case::u32_negative(TypeTag::U32, "-1", ErrorKind::INVALID_NUMBER)]
#[case::i32_overflow(TypeTag::I32, "3000000000", ErrorKind::INVALID_NUMBER)]
#[case::float_nan(TypeTag::FLOAT, "NaN", ErrorKind::INVALID_NUMBER)]
#[case::float_infinite(TypeTag::FLOAT, "inf", ErrorKind::INVALID_NUMBER)]
#[case::bool_word(TypeTag::BOOL, "maybe", ErrorKind::INVALID_BOOLEAN)]
fn builtin_resolvers_reject_bad_tokens(
    #[case] type_tag: TypeTag,
    #[case] token: &str,
    #[case] expected: ErrorKind,
) {
    let dispatcher = dispatcher_with(vec![
        echoing("value").parameter(ParameterDescriptor::value("n", type_tag)),
    ]);
    let actor = TestActor::named("steve");
    let error = unhandled(dispatcher.dispatch(&actor, &format!("value {token}")));
    assert_eq!(error.kind(), expected);
}

#[test]
fn enumerations_match_variants_ignoring_case() {
    let mode = TypeTag::enumeration("gamemode", ["Survival", "Creative", "Adventure"]);
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("gamemode")
            .parameter(ParameterDescriptor::value("mode", mode))
            .handler(|invocation| {
                let variant = invocation
                    .get::<EnumVariant>("mode")
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("mode missing"))?;
                Ok(HandlerOutput::Value(Value::new(variant)))
            }),
    ]);
    let actor = TestActor::named("steve");

    let DispatchOutcome::Invoked(HandlerOutput::Value(value)) = dispatcher
        .dispatch(&actor, "gamemode creative")
        .expect("gamemode dispatches")
    else {
        panic!("expected a returned variant");
    };
    assert_eq!(
        value.downcast_ref::<EnumVariant>(),
        Some(&EnumVariant {
            index: 1,
            name: String::from("Creative"),
        })
    );

    match unhandled(dispatcher.dispatch(&actor, "gamemode hardcore")) {
        CommandError::InvalidEnumValue {
            input, expected, ..
        } => {
            assert_eq!(input, "hardcore");
            assert_eq!(expected, ["Survival", "Creative", "Adventure"]);
        }
        other => panic!("expected invalid enum value, got {other:?}"),
    }
}

#[test]
fn lists_consume_remaining_tokens_with_element_resolver() {
    let dispatcher = dispatcher_with(vec![
        echoing("sum").parameter(ParameterDescriptor::value("values", TypeTag::list(TypeTag::INT))),
    ]);
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "sum 1 2 3").expect("sum dispatches");
    assert_eq!(returned_text(outcome), "values=[1,2,3]");

    let usage: Vec<&str> = dispatcher.commands().map(Execution::usage).collect();
    assert_eq!(usage, ["sum <values...>"]);

    let error = unhandled(dispatcher.dispatch(&actor, "sum 1 two"));
    assert_eq!(error.kind(), ErrorKind::INVALID_NUMBER);
}

#[test]
fn context_parameters_consume_no_input() {
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("whoami")
            .parameter(ParameterDescriptor::context("me", TypeTag::ACTOR))
            .parameter(ParameterDescriptor::context("call", TypeTag::INVOCATION))
            .handler(|invocation| {
                let me = invocation
                    .get::<ActorName>("me")
                    .ok_or_else(|| anyhow::anyhow!("actor missing"))?;
                let call = invocation
                    .get::<InvocationInfo>("call")
                    .ok_or_else(|| anyhow::anyhow!("invocation missing"))?;
                Ok(HandlerOutput::Value(Value::new(format!(
                    "{} via {} ({})",
                    me.0, call.path, call.input
                ))))
            }),
    ]);
    let actor = TestActor::named("alex");

    let outcome = dispatcher.dispatch(&actor, "WhoAmI").expect("whoami dispatches");
    assert_eq!(returned_text(outcome), "alex via whoami (WhoAmI)");

    let error = unhandled(dispatcher.dispatch(&actor, "whoami extra"));
    assert_eq!(error.kind(), ErrorKind::TOO_MANY_ARGUMENTS);
}

#[test]
fn lower_priority_value_overrides_builtin() {
    let mut builder = DispatcherBuilder::new();
    builder
        .register_resolver(ResolverEntry::value(TypeTag::STRING, Labelled("custom")))
        .expect("resolver registers");
    builder
        .register(echoing("say").parameter(ParameterDescriptor::value("word", TypeTag::STRING)))
        .expect("say registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "say hi").expect("say dispatches");
    assert_eq!(returned_text(outcome), "word=custom");
}

#[test]
fn first_applicable_entry_wins_across_priorities() {
    let mut builder = DispatcherBuilder::new();
    builder
        .register_resolver(
            ResolverEntry::value_when("late", is_coordinate, Labelled("late")).with_priority(50),
        )
        .expect("late registers");
    builder
        .register_resolver(
            ResolverEntry::value_when("early", is_coordinate, Labelled("early")).with_priority(-5),
        )
        .expect("early registers");
    builder
        .register(
            echoing("goto").parameter(ParameterDescriptor::value("at", TypeTag::new("coordinate"))),
        )
        .expect("goto registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "goto 10").expect("goto dispatches");
    assert_eq!(returned_text(outcome), "at=early");
}

#[test]
fn equal_priority_ambiguity_is_rejected() {
    let mut builder = DispatcherBuilder::new();
    for label in ["first", "second"] {
        builder
            .register_resolver(ResolverEntry::value_when(label, is_coordinate, Labelled(label)))
            .expect("predicate entry registers");
    }

    let error = builder
        .register(
            echoing("goto").parameter(ParameterDescriptor::value("at", TypeTag::new("coordinate"))),
        )
        .expect_err("ambiguous resolvers");
    match error {
        RegistrationError::ConflictingResolvers {
            parameter,
            first,
            second,
            ..
        } => {
            assert_eq!(parameter, "at");
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("expected conflicting resolvers, got {other:?}"),
    }
}

#[test]
fn first_registered_policy_resolves_ambiguity() {
    let settings = EngineSettings::default()
        .with_resolver_conflicts(ResolverConflictPolicy::FirstRegisteredWins);
    let mut builder = DispatcherBuilder::with_settings(settings);
    for label in ["first", "second"] {
        builder
            .register_resolver(ResolverEntry::value_when(label, is_coordinate, Labelled(label)))
            .expect("predicate entry registers");
    }
    builder
        .register(
            echoing("goto").parameter(ParameterDescriptor::value("at", TypeTag::new("coordinate"))),
        )
        .expect("goto registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "goto 1").expect("goto dispatches");
    assert_eq!(returned_text(outcome), "at=first");
}

#[rstest]
#[case::reject(ResolverConflictPolicy::Reject, false)]
#[case::first_wins(ResolverConflictPolicy::FirstRegisteredWins, true)]
fn duplicate_keyed_registration_follows_policy(
    #[case] policy: ResolverConflictPolicy,
    #[case] accepted: bool,
) {
    let mut registry = ResolverRegistry::new(policy);
    registry
        .register(ResolverEntry::value(TypeTag::new("colour"), Labelled("a")))
        .expect("first entry registers");
    let outcome = registry.register(ResolverEntry::value(TypeTag::new("colour"), Labelled("b")));
    assert_eq!(outcome.is_ok(), accepted);
}

#[test]
fn unknown_static_type_fails_registration() {
    let mut builder = DispatcherBuilder::new();
    let error = builder
        .register(
            echoing("warp").parameter(ParameterDescriptor::value("to", TypeTag::new("location"))),
        )
        .expect_err("no resolver for location");
    assert!(matches!(
        error,
        RegistrationError::UnresolvableParameter { ref parameter, .. } if parameter == "to"
    ));
    assert!(builder.tree().is_empty());
}

#[test]
fn unresolvable_dynamic_type_fails_at_dispatch() {
    let dynamic = TypeTag::list(TypeTag::new("location"));
    let dispatcher = dispatcher_with(vec![
        echoing("route").parameter(ParameterDescriptor::value("stops", dynamic)),
    ]);
    let execution = dispatcher.commands().next().expect("route registered");
    assert!(execution.parameters().first().is_some_and(BoundParameter::is_deferred));

    let actor = TestActor::named("steve");
    match unhandled(dispatcher.dispatch(&actor, "route spawn")) {
        CommandError::UnresolvableParameter { parameter, type_tag } => {
            assert_eq!(parameter, "stops");
            assert_eq!(type_tag, "list<location>");
        }
        other => panic!("expected unresolvable parameter, got {other:?}"),
    }
}

/// Builds resolvers for `pair<T>` from the resolver of `T`; a pair takes the
/// last two tokens of the input.
struct PairFactory;

struct PairResolver(Arc<dyn ValueResolver>);

impl ValueResolver for PairResolver {
    fn resolve(
        &self,
        cursor: &mut TokenCursor<'_>,
        context: &ResolveContext<'_>,
    ) -> Result<Value, CommandError> {
        let first = self.0.resolve(cursor, context)?;
        let second = self.0.resolve(cursor, context)?;
        Ok(Value::new(vec![first, second]))
    }

    fn consumes_remaining(&self) -> bool {
        true
    }
}

impl ValueResolverFactory for PairFactory {
    fn create(
        &self,
        parameter: &ParameterDescriptor,
        registry: &ResolverRegistry,
    ) -> Result<Option<Arc<dyn ValueResolver>>, RegistrationError> {
        let Some(element) = parameter.type_tag().arguments().first() else {
            return Ok(None);
        };
        let element = ParameterDescriptor::value(parameter.name(), element.clone());
        Ok(registry
            .resolve_value(&element)?
            .map(|resolver| Arc::new(PairResolver(resolver)) as Arc<dyn ValueResolver>))
    }
}

#[test]
fn factories_build_resolvers_from_element_types() {
    let mut builder = DispatcherBuilder::new();
    builder
        .register_resolver(ResolverEntry::value_factory(
            "pair",
            |parameter: &ParameterDescriptor| parameter.type_tag().name() == "pair",
            PairFactory,
        ))
        .expect("factory registers");
    builder
        .register(
            echoing("span")
                .parameter(ParameterDescriptor::value("label", TypeTag::STRING))
                .parameter(ParameterDescriptor::value(
                    "range",
                    TypeTag::new("pair").with_argument(TypeTag::INT),
                )),
        )
        .expect("span registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "span ruler 3 9").expect("span dispatches");
    assert_eq!(returned_text(outcome), "label=ruler range=[3,9]");

    let error = unhandled(dispatcher.dispatch(&actor, "span ruler 3 9 12"));
    assert_eq!(error.kind(), ErrorKind::TOO_MANY_ARGUMENTS);
}

#[test]
fn defaults_come_from_values_and_providers() {
    let dispatcher = dispatcher_with(vec![
        echoing("give")
            .parameter(ParameterDescriptor::value("item", TypeTag::STRING))
            .parameter(
                ParameterDescriptor::value("count", TypeTag::INT).default_value(Value::new(1_i64)),
            )
            .parameter(ParameterDescriptor::value("target", TypeTag::STRING).default_with(
                |context: &ResolveContext<'_>| {
                    Ok(Value::new(context.actor().name().to_owned()))
                },
            )),
    ]);
    let actor = TestActor::named("alex");

    let outcome = dispatcher.dispatch(&actor, "give apple").expect("give dispatches");
    assert_eq!(returned_text(outcome), "item=apple count=1 target=alex");

    let outcome = dispatcher.dispatch(&actor, "give apple 3 steve").expect("give dispatches");
    assert_eq!(returned_text(outcome), "item=apple count=3 target=steve");
}

#[test]
fn optional_parameter_without_default_is_absent() {
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("kick")
            .parameter(ParameterDescriptor::value("player", TypeTag::STRING))
            .parameter(ParameterDescriptor::value("reason", TypeTag::STRING).optional())
            .handler(|invocation| {
                Ok(HandlerOutput::Value(Value::new(
                    invocation.arguments().contains("reason"),
                )))
            }),
    ]);
    let actor = TestActor::named("steve");

    let DispatchOutcome::Invoked(HandlerOutput::Value(value)) =
        dispatcher.dispatch(&actor, "kick alex").expect("kick dispatches")
    else {
        panic!("expected a returned flag");
    };
    assert_eq!(value.downcast_ref::<bool>(), Some(&false));
}

#[test]
fn context_resolvers_see_earlier_arguments() {
    let mut builder = DispatcherBuilder::new();
    builder
        .register_resolver(ResolverEntry::context_fn(TypeTag::new("shout"), |context| {
            let word = context
                .arguments()
                .get::<String>("word")
                .cloned()
                .unwrap_or_default();
            Ok(Value::new(word.to_uppercase()))
        }))
        .expect("context resolver registers");
    builder
        .register(
            echoing("yell")
                .parameter(ParameterDescriptor::value("word", TypeTag::STRING))
                .parameter(ParameterDescriptor::context("loud", TypeTag::new("shout"))),
        )
        .expect("yell registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    let outcome = dispatcher.dispatch(&actor, "yell hey").expect("yell dispatches");
    assert_eq!(returned_text(outcome), "word=hey loud=HEY");
}

#[rstest]
#[case::in_range("give 64", None)]
#[case::too_large("give 65", Some(ErrorKind::NUMBER_NOT_IN_RANGE))]
#[case::too_small("give 0", Some(ErrorKind::NUMBER_NOT_IN_RANGE))]
fn range_validator_bounds_numbers(#[case] input: &str, #[case] failure: Option<ErrorKind>) {
    let dispatcher = dispatcher_with(vec![echoing("give").parameter(
        ParameterDescriptor::value("amount", TypeTag::INT)
            .validator(RangeValidator::new(1.0, 64.0)),
    )]);
    let actor = TestActor::named("steve");
    let result = dispatcher.dispatch(&actor, input);
    match failure {
        None => assert!(result.expect("in range").is_invoked()),
        Some(kind) => assert_eq!(unhandled(result).kind(), kind),
    }
}

#[test]
fn length_validator_counts_characters() {
    let dispatcher = dispatcher_with(vec![echoing("nick").parameter(
        ParameterDescriptor::value("name", TypeTag::STRING).validator(LengthValidator::new(3, 5)),
    )]);
    let actor = TestActor::named("steve");

    assert!(dispatcher.dispatch(&actor, "nick héllo").expect("five chars").is_invoked());
    match unhandled(dispatcher.dispatch(&actor, "nick ab")) {
        CommandError::InvalidLength { length, min, max, .. } => {
            assert_eq!((length, min, max), (2, 3, 5));
        }
        other => panic!("expected invalid length, got {other:?}"),
    }
}

/// Rejects words on a fixed block list.
struct Blocklist(&'static [&'static str]);

impl ParameterValidator for Blocklist {
    fn validate(
        &self,
        value: &Value,
        _actor: &dyn Actor,
        parameter: &ParameterDescriptor,
    ) -> Result<(), CommandError> {
        match value.downcast_ref::<String>() {
            Some(word) if self.0.contains(&word.as_str()) => Err(CommandError::validation(
                parameter.name(),
                format!("'{word}' is not allowed"),
            )),
            _ => Ok(()),
        }
    }
}

#[test]
fn custom_validators_run_in_order_after_resolution() {
    let dispatcher = dispatcher_with(vec![echoing("name").parameter(
        ParameterDescriptor::value("pet", TypeTag::STRING)
            .validator(LengthValidator::new(1, 8))
            .validator(Blocklist(&["admin"])),
    )]);
    let actor = TestActor::named("steve");

    assert!(dispatcher.dispatch(&actor, "name rex").expect("allowed").is_invoked());
    let rejected = unhandled(dispatcher.dispatch(&actor, "name admin"));
    assert_eq!(rejected.kind(), ErrorKind::VALIDATION);
    assert_eq!(rejected.to_string(), "invalid value for 'pet': 'admin' is not allowed");

    let too_long = unhandled(dispatcher.dispatch(&actor, "name administrator"));
    assert_eq!(too_long.kind(), ErrorKind::INVALID_LENGTH);
}

#[test]
fn invocation_metadata_records_canonical_path() {
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("teleport")
            .alias("tp")
            .parameter(ParameterDescriptor::context("call", TypeTag::INVOCATION))
            .handler(|invocation| {
                let call = invocation
                    .get::<InvocationInfo>("call")
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("invocation missing"))?;
                Ok(HandlerOutput::Value(Value::new(call)))
            }),
    ]);
    let actor = TestActor::named("steve");

    let DispatchOutcome::Invoked(HandlerOutput::Value(value)) =
        dispatcher.dispatch(&actor, "tp").expect("tp dispatches")
    else {
        panic!("expected invocation info");
    };
    let info = value.downcast_ref::<InvocationInfo>().expect("invocation info");
    assert_eq!(info.path, CommandPath::parse("teleport"));
    assert_eq!(info.input, "tp");
}
