//! Dispatcher surface: suggestions, listing, limits, outputs and sharing.

use std::thread;

use rstest::{fixture, rstest};

use super::support::{CallLog, TestActor, dispatcher_with, echoing, recording, returned_text};
use crate::{
    CommandDescriptor, CommandError, CommandPath, DispatchError, DispatchOutcome, Dispatcher,
    DispatcherBuilder, EngineSettings, HandlerOutput, NodeKind, ParameterDescriptor, Pending,
    Permission, RegistrationError, TypeTag, Value,
};

#[fixture]
fn server() -> Dispatcher {
    let log = CallLog::default();
    let mut builder = DispatcherBuilder::new();
    builder
        .group_permission("admin", Permission::node("admin"))
        .expect("group permission applies");
    for command in [
        recording("teleport", "teleport", &log)
            .alias("tp")
            .parameter(ParameterDescriptor::value("x", TypeTag::INT)),
        recording("tell", "tell", &log)
            .parameter(ParameterDescriptor::value("player", TypeTag::STRING))
            .parameter(ParameterDescriptor::value("message", TypeTag::STRING).greedy()),
        recording("warp spawn", "spawn", &log),
        recording("warp home", "home", &log),
        recording("admin reload", "reload", &log).description("Reloads configuration"),
        recording("ban", "ban", &log).permission(Permission::node("mod.ban")),
    ] {
        builder.register(command).expect("command registers");
    }
    builder.build()
}

#[rstest]
#[case::everything("", &["teleport", "tell", "tp", "warp"])]
#[case::prefix("te", &["teleport", "tell"])]
#[case::case_folded("TE", &["teleport", "tell"])]
#[case::subcommands("warp ", &["home", "spawn"])]
#[case::subcommand_prefix("warp h", &["home"])]
#[case::hidden_group("admin ", &[])]
#[case::past_parameters("teleport 1 ", &[])]
#[case::unknown_root("fly ", &[])]
#[case::unclosed_quote("tell \"al", &[])]
fn suggestions_for_guest(server: Dispatcher, #[case] partial: &str, #[case] expected: &[&str]) {
    let guest = TestActor::named("guest");
    assert_eq!(server.suggest(&guest, partial), expected);
}

#[rstest]
#[case::roots("", &["admin", "ban", "teleport", "tell", "tp", "warp"])]
#[case::group("admin ", &["reload"])]
#[case::group_prefix("ADMIN re", &["reload"])]
fn suggestions_follow_permissions(
    server: Dispatcher,
    #[case] partial: &str,
    #[case] expected: &[&str],
) {
    let admin = TestActor::granting("admin", &["admin", "mod.ban"]);
    assert_eq!(server.suggest(&admin, partial), expected);
}

#[rstest]
fn commands_are_listed_in_registration_order(server: Dispatcher) {
    let listed: Vec<(String, &str, Option<&str>)> = server
        .commands()
        .map(|execution| {
            (
                execution.path().to_string(),
                execution.usage(),
                execution.description(),
            )
        })
        .collect();
    assert_eq!(
        listed,
        [
            (String::from("teleport"), "teleport <x>", None),
            (String::from("tell"), "tell <player> <message...>", None),
            (String::from("warp spawn"), "warp spawn", None),
            (String::from("warp home"), "warp home", None),
            (
                String::from("admin reload"),
                "admin reload",
                Some("Reloads configuration")
            ),
            (String::from("ban"), "ban", None),
        ]
    );
}

#[rstest]
fn tree_exposes_literals_and_aliases(server: Dispatcher) {
    let tree = server.tree();
    let canonical = tree
        .lookup(&CommandPath::parse("teleport"))
        .expect("teleport node");
    assert_eq!(tree.lookup(&CommandPath::parse("TP")), Some(canonical));

    let node = tree.node(canonical).expect("node exists");
    match node.kind() {
        NodeKind::Literal { name, aliases } => {
            assert_eq!(name, "teleport");
            assert_eq!(aliases, &[String::from("tp")]);
        }
        other => panic!("expected a literal, got {other:?}"),
    }
    assert!(!node.is_terminal());
    assert_eq!(node.parameters().len(), 1);

    let warp = tree.lookup(&CommandPath::parse("warp")).expect("warp node");
    assert!(!tree.node(warp).expect("node exists").is_terminal());
    assert!(
        tree.lookup(&CommandPath::parse("warp home"))
            .and_then(|id| tree.node(id))
            .is_some_and(crate::CommandNode::is_terminal)
    );
}

#[test]
fn oversized_input_is_rejected_before_tokenizing() {
    let settings = EngineSettings::default().with_max_input_bytes(8);
    let mut builder = DispatcherBuilder::with_settings(settings);
    builder
        .register(
            echoing("say").parameter(ParameterDescriptor::value("m", TypeTag::STRING).greedy()),
        )
        .expect("say registers");
    let dispatcher = builder.build();
    let actor = TestActor::named("steve");

    assert!(dispatcher.dispatch(&actor, "say hey").is_ok());
    match dispatcher.dispatch(&actor, "say \"hello there") {
        Err(DispatchError::Unhandled(CommandError::InputTooLong { size, max_size })) => {
            assert_eq!((size, max_size), (16, 8));
        }
        other => panic!("expected oversized input, got {other:?}"),
    }
}

#[test]
fn parameterless_command_runs_with_no_arguments() {
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("spawn")
            .handler(|invocation| {
                Ok(HandlerOutput::Value(Value::new(invocation.arguments().is_empty())))
            }),
    ]);
    let DispatchOutcome::Invoked(HandlerOutput::Value(value)) = dispatcher
        .dispatch(&TestActor::named("steve"), "spawn")
        .expect("spawn dispatches")
    else {
        panic!("expected a returned flag");
    };
    assert_eq!(value.downcast_ref::<bool>(), Some(&true));
}

#[test]
fn deferred_output_is_completed_by_the_caller() {
    let dispatcher = dispatcher_with(vec![
        CommandDescriptor::new("backup")
            .parameter(ParameterDescriptor::value("world", TypeTag::STRING))
            .handler(|invocation| {
                let world = invocation
                    .get::<String>("world")
                    .cloned()
                    .unwrap_or_default();
                Ok(HandlerOutput::Deferred(Pending::new(move || {
                    Ok(HandlerOutput::Value(Value::new(format!("saved {world}"))))
                })))
            }),
    ]);

    let outcome = dispatcher
        .dispatch(&TestActor::named("steve"), "backup overworld")
        .expect("backup dispatches");
    let DispatchOutcome::Invoked(HandlerOutput::Deferred(pending)) = outcome else {
        panic!("expected deferred work");
    };
    let completed = pending.complete().expect("deferred work completes");
    assert_eq!(
        returned_text(DispatchOutcome::Invoked(completed)),
        "saved overworld"
    );
}

#[test]
fn descriptor_without_handler_is_rejected() {
    let mut builder = DispatcherBuilder::new();
    let error = builder
        .register(CommandDescriptor::new("ghost"))
        .expect_err("handler is required");
    assert!(matches!(error, RegistrationError::InvalidDescriptor { .. }));
}

#[test]
fn dispatcher_is_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Dispatcher>();

    let dispatcher = dispatcher_with(vec![
        echoing("add")
            .parameter(ParameterDescriptor::value("a", TypeTag::INT))
            .parameter(ParameterDescriptor::value("b", TypeTag::INT)),
    ]);

    thread::scope(|scope| {
        let workers: Vec<_> = (0..8_i64)
            .map(|worker| {
                let dispatcher = &dispatcher;
                scope.spawn(move || {
                    let actor = TestActor::named(&format!("worker-{worker}"));
                    (0..50_i64)
                        .map(|round| {
                            let input = format!("add {worker} {round}");
                            let outcome = dispatcher
                                .dispatch(&actor, &input)
                                .expect("add dispatches");
                            returned_text(outcome) == format!("a={worker} b={round}")
                        })
                        .all(|matched| matched)
                })
            })
            .collect();
        for worker in workers {
            assert!(worker.join().expect("worker finishes"));
        }
    });
}
