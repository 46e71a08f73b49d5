//! End-to-end embedding: settings loaded from disk drive a dispatcher.

use std::fs;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use herald::{
    Actor, CommandDescriptor, DispatchOutcome, DispatcherBuilder, EngineSettings, ErrorKind,
    GENERIC_FAILURE_REPLY, HandlerOutput, ParameterDescriptor, ResolverConflictPolicy, TypeTag,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[derive(Default)]
struct Console {
    messages: Mutex<Vec<String>>,
}

impl Console {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl Actor for Console {
    fn name(&self) -> &str {
        "console"
    }

    fn has_permission(&self, _permission: &str) -> bool {
        true
    }

    fn reply(&self, message: &str) {
        self.messages.lock().expect("messages lock").push(message.to_owned());
    }
}

struct SettingsFile {
    _dir: TempDir,
    path: Utf8PathBuf,
}

#[fixture]
fn settings_file() -> SettingsFile {
    let dir = TempDir::new().expect("create temp dir");
    let path = Utf8PathBuf::from_path_buf(dir.path().join("herald.toml"))
        .expect("temp path is UTF-8");
    fs::write(
        &path,
        concat!(
            "reply_on_failure = true\n",
            "max_input_bytes = 32\n",
            "resolver_conflicts = \"first_registered_wins\"\n",
        ),
    )
    .expect("write settings");
    SettingsFile { _dir: dir, path }
}

fn dispatcher_from(settings: EngineSettings) -> herald::Dispatcher {
    let mut builder = DispatcherBuilder::with_settings(settings);
    builder
        .register(
            CommandDescriptor::new("add")
                .parameter(ParameterDescriptor::value("a", TypeTag::INT))
                .parameter(ParameterDescriptor::value("b", TypeTag::INT))
                .handler(|invocation| {
                    let a = invocation.get::<i64>("a").copied().unwrap_or_default();
                    let b = invocation.get::<i64>("b").copied().unwrap_or_default();
                    invocation.actor().reply(&(a + b).to_string());
                    Ok(HandlerOutput::Unit)
                }),
        )
        .expect("add registers");
    builder
        .register(
            CommandDescriptor::new("explode")
                .handler(|_| Err(anyhow::anyhow!("storage offline"))),
        )
        .expect("explode registers");
    builder.build()
}

#[rstest]
fn loaded_settings_reach_the_dispatcher(settings_file: SettingsFile) {
    let settings = EngineSettings::load(&settings_file.path).expect("settings load");
    assert_eq!(settings.max_input_bytes(), 32);
    assert_eq!(
        settings.resolver_conflicts(),
        ResolverConflictPolicy::FirstRegisteredWins
    );

    let dispatcher = dispatcher_from(settings);
    let console = Console::default();
    let outcome = dispatcher.dispatch(&console, "add 2 40").expect("add dispatches");
    assert!(outcome.is_invoked());
    assert_eq!(console.messages(), vec![String::from("42")]);
}

#[rstest]
#[case::parse_failure("add 2", "missing required argument 'b'", ErrorKind::NOT_ENOUGH_ARGUMENTS)]
#[case::handler_failure("explode", GENERIC_FAILURE_REPLY, ErrorKind::INVOCATION)]
#[case::oversized(
    "add 1111111111 2222222222 3333333333",
    "input of 36 bytes exceeds the 32 byte limit",
    ErrorKind::INPUT_TOO_LONG
)]
fn default_replies_tell_the_actor(
    settings_file: SettingsFile,
    #[case] input: &str,
    #[case] reply: &str,
    #[case] kind: ErrorKind,
) {
    let settings = EngineSettings::load(&settings_file.path).expect("settings load");
    let dispatcher = dispatcher_from(settings);
    let console = Console::default();

    match dispatcher.dispatch(&console, input).expect("failure is handled") {
        DispatchOutcome::Handled {
            kind: routed,
            handler_kind,
        } => {
            assert_eq!(routed, kind);
            let expected_handler = if kind == ErrorKind::INVOCATION {
                ErrorKind::INVOCATION
            } else {
                ErrorKind::FAILURE
            };
            assert_eq!(handler_kind, expected_handler);
        }
        other => panic!("expected a handled failure, got {other:?}"),
    }
    assert_eq!(console.messages(), vec![reply.to_owned()]);
}
