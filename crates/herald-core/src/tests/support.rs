//! Shared fixtures for dispatcher tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::{
    Actor, CommandDescriptor, DispatchOutcome, Dispatcher, DispatcherBuilder, HandlerOutput,
    Invocation, Value,
};

/// Actor holding a fixed permission set and recording every message sent to
/// it.
#[derive(Debug, Default)]
pub(super) struct TestActor {
    name: String,
    granted: HashSet<String>,
    messages: Mutex<Vec<String>>,
}

impl TestActor {
    pub(super) fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub(super) fn granting(name: &str, permissions: &[&str]) -> Self {
        Self {
            name: name.to_owned(),
            granted: permissions.iter().map(|&permission| permission.to_owned()).collect(),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("messages lock").clone()
    }
}

impl Actor for TestActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.granted.contains(permission)
    }

    fn reply(&self, message: &str) {
        self.messages.lock().expect("messages lock").push(message.to_owned());
    }
}

/// Records which command ran together with a rendering of its arguments.
#[derive(Debug, Clone, Default)]
pub(super) struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub(super) fn record(&self, entry: impl Into<String>) {
        self.0.lock().expect("call log lock").push(entry.into());
    }

    pub(super) fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log lock").clone()
    }
}

/// Builds a command whose handler records `label` in `log`.
pub(super) fn recording(path: &str, label: &str, log: &CallLog) -> CommandDescriptor {
    let log = log.clone();
    let label = label.to_owned();
    CommandDescriptor::new(path).handler(move |_| {
        log.record(label.clone());
        Ok(HandlerOutput::Unit)
    })
}

/// Builds a command that returns its arguments rendered as text.
pub(super) fn echoing(path: &str) -> CommandDescriptor {
    CommandDescriptor::new(path).handler(|invocation| {
        Ok(HandlerOutput::Value(Value::new(render_arguments(invocation))))
    })
}

/// Renders arguments as `name=value` pairs in resolution order.
pub(super) fn render_arguments(invocation: &Invocation<'_>) -> String {
    invocation
        .arguments()
        .iter()
        .map(|(name, value)| format!("{name}={}", render_value(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(value: &Value) -> String {
    if let Some(text) = value.downcast_ref::<String>() {
        return text.clone();
    }
    if let Some(number) = value.downcast_ref::<i64>() {
        return number.to_string();
    }
    if let Some(number) = value.downcast_ref::<i32>() {
        return number.to_string();
    }
    if let Some(number) = value.downcast_ref::<u32>() {
        return number.to_string();
    }
    if let Some(number) = value.downcast_ref::<f64>() {
        return number.to_string();
    }
    if let Some(flag) = value.downcast_ref::<bool>() {
        return flag.to_string();
    }
    if let Some(items) = value.downcast_ref::<Vec<Value>>() {
        let rendered: Vec<String> = items.iter().map(render_value).collect();
        return format!("[{}]", rendered.join(","));
    }
    String::from("?")
}

/// Registers every descriptor on a default builder and freezes it.
pub(super) fn dispatcher_with(commands: Vec<CommandDescriptor>) -> Dispatcher {
    let mut builder = DispatcherBuilder::new();
    for command in commands {
        builder.register(command).expect("command registers");
    }
    builder.build()
}

/// Extracts the text value returned by an echoing handler.
pub(super) fn returned_text(outcome: DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Invoked(HandlerOutput::Value(value)) => value
            .downcast_ref::<String>()
            .cloned()
            .expect("handler returned text"),
        other => panic!("expected a returned value, got {other:?}"),
    }
}
