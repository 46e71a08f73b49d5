//! The capability object representing whoever issued a command.

/// Capability object supplied by the platform adapter.
///
/// The engine only needs an identity and a permission check. The message
/// methods are used by the default failure replies and do nothing unless the
/// adapter overrides them.
pub trait Actor {
    /// Returns a stable identity for the actor.
    fn name(&self) -> &str;

    /// Returns `true` when the actor holds `permission`.
    fn has_permission(&self, permission: &str) -> bool;

    /// Sends an informational message to the actor.
    fn reply(&self, message: &str) {
        let _ = message;
    }

    /// Sends an error message to the actor.
    fn error(&self, message: &str) {
        self.reply(message);
    }
}
