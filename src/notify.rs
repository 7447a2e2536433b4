use log::{info, warn};

/// Capability interface for the push-notification collaborator.
///
/// Dispatch is fire-and-forget: implementations report nothing back and must
/// swallow their own failures, a lost notification never fails the state
/// mutation it follows. Callers invoke this only after the mutation has
/// committed.
pub trait Notifier: Send + Sync {
    fn notify_user(&self, user_id: &str, title: &str, body: &str);
}

/// Notifier that writes to the log instead of a push gateway. Stands in for
/// the real sender in development and tests.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_user(&self, user_id: &str, title: &str, body: &str) {
        info!("notify {}: {} - {}", user_id, title, body);
    }
}

/// Notifier that drops everything, with a trace of what was dropped.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify_user(&self, user_id: &str, title: &str, _body: &str) {
        warn!("notifications disabled, dropping '{}' for {}", title, user_id);
    }
}
