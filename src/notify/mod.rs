mod telegram;

use async_trait::async_trait;

pub use telegram::{NotifyError, TelegramNotifier};

/// Outbound text alerts. Delivery is best-effort: implementations log their
/// own failures and only report whether the message went out.
#[async_trait]
pub trait Notifier: Send {
    async fn notify(&mut self, message: &str) -> bool;
}
