use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum NotifierError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Out-of-band delivery of verification codes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifierError>;
}

/// Writes messages to the log instead of delivering them. For development.
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifierError> {
        tracing::info!(recipient, subject, body, "Notification");
        Ok(())
    }
}
