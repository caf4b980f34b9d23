use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("Notification dispatch failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OfferReceived,
    OfferCountered,
    OfferAccepted,
    OfferRejected,
    OfferExpired,
    MilestoneSubmitted,
    MilestoneApproved,
    MilestoneRejected,
    ContentSubmitted,
    ContentReviewed,
    ProofSubmitted,
    DealCancelled,
}

/// Fire-and-forget delivery to a user. A failure here never undoes the
/// transition that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Writes notifications to the log. Used until a push provider is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        info!(%user_id, ?kind, %payload, "notification");
        Ok(())
    }
}
