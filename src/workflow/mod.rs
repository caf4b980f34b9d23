//! Offer negotiation, deal milestones and the submission router.
//!
//! Every operation takes the acting party explicitly and, for mutations,
//! the entity version the caller last observed.

pub mod deals;
pub mod derive;
pub mod history;
pub mod offers;
pub mod router;
pub mod terms;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::offers::PartyRole;
use crate::services::{NotificationKind, Notifier};

pub use deals::{DealLifecycle, DealView, Evidence, EvidenceSettings, ReviewDecision};
pub use history::{NegotiationHistory, Replay};
pub use offers::{DraftChanges, OfferLifecycle, OfferResponse, OfferSettings};
pub use router::{
    MilestoneMode, SubmissionLane, SubmissionReceipt, SubmissionRequest, SubmissionRouter,
    SubmissionTarget,
};

/// The authenticated party performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: PartyRole,
}

impl Actor {
    pub fn new(id: Uuid, role: PartyRole) -> Self {
        Self { id, role }
    }
}

/// Optimistic concurrency check against the version the caller observed.
pub(crate) fn ensure_version(
    entity: &'static str,
    id: Uuid,
    actual: i32,
    expected: i32,
) -> AppResult<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(AppError::StaleVersion {
            entity,
            id,
            expected,
            actual,
        })
    }
}

/// Deliver a notification after a committed transition. Failures are
/// logged and never surface to the caller.
pub(crate) async fn dispatch(
    notifier: &dyn Notifier,
    user_id: Uuid,
    kind: NotificationKind,
    payload: serde_json::Value,
) {
    if let Err(e) = notifier.notify(user_id, kind, payload).await {
        tracing::warn!(%user_id, ?kind, "Notification not delivered: {e}");
    }
}
