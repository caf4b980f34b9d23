//! Persistence seam for the workflow. Every mutation is version-guarded:
//! the caller states the version it read and the store refuses the write
//! when the row has moved on.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::models::deals::DealStatus;
use crate::models::{deals, milestones, negotiation_events, offers};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{entity} {id} is at version {actual}, expected {expected}")]
    VersionConflict {
        entity: &'static str,
        id: Uuid,
        expected: i32,
        actual: i32,
    },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Event for offer {offer_id} out of order: sequence {sequence} after {last}")]
    OutOfOrder {
        offer_id: Uuid,
        sequence: i32,
        last: i32,
    },

    #[error("Cannot {action} {entity} while it is {from}")]
    Illegal {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// One offer transition: the updated row, the optional negotiation event
/// it produced and, on acceptance, the deal it created. Applied
/// atomically or not at all.
#[derive(Debug, Clone)]
pub struct OfferCommit {
    pub offer: offers::Model,
    pub expected_version: i32,
    pub event: Option<negotiation_events::Model>,
    pub deal: Option<(deals::Model, Vec<milestones::Model>)>,
}

/// One milestone transition. The parent deal is re-read under the same
/// lock or transaction: it must still be Active. With `complete_deal` set,
/// the deal moves to Completed once every one of its milestones is
/// approved.
#[derive(Debug, Clone)]
pub struct MilestoneCommit {
    pub milestone: milestones::Model,
    pub expected_version: i32,
    pub complete_deal: bool,
}

#[derive(Debug, Clone)]
pub struct MilestoneCommitted {
    pub milestone: milestones::Model,
    /// Set when this commit completed the deal.
    pub completed_deal: Option<deals::Model>,
}

fn ensure_open(deal: &deals::Model) -> Result<(), StoreError> {
    if deal.status != DealStatus::Active {
        return Err(StoreError::Illegal {
            entity: "deal",
            from: format!("{:?}", deal.status),
            action: "change milestones of",
        });
    }
    Ok(())
}

fn approved_work_blocks_cancel() -> StoreError {
    StoreError::Illegal {
        entity: "deal",
        from: "Active with approved milestones".to_string(),
        action: "cancel",
    }
}

fn completed(mut deal: deals::Model, at: DateTime<Utc>) -> deals::Model {
    deal.status = DealStatus::Completed;
    deal.version += 1;
    deal.updated_at = at;
    deal
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_offer(&self, offer: offers::Model) -> Result<offers::Model, StoreError>;

    /// Soft-deleted offers are returned; callers decide visibility.
    async fn get_offer(&self, id: Uuid) -> Result<Option<offers::Model>, StoreError>;

    async fn list_offers_for_user(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<offers::Model>, StoreError>;

    /// Live offers awaiting a response whose last send is older than `cutoff`.
    async fn list_offers_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<offers::Model>, StoreError>;

    async fn commit_offer(&self, commit: OfferCommit) -> Result<offers::Model, StoreError>;

    async fn append_event(
        &self,
        event: negotiation_events::Model,
    ) -> Result<negotiation_events::Model, StoreError>;

    /// Events of one offer ordered by sequence ascending.
    async fn list_events(
        &self,
        offer_id: Uuid,
    ) -> Result<Vec<negotiation_events::Model>, StoreError>;

    async fn get_deal(&self, id: Uuid) -> Result<Option<deals::Model>, StoreError>;

    async fn get_deal_by_offer(&self, offer_id: Uuid) -> Result<Option<deals::Model>, StoreError>;

    async fn update_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError>;

    async fn get_milestone(&self, id: Uuid) -> Result<Option<milestones::Model>, StoreError>;

    /// Milestones of one deal ordered by position.
    async fn list_milestones(&self, deal_id: Uuid) -> Result<Vec<milestones::Model>, StoreError>;

    /// Version-guarded like `update_deal`, and refused once any milestone
    /// of the deal is approved.
    async fn cancel_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError>;

    async fn commit_milestone(
        &self,
        commit: MilestoneCommit,
    ) -> Result<MilestoneCommitted, StoreError>;
}
