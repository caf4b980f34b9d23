use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, SqlErr, TransactionTrait};
use uuid::Uuid;

use super::{
    MilestoneCommit, MilestoneCommitted, OfferCommit, Store, StoreError,
    approved_work_blocks_cancel, completed, ensure_open,
};
use crate::db;
use crate::models::milestones::MilestoneStatus;
use crate::models::{deals, milestones, negotiation_events, offers};

/// `Store` backed by Postgres through SeaORM.
#[derive(Clone)]
pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn map_insert_error(err: DbErr, what: String) -> StoreError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => StoreError::Duplicate(what),
        _ => StoreError::Database(err),
    }
}

async fn offer_conflict<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected: i32,
) -> Result<StoreError, StoreError> {
    Ok(match db::offers::get_offer_by_id(conn, id).await? {
        Some(current) => StoreError::VersionConflict {
            entity: "offer",
            id,
            expected,
            actual: current.version,
        },
        None => StoreError::NotFound { entity: "offer", id },
    })
}

async fn deal_conflict<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
    expected: i32,
) -> Result<StoreError, StoreError> {
    Ok(match db::deals::get_deal_by_id(conn, id).await? {
        Some(current) => StoreError::VersionConflict {
            entity: "deal",
            id,
            expected,
            actual: current.version,
        },
        None => StoreError::NotFound { entity: "deal", id },
    })
}

async fn append_event_in<C: ConnectionTrait>(
    conn: &C,
    event: negotiation_events::Model,
) -> Result<negotiation_events::Model, StoreError> {
    let last = db::negotiation_events::last_sequence(conn, event.offer_id).await?;
    if event.sequence <= last {
        return Err(StoreError::OutOfOrder {
            offer_id: event.offer_id,
            sequence: event.sequence,
            last,
        });
    }

    let what = format!("event {} for offer {}", event.sequence, event.offer_id);
    db::negotiation_events::insert_event(conn, event)
        .await
        .map_err(|e| map_insert_error(e, what))
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_offer(&self, offer: offers::Model) -> Result<offers::Model, StoreError> {
        let what = format!("offer {}", offer.id);
        db::offers::insert_offer(&self.db, offer)
            .await
            .map_err(|e| map_insert_error(e, what))
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<offers::Model>, StoreError> {
        Ok(db::offers::get_offer_by_id(&self.db, id).await?)
    }

    async fn list_offers_for_user(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<offers::Model>, StoreError> {
        Ok(db::offers::get_offers_for_user(&self.db, user_id, offset, limit).await?)
    }

    async fn list_offers_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<offers::Model>, StoreError> {
        Ok(db::offers::get_offers_sent_before(&self.db, cutoff).await?)
    }

    async fn commit_offer(&self, commit: OfferCommit) -> Result<offers::Model, StoreError> {
        let txn = self.db.begin().await?;
        let id = commit.offer.id;

        let written =
            db::offers::update_offer_if_version(&txn, commit.offer.clone(), commit.expected_version)
                .await?;
        if written == 0 {
            let err = offer_conflict(&txn, id, commit.expected_version).await?;
            txn.rollback().await?;
            return Err(err);
        }

        if let Some(event) = commit.event {
            append_event_in(&txn, event).await?;
        }

        if let Some((deal, milestones)) = commit.deal {
            let what = format!("deal for offer {}", deal.offer_id);
            db::deals::insert_deal(&txn, deal)
                .await
                .map_err(|e| map_insert_error(e, what))?;
            db::milestones::insert_milestones(&txn, milestones).await?;
        }

        txn.commit().await?;
        Ok(commit.offer)
    }

    async fn append_event(
        &self,
        event: negotiation_events::Model,
    ) -> Result<negotiation_events::Model, StoreError> {
        let txn = self.db.begin().await?;
        let event = append_event_in(&txn, event).await?;
        txn.commit().await?;
        Ok(event)
    }

    async fn list_events(
        &self,
        offer_id: Uuid,
    ) -> Result<Vec<negotiation_events::Model>, StoreError> {
        Ok(db::negotiation_events::get_events_by_offer(&self.db, offer_id).await?)
    }

    async fn get_deal(&self, id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        Ok(db::deals::get_deal_by_id(&self.db, id).await?)
    }

    async fn get_deal_by_offer(&self, offer_id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        Ok(db::deals::get_deal_by_offer_id(&self.db, offer_id).await?)
    }

    async fn update_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        let id = deal.id;
        let written =
            db::deals::update_deal_if_version(&self.db, deal.clone(), expected_version).await?;
        if written == 0 {
            return Err(deal_conflict(&self.db, id, expected_version).await?);
        }
        Ok(deal)
    }

    async fn get_milestone(&self, id: Uuid) -> Result<Option<milestones::Model>, StoreError> {
        Ok(db::milestones::get_milestone_by_id(&self.db, id).await?)
    }

    async fn list_milestones(&self, deal_id: Uuid) -> Result<Vec<milestones::Model>, StoreError> {
        Ok(db::milestones::get_milestones_by_deal(&self.db, deal_id).await?)
    }

    async fn cancel_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        let txn = self.db.begin().await?;
        let id = deal.id;

        if db::deals::lock_deal_by_id(&txn, id).await?.is_none() {
            txn.rollback().await?;
            return Err(StoreError::NotFound { entity: "deal", id });
        }
        let milestones = db::milestones::get_milestones_by_deal(&txn, id).await?;
        if milestones
            .iter()
            .any(|m| m.status == MilestoneStatus::Approved)
        {
            txn.rollback().await?;
            return Err(approved_work_blocks_cancel());
        }

        let written =
            db::deals::update_deal_if_version(&txn, deal.clone(), expected_version).await?;
        if written == 0 {
            let err = deal_conflict(&txn, id, expected_version).await?;
            txn.rollback().await?;
            return Err(err);
        }

        txn.commit().await?;
        Ok(deal)
    }

    async fn commit_milestone(
        &self,
        commit: MilestoneCommit,
    ) -> Result<MilestoneCommitted, StoreError> {
        let txn = self.db.begin().await?;
        let id = commit.milestone.id;
        let deal_id = commit.milestone.deal_id;

        let Some(deal) = db::deals::lock_deal_by_id(&txn, deal_id).await? else {
            txn.rollback().await?;
            return Err(StoreError::NotFound {
                entity: "deal",
                id: deal_id,
            });
        };
        if let Err(err) = ensure_open(&deal) {
            txn.rollback().await?;
            return Err(err);
        }

        let written = db::milestones::update_milestone_if_version(
            &txn,
            commit.milestone.clone(),
            commit.expected_version,
        )
        .await?;
        if written == 0 {
            let err = match db::milestones::get_milestone_by_id(&txn, id).await? {
                Some(current) => StoreError::VersionConflict {
                    entity: "milestone",
                    id,
                    expected: commit.expected_version,
                    actual: current.version,
                },
                None => StoreError::NotFound {
                    entity: "milestone",
                    id,
                },
            };
            txn.rollback().await?;
            return Err(err);
        }

        let mut completed_deal = None;
        if commit.complete_deal && commit.milestone.status == MilestoneStatus::Approved {
            let milestones = db::milestones::get_milestones_by_deal(&txn, deal_id).await?;
            if milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::Approved)
            {
                let expected = deal.version;
                let done = completed(deal, commit.milestone.updated_at);
                let written =
                    db::deals::update_deal_if_version(&txn, done.clone(), expected).await?;
                if written == 0 {
                    let err = deal_conflict(&txn, deal_id, expected).await?;
                    txn.rollback().await?;
                    return Err(err);
                }
                completed_deal = Some(done);
            }
        }

        txn.commit().await?;
        Ok(MilestoneCommitted {
            milestone: commit.milestone,
            completed_deal,
        })
    }
}
