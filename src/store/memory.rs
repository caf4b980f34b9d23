use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    MilestoneCommit, MilestoneCommitted, OfferCommit, Store, StoreError,
    approved_work_blocks_cancel, completed, ensure_open,
};
use crate::models::milestones::MilestoneStatus;
use crate::models::{deals, milestones, negotiation_events, offers};

#[derive(Default)]
struct Tables {
    offers: HashMap<Uuid, offers::Model>,
    events: HashMap<Uuid, Vec<negotiation_events::Model>>,
    deals: HashMap<Uuid, deals::Model>,
    milestones: HashMap<Uuid, milestones::Model>,
}

impl Tables {
    fn check_offer_version(&self, id: Uuid, expected: i32) -> Result<(), StoreError> {
        let current = self
            .offers
            .get(&id)
            .ok_or(StoreError::NotFound { entity: "offer", id })?;
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                entity: "offer",
                id,
                expected,
                actual: current.version,
            });
        }
        Ok(())
    }

    fn check_deal_version(&self, id: Uuid, expected: i32) -> Result<(), StoreError> {
        let current = self
            .deals
            .get(&id)
            .ok_or(StoreError::NotFound { entity: "deal", id })?;
        if current.version != expected {
            return Err(StoreError::VersionConflict {
                entity: "deal",
                id,
                expected,
                actual: current.version,
            });
        }
        Ok(())
    }

    fn check_event_order(&self, event: &negotiation_events::Model) -> Result<(), StoreError> {
        let last = self
            .events
            .get(&event.offer_id)
            .and_then(|events| events.last())
            .map_or(0, |e| e.sequence);
        if event.sequence <= last {
            return Err(StoreError::OutOfOrder {
                offer_id: event.offer_id,
                sequence: event.sequence,
                last,
            });
        }
        Ok(())
    }
}

/// In-process store with the same atomicity and version semantics as the
/// Postgres store. A single lock covers every table so multi-row commits
/// are all-or-nothing.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_offer(&self, offer: offers::Model) -> Result<offers::Model, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.offers.contains_key(&offer.id) {
            return Err(StoreError::Duplicate(format!("offer {}", offer.id)));
        }
        tables.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<offers::Model>, StoreError> {
        Ok(self.tables.read().await.offers.get(&id).cloned())
    }

    async fn list_offers_for_user(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<offers::Model>, StoreError> {
        let tables = self.tables.read().await;
        let mut offers: Vec<offers::Model> = tables
            .offers
            .values()
            .filter(|o| o.deleted_at.is_none() && o.is_party(user_id))
            .cloned()
            .collect();
        offers.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(offers
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_offers_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<offers::Model>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .offers
            .values()
            .filter(|o| {
                o.deleted_at.is_none()
                    && o.status.awaits_response()
                    && o.last_sent_at.is_some_and(|at| at < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn commit_offer(&self, commit: OfferCommit) -> Result<offers::Model, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_offer_version(commit.offer.id, commit.expected_version)?;
        if let Some(event) = &commit.event {
            tables.check_event_order(event)?;
        }
        if let Some((deal, _)) = &commit.deal {
            if tables.deals.values().any(|d| d.offer_id == deal.offer_id) {
                return Err(StoreError::Duplicate(format!(
                    "deal for offer {}",
                    deal.offer_id
                )));
            }
        }

        if let Some(event) = commit.event {
            tables.events.entry(event.offer_id).or_default().push(event);
        }
        if let Some((deal, milestones)) = commit.deal {
            for milestone in milestones {
                tables.milestones.insert(milestone.id, milestone);
            }
            tables.deals.insert(deal.id, deal);
        }
        tables.offers.insert(commit.offer.id, commit.offer.clone());
        Ok(commit.offer)
    }

    async fn append_event(
        &self,
        event: negotiation_events::Model,
    ) -> Result<negotiation_events::Model, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_event_order(&event)?;
        tables
            .events
            .entry(event.offer_id)
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn list_events(
        &self,
        offer_id: Uuid,
    ) -> Result<Vec<negotiation_events::Model>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.events.get(&offer_id).cloned().unwrap_or_default())
    }

    async fn get_deal(&self, id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        Ok(self.tables.read().await.deals.get(&id).cloned())
    }

    async fn get_deal_by_offer(&self, offer_id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .deals
            .values()
            .find(|d| d.offer_id == offer_id)
            .cloned())
    }

    async fn update_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_deal_version(deal.id, expected_version)?;
        tables.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn get_milestone(&self, id: Uuid) -> Result<Option<milestones::Model>, StoreError> {
        Ok(self.tables.read().await.milestones.get(&id).cloned())
    }

    async fn list_milestones(&self, deal_id: Uuid) -> Result<Vec<milestones::Model>, StoreError> {
        let tables = self.tables.read().await;
        let mut milestones: Vec<milestones::Model> = tables
            .milestones
            .values()
            .filter(|m| m.deal_id == deal_id)
            .cloned()
            .collect();
        milestones.sort_by_key(|m| m.position);
        Ok(milestones)
    }

    async fn cancel_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        let mut tables = self.tables.write().await;
        tables.check_deal_version(deal.id, expected_version)?;
        if tables
            .milestones
            .values()
            .any(|m| m.deal_id == deal.id && m.status == MilestoneStatus::Approved)
        {
            return Err(approved_work_blocks_cancel());
        }
        tables.deals.insert(deal.id, deal.clone());
        Ok(deal)
    }

    async fn commit_milestone(
        &self,
        commit: MilestoneCommit,
    ) -> Result<MilestoneCommitted, StoreError> {
        let mut tables = self.tables.write().await;
        let id = commit.milestone.id;
        let deal_id = commit.milestone.deal_id;
        let current = tables
            .milestones
            .get(&id)
            .ok_or(StoreError::NotFound {
                entity: "milestone",
                id,
            })?;
        if current.version != commit.expected_version {
            return Err(StoreError::VersionConflict {
                entity: "milestone",
                id,
                expected: commit.expected_version,
                actual: current.version,
            });
        }
        let deal = tables
            .deals
            .get(&deal_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "deal",
                id: deal_id,
            })?;
        ensure_open(&deal)?;

        let settles = commit.complete_deal
            && commit.milestone.status == MilestoneStatus::Approved
            && tables
                .milestones
                .values()
                .filter(|m| m.deal_id == deal_id && m.id != id)
                .all(|m| m.status == MilestoneStatus::Approved);

        tables.milestones.insert(id, commit.milestone.clone());
        let completed_deal = settles.then(|| completed(deal, commit.milestone.updated_at));
        if let Some(done) = &completed_deal {
            tables.deals.insert(deal_id, done.clone());
        }
        Ok(MilestoneCommitted {
            milestone: commit.milestone,
            completed_deal,
        })
    }
}
