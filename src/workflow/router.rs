//! Single entry point for evidence submissions.
//!
//! Resolves which lifecycle operation a request maps to and keeps at most
//! one submission in flight per target. The in-flight table also holds
//! each running upload session, so a submission can be cancelled from
//! outside the request that started it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use super::deals::DealLifecycle;
use super::offers::OfferLifecycle;
use super::Actor;
use crate::error::{AppError, AppResult};
use crate::models::milestones::{self, MilestoneStatus};
use crate::models::{deals, offers};
use crate::upload::{LocalFile, UploadSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneMode {
    /// Pick submit or resubmit from the milestone's current status.
    #[default]
    Auto,
    NewWork,
    Resubmission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum SubmissionTarget {
    Milestone {
        milestone_id: Uuid,
        #[serde(default)]
        mode: MilestoneMode,
    },
    OfferContent {
        deal_id: Uuid,
    },
    Proof {
        deal_id: Uuid,
    },
    OfferAttachments {
        offer_id: Uuid,
    },
}

/// Mutual-exclusion key: one submission at a time per lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionLane {
    Milestone(Uuid),
    OfferContent(Uuid),
    Proof(Uuid),
    OfferAttachments(Uuid),
}

impl SubmissionLane {
    pub fn target_id(self) -> Uuid {
        match self {
            SubmissionLane::Milestone(id)
            | SubmissionLane::OfferContent(id)
            | SubmissionLane::Proof(id)
            | SubmissionLane::OfferAttachments(id) => id,
        }
    }
}

impl SubmissionTarget {
    pub fn lane(&self) -> SubmissionLane {
        match *self {
            SubmissionTarget::Milestone { milestone_id, .. } => {
                SubmissionLane::Milestone(milestone_id)
            }
            SubmissionTarget::OfferContent { deal_id } => SubmissionLane::OfferContent(deal_id),
            SubmissionTarget::Proof { deal_id } => SubmissionLane::Proof(deal_id),
            SubmissionTarget::OfferAttachments { offer_id } => {
                SubmissionLane::OfferAttachments(offer_id)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub actor: Actor,
    pub target: SubmissionTarget,
    /// Version of the milestone, deal or offer the caller last read.
    pub expected_version: i32,
    pub files: Vec<LocalFile>,
    pub social_links: Vec<String>,
}

/// The entity a routed submission produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum SubmissionReceipt {
    Milestone(milestones::Model),
    Deal(deals::Model),
    Offer(offers::Model),
}

pub struct SubmissionRouter {
    offers: Arc<OfferLifecycle>,
    deals: Arc<DealLifecycle>,
    in_flight: Mutex<HashMap<SubmissionLane, InFlight>>,
}

struct InFlight {
    actor_id: Uuid,
    session: UploadSession,
}

/// Releases the lane when the submission finishes, fails or is dropped.
struct LaneGuard<'a> {
    router: &'a SubmissionRouter,
    lane: SubmissionLane,
}

impl Drop for LaneGuard<'_> {
    fn drop(&mut self) {
        self.router.lanes().remove(&self.lane);
    }
}

impl SubmissionRouter {
    pub fn new(offers: Arc<OfferLifecycle>, deals: Arc<DealLifecycle>) -> Self {
        Self {
            offers,
            deals,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn submit(&self, request: SubmissionRequest) -> AppResult<SubmissionReceipt> {
        let SubmissionRequest {
            actor,
            target,
            expected_version,
            files,
            social_links,
        } = request;
        let lane = target.lane();

        match target {
            SubmissionTarget::OfferAttachments { offer_id } => {
                let session = self.offers.prepare_attachments(files);
                let _guard = self.claim(actor, lane, &session)?;
                let offer = self
                    .offers
                    .add_attachments(actor, offer_id, expected_version, &session)
                    .await?;
                Ok(SubmissionReceipt::Offer(offer))
            }
            SubmissionTarget::Milestone { milestone_id, mode } => {
                let evidence = self.deals.prepare_evidence(files, social_links);
                let _guard = self.claim(actor, lane, &evidence.session)?;
                let resubmission = match mode {
                    MilestoneMode::NewWork => false,
                    MilestoneMode::Resubmission => true,
                    MilestoneMode::Auto => {
                        let milestone = self.deals.milestone(actor, milestone_id).await?;
                        milestone.status == MilestoneStatus::Rejected
                    }
                };
                debug!(%milestone_id, resubmission, "Routing milestone submission");

                let milestone = if resubmission {
                    self.deals
                        .resubmit(actor, milestone_id, expected_version, evidence)
                        .await?
                } else {
                    self.deals
                        .submit(actor, milestone_id, expected_version, evidence)
                        .await?
                };
                Ok(SubmissionReceipt::Milestone(milestone))
            }
            SubmissionTarget::OfferContent { deal_id } => {
                let evidence = self.deals.prepare_evidence(files, social_links);
                let _guard = self.claim(actor, lane, &evidence.session)?;
                let deal = self
                    .deals
                    .submit_offer_content(actor, deal_id, expected_version, evidence)
                    .await?;
                Ok(SubmissionReceipt::Deal(deal))
            }
            SubmissionTarget::Proof { deal_id } => {
                let evidence = self.deals.prepare_evidence(files, social_links);
                let _guard = self.claim(actor, lane, &evidence.session)?;
                let deal = self
                    .deals
                    .submit_proof(actor, deal_id, expected_version, evidence)
                    .await?;
                Ok(SubmissionReceipt::Deal(deal))
            }
        }
    }

    /// Cancel the upload of the actor's submission running on `lane`.
    pub fn cancel(&self, actor: Actor, lane: SubmissionLane) -> bool {
        match self.lanes().get(&lane) {
            Some(running) if running.actor_id == actor.id => {
                info!(
                    "Cancelling submission upload {} for {lane:?}",
                    running.session.id()
                );
                running.session.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self, lane: SubmissionLane) -> bool {
        self.lanes().contains_key(&lane)
    }

    fn claim(
        &self,
        actor: Actor,
        lane: SubmissionLane,
        session: &UploadSession,
    ) -> AppResult<LaneGuard<'_>> {
        let mut lanes = self.lanes();
        if lanes.contains_key(&lane) {
            return Err(AppError::SubmissionInProgress(lane.target_id()));
        }
        lanes.insert(
            lane,
            InFlight {
                actor_id: actor.id,
                session: session.clone(),
            },
        );
        Ok(LaneGuard { router: self, lane })
    }

    fn lanes(&self) -> MutexGuard<'_, HashMap<SubmissionLane, InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
