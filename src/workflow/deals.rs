//! Deal and milestone lifecycle: evidence submission, review, the content
//! approval gate, post-publication proof and cancellation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::terms::{parse_social_links, to_cents};
use super::{Actor, dispatch, ensure_version};
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::models::deals::{self, ContentStatus, DealStatus};
use crate::models::evidence::{Feedback, SocialLink, Submission, SubmissionKind, UploadedFile};
use crate::models::milestones::{self, MilestoneStatus};
use crate::services::{NotificationKind, Notifier, PaymentGateway};
use crate::store::{MilestoneCommit, Store};
use crate::upload::{
    LocalFile, MEGABYTE, UploadConstraints, UploadOutcome, UploadPipeline, UploadSession,
};

#[derive(Debug, Clone)]
pub struct EvidenceSettings {
    pub constraints: UploadConstraints,
}

impl Default for EvidenceSettings {
    fn default() -> Self {
        Self {
            constraints: UploadConstraints::new(200 * MEGABYTE),
        }
    }
}

/// A batch of evidence: an upload session not yet run, plus post links.
///
/// The session is created up front so the caller can watch its progress
/// or cancel it while the submission is in flight.
#[derive(Clone)]
pub struct Evidence {
    pub session: UploadSession,
    pub social_links: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject { feedback: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DealView {
    #[serde(flatten)]
    pub deal: deals::Model,
    pub milestones: Vec<milestones::Model>,
}

pub struct DealLifecycle {
    store: Arc<dyn Store>,
    uploads: UploadPipeline,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    settings: EvidenceSettings,
}

impl DealLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        uploads: UploadPipeline,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: EvidenceSettings,
    ) -> Self {
        Self {
            store,
            uploads,
            payments,
            notifier,
            settings,
        }
    }

    /// Open an upload session for evidence files without running it.
    pub fn prepare_evidence(&self, files: Vec<LocalFile>, social_links: Vec<String>) -> Evidence {
        Evidence {
            session: self.uploads.begin(files, &self.settings.constraints),
            social_links,
        }
    }

    pub async fn get(&self, actor: Actor, deal_id: Uuid) -> AppResult<DealView> {
        let deal = self.party_deal(actor, deal_id).await?;
        let milestones = self.store.list_milestones(deal.id).await?;
        Ok(DealView { deal, milestones })
    }

    pub async fn get_by_offer(&self, actor: Actor, offer_id: Uuid) -> AppResult<DealView> {
        let deal = self
            .store
            .get_deal_by_offer(offer_id)
            .await?
            .filter(|d| d.role_of(actor.id).is_some())
            .ok_or(AppError::NotFound {
                entity: "deal",
                id: offer_id,
            })?;
        let milestones = self.store.list_milestones(deal.id).await?;
        Ok(DealView { deal, milestones })
    }

    pub async fn milestone(&self, actor: Actor, milestone_id: Uuid) -> AppResult<milestones::Model> {
        let (milestone, _) = self.milestone_with_deal(actor, milestone_id).await?;
        Ok(milestone)
    }

    /// First submission of work for an `Assigned` milestone.
    pub async fn submit(
        &self,
        actor: Actor,
        milestone_id: Uuid,
        expected_version: i32,
        evidence: Evidence,
    ) -> AppResult<milestones::Model> {
        self.record_work(
            actor,
            milestone_id,
            expected_version,
            evidence,
            SubmissionKind::Initial,
        )
        .await
    }

    /// New work for a `Rejected` milestone. Earlier submissions are kept.
    pub async fn resubmit(
        &self,
        actor: Actor,
        milestone_id: Uuid,
        expected_version: i32,
        evidence: Evidence,
    ) -> AppResult<milestones::Model> {
        self.record_work(
            actor,
            milestone_id,
            expected_version,
            evidence,
            SubmissionKind::Resubmission,
        )
        .await
    }

    async fn record_work(
        &self,
        actor: Actor,
        milestone_id: Uuid,
        expected_version: i32,
        evidence: Evidence,
        kind: SubmissionKind,
    ) -> AppResult<milestones::Model> {
        let (milestone, deal) = self.milestone_with_deal(actor, milestone_id).await?;
        let (action, from, to) = match kind {
            SubmissionKind::Resubmission => (
                "resubmit",
                MilestoneStatus::Rejected,
                MilestoneStatus::Resubmitted,
            ),
            _ => ("submit", MilestoneStatus::Assigned, MilestoneStatus::Submitted),
        };

        if actor.id != deal.creator_id {
            return Err(AppError::forbidden(
                "Only the creator submits milestone work",
            ));
        }
        if deal.status != DealStatus::Active {
            return Err(AppError::illegal("deal", deal.status, action));
        }
        if milestone.status != from {
            return Err(AppError::illegal("milestone", milestone.status, action));
        }
        if !deal.content_status.unblocks_milestones() {
            return Err(AppError::ContentApprovalPending(deal.id));
        }
        ensure_version(
            "milestone",
            milestone.id,
            milestone.version,
            expected_version,
        )?;

        let now = Utc::now();
        let (files, links) = self.collect_evidence(&evidence, now).await?;

        let mut updated = milestone;
        updated.submissions.push(Submission {
            version: updated.submissions.next_version(),
            kind,
            submitted_by: actor.id,
            files,
            social_links: links.clone(),
            submitted_at: now,
        });
        updated.social_links.append(links);
        updated.status = to;
        updated.version += 1;
        updated.updated_at = now;

        let updated = self
            .store
            .commit_milestone(MilestoneCommit {
                milestone: updated,
                expected_version,
                complete_deal: false,
            })
            .await?
            .milestone;

        info!(
            "Milestone {} {:?} (submission {})",
            updated.id,
            updated.status,
            updated.submissions.latest_version()
        );
        dispatch(
            self.notifier.as_ref(),
            deal.marketer_id,
            NotificationKind::MilestoneSubmitted,
            json!({ "deal_id": deal.id, "milestone_id": updated.id }),
        )
        .await;
        Ok(updated)
    }

    /// Approve or reject submitted work. Approving the last open milestone
    /// completes the deal in the same commit, decided by the store under the
    /// deal's lock.
    pub async fn review(
        &self,
        actor: Actor,
        milestone_id: Uuid,
        expected_version: i32,
        decision: ReviewDecision,
    ) -> AppResult<milestones::Model> {
        let (milestone, deal) = self.milestone_with_deal(actor, milestone_id).await?;
        if actor.id != deal.marketer_id {
            return Err(AppError::forbidden("Only the marketer reviews milestones"));
        }
        if deal.status != DealStatus::Active {
            return Err(AppError::illegal("deal", deal.status, "review"));
        }
        if !milestone.status.awaits_review() {
            return Err(AppError::illegal("milestone", milestone.status, "review"));
        }
        ensure_version(
            "milestone",
            milestone.id,
            milestone.version,
            expected_version,
        )?;

        let now = Utc::now();
        let mut updated = milestone;
        updated.version += 1;
        updated.updated_at = now;

        let kind = match decision {
            ReviewDecision::Approve => {
                updated.status = MilestoneStatus::Approved;
                NotificationKind::MilestoneApproved
            }
            ReviewDecision::Reject { feedback } => {
                updated.feedback_history.push(Feedback {
                    submission_version: updated.submissions.latest_version(),
                    reviewer_id: actor.id,
                    comment: required_feedback(feedback)?,
                    created_at: now,
                });
                updated.status = MilestoneStatus::Rejected;
                NotificationKind::MilestoneRejected
            }
        };
        let approving = updated.status == MilestoneStatus::Approved;

        let committed = self
            .store
            .commit_milestone(MilestoneCommit {
                milestone: updated,
                expected_version,
                complete_deal: approving,
            })
            .await?;
        let updated = committed.milestone;
        let completes_deal = committed.completed_deal.is_some();

        info!("Milestone {} reviewed: {:?}", updated.id, updated.status);
        if completes_deal {
            info!("Deal {} completed", deal.id);
        }

        if updated.status == MilestoneStatus::Approved {
            self.release(&deal, &updated).await;
        }
        dispatch(
            self.notifier.as_ref(),
            deal.creator_id,
            kind,
            json!({
                "deal_id": deal.id,
                "milestone_id": updated.id,
                "deal_completed": completes_deal,
            }),
        )
        .await;
        Ok(updated)
    }

    /// Pre-production content for a deal behind the approval gate.
    pub async fn submit_offer_content(
        &self,
        actor: Actor,
        deal_id: Uuid,
        expected_version: i32,
        evidence: Evidence,
    ) -> AppResult<deals::Model> {
        let deal = self.party_deal(actor, deal_id).await?;
        if actor.id != deal.creator_id {
            return Err(AppError::forbidden("Only the creator submits content"));
        }
        if deal.status != DealStatus::Active {
            return Err(AppError::illegal("deal", deal.status, "submit content for"));
        }
        if !matches!(
            deal.content_status,
            ContentStatus::AwaitingContent | ContentStatus::Rejected
        ) {
            return Err(AppError::illegal(
                "offer content",
                deal.content_status,
                "submit",
            ));
        }
        ensure_version("deal", deal.id, deal.version, expected_version)?;

        let now = Utc::now();
        let (files, links) = self.collect_evidence(&evidence, now).await?;

        let mut updated = deal;
        updated.content_submissions.push(Submission {
            version: updated.content_submissions.next_version(),
            kind: SubmissionKind::Content,
            submitted_by: actor.id,
            files,
            social_links: links,
            submitted_at: now,
        });
        updated.content_status = ContentStatus::Submitted;
        let updated = self.save_deal(updated, expected_version, now).await?;

        info!("Content submitted for deal {}", updated.id);
        dispatch(
            self.notifier.as_ref(),
            updated.marketer_id,
            NotificationKind::ContentSubmitted,
            json!({ "deal_id": updated.id }),
        )
        .await;
        Ok(updated)
    }

    pub async fn review_offer_content(
        &self,
        actor: Actor,
        deal_id: Uuid,
        expected_version: i32,
        decision: ReviewDecision,
    ) -> AppResult<deals::Model> {
        let deal = self.party_deal(actor, deal_id).await?;
        if actor.id != deal.marketer_id {
            return Err(AppError::forbidden("Only the marketer reviews content"));
        }
        if deal.content_status != ContentStatus::Submitted {
            return Err(AppError::illegal(
                "offer content",
                deal.content_status,
                "review",
            ));
        }
        ensure_version("deal", deal.id, deal.version, expected_version)?;

        let now = Utc::now();
        let mut updated = deal;
        match decision {
            ReviewDecision::Approve => updated.content_status = ContentStatus::Approved,
            ReviewDecision::Reject { feedback } => {
                updated.content_feedback.push(Feedback {
                    submission_version: updated.content_submissions.latest_version(),
                    reviewer_id: actor.id,
                    comment: required_feedback(feedback)?,
                    created_at: now,
                });
                updated.content_status = ContentStatus::Rejected;
            }
        }
        let updated = self.save_deal(updated, expected_version, now).await?;

        info!(
            "Content for deal {} reviewed: {:?}",
            updated.id, updated.content_status
        );
        dispatch(
            self.notifier.as_ref(),
            updated.creator_id,
            NotificationKind::ContentReviewed,
            json!({ "deal_id": updated.id, "content_status": updated.content_status }),
        )
        .await;
        Ok(updated)
    }

    /// Post-publication proof. Accepted while the deal is active or
    /// completed.
    pub async fn submit_proof(
        &self,
        actor: Actor,
        deal_id: Uuid,
        expected_version: i32,
        evidence: Evidence,
    ) -> AppResult<deals::Model> {
        let deal = self.party_deal(actor, deal_id).await?;
        if actor.id != deal.creator_id {
            return Err(AppError::forbidden("Only the creator submits proof"));
        }
        if deal.status == DealStatus::Cancelled {
            return Err(AppError::illegal("deal", deal.status, "submit proof for"));
        }
        ensure_version("deal", deal.id, deal.version, expected_version)?;

        let now = Utc::now();
        let (files, links) = self.collect_evidence(&evidence, now).await?;

        let mut updated = deal;
        updated.proofs.push(Submission {
            version: updated.proofs.next_version(),
            kind: SubmissionKind::Proof,
            submitted_by: actor.id,
            files,
            social_links: links,
            submitted_at: now,
        });
        let updated = self.save_deal(updated, expected_version, now).await?;

        dispatch(
            self.notifier.as_ref(),
            updated.marketer_id,
            NotificationKind::ProofSubmitted,
            json!({ "deal_id": updated.id, "proof": updated.proofs.latest_version() }),
        )
        .await;
        Ok(updated)
    }

    /// Either party may cancel an active deal until a milestone is approved.
    /// The approval check is repeated inside the store commit.
    pub async fn cancel(
        &self,
        actor: Actor,
        deal_id: Uuid,
        expected_version: i32,
    ) -> AppResult<deals::Model> {
        let deal = self.party_deal(actor, deal_id).await?;
        if deal.status != DealStatus::Active {
            return Err(AppError::illegal("deal", deal.status, "cancel"));
        }
        let milestones = self.store.list_milestones(deal.id).await?;
        if milestones
            .iter()
            .any(|m| m.status == MilestoneStatus::Approved)
        {
            return Err(AppError::IllegalTransition {
                entity: "deal",
                from: "Active with approved milestones".to_string(),
                action: "cancel",
            });
        }
        ensure_version("deal", deal.id, deal.version, expected_version)?;

        let mut updated = deal;
        updated.status = DealStatus::Cancelled;
        updated.version += 1;
        updated.updated_at = Utc::now();
        let updated = self.store.cancel_deal(updated, expected_version).await?;

        info!("Deal {} cancelled by {}", updated.id, actor.id);
        let other = if actor.id == updated.creator_id {
            updated.marketer_id
        } else {
            updated.creator_id
        };
        dispatch(
            self.notifier.as_ref(),
            other,
            NotificationKind::DealCancelled,
            json!({ "deal_id": updated.id }),
        )
        .await;
        Ok(updated)
    }

    /// Run the evidence upload and validate links. Nothing is recorded
    /// unless every file is stored.
    async fn collect_evidence(
        &self,
        evidence: &Evidence,
        now: DateTime<Utc>,
    ) -> AppResult<(Vec<UploadedFile>, Vec<SocialLink>)> {
        let links = parse_social_links(&evidence.social_links, now)?;
        if evidence.session.files().is_empty() && links.is_empty() {
            let mut errors = ValidationErrors::default();
            errors.add("evidence", "at least one file or link is required");
            return Err(AppError::Validation(errors));
        }

        match self.uploads.run(&evidence.session).await {
            UploadOutcome::Complete(files) => Ok((files, links)),
            UploadOutcome::PartialFailure { stored, failed } => {
                Err(AppError::EvidenceIncomplete { stored, failed })
            }
            UploadOutcome::Cancelled { .. } => {
                Err(AppError::UploadCancelled(evidence.session.id()))
            }
        }
    }

    async fn release(&self, deal: &deals::Model, milestone: &milestones::Model) {
        let Some(cents) = to_cents(milestone.amount) else {
            warn!(
                "Milestone {} amount {} does not fit in cents",
                milestone.id, milestone.amount
            );
            return;
        };
        if let Err(e) = self
            .payments
            .release_milestone(deal.id, milestone.id, cents)
            .await
        {
            warn!("Payout release for milestone {} not sent: {e}", milestone.id);
        }
    }

    async fn save_deal(
        &self,
        mut deal: deals::Model,
        expected_version: i32,
        now: DateTime<Utc>,
    ) -> AppResult<deals::Model> {
        deal.version += 1;
        deal.updated_at = now;
        Ok(self.store.update_deal(deal, expected_version).await?)
    }

    async fn party_deal(&self, actor: Actor, deal_id: Uuid) -> AppResult<deals::Model> {
        self.store
            .get_deal(deal_id)
            .await?
            .filter(|d| d.role_of(actor.id).is_some())
            .ok_or(AppError::NotFound {
                entity: "deal",
                id: deal_id,
            })
    }

    async fn milestone_with_deal(
        &self,
        actor: Actor,
        milestone_id: Uuid,
    ) -> AppResult<(milestones::Model, deals::Model)> {
        let not_found = AppError::NotFound {
            entity: "milestone",
            id: milestone_id,
        };
        let Some(milestone) = self.store.get_milestone(milestone_id).await? else {
            return Err(not_found);
        };
        match self.store.get_deal(milestone.deal_id).await? {
            Some(deal) if deal.role_of(actor.id).is_some() => Ok((milestone, deal)),
            _ => Err(not_found),
        }
    }
}

fn required_feedback(feedback: String) -> AppResult<String> {
    let feedback = feedback.trim();
    if feedback.is_empty() {
        let mut errors = ValidationErrors::default();
        errors.add("feedback", "a rejection must say what to change");
        return Err(AppError::Validation(errors));
    }
    Ok(feedback.to_string())
}
