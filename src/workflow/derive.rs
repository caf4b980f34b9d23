//! Deal and milestone derivation from an accepted offer.
//!
//! Ids are name-based (UUIDv5) so that deriving twice from the same offer
//! yields identical rows, and the unique `offer_id` constraint on deals
//! turns a duplicate acceptance into a conflict rather than a second deal.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::deals::{self, ContentStatus, DealStatus};
use crate::models::evidence::{FeedbackHistory, SocialLinks, Submissions};
use crate::models::milestones::{self, MilestoneStatus};
use crate::models::offers::{self, Deliverables, PlannedMilestone};

pub fn deal_id_for(offer_id: Uuid) -> Uuid {
    Uuid::new_v5(&offer_id, b"deal")
}

pub fn milestone_id_for(deal_id: Uuid, position: i32) -> Uuid {
    Uuid::new_v5(&deal_id, format!("milestone:{position}").as_bytes())
}

/// Build the deal and its milestones for an offer being accepted.
///
/// With an explicit milestone plan each planned group becomes one
/// milestone; otherwise a single milestone covers every deliverable for
/// the full amount, due on the desired post date.
pub fn derive_deal(
    offer: &offers::Model,
    accepted_at: DateTime<Utc>,
) -> (deals::Model, Vec<milestones::Model>) {
    let deal_id = deal_id_for(offer.id);

    let deal = deals::Model {
        id: deal_id,
        offer_id: offer.id,
        creator_id: offer.creator_id,
        marketer_id: offer.marketer_id,
        status: DealStatus::Active,
        content_status: if offer.requires_content_approval {
            ContentStatus::AwaitingContent
        } else {
            ContentStatus::NotRequired
        },
        content_submissions: Submissions::default(),
        content_feedback: FeedbackHistory::default(),
        proofs: Submissions::default(),
        created_at: accepted_at,
        updated_at: accepted_at,
        version: 1,
    };

    let plan: Vec<PlannedMilestone> = if offer.milestone_plan.0.is_empty() {
        vec![PlannedMilestone {
            name: offer.offer_name.clone(),
            amount: offer.proposed_amount,
            deliverables: offer.deliverables.0.clone(),
            due_date: offer.desired_post_date,
        }]
    } else {
        offer.milestone_plan.0.clone()
    };

    let milestones = plan
        .into_iter()
        .enumerate()
        .map(|(position, planned)| {
            let position = position as i32;
            milestones::Model {
                id: milestone_id_for(deal_id, position),
                deal_id,
                position,
                name: planned.name,
                amount: planned.amount,
                due_date: planned.due_date.or(offer.desired_post_date),
                status: MilestoneStatus::Assigned,
                deliverables: Deliverables(planned.deliverables),
                submissions: Submissions::default(),
                social_links: SocialLinks::default(),
                feedback_history: FeedbackHistory::default(),
                created_at: accepted_at,
                updated_at: accepted_at,
                version: 1,
            }
        })
        .collect();

    (deal, milestones)
}
