//! Routing of evidence submissions and per-target mutual exclusion.
//!
//! Run with: `cargo test --test submission_router_test`
mod common;

use uuid::Uuid;

use collab_backend::error::AppError;
use collab_backend::models::deals::ContentStatus;
use collab_backend::models::evidence::{FileStatus, SubmissionKind};
use collab_backend::models::milestones::MilestoneStatus;
use collab_backend::models::offers::Platform;
use collab_backend::workflow::{
    Actor, MilestoneMode, ReviewDecision, SubmissionLane, SubmissionReceipt, SubmissionRequest,
    SubmissionTarget,
};

use common::{Harness, image, planned};

fn milestone_request(
    actor: Actor,
    milestone_id: Uuid,
    version: i32,
    mode: MilestoneMode,
    files: &[&str],
) -> SubmissionRequest {
    SubmissionRequest {
        actor,
        target: SubmissionTarget::Milestone { milestone_id, mode },
        expected_version: version,
        files: files.iter().map(|name| image(name)).collect(),
        social_links: vec![],
    }
}

#[tokio::test]
async fn test_concurrent_submits_for_one_milestone_let_exactly_one_through() {
    let h = Harness::new();
    let view = h.accepted_deal(h.draft(500)).await;
    let milestone = &view.milestones[0];
    let router = &h.state.router;

    let (first, second) = tokio::join!(
        router.submit(milestone_request(
            h.creator,
            milestone.id,
            milestone.version,
            MilestoneMode::NewWork,
            &["take-1.png"],
        )),
        router.submit(milestone_request(
            h.creator,
            milestone.id,
            milestone.version,
            MilestoneMode::NewWork,
            &["take-2.png"],
        )),
    );

    let outcomes = [first, second];
    let winners = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert!(
                matches!(
                    e,
                    AppError::SubmissionInProgress(_) | AppError::StaleVersion { .. }
                ),
                "unexpected error {e:?}"
            );
        }
    }

    let current = h.state.deals.milestone(h.creator, milestone.id).await.unwrap();
    assert_eq!(current.status, MilestoneStatus::Submitted);
    assert_eq!(current.submissions.0.len(), 1);
    assert_eq!(current.submissions.0[0].files.len(), 1);
    assert!(!router.is_in_flight(SubmissionLane::Milestone(milestone.id)));
}

#[tokio::test]
async fn test_different_milestones_do_not_block_each_other() {
    let h = Harness::new();
    let mut draft = h.draft(500);
    draft.terms.deliverables = vec![Platform::Instagram, Platform::Tiktok];
    draft.terms.milestone_plan = vec![
        planned("Reel", 250, vec![Platform::Instagram]),
        planned("Video", 250, vec![Platform::Tiktok]),
    ];
    let view = h.accepted_deal(draft).await;
    let router = &h.state.router;

    let (first, second) = tokio::join!(
        router.submit(milestone_request(
            h.creator,
            view.milestones[0].id,
            1,
            MilestoneMode::Auto,
            &["reel.png"],
        )),
        router.submit(milestone_request(
            h.creator,
            view.milestones[1].id,
            1,
            MilestoneMode::Auto,
            &["video.png"],
        )),
    );
    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_auto_mode_follows_the_milestone_status() {
    let h = Harness::new();
    let view = h.accepted_deal(h.draft(500)).await;
    let milestone_id = view.milestones[0].id;
    let router = &h.state.router;

    let receipt = router
        .submit(milestone_request(
            h.creator,
            milestone_id,
            1,
            MilestoneMode::Auto,
            &["draft-cut.png"],
        ))
        .await
        .unwrap();
    let SubmissionReceipt::Milestone(submitted) = receipt else {
        panic!("expected a milestone receipt");
    };
    assert_eq!(submitted.status, MilestoneStatus::Submitted);

    let rejected = h
        .state
        .deals
        .review(
            h.marketer,
            milestone_id,
            submitted.version,
            ReviewDecision::Reject {
                feedback: "Logo is cropped".to_string(),
            },
        )
        .await
        .unwrap();

    let receipt = router
        .submit(milestone_request(
            h.creator,
            milestone_id,
            rejected.version,
            MilestoneMode::Auto,
            &["final-cut.png"],
        ))
        .await
        .unwrap();
    let SubmissionReceipt::Milestone(resubmitted) = receipt else {
        panic!("expected a milestone receipt");
    };
    assert_eq!(resubmitted.status, MilestoneStatus::Resubmitted);
    assert_eq!(
        resubmitted.submissions.0[1].kind,
        SubmissionKind::Resubmission
    );
}

#[tokio::test]
async fn test_explicit_resubmission_of_fresh_milestone_is_illegal() {
    let h = Harness::new();
    let view = h.accepted_deal(h.draft(500)).await;

    let err = h
        .state
        .router
        .submit(milestone_request(
            h.creator,
            view.milestones[0].id,
            1,
            MilestoneMode::Resubmission,
            &["a.png"],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));
}

#[tokio::test]
async fn test_owner_can_cancel_an_inflight_submission() {
    let h = Harness::new();
    let view = h.accepted_deal(h.draft(500)).await;
    let milestone_id = view.milestones[0].id;
    let lane = SubmissionLane::Milestone(milestone_id);
    let router = &h.state.router;

    let (result, (by_stranger, by_owner)) = tokio::join!(
        router.submit(milestone_request(
            h.creator,
            milestone_id,
            1,
            MilestoneMode::NewWork,
            &["stalled-upload.png"],
        )),
        async {
            while !router.is_in_flight(lane) {
                tokio::task::yield_now().await;
            }
            let by_stranger = router.cancel(h.marketer, lane);
            let by_owner = router.cancel(h.creator, lane);
            (by_stranger, by_owner)
        },
    );

    assert!(!by_stranger);
    assert!(by_owner);
    assert!(matches!(result, Err(AppError::UploadCancelled(_))));
    assert!(!router.is_in_flight(lane));

    let current = h.state.deals.milestone(h.creator, milestone_id).await.unwrap();
    assert_eq!(current.status, MilestoneStatus::Assigned);
    assert!(!router.cancel(h.creator, lane));
}

#[tokio::test]
async fn test_lane_is_released_after_a_failed_upload() {
    let h = Harness::new();
    let view = h.accepted_deal(h.draft(500)).await;
    let milestone_id = view.milestones[0].id;
    let router = &h.state.router;

    let err = router
        .submit(milestone_request(
            h.creator,
            milestone_id,
            1,
            MilestoneMode::NewWork,
            &["broken.png"],
        ))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "evidence_incomplete");
    assert!(!router.is_in_flight(SubmissionLane::Milestone(milestone_id)));

    let receipt = router
        .submit(milestone_request(
            h.creator,
            milestone_id,
            1,
            MilestoneMode::NewWork,
            &["fixed.png"],
        ))
        .await
        .unwrap();
    assert!(matches!(receipt, SubmissionReceipt::Milestone(_)));
}

#[tokio::test]
async fn test_offer_attachments_target_uploads_into_the_draft() {
    let h = Harness::new();
    let draft = h.save(h.draft(500)).await;

    let receipt = h
        .state
        .router
        .submit(SubmissionRequest {
            actor: h.marketer,
            target: SubmissionTarget::OfferAttachments { offer_id: draft.id },
            expected_version: draft.version,
            files: vec![image("brief.png")],
            social_links: vec![],
        })
        .await
        .unwrap();

    let SubmissionReceipt::Offer(offer) = receipt else {
        panic!("expected an offer receipt");
    };
    assert_eq!(offer.version, draft.version + 1);
    assert_eq!(offer.attachments.0.len(), 1);
    assert_eq!(offer.attachments.0[0].status, FileStatus::Stored);
    assert_eq!(offer.offer_name, draft.offer_name);
}

#[tokio::test]
async fn test_content_and_proof_targets_update_the_deal() {
    let h = Harness::new();
    let mut draft = h.draft(500);
    draft.requires_content_approval = true;
    let view = h.accepted_deal(draft).await;
    let deal_id = view.deal.id;

    let receipt = h
        .state
        .router
        .submit(SubmissionRequest {
            actor: h.creator,
            target: SubmissionTarget::OfferContent { deal_id },
            expected_version: view.deal.version,
            files: vec![image("storyboard.png")],
            social_links: vec![],
        })
        .await
        .unwrap();
    let SubmissionReceipt::Deal(deal) = receipt else {
        panic!("expected a deal receipt");
    };
    assert_eq!(deal.content_status, ContentStatus::Submitted);

    let receipt = h
        .state
        .router
        .submit(SubmissionRequest {
            actor: h.creator,
            target: SubmissionTarget::Proof { deal_id },
            expected_version: deal.version,
            files: vec![],
            social_links: vec!["https://www.instagram.com/p/xyz/".to_string()],
        })
        .await
        .unwrap();
    let SubmissionReceipt::Deal(deal) = receipt else {
        panic!("expected a deal receipt");
    };
    assert_eq!(deal.proofs.0.len(), 1);
}

#[test]
fn test_targets_deserialize_from_tagged_json() {
    let id = Uuid::new_v4();
    let target: SubmissionTarget = serde_json::from_value(serde_json::json!({
        "target": "milestone",
        "milestone_id": id,
    }))
    .unwrap();
    assert_eq!(
        target,
        SubmissionTarget::Milestone {
            milestone_id: id,
            mode: MilestoneMode::Auto,
        }
    );
    assert_eq!(target.lane(), SubmissionLane::Milestone(id));

    let target: SubmissionTarget = serde_json::from_value(serde_json::json!({
        "target": "offer_content",
        "deal_id": id,
    }))
    .unwrap();
    assert_eq!(target.lane().target_id(), id);
}
