//! Offer lifecycle: drafting, sending, the counter loop and the terminal
//! transitions. Each transition commits the offer row and its negotiation
//! event together.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use super::derive::derive_deal;
use super::terms::{validate_draft, validate_for_send, validate_terms};
use super::{Actor, dispatch, ensure_version};
use crate::error::{AppError, AppResult, ValidationErrors};
use crate::models::evidence::{Attachments, ClientToken, UploadedFile};
use crate::models::negotiation_events::{self, NegotiationAction};
use crate::models::offers::{
    self, Deliverables, DraftOffer, MilestonePlan, OfferStatus, PartyRole, Terms,
};
use crate::services::{NotificationKind, Notifier, PaymentGateway};
use crate::store::{OfferCommit, Store};
use crate::upload::{
    LocalFile, MAX_FILES_PER_SESSION, MEGABYTE, UploadConstraints, UploadPipeline, UploadSession,
};

#[derive(Debug, Clone)]
pub struct OfferSettings {
    /// One-time fee authorized when an offer is first sent.
    pub send_fee_cents: i64,
    /// How long a sent offer waits for a response before it expires.
    pub ttl: Duration,
    pub attachment_constraints: UploadConstraints,
}

impl Default for OfferSettings {
    fn default() -> Self {
        Self {
            send_fee_cents: 100,
            ttl: Duration::hours(168),
            attachment_constraints: UploadConstraints::new(10 * MEGABYTE),
        }
    }
}

/// What the recipient of a sent offer does with it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OfferResponse {
    Accept,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
    Counter {
        terms: Terms,
    },
}

impl OfferResponse {
    fn verb(&self) -> &'static str {
        match self {
            OfferResponse::Accept => "accept",
            OfferResponse::Reject { .. } => "reject",
            OfferResponse::Counter { .. } => "counter",
        }
    }
}

/// A draft save: the full draft plus attachment changes.
#[derive(Debug, Clone)]
pub struct DraftChanges {
    pub draft: DraftOffer,
    /// New files, or retries of failed ones carrying their original token.
    pub files: Vec<LocalFile>,
    /// Attachments to drop from the draft.
    pub remove_attachments: Vec<ClientToken>,
}

impl DraftChanges {
    pub fn new(draft: DraftOffer) -> Self {
        Self {
            draft,
            files: Vec::new(),
            remove_attachments: Vec::new(),
        }
    }
}

pub struct OfferLifecycle {
    store: Arc<dyn Store>,
    uploads: UploadPipeline,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    settings: OfferSettings,
    /// Offers with a send between payment authorization and commit.
    sending: Mutex<HashSet<Uuid>>,
}

/// Releases an offer's send slot however the send ends.
struct SendGuard<'a> {
    lifecycle: &'a OfferLifecycle,
    offer_id: Uuid,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.sends().remove(&self.offer_id);
    }
}

impl OfferLifecycle {
    pub fn new(
        store: Arc<dyn Store>,
        uploads: UploadPipeline,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        settings: OfferSettings,
    ) -> Self {
        Self {
            store,
            uploads,
            payments,
            notifier,
            settings,
            sending: Mutex::new(HashSet::new()),
        }
    }

    /// An offer visible to `actor`. Deleted offers and offers the actor is
    /// not party to are reported as missing.
    pub async fn get(&self, actor: Actor, offer_id: Uuid) -> AppResult<offers::Model> {
        let offer = self.load_live(offer_id).await?;
        if !offer.is_party(actor.id) {
            return Err(not_found(offer_id));
        }
        Ok(offer)
    }

    pub async fn list_for(
        &self,
        actor: Actor,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<offers::Model>> {
        Ok(self
            .store
            .list_offers_for_user(actor.id, offset, limit)
            .await?)
    }

    /// Create a draft (`target` is `None`) or overwrite an existing one.
    ///
    /// Drafts need not be complete, but the post date may never precede
    /// the review date. New files are uploaded before the save; any that
    /// fail stay on the draft as failed attachments and block sending until
    /// they are retried or removed.
    pub async fn save_draft(
        &self,
        actor: Actor,
        target: Option<(Uuid, i32)>,
        changes: DraftChanges,
    ) -> AppResult<offers::Model> {
        let DraftChanges {
            draft,
            files,
            remove_attachments,
        } = changes;

        validate_draft(&draft.offer_name, &draft.terms)?;
        if draft.counterpart_id == actor.id {
            let mut errors = ValidationErrors::default();
            errors.add("counterpart_id", "cannot send an offer to yourself");
            return Err(AppError::Validation(errors));
        }

        let existing = match target {
            Some((offer_id, expected_version)) => {
                let offer = self.owned(actor, offer_id).await?;
                if offer.status != OfferStatus::Draft {
                    return Err(AppError::illegal("offer", offer.status, "edit"));
                }
                ensure_version("offer", offer.id, offer.version, expected_version)?;
                Some(offer)
            }
            None => None,
        };

        let mut attachments = existing
            .as_ref()
            .map(|o| o.attachments.0.clone())
            .unwrap_or_default();
        attachments.retain(|f| !remove_attachments.contains(&f.client_token));

        // Stored attachments are immutable; a retry naming one is a no-op.
        let files: Vec<LocalFile> = files
            .into_iter()
            .filter(|f| {
                f.client_token.is_none_or(|token| {
                    !attachments
                        .iter()
                        .any(|a| a.client_token == token && a.is_stored())
                })
            })
            .collect();
        let added = files
            .iter()
            .filter(|f| {
                f.client_token
                    .is_none_or(|token| !attachments.iter().any(|a| a.client_token == token))
            })
            .count();
        if attachments.len() + added > MAX_FILES_PER_SESSION {
            let mut errors = ValidationErrors::default();
            errors.add(
                "attachments",
                format!("an offer holds at most {MAX_FILES_PER_SESSION} attachments"),
            );
            return Err(AppError::Validation(errors));
        }

        if !files.is_empty() {
            let session = self.prepare_attachments(files);
            self.uploads.run(&session).await;
            merge_attachments(&mut attachments, &session);
        }

        let now = Utc::now();
        match existing {
            Some(mut offer) => {
                let expected_version = offer.version;
                apply_draft(&mut offer, draft);
                offer.attachments = Attachments(attachments);
                advance(&mut offer, now);

                let saved = self
                    .store
                    .commit_offer(OfferCommit {
                        offer,
                        expected_version,
                        event: None,
                        deal: None,
                    })
                    .await?;
                info!("Draft offer {} saved at version {}", saved.id, saved.version);
                Ok(saved)
            }
            None => {
                let mut offer = offers::Model {
                    id: Uuid::new_v4(),
                    creator_id: actor.id,
                    marketer_id: actor.id,
                    created_by: actor.role,
                    offer_name: String::new(),
                    offer_type: draft.offer_type,
                    description: String::new(),
                    proposed_amount: Decimal::ZERO,
                    deliverables: Deliverables::default(),
                    desired_review_date: None,
                    desired_post_date: None,
                    milestone_plan: MilestonePlan::default(),
                    notes: None,
                    agreed_to_terms: false,
                    requires_content_approval: false,
                    attachments: Attachments(attachments),
                    status: OfferStatus::Draft,
                    awaiting: None,
                    last_sent_at: None,
                    deleted_at: None,
                    created_at: now,
                    updated_at: now,
                    version: 1,
                };
                apply_draft(&mut offer, draft);

                let saved = self.store.insert_offer(offer).await?;
                info!("Draft offer {} created by {}", saved.id, actor.id);
                Ok(saved)
            }
        }
    }

    /// Open an upload session for draft attachments without running it.
    pub fn prepare_attachments(&self, files: Vec<LocalFile>) -> UploadSession {
        self.uploads
            .begin(files, &self.settings.attachment_constraints)
    }

    /// Upload into an existing draft, keeping its other fields.
    pub async fn add_attachments(
        &self,
        actor: Actor,
        offer_id: Uuid,
        expected_version: i32,
        session: &UploadSession,
    ) -> AppResult<offers::Model> {
        let offer = self.owned(actor, offer_id).await?;
        if offer.status != OfferStatus::Draft {
            return Err(AppError::illegal("offer", offer.status, "attach files to"));
        }
        ensure_version("offer", offer.id, offer.version, expected_version)?;

        let mut attachments = offer.attachments.0.clone();
        let added = session
            .tokens()
            .iter()
            .filter(|t| !attachments.iter().any(|a| a.client_token == **t))
            .count();
        if attachments.len() + added > MAX_FILES_PER_SESSION {
            let mut errors = ValidationErrors::default();
            errors.add(
                "attachments",
                format!("an offer holds at most {MAX_FILES_PER_SESSION} attachments"),
            );
            return Err(AppError::Validation(errors));
        }

        self.uploads.run(session).await;
        if session.is_cancelled() {
            return Err(AppError::UploadCancelled(session.id()));
        }
        merge_attachments(&mut attachments, session);

        let mut updated = offer;
        updated.attachments = Attachments(attachments);
        advance(&mut updated, Utc::now());
        Ok(self
            .store
            .commit_offer(OfferCommit {
                offer: updated,
                expected_version,
                event: None,
                deal: None,
            })
            .await?)
    }

    /// Send a draft to its counterpart.
    ///
    /// Order matters: validation, then attachments, then payment. Nothing
    /// is persisted unless all three pass. At most one send per offer runs
    /// at a time, so the fee is authorized once.
    pub async fn send(
        &self,
        actor: Actor,
        offer_id: Uuid,
        expected_version: i32,
    ) -> AppResult<offers::Model> {
        let _guard = self.claim_send(offer_id)?;
        let offer = self.owned(actor, offer_id).await?;
        if offer.status != OfferStatus::Draft {
            return Err(AppError::illegal("offer", offer.status, "send"));
        }
        ensure_version("offer", offer.id, offer.version, expected_version)?;

        validate_for_send(&offer.terms(), offer.agreed_to_terms)?;
        if !offer.attachments.all_stored() {
            return Err(AppError::AttachmentsIncomplete {
                pending: offer.attachments.not_stored(),
            });
        }

        let authorization = self
            .payments
            .authorize_send(offer.id, self.settings.send_fee_cents)
            .await
            .map_err(|e| AppError::PaymentFailed {
                reason: e.to_string(),
            })?;
        if !authorization.authorized {
            return Err(AppError::PaymentFailed {
                reason: authorization
                    .reason
                    .unwrap_or_else(|| "declined".to_string()),
            });
        }

        let now = Utc::now();
        let terms = offer.terms();
        let recipient = offer.created_by.counterpart();
        let mut sent = offer;
        sent.status = OfferStatus::Sent;
        sent.awaiting = Some(recipient);
        sent.last_sent_at = Some(now);
        advance(&mut sent, now);
        let event = event_for(
            &sent,
            actor.id,
            Some(actor.role),
            NegotiationAction::Sent,
            terms,
            None,
            now,
        );

        let sent = self
            .store
            .commit_offer(OfferCommit {
                offer: sent,
                expected_version,
                event: Some(event),
                deal: None,
            })
            .await
            .inspect_err(|e| {
                warn!("Offer {offer_id} send fee authorized but commit failed: {e}");
            })?;

        info!("Offer {} sent to {:?}", sent.id, recipient);
        dispatch(
            self.notifier.as_ref(),
            sent.party_id(recipient),
            NotificationKind::OfferReceived,
            json!({ "offer_id": sent.id, "offer_name": sent.offer_name }),
        )
        .await;
        Ok(sent)
    }

    /// Accept, reject or counter. Only the party the offer is waiting on
    /// may respond. Accepting creates the deal in the same commit.
    pub async fn respond(
        &self,
        actor: Actor,
        offer_id: Uuid,
        expected_version: i32,
        response: OfferResponse,
    ) -> AppResult<offers::Model> {
        let offer = self.load_live(offer_id).await?;
        if !offer.is_party(actor.id) {
            return Err(not_found(offer_id));
        }
        if !offer.status.awaits_response() {
            return Err(AppError::illegal("offer", offer.status, response.verb()));
        }
        let recipient = offer.awaiting.unwrap_or(offer.created_by.counterpart());
        if actor.role != recipient || offer.party_id(recipient) != actor.id {
            return Err(AppError::forbidden(format!(
                "Only the {recipient:?} may respond to offer {offer_id}"
            )));
        }
        ensure_version("offer", offer.id, offer.version, expected_version)?;

        let now = Utc::now();
        let previous = offer.terms();
        let sender = actor.role.counterpart();
        let mut updated = offer;

        let (action, reason, deal, kind) = match response {
            OfferResponse::Accept => {
                updated.status = OfferStatus::Accepted;
                updated.awaiting = None;
                let deal = derive_deal(&updated, now);
                (
                    NegotiationAction::Accepted,
                    None,
                    Some(deal),
                    NotificationKind::OfferAccepted,
                )
            }
            OfferResponse::Reject { reason } => {
                updated.status = OfferStatus::Rejected;
                updated.awaiting = None;
                let reason = reason.filter(|r| !r.trim().is_empty());
                (
                    NegotiationAction::Rejected,
                    reason,
                    None,
                    NotificationKind::OfferRejected,
                )
            }
            OfferResponse::Counter { terms } => {
                validate_terms(&terms)?;
                updated.apply_terms(terms);
                updated.status = OfferStatus::Sent;
                updated.awaiting = Some(sender);
                updated.last_sent_at = Some(now);
                (
                    NegotiationAction::Countered,
                    None,
                    None,
                    NotificationKind::OfferCountered,
                )
            }
        };
        advance(&mut updated, now);
        let event = event_for(
            &updated,
            actor.id,
            Some(actor.role),
            action,
            previous,
            reason,
            now,
        );
        let deal_id = deal.as_ref().map(|(d, _)| d.id);

        let updated = self
            .store
            .commit_offer(OfferCommit {
                offer: updated,
                expected_version,
                event: Some(event),
                deal,
            })
            .await?;

        info!(
            "Offer {} {:?} by {:?}, now version {}",
            updated.id, action, actor.role, updated.version
        );
        dispatch(
            self.notifier.as_ref(),
            updated.party_id(sender),
            kind,
            json!({ "offer_id": updated.id, "deal_id": deal_id }),
        )
        .await;
        Ok(updated)
    }

    /// System transition for an offer whose response window has passed.
    ///
    /// Expiring an offer that is already terminal is a no-op; a draft, or
    /// an offer still inside its window, cannot expire.
    pub async fn expire(&self, offer_id: Uuid, now: DateTime<Utc>) -> AppResult<offers::Model> {
        let offer = self.load_live(offer_id).await?;
        if offer.status.is_terminal() {
            return Ok(offer);
        }
        if !offer.status.awaits_response() {
            return Err(AppError::illegal("offer", offer.status, "expire"));
        }
        let due = offer.last_sent_at.map(|sent| sent + self.settings.ttl);
        if due.is_some_and(|due| due > now) {
            return Err(AppError::IllegalTransition {
                entity: "offer",
                from: format!("{:?} until {}", offer.status, due.unwrap_or(now)),
                action: "expire",
            });
        }

        let expected_version = offer.version;
        let terms = offer.terms();
        let mut expired = offer;
        expired.status = OfferStatus::Expired;
        expired.awaiting = None;
        advance(&mut expired, now);
        let event = event_for(
            &expired,
            Uuid::nil(),
            None,
            NegotiationAction::Expired,
            terms,
            None,
            now,
        );

        let expired = self
            .store
            .commit_offer(OfferCommit {
                offer: expired,
                expected_version,
                event: Some(event),
                deal: None,
            })
            .await?;

        info!("Offer {} expired", expired.id);
        for party in [expired.creator_id, expired.marketer_id] {
            dispatch(
                self.notifier.as_ref(),
                party,
                NotificationKind::OfferExpired,
                json!({ "offer_id": expired.id }),
            )
            .await;
        }
        Ok(expired)
    }

    /// Expire every offer past its window. One failure does not stop the
    /// sweep.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> AppResult<Vec<offers::Model>> {
        let due = self
            .store
            .list_offers_sent_before(now - self.settings.ttl)
            .await?;

        let mut expired = Vec::with_capacity(due.len());
        for offer in due {
            match self.expire(offer.id, now).await {
                Ok(offer) => expired.push(offer),
                Err(e) => warn!("Could not expire offer {}: {e}", offer.id),
            }
        }
        Ok(expired)
    }

    /// Soft-delete an offer nobody has acted on yet.
    pub async fn delete(
        &self,
        actor: Actor,
        offer_id: Uuid,
        expected_version: i32,
    ) -> AppResult<offers::Model> {
        let offer = self.owned(actor, offer_id).await?;
        if offer.status.is_terminal() {
            return Err(AppError::illegal("offer", offer.status, "delete"));
        }
        ensure_version("offer", offer.id, offer.version, expected_version)?;

        let now = Utc::now();
        let mut deleted = offer;
        deleted.deleted_at = Some(now);
        advance(&mut deleted, now);

        let deleted = self
            .store
            .commit_offer(OfferCommit {
                offer: deleted,
                expected_version,
                event: None,
                deal: None,
            })
            .await?;
        info!("Offer {} deleted by {}", deleted.id, actor.id);
        Ok(deleted)
    }

    async fn load_live(&self, offer_id: Uuid) -> AppResult<offers::Model> {
        match self.store.get_offer(offer_id).await? {
            Some(offer) if offer.deleted_at.is_none() => Ok(offer),
            _ => Err(not_found(offer_id)),
        }
    }

    /// Load an offer the actor created. Only the creator-party edits,
    /// sends or deletes.
    fn claim_send(&self, offer_id: Uuid) -> AppResult<SendGuard<'_>> {
        if !self.sends().insert(offer_id) {
            return Err(AppError::SubmissionInProgress(offer_id));
        }
        Ok(SendGuard {
            lifecycle: self,
            offer_id,
        })
    }

    fn sends(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.sending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn owned(&self, actor: Actor, offer_id: Uuid) -> AppResult<offers::Model> {
        let offer = self.load_live(offer_id).await?;
        if !offer.is_party(actor.id) {
            return Err(not_found(offer_id));
        }
        if offer.owner_id() != actor.id || offer.created_by != actor.role {
            return Err(AppError::forbidden(format!(
                "Only the party that drafted offer {offer_id} may change it"
            )));
        }
        Ok(offer)
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound {
        entity: "offer",
        id,
    }
}

fn advance(offer: &mut offers::Model, now: DateTime<Utc>) {
    offer.version += 1;
    offer.updated_at = now;
}

fn apply_draft(offer: &mut offers::Model, draft: DraftOffer) {
    match offer.created_by {
        PartyRole::Creator => offer.marketer_id = draft.counterpart_id,
        PartyRole::Marketer => offer.creator_id = draft.counterpart_id,
    }
    offer.offer_name = draft.offer_name.trim().to_string();
    offer.offer_type = draft.offer_type;
    offer.notes = draft.notes;
    offer.agreed_to_terms = draft.agreed_to_terms;
    offer.requires_content_approval = draft.requires_content_approval;
    offer.apply_terms(draft.terms);
}

/// Fold a session's files into the attachment list, replacing entries that
/// share a client token.
fn merge_attachments(attachments: &mut Vec<UploadedFile>, session: &UploadSession) {
    for file in session.files() {
        match attachments
            .iter_mut()
            .find(|a| a.client_token == file.client_token)
        {
            Some(slot) if !slot.is_stored() => *slot = file,
            Some(_) => {}
            None => attachments.push(file),
        }
    }
}

/// The event recording a transition already applied to `offer`.
fn event_for(
    offer: &offers::Model,
    actor_id: Uuid,
    actor_role: Option<PartyRole>,
    action: NegotiationAction,
    previous_terms: Terms,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> negotiation_events::Model {
    negotiation_events::Model {
        id: Uuid::new_v4(),
        offer_id: offer.id,
        sequence: offer.version,
        actor_id,
        actor_role,
        action,
        previous_terms,
        new_terms: offer.terms(),
        reason,
        created_at: now,
    }
}
