//! Append-only negotiation history and its replay.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::negotiation_events::{self, NegotiationAction};
use crate::models::offers::{OfferStatus, PartyRole, Terms};
use crate::store::Store;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Offer has no negotiation history")]
    Empty,

    #[error("Event {sequence} does not continue from the terms before it")]
    BrokenChain { sequence: i32 },

    #[error("Event {sequence} ({action:?}) cannot follow an offer that is {status:?}")]
    Unreachable {
        sequence: i32,
        action: NegotiationAction,
        status: OfferStatus,
    },
}

/// The negotiation state reconstructed from events alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replay {
    pub terms: Terms,
    pub status: OfferStatus,
    pub awaiting: Option<PartyRole>,
    pub counters: usize,
}

impl Replay {
    fn start(terms: Terms) -> Self {
        Self {
            terms,
            status: OfferStatus::Draft,
            awaiting: None,
            counters: 0,
        }
    }

    /// Apply one event, checking it continues from the current terms.
    pub fn apply(mut self, event: &negotiation_events::Model) -> Result<Self, HistoryError> {
        if event.previous_terms != self.terms {
            return Err(HistoryError::BrokenChain {
                sequence: event.sequence,
            });
        }

        let reachable = match event.action {
            NegotiationAction::Sent => self.status == OfferStatus::Draft,
            _ => self.status.awaits_response(),
        };
        if !reachable {
            return Err(HistoryError::Unreachable {
                sequence: event.sequence,
                action: event.action,
                status: self.status,
            });
        }

        match event.action {
            NegotiationAction::Sent | NegotiationAction::Countered => {
                self.status = OfferStatus::Sent;
                self.awaiting = event.actor_role.map(PartyRole::counterpart);
                if event.action == NegotiationAction::Countered {
                    self.counters += 1;
                }
            }
            NegotiationAction::Accepted => {
                self.status = OfferStatus::Accepted;
                self.awaiting = None;
            }
            NegotiationAction::Rejected => {
                self.status = OfferStatus::Rejected;
                self.awaiting = None;
            }
            NegotiationAction::Expired => {
                self.status = OfferStatus::Expired;
                self.awaiting = None;
            }
        }
        self.terms = event.new_terms.clone();
        Ok(self)
    }
}

/// Fold an offer's events, in sequence order, into its negotiation state.
/// The first event's previous terms seed the fold.
pub fn replay(events: &[negotiation_events::Model]) -> Result<Replay, HistoryError> {
    let first = events.first().ok_or(HistoryError::Empty)?;
    events
        .iter()
        .try_fold(Replay::start(first.previous_terms.clone()), Replay::apply)
}

/// Read access to the recorded history. Events are written by the offer
/// lifecycle in the same commit as the transition they describe.
#[derive(Clone)]
pub struct NegotiationHistory {
    store: Arc<dyn Store>,
}

impl NegotiationHistory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list_for(&self, offer_id: Uuid) -> AppResult<Vec<negotiation_events::Model>> {
        Ok(self.store.list_events(offer_id).await?)
    }

    /// Append outside an offer transition. The store refuses a sequence
    /// that does not follow the last recorded one.
    pub async fn append(
        &self,
        event: negotiation_events::Model,
    ) -> AppResult<negotiation_events::Model> {
        Ok(self.store.append_event(event).await?)
    }

    /// `None` for an offer that was never sent.
    pub async fn replay_for(&self, offer_id: Uuid) -> AppResult<Option<Replay>> {
        let events = self.list_for(offer_id).await?;
        match replay(&events) {
            Ok(state) => Ok(Some(state)),
            Err(HistoryError::Empty) => Ok(None),
            Err(e) => Err(AppError::Internal(format!(
                "history of offer {offer_id} is inconsistent: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn terms(amount: i64) -> Terms {
        Terms {
            proposed_amount: Decimal::from(amount),
            description: "Story".into(),
            deliverables: vec![],
            desired_review_date: None,
            desired_post_date: None,
            milestone_plan: vec![],
        }
    }

    fn event(
        sequence: i32,
        role: Option<PartyRole>,
        action: NegotiationAction,
        previous: i64,
        new: i64,
    ) -> negotiation_events::Model {
        negotiation_events::Model {
            id: Uuid::new_v4(),
            offer_id: Uuid::nil(),
            sequence,
            actor_id: Uuid::new_v4(),
            actor_role: role,
            action,
            previous_terms: terms(previous),
            new_terms: terms(new),
            reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn counter_then_accept_folds_to_latest_terms() {
        let events = [
            event(2, Some(PartyRole::Marketer), NegotiationAction::Sent, 500, 500),
            event(3, Some(PartyRole::Creator), NegotiationAction::Countered, 500, 600),
            event(4, Some(PartyRole::Marketer), NegotiationAction::Accepted, 600, 600),
        ];

        let state = replay(&events).unwrap();
        assert_eq!(state.terms, terms(600));
        assert_eq!(state.status, OfferStatus::Accepted);
        assert_eq!(state.awaiting, None);
        assert_eq!(state.counters, 1);
    }

    #[test]
    fn counter_hands_the_turn_to_the_other_party() {
        let events = [
            event(2, Some(PartyRole::Marketer), NegotiationAction::Sent, 500, 500),
            event(3, Some(PartyRole::Creator), NegotiationAction::Countered, 500, 600),
        ];

        let state = replay(&events).unwrap();
        assert_eq!(state.status, OfferStatus::Sent);
        assert_eq!(state.awaiting, Some(PartyRole::Marketer));
    }

    #[test]
    fn gap_in_terms_is_a_broken_chain() {
        let events = [
            event(2, Some(PartyRole::Marketer), NegotiationAction::Sent, 500, 500),
            event(3, Some(PartyRole::Creator), NegotiationAction::Countered, 550, 600),
        ];

        assert_eq!(
            replay(&events),
            Err(HistoryError::BrokenChain { sequence: 3 })
        );
    }

    #[test]
    fn nothing_follows_a_terminal_event() {
        let events = [
            event(2, Some(PartyRole::Marketer), NegotiationAction::Sent, 500, 500),
            event(3, None, NegotiationAction::Expired, 500, 500),
            event(4, Some(PartyRole::Creator), NegotiationAction::Accepted, 500, 500),
        ];

        assert!(matches!(
            replay(&events),
            Err(HistoryError::Unreachable { sequence: 4, .. })
        ));
    }

    #[tokio::test]
    async fn append_keeps_sequence_order() {
        let history = NegotiationHistory::new(Arc::new(crate::store::MemoryStore::new()));
        let sent = event(2, Some(PartyRole::Marketer), NegotiationAction::Sent, 500, 500);
        history.append(sent.clone()).await.unwrap();

        let replayed = event(2, Some(PartyRole::Creator), NegotiationAction::Countered, 500, 600);
        assert!(history.append(replayed).await.is_err());

        assert_eq!(history.list_for(Uuid::nil()).await.unwrap(), vec![sent]);
        let state = history.replay_for(Uuid::nil()).await.unwrap().unwrap();
        assert_eq!(state.awaiting, Some(PartyRole::Creator));
        assert!(history.replay_for(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[test]
    fn empty_history_has_no_replay() {
        assert_eq!(replay(&[]), Err(HistoryError::Empty));
    }
}
