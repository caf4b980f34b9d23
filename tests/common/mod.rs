//! Shared fixtures: in-memory store, scriptable collaborators and an
//! accepted-deal builder.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use uuid::Uuid;

use collab_backend::models::offers::{
    self, DraftOffer, OfferType, PartyRole, Platform, PlannedMilestone, Terms,
};
use collab_backend::models::{deals, milestones, negotiation_events};
use collab_backend::services::{
    NotificationKind, Notifier, NotifyError, PaymentAuthorization, PaymentError, PaymentGateway,
};
use collab_backend::state::AppState;
use collab_backend::store::{
    MemoryStore, MilestoneCommit, MilestoneCommitted, OfferCommit, Store, StoreError,
};
use collab_backend::upload::{ByteProgress, LocalFile, MemorySink, SinkError, SinkObject, UploadSink};
use collab_backend::workflow::{
    Actor, DealView, DraftChanges, Evidence, EvidenceSettings, OfferResponse, OfferSettings,
};

/// Memory sink that fails files named `broken*` and never finishes files
/// named `stall*`.
#[derive(Default)]
pub struct TestSink {
    pub inner: MemorySink,
}

#[async_trait]
impl UploadSink for TestSink {
    async fn put(
        &self,
        object: SinkObject<'_>,
        progress: &ByteProgress,
    ) -> Result<String, SinkError> {
        if object.file_name.starts_with("broken") {
            progress.report(object.bytes.len() as u64 / 2);
            return Err(SinkError::Transport("connection reset by peer".into()));
        }
        if object.file_name.starts_with("stall") {
            return std::future::pending().await;
        }
        self.inner.put(object, progress).await
    }
}

#[derive(Default)]
pub struct MockPayments {
    pub decline_reason: Mutex<Option<String>>,
    pub unreachable: AtomicBool,
    /// Milliseconds each authorization takes.
    pub latency_ms: AtomicU64,
    pub authorizations: Mutex<Vec<(Uuid, i64)>>,
    pub releases: Mutex<Vec<(Uuid, Uuid, i64)>>,
}

impl MockPayments {
    pub fn decline(&self, reason: &str) {
        *self.decline_reason.lock().unwrap() = Some(reason.to_string());
    }

    pub fn approve(&self) {
        *self.decline_reason.lock().unwrap() = None;
        self.unreachable.store(false, Ordering::SeqCst);
    }

    pub fn authorization_count(&self) -> usize {
        self.authorizations.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for MockPayments {
    async fn authorize_send(
        &self,
        offer_id: Uuid,
        amount_cents: i64,
    ) -> Result<PaymentAuthorization, PaymentError> {
        self.authorizations
            .lock()
            .unwrap()
            .push((offer_id, amount_cents));
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaymentError::Transport("gateway timed out".into()));
        }
        Ok(match self.decline_reason.lock().unwrap().clone() {
            Some(reason) => PaymentAuthorization::declined(reason),
            None => PaymentAuthorization::approved(),
        })
    }

    async fn release_milestone(
        &self,
        deal_id: Uuid,
        milestone_id: Uuid,
        amount_cents: i64,
    ) -> Result<(), PaymentError> {
        self.releases
            .lock()
            .unwrap()
            .push((deal_id, milestone_id, amount_cents));
        Ok(())
    }
}

/// Records every notification; optionally fails them all after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Uuid, NotificationKind)>>,
    pub failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn kinds_for(&self, user_id: Uuid) -> Vec<NotificationKind> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, kind)| *kind)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        _payload: serde_json::Value,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((user_id, kind));
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError("push provider unavailable".into()));
        }
        Ok(())
    }
}

/// Memory store whose milestone commits land only after `commit_delay`,
/// leaving a window between a workflow's reads and its write.
pub struct DelayedCommits {
    inner: MemoryStore,
    commit_delay: Duration,
}

impl DelayedCommits {
    pub fn new(commit_delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            commit_delay,
        }
    }
}

#[async_trait]
impl Store for DelayedCommits {
    async fn insert_offer(&self, offer: offers::Model) -> Result<offers::Model, StoreError> {
        self.inner.insert_offer(offer).await
    }

    async fn get_offer(&self, id: Uuid) -> Result<Option<offers::Model>, StoreError> {
        self.inner.get_offer(id).await
    }

    async fn list_offers_for_user(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<offers::Model>, StoreError> {
        self.inner.list_offers_for_user(user_id, offset, limit).await
    }

    async fn list_offers_sent_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<offers::Model>, StoreError> {
        self.inner.list_offers_sent_before(cutoff).await
    }

    async fn commit_offer(&self, commit: OfferCommit) -> Result<offers::Model, StoreError> {
        self.inner.commit_offer(commit).await
    }

    async fn append_event(
        &self,
        event: negotiation_events::Model,
    ) -> Result<negotiation_events::Model, StoreError> {
        self.inner.append_event(event).await
    }

    async fn list_events(
        &self,
        offer_id: Uuid,
    ) -> Result<Vec<negotiation_events::Model>, StoreError> {
        self.inner.list_events(offer_id).await
    }

    async fn get_deal(&self, id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        self.inner.get_deal(id).await
    }

    async fn get_deal_by_offer(&self, offer_id: Uuid) -> Result<Option<deals::Model>, StoreError> {
        self.inner.get_deal_by_offer(offer_id).await
    }

    async fn update_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        self.inner.update_deal(deal, expected_version).await
    }

    async fn get_milestone(&self, id: Uuid) -> Result<Option<milestones::Model>, StoreError> {
        self.inner.get_milestone(id).await
    }

    async fn list_milestones(&self, deal_id: Uuid) -> Result<Vec<milestones::Model>, StoreError> {
        self.inner.list_milestones(deal_id).await
    }

    async fn cancel_deal(
        &self,
        deal: deals::Model,
        expected_version: i32,
    ) -> Result<deals::Model, StoreError> {
        self.inner.cancel_deal(deal, expected_version).await
    }

    async fn commit_milestone(
        &self,
        commit: MilestoneCommit,
    ) -> Result<MilestoneCommitted, StoreError> {
        tokio::time::sleep(self.commit_delay).await;
        self.inner.commit_milestone(commit).await
    }
}

pub struct Harness {
    pub state: AppState,
    pub sink: Arc<TestSink>,
    pub payments: Arc<MockPayments>,
    pub notifier: Arc<RecordingNotifier>,
    pub marketer: Actor,
    pub creator: Actor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn Store>) -> Self {
        let sink = Arc::new(TestSink::default());
        let payments = Arc::new(MockPayments::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(
            store,
            sink.clone(),
            payments.clone(),
            notifier.clone(),
            OfferSettings::default(),
            EvidenceSettings::default(),
        );

        Self {
            state,
            sink,
            payments,
            notifier,
            marketer: Actor::new(Uuid::new_v4(), PartyRole::Marketer),
            creator: Actor::new(Uuid::new_v4(), PartyRole::Creator),
        }
    }

    /// A draft from the marketer to the creator.
    pub fn draft(&self, amount: i64) -> DraftOffer {
        DraftOffer {
            counterpart_id: self.creator.id,
            offer_name: "Spring launch".to_string(),
            offer_type: OfferType::Custom,
            terms: terms(amount, date(2026, 3, 1), date(2026, 3, 5)),
            notes: None,
            agreed_to_terms: true,
            requires_content_approval: false,
        }
    }

    pub async fn save(&self, draft: DraftOffer) -> offers::Model {
        self.state
            .offers
            .save_draft(self.marketer, None, DraftChanges::new(draft))
            .await
            .expect("draft should save")
    }

    pub async fn sent_offer(&self, amount: i64) -> offers::Model {
        let draft = self.save(self.draft(amount)).await;
        self.state
            .offers
            .send(self.marketer, draft.id, draft.version)
            .await
            .expect("offer should send")
    }

    /// Draft, send and accept an offer, returning the deal it produced.
    pub async fn accepted_deal(&self, draft: DraftOffer) -> DealView {
        let offer = self.save(draft).await;
        let offer = self
            .state
            .offers
            .send(self.marketer, offer.id, offer.version)
            .await
            .expect("offer should send");
        let offer = self
            .state
            .offers
            .respond(self.creator, offer.id, offer.version, OfferResponse::Accept)
            .await
            .expect("offer should be accepted");
        self.state
            .deals
            .get_by_offer(self.creator, offer.id)
            .await
            .expect("deal should exist")
    }

    pub fn evidence(&self, names: &[&str], links: &[&str]) -> Evidence {
        self.state.deals.prepare_evidence(
            names.iter().map(|n| image(n)).collect(),
            links.iter().map(|l| l.to_string()).collect(),
        )
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn terms(amount: i64, review: NaiveDate, post: NaiveDate) -> Terms {
    Terms {
        proposed_amount: Decimal::from(amount),
        description: "Two posts and a story".to_string(),
        deliverables: vec![Platform::Instagram],
        desired_review_date: Some(review),
        desired_post_date: Some(post),
        milestone_plan: vec![],
    }
}

pub fn planned(name: &str, amount: i64, deliverables: Vec<Platform>) -> PlannedMilestone {
    PlannedMilestone {
        name: name.to_string(),
        amount: Decimal::from(amount),
        deliverables,
        due_date: None,
    }
}

pub fn image(name: &str) -> LocalFile {
    LocalFile::in_memory(name, "image/png", vec![42u8; 2048])
}
