use std::sync::Arc;

use crate::services::{Notifier, PaymentGateway};
use crate::store::Store;
use crate::upload::{UploadPipeline, UploadSink};
use crate::workflow::{
    DealLifecycle, EvidenceSettings, NegotiationHistory, OfferLifecycle, OfferSettings,
    SubmissionRouter,
};

/// Everything a request handler needs, shared across Actix workers.
#[derive(Clone)]
pub struct AppState {
    pub offers: Arc<OfferLifecycle>,
    pub deals: Arc<DealLifecycle>,
    pub history: NegotiationHistory,
    pub router: Arc<SubmissionRouter>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn UploadSink>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        offer_settings: OfferSettings,
        evidence_settings: EvidenceSettings,
    ) -> Self {
        let uploads = UploadPipeline::new(sink);
        let offers = Arc::new(OfferLifecycle::new(
            Arc::clone(&store),
            uploads.clone(),
            Arc::clone(&payments),
            Arc::clone(&notifier),
            offer_settings,
        ));
        let deals = Arc::new(DealLifecycle::new(
            Arc::clone(&store),
            uploads,
            payments,
            notifier,
            evidence_settings,
        ));
        let router = Arc::new(SubmissionRouter::new(
            Arc::clone(&offers),
            Arc::clone(&deals),
        ));

        Self {
            offers,
            deals,
            history: NegotiationHistory::new(store),
            router,
        }
    }
}
