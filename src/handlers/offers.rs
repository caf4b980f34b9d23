use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{InlineFile, VersionQuery, decode_files};
use crate::auth::AuthenticatedActor;
use crate::error::{AppError, ValidationErrors};
use crate::models::PaginationQuery;
use crate::models::evidence::ClientToken;
use crate::models::negotiation_events;
use crate::models::offers::DraftOffer;
use crate::state::AppState;
use crate::workflow::{DraftChanges, OfferResponse, Replay};

#[derive(Debug, Deserialize)]
pub struct SaveDraftRequest {
    #[serde(flatten)]
    pub draft: DraftOffer,
    #[serde(default)]
    pub files: Vec<InlineFile>,
    #[serde(default)]
    pub remove_attachments: Vec<ClientToken>,
    /// Required when updating an existing draft.
    pub version: Option<i32>,
}

impl SaveDraftRequest {
    fn into_changes(self) -> Result<DraftChanges, AppError> {
        Ok(DraftChanges {
            draft: self.draft,
            files: decode_files(self.files)?,
            remove_attachments: self.remove_attachments,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VersionBody {
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub version: i32,
    #[serde(flatten)]
    pub response: OfferResponse,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub events: Vec<negotiation_events::Model>,
    pub replay: Option<Replay>,
}

/// GET /api/offers: offers the caller is party to, newest first.
pub async fn list_offers(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, AppError> {
    let offers = state
        .offers
        .list_for(actor.0, query.offset(), query.limit())
        .await?;
    Ok(HttpResponse::Ok().json(offers))
}

/// POST /api/offers: create a draft, uploading any inline attachments.
pub async fn create_draft(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    body: web::Json<SaveDraftRequest>,
) -> Result<HttpResponse, AppError> {
    let changes = body.into_inner().into_changes()?;
    let offer = state.offers.save_draft(actor.0, None, changes).await?;
    Ok(HttpResponse::Created().json(offer))
}

pub async fn get_offer(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let offer = state.offers.get(actor.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(offer))
}

/// PUT /api/offers/{id}: overwrite a draft the caller owns.
pub async fn update_draft(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<SaveDraftRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let Some(version) = body.version else {
        let mut errors = ValidationErrors::default();
        errors.add("version", "is required when updating a draft");
        return Err(AppError::Validation(errors));
    };
    let changes = body.into_changes()?;
    let offer = state
        .offers
        .save_draft(actor.0, Some((path.into_inner(), version)), changes)
        .await?;
    Ok(HttpResponse::Ok().json(offer))
}

/// DELETE /api/offers/{id}?version=N
pub async fn delete_offer(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<VersionQuery>,
) -> Result<HttpResponse, AppError> {
    state
        .offers
        .delete(actor.0, path.into_inner(), query.version)
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/offers/{id}/send: validate, check attachments, charge the
/// send fee and hand the offer to the counterpart.
pub async fn send_offer(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<VersionBody>,
) -> Result<HttpResponse, AppError> {
    let offer = state
        .offers
        .send(actor.0, path.into_inner(), body.version)
        .await?;
    Ok(HttpResponse::Ok().json(offer))
}

/// POST /api/offers/{id}/respond with `{"action": "accept" | "reject" | "counter", ...}`.
pub async fn respond_to_offer(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<RespondRequest>,
) -> Result<HttpResponse, AppError> {
    let RespondRequest { version, response } = body.into_inner();
    let offer = state
        .offers
        .respond(actor.0, path.into_inner(), version, response)
        .await?;
    Ok(HttpResponse::Ok().json(offer))
}

/// GET /api/offers/{id}/history: every negotiation event plus the state
/// they fold to.
pub async fn get_history(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let offer = state.offers.get(actor.0, path.into_inner()).await?;
    let events = state.history.list_for(offer.id).await?;
    let replay = state.history.replay_for(offer.id).await?;
    Ok(HttpResponse::Ok().json(HistoryResponse { events, replay }))
}
