use actix_web::{HttpResponse, web};
use serde::Deserialize;
use uuid::Uuid;

use super::offers::VersionBody;
use crate::auth::AuthenticatedActor;
use crate::error::AppError;
use crate::state::AppState;
use crate::workflow::ReviewDecision;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub version: i32,
    #[serde(flatten)]
    pub decision: ReviewDecision,
}

/// GET /api/deals/{id}: the deal with its milestones.
pub async fn get_deal(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = state.deals.get(actor.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

pub async fn get_deal_by_offer(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let view = state.deals.get_by_offer(actor.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// POST /api/deals/{id}/content/review: the marketer approves or rejects
/// pre-production content.
pub async fn review_content(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let ReviewRequest { version, decision } = body.into_inner();
    let deal = state
        .deals
        .review_offer_content(actor.0, path.into_inner(), version, decision)
        .await?;
    Ok(HttpResponse::Ok().json(deal))
}

pub async fn cancel_deal(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<VersionBody>,
) -> Result<HttpResponse, AppError> {
    let deal = state
        .deals
        .cancel(actor.0, path.into_inner(), body.version)
        .await?;
    Ok(HttpResponse::Ok().json(deal))
}
