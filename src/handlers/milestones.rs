use actix_web::{HttpResponse, web};
use uuid::Uuid;

use super::deals::ReviewRequest;
use crate::auth::AuthenticatedActor;
use crate::error::AppError;
use crate::state::AppState;

pub async fn get_milestone(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let milestone = state.deals.milestone(actor.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(milestone))
}

/// POST /api/milestones/{id}/review with `{"decision": "approve"}` or
/// `{"decision": "reject", "feedback": "..."}`.
pub async fn review_milestone(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    body: web::Json<ReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let ReviewRequest { version, decision } = body.into_inner();
    let milestone = state
        .deals
        .review(actor.0, path.into_inner(), version, decision)
        .await?;
    Ok(HttpResponse::Ok().json(milestone))
}
