use actix_web::{HttpResponse, web};
use serde::Deserialize;

use super::{InlineFile, decode_files};
use crate::auth::AuthenticatedActor;
use crate::error::AppError;
use crate::state::AppState;
use crate::workflow::{SubmissionRequest, SubmissionTarget};

#[derive(Debug, Deserialize)]
pub struct SubmissionBody {
    #[serde(flatten)]
    pub target: SubmissionTarget,
    pub version: i32,
    #[serde(default)]
    pub files: Vec<InlineFile>,
    #[serde(default)]
    pub social_links: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    #[serde(flatten)]
    pub target: SubmissionTarget,
}

/// POST /api/submissions: milestone work, offer content, proof or draft
/// attachments, routed by `target`.
pub async fn submit(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    body: web::Json<SubmissionBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = SubmissionRequest {
        actor: actor.0,
        target: body.target,
        expected_version: body.version,
        files: decode_files(body.files)?,
        social_links: body.social_links,
    };
    let receipt = state.router.submit(request).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

/// POST /api/submissions/cancel: stop the upload of an in-flight
/// submission. Files already stored stay stored.
pub async fn cancel(
    actor: AuthenticatedActor,
    state: web::Data<AppState>,
    body: web::Json<CancelBody>,
) -> Result<HttpResponse, AppError> {
    let cancelled = state.router.cancel(actor.0, body.target.lane());
    Ok(HttpResponse::Ok().json(serde_json::json!({ "cancelled": cancelled })))
}
