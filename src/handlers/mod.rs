pub mod deals;
pub mod milestones;
pub mod offers;
pub mod submissions;

use actix_web::web;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::error::{AppError, ValidationErrors};
use crate::models::evidence::ClientToken;
use crate::upload::LocalFile;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    // ── Offer routes ──
    cfg.service(
        web::scope("/offers")
            .route("", web::get().to(offers::list_offers))
            .route("", web::post().to(offers::create_draft))
            .route("/{id}", web::get().to(offers::get_offer))
            .route("/{id}", web::put().to(offers::update_draft))
            .route("/{id}", web::delete().to(offers::delete_offer))
            .route("/{id}/send", web::post().to(offers::send_offer))
            .route("/{id}/respond", web::post().to(offers::respond_to_offer))
            .route("/{id}/history", web::get().to(offers::get_history)),
    );

    // ── Deal routes ──
    cfg.service(
        web::scope("/deals")
            .route("/by-offer/{offer_id}", web::get().to(deals::get_deal_by_offer))
            .route("/{id}", web::get().to(deals::get_deal))
            .route("/{id}/content/review", web::post().to(deals::review_content))
            .route("/{id}/cancel", web::post().to(deals::cancel_deal)),
    );

    // ── Milestone routes ──
    cfg.service(
        web::scope("/milestones")
            .route("/{id}", web::get().to(milestones::get_milestone))
            .route("/{id}/review", web::post().to(milestones::review_milestone)),
    );

    // ── Submission routes ──
    cfg.service(
        web::scope("/submissions")
            .route("", web::post().to(submissions::submit))
            .route("/cancel", web::post().to(submissions::cancel)),
    );
}

/// A file carried inline in a JSON body.
#[derive(Debug, Clone, Deserialize)]
pub struct InlineFile {
    pub file_name: String,
    pub mime_type: String,
    /// Standard base64 of the file bytes.
    pub data: String,
    /// Present when the client retries a file it already tried once.
    pub client_token: Option<ClientToken>,
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    pub version: i32,
}

pub(crate) fn decode_files(files: Vec<InlineFile>) -> Result<Vec<LocalFile>, AppError> {
    let mut errors = ValidationErrors::default();
    let mut decoded = Vec::with_capacity(files.len());

    for (i, file) in files.into_iter().enumerate() {
        match STANDARD.decode(file.data.as_bytes()) {
            Ok(bytes) => {
                let local = LocalFile::in_memory(file.file_name, file.mime_type, bytes);
                decoded.push(match file.client_token {
                    Some(token) => local.with_token(token),
                    None => local,
                });
            }
            Err(e) => errors.add(format!("files[{i}].data"), format!("invalid base64: {e}")),
        }
    }

    errors.into_result()?;
    Ok(decoded)
}
