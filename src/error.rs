use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::models::evidence::UploadedFile;
use crate::store::StoreError;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every problem found in one validation pass, so the caller can fix
/// them together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} {id} is at version {actual}, but version {expected} was supplied")]
    StaleVersion {
        entity: &'static str,
        id: Uuid,
        expected: i32,
        actual: i32,
    },

    #[error("{} attachment(s) are not stored yet", pending.len())]
    AttachmentsIncomplete { pending: Vec<UploadedFile> },

    #[error("{} of {} evidence file(s) failed to upload", failed.len(), failed.len() + stored.len())]
    EvidenceIncomplete {
        stored: Vec<UploadedFile>,
        failed: Vec<UploadedFile>,
    },

    #[error("Upload session {0} was cancelled")]
    UploadCancelled(Uuid),

    #[error("Payment authorization failed: {reason}")]
    PaymentFailed { reason: String },

    #[error("Cannot {action} {entity} while it is {from}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("A submission for {0} is already in progress")]
    SubmissionInProgress(Uuid),

    #[error("Deal {0} requires approved content before milestone work can be submitted")]
    ContentApprovalPending(Uuid),

    #[error("{0}")]
    Forbidden(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn illegal(entity: &'static str, from: impl fmt::Debug, action: &'static str) -> Self {
        AppError::IllegalTransition {
            entity,
            from: format!("{from:?}"),
            action,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(message.into())
    }

    /// Stable, machine-readable category clients branch on.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::StaleVersion { .. } => "stale_version",
            AppError::AttachmentsIncomplete { .. } => "attachments_incomplete",
            AppError::EvidenceIncomplete { .. } => "evidence_incomplete",
            AppError::UploadCancelled(_) => "upload_cancelled",
            AppError::PaymentFailed { .. } => "payment_failed",
            AppError::IllegalTransition { .. } => "illegal_transition",
            AppError::SubmissionInProgress(_) => "submission_in_progress",
            AppError::ContentApprovalPending(_) => "content_approval_pending",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound { .. } => "not_found",
            AppError::Internal(_) => "internal",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            AppError::StaleVersion { actual, .. } => {
                Some(serde_json::json!({ "current_version": actual }))
            }
            AppError::AttachmentsIncomplete { pending } => {
                Some(serde_json::json!({ "pending": pending }))
            }
            AppError::EvidenceIncomplete { stored, failed } => {
                Some(serde_json::json!({ "stored": stored, "failed": failed }))
            }
            _ => None,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => AppError::NotFound { entity, id },
            StoreError::VersionConflict {
                entity,
                id,
                expected,
                actual,
            } => AppError::StaleVersion {
                entity,
                id,
                expected,
                actual,
            },
            StoreError::Illegal {
                entity,
                from,
                action,
            } => AppError::IllegalTransition {
                entity,
                from,
                action,
            },
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    category: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StaleVersion { .. }
            | AppError::IllegalTransition { .. }
            | AppError::SubmissionInProgress(_)
            | AppError::ContentApprovalPending(_) => StatusCode::CONFLICT,
            AppError::AttachmentsIncomplete { .. }
            | AppError::EvidenceIncomplete { .. }
            | AppError::UploadCancelled(_) => StatusCode::FAILED_DEPENDENCY,
            AppError::PaymentFailed { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            category: self.category(),
            details: self.details(),
        })
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::milestones::MilestoneStatus;

    #[test]
    fn store_conflict_maps_to_stale_version() {
        let id = Uuid::new_v4();
        let err: AppError = StoreError::VersionConflict {
            entity: "offer",
            id,
            expected: 2,
            actual: 3,
        }
        .into();

        assert_eq!(err.category(), "stale_version");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn every_category_is_distinct() {
        let id = Uuid::new_v4();
        let errors = [
            AppError::Validation(ValidationErrors::default()),
            AppError::StaleVersion {
                entity: "offer",
                id,
                expected: 1,
                actual: 2,
            },
            AppError::AttachmentsIncomplete { pending: vec![] },
            AppError::EvidenceIncomplete {
                stored: vec![],
                failed: vec![],
            },
            AppError::UploadCancelled(id),
            AppError::PaymentFailed {
                reason: "declined".into(),
            },
            AppError::illegal("milestone", "Assigned", "resubmit"),
            AppError::SubmissionInProgress(id),
            AppError::ContentApprovalPending(id),
            AppError::forbidden("no"),
            AppError::NotFound { entity: "deal", id },
            AppError::Internal("boom".into()),
        ];

        let mut categories: Vec<&str> = errors.iter().map(AppError::category).collect();
        categories.sort_unstable();
        categories.dedup();
        assert_eq!(categories.len(), errors.len());
    }

    #[test]
    fn illegal_transition_message_names_state_and_action() {
        let err = AppError::illegal("milestone", MilestoneStatus::Assigned, "resubmit");
        assert_eq!(err.to_string(), "Cannot resubmit milestone while it is Assigned");
    }
}
