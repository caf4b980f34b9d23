//! JSON value types shared by offers, deals and milestones: uploaded file
//! references, submissions, social links and reviewer feedback.

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::offers::Platform;

/// Idempotency key assigned to a file before any bytes leave the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientToken(pub Uuid);

impl ClientToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Uploading,
    Stored,
    Failed,
}

/// Reference to a stored (or not yet stored) binary.
///
/// Once `status` is `Stored` the record is never modified again; a
/// correction means a new file with a new client token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub client_token: ClientToken,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub status: FileStatus,
    pub remote_url: Option<String>,
    /// Why the file failed, when it did.
    pub failure: Option<String>,
}

impl UploadedFile {
    pub fn is_stored(&self) -> bool {
        self.status == FileStatus::Stored && self.remote_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Attachments(pub Vec<UploadedFile>);

impl Attachments {
    pub fn all_stored(&self) -> bool {
        self.0.iter().all(UploadedFile::is_stored)
    }

    pub fn not_stored(&self) -> Vec<UploadedFile> {
        self.0.iter().filter(|f| !f.is_stored()).cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub url: String,
    pub platform: Option<Platform>,
    pub added_at: DateTime<Utc>,
}

/// Append-only registry of every post link recorded against an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct SocialLinks(pub Vec<SocialLink>);

impl SocialLinks {
    pub fn append(&mut self, links: impl IntoIterator<Item = SocialLink>) {
        self.0.extend(links);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionKind {
    Initial,
    Resubmission,
    Content,
    Proof,
}

/// One accepted batch of evidence. Earlier submissions are kept so that
/// reviewers can compare attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// 1-based attempt number within the owning collection.
    pub version: i32,
    pub kind: SubmissionKind,
    pub submitted_by: Uuid,
    pub files: Vec<UploadedFile>,
    pub social_links: Vec<SocialLink>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Submissions(pub Vec<Submission>);

impl Submissions {
    pub fn latest_version(&self) -> i32 {
        self.0.last().map_or(0, |s| s.version)
    }

    pub fn next_version(&self) -> i32 {
        self.latest_version() + 1
    }

    pub fn push(&mut self, submission: Submission) {
        self.0.push(submission);
    }
}

/// A reviewer comment, tied to the submission attempt it critiques.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub submission_version: i32,
    pub reviewer_id: Uuid,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FeedbackHistory(pub Vec<Feedback>);

impl FeedbackHistory {
    pub fn push(&mut self, feedback: Feedback) {
        self.0.push(feedback);
    }

    pub fn for_version(&self, version: i32) -> impl Iterator<Item = &Feedback> {
        self.0.iter().filter(move |f| f.submission_version == version)
    }
}
