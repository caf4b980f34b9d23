use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::evidence::{FeedbackHistory, Submissions};
use super::offers::PartyRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum DealStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Pre-production content approval gate recorded on the deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[sea_orm(string_value = "not_required")]
    NotRequired,
    #[sea_orm(string_value = "awaiting_content")]
    AwaitingContent,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ContentStatus {
    /// Whether milestone work may be submitted under this gate.
    pub fn unblocks_milestones(self) -> bool {
        matches!(self, ContentStatus::NotRequired | ContentStatus::Approved)
    }
}

/// SeaORM entity for the `deals` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub offer_id: Uuid,
    pub creator_id: Uuid,
    pub marketer_id: Uuid,
    pub status: DealStatus,
    pub content_status: ContentStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub content_submissions: Submissions,
    #[sea_orm(column_type = "JsonBinary")]
    pub content_feedback: FeedbackHistory,
    #[sea_orm(column_type = "JsonBinary")]
    pub proofs: Submissions,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offers::Entity",
        from = "Column::OfferId",
        to = "super::offers::Column::Id"
    )]
    Offer,
    #[sea_orm(has_many = "super::milestones::Entity")]
    Milestones,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl Related<super::milestones::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Milestones.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn role_of(&self, user_id: Uuid) -> Option<PartyRole> {
        if self.creator_id == user_id {
            Some(PartyRole::Creator)
        } else if self.marketer_id == user_id {
            Some(PartyRole::Marketer)
        } else {
            None
        }
    }
}
