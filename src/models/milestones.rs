use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::evidence::{FeedbackHistory, SocialLinks, Submissions};
use super::offers::Deliverables;

/// Milestone status stored as a lowercase string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum MilestoneStatus {
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "resubmitted")]
    Resubmitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl MilestoneStatus {
    pub fn awaits_review(self) -> bool {
        matches!(self, MilestoneStatus::Submitted | MilestoneStatus::Resubmitted)
    }
}

/// SeaORM entity for the `milestones` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "milestones")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub deal_id: Uuid,
    /// Zero-based order within the deal.
    pub position: i32,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub due_date: Option<Date>,
    pub status: MilestoneStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub deliverables: Deliverables,
    #[sea_orm(column_type = "JsonBinary")]
    pub submissions: Submissions,
    #[sea_orm(column_type = "JsonBinary")]
    pub social_links: SocialLinks,
    #[sea_orm(column_type = "JsonBinary")]
    pub feedback_history: FeedbackHistory,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::deals::Entity",
        from = "Column::DealId",
        to = "super::deals::Column::Id"
    )]
    Deal,
}

impl Related<super::deals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
