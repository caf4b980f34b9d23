use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::offers::{PartyRole, Terms};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum NegotiationAction {
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "countered")]
    Countered,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// SeaORM entity for the append-only `negotiation_events` table.
///
/// `sequence` is the offer version produced by the transition, so events
/// of one offer are totally ordered.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "negotiation_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub offer_id: Uuid,
    pub sequence: i32,
    pub actor_id: Uuid,
    /// `None` when the system acted (expiry).
    pub actor_role: Option<PartyRole>,
    pub action: NegotiationAction,
    #[sea_orm(column_type = "JsonBinary")]
    pub previous_terms: Terms,
    #[sea_orm(column_type = "JsonBinary")]
    pub new_terms: Terms,
    #[sea_orm(column_type = "Text", nullable)]
    pub reason: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::offers::Entity",
        from = "Column::OfferId",
        to = "super::offers::Column::Id"
    )]
    Offer,
}

impl Related<super::offers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
