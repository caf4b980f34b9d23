use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::evidence::Attachments;

/// Which side of the marketplace an actor is on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    #[sea_orm(string_value = "creator")]
    Creator,
    #[sea_orm(string_value = "marketer")]
    Marketer,
}

impl PartyRole {
    pub fn counterpart(self) -> Self {
        match self {
            PartyRole::Creator => PartyRole::Marketer,
            PartyRole::Marketer => PartyRole::Creator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    #[sea_orm(string_value = "custom")]
    Custom,
    #[sea_orm(string_value = "template")]
    Template,
}

/// Offer status stored as a lowercase string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
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

impl OfferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OfferStatus::Accepted | OfferStatus::Rejected | OfferStatus::Expired
        )
    }

    /// Waiting on the recipient party to accept, reject or counter.
    pub fn awaits_response(self) -> bool {
        matches!(self, OfferStatus::Sent | OfferStatus::Countered)
    }
}

/// Social platforms a creator can deliver content on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Tiktok,
    Youtube,
    Twitter,
    Facebook,
    Linkedin,
    Snapchat,
    Pinterest,
    Twitch,
    Blog,
}

/// One deliverable group of an explicit milestone breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMilestone {
    pub name: String,
    pub amount: Decimal,
    pub deliverables: Vec<Platform>,
    pub due_date: Option<NaiveDate>,
}

/// The negotiable part of an offer. Every counter replaces all of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Terms {
    pub proposed_amount: Decimal,
    pub description: String,
    pub deliverables: Vec<Platform>,
    pub desired_review_date: Option<NaiveDate>,
    pub desired_post_date: Option<NaiveDate>,
    #[serde(default)]
    pub milestone_plan: Vec<PlannedMilestone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Deliverables(pub Vec<Platform>);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct MilestonePlan(pub Vec<PlannedMilestone>);

/// SeaORM entity for the `offers` table.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub creator_id: Uuid,
    pub marketer_id: Uuid,
    /// The party that drafted the offer and owns it while it is a draft.
    pub created_by: PartyRole,
    pub offer_name: String,
    pub offer_type: OfferType,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub proposed_amount: Decimal,
    #[sea_orm(column_type = "JsonBinary")]
    pub deliverables: Deliverables,
    pub desired_review_date: Option<Date>,
    pub desired_post_date: Option<Date>,
    #[sea_orm(column_type = "JsonBinary")]
    pub milestone_plan: MilestonePlan,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub agreed_to_terms: bool,
    pub requires_content_approval: bool,
    #[sea_orm(column_type = "JsonBinary")]
    pub attachments: Attachments,
    pub status: OfferStatus,
    /// The party expected to respond next; `None` until the offer is sent.
    pub awaiting: Option<PartyRole>,
    pub last_sent_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::negotiation_events::Entity")]
    NegotiationEvents,
    #[sea_orm(has_one = "super::deals::Entity")]
    Deal,
}

impl Related<super::negotiation_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NegotiationEvents.def()
    }
}

impl Related<super::deals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn terms(&self) -> Terms {
        Terms {
            proposed_amount: self.proposed_amount,
            description: self.description.clone(),
            deliverables: self.deliverables.0.clone(),
            desired_review_date: self.desired_review_date,
            desired_post_date: self.desired_post_date,
            milestone_plan: self.milestone_plan.0.clone(),
        }
    }

    pub fn apply_terms(&mut self, terms: Terms) {
        self.proposed_amount = terms.proposed_amount;
        self.description = terms.description;
        self.deliverables = Deliverables(terms.deliverables);
        self.desired_review_date = terms.desired_review_date;
        self.desired_post_date = terms.desired_post_date;
        self.milestone_plan = MilestonePlan(terms.milestone_plan);
    }

    pub fn party_id(&self, role: PartyRole) -> Uuid {
        match role {
            PartyRole::Creator => self.creator_id,
            PartyRole::Marketer => self.marketer_id,
        }
    }

    pub fn owner_id(&self) -> Uuid {
        self.party_id(self.created_by)
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.marketer_id == user_id
    }
}

// ── DTOs ──

/// Non-negotiable draft fields plus the negotiable terms.
#[derive(Debug, Clone, Deserialize)]
pub struct DraftOffer {
    pub counterpart_id: Uuid,
    pub offer_name: String,
    pub offer_type: OfferType,
    pub terms: Terms,
    pub notes: Option<String>,
    #[serde(default)]
    pub agreed_to_terms: bool,
    #[serde(default)]
    pub requires_content_approval: bool,
}
