use chrono::{DateTime, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::models::offers::{self, OfferStatus};

/// Insert a new offer row.
pub async fn insert_offer<C: ConnectionTrait>(
    db: &C,
    offer: offers::Model,
) -> Result<offers::Model, DbErr> {
    offers::ActiveModel::from(offer).reset_all().insert(db).await
}

/// Fetch a single offer by ID, including soft-deleted ones.
pub async fn get_offer_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<offers::Model>, DbErr> {
    offers::Entity::find_by_id(id).one(db).await
}

/// Live offers where the user is either party, most recently touched first.
pub async fn get_offers_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
    offset: u64,
    limit: u64,
) -> Result<Vec<offers::Model>, DbErr> {
    offers::Entity::find()
        .filter(offers::Column::DeletedAt.is_null())
        .filter(
            Condition::any()
                .add(offers::Column::CreatorId.eq(user_id))
                .add(offers::Column::MarketerId.eq(user_id)),
        )
        .order_by_desc(offers::Column::UpdatedAt)
        .order_by_desc(offers::Column::Id)
        .offset(offset)
        .limit(limit)
        .all(db)
        .await
}

/// Live offers still awaiting a response that were last sent before `cutoff`.
pub async fn get_offers_sent_before(
    db: &DatabaseConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<offers::Model>, DbErr> {
    offers::Entity::find()
        .filter(offers::Column::DeletedAt.is_null())
        .filter(offers::Column::Status.is_in([OfferStatus::Sent, OfferStatus::Countered]))
        .filter(offers::Column::LastSentAt.lt(cutoff))
        .all(db)
        .await
}

/// Overwrite an offer only if its stored version still equals `expected_version`.
///
/// Returns the number of rows written: zero means the version moved on
/// (or the row is gone).
pub async fn update_offer_if_version<C: ConnectionTrait>(
    db: &C,
    offer: offers::Model,
    expected_version: i32,
) -> Result<u64, DbErr> {
    let id = offer.id;
    let active = offers::ActiveModel::from(offer).reset_all();

    let result = offers::Entity::update_many()
        .set(active)
        .filter(offers::Column::Id.eq(id))
        .filter(offers::Column::Version.eq(expected_version))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
