use sea_orm::*;
use uuid::Uuid;

use crate::models::deals;

/// Insert a freshly derived deal.
pub async fn insert_deal<C: ConnectionTrait>(
    db: &C,
    deal: deals::Model,
) -> Result<deals::Model, DbErr> {
    deals::ActiveModel::from(deal).reset_all().insert(db).await
}

/// Fetch a single deal by ID.
pub async fn get_deal_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<deals::Model>, DbErr> {
    deals::Entity::find_by_id(id).one(db).await
}

/// Fetch a deal and hold its row lock until the surrounding transaction
/// ends. Milestone commits and cancellation serialize on this lock.
pub async fn lock_deal_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<deals::Model>, DbErr> {
    deals::Entity::find_by_id(id).lock_exclusive().one(db).await
}

/// Fetch the deal an offer turned into, if it was accepted.
pub async fn get_deal_by_offer_id<C: ConnectionTrait>(
    db: &C,
    offer_id: Uuid,
) -> Result<Option<deals::Model>, DbErr> {
    deals::Entity::find()
        .filter(deals::Column::OfferId.eq(offer_id))
        .one(db)
        .await
}

/// Overwrite a deal only if its stored version still equals `expected_version`.
pub async fn update_deal_if_version<C: ConnectionTrait>(
    db: &C,
    deal: deals::Model,
    expected_version: i32,
) -> Result<u64, DbErr> {
    let id = deal.id;
    let active = deals::ActiveModel::from(deal).reset_all();

    let result = deals::Entity::update_many()
        .set(active)
        .filter(deals::Column::Id.eq(id))
        .filter(deals::Column::Version.eq(expected_version))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
