use sea_orm::*;
use uuid::Uuid;

use crate::models::milestones;

/// Insert the milestones derived for a new deal.
pub async fn insert_milestones<C: ConnectionTrait>(
    db: &C,
    items: Vec<milestones::Model>,
) -> Result<(), DbErr> {
    if items.is_empty() {
        return Ok(());
    }

    let active: Vec<milestones::ActiveModel> = items
        .into_iter()
        .map(|m| milestones::ActiveModel::from(m).reset_all())
        .collect();

    milestones::Entity::insert_many(active).exec(db).await?;
    Ok(())
}

/// Fetch a single milestone by ID.
pub async fn get_milestone_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<milestones::Model>, DbErr> {
    milestones::Entity::find_by_id(id).one(db).await
}

/// Fetch the milestones of a deal in position order.
pub async fn get_milestones_by_deal<C: ConnectionTrait>(
    db: &C,
    deal_id: Uuid,
) -> Result<Vec<milestones::Model>, DbErr> {
    milestones::Entity::find()
        .filter(milestones::Column::DealId.eq(deal_id))
        .order_by_asc(milestones::Column::Position)
        .all(db)
        .await
}

/// Overwrite a milestone only if its stored version still equals `expected_version`.
pub async fn update_milestone_if_version<C: ConnectionTrait>(
    db: &C,
    milestone: milestones::Model,
    expected_version: i32,
) -> Result<u64, DbErr> {
    let id = milestone.id;
    let active = milestones::ActiveModel::from(milestone).reset_all();

    let result = milestones::Entity::update_many()
        .set(active)
        .filter(milestones::Column::Id.eq(id))
        .filter(milestones::Column::Version.eq(expected_version))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
