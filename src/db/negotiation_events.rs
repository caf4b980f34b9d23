use sea_orm::*;
use uuid::Uuid;

use crate::models::negotiation_events;

/// Append an event. Events are never updated or deleted.
pub async fn insert_event<C: ConnectionTrait>(
    db: &C,
    event: negotiation_events::Model,
) -> Result<negotiation_events::Model, DbErr> {
    negotiation_events::ActiveModel::from(event)
        .reset_all()
        .insert(db)
        .await
}

/// Highest sequence recorded for an offer, or 0 when it has no events.
pub async fn last_sequence<C: ConnectionTrait>(db: &C, offer_id: Uuid) -> Result<i32, DbErr> {
    let last = negotiation_events::Entity::find()
        .filter(negotiation_events::Column::OfferId.eq(offer_id))
        .order_by_desc(negotiation_events::Column::Sequence)
        .one(db)
        .await?;

    Ok(last.map_or(0, |e| e.sequence))
}

/// Fetch the events of an offer in sequence order.
pub async fn get_events_by_offer<C: ConnectionTrait>(
    db: &C,
    offer_id: Uuid,
) -> Result<Vec<negotiation_events::Model>, DbErr> {
    negotiation_events::Entity::find()
        .filter(negotiation_events::Column::OfferId.eq(offer_id))
        .order_by_asc(negotiation_events::Column::Sequence)
        .all(db)
        .await
}
