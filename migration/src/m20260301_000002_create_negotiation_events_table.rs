use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum NegotiationEvents {
    Table,
    Id,
    OfferId,
    Sequence,
    ActorId,
    ActorRole,
    Action,
    PreviousTerms,
    NewTerms,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Offers {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NegotiationEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NegotiationEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NegotiationEvents::OfferId).uuid().not_null())
                    .col(
                        ColumnDef::new(NegotiationEvents::Sequence)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NegotiationEvents::ActorId).uuid().not_null())
                    .col(ColumnDef::new(NegotiationEvents::ActorRole).string().null())
                    .col(ColumnDef::new(NegotiationEvents::Action).string().not_null())
                    .col(
                        ColumnDef::new(NegotiationEvents::PreviousTerms)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(NegotiationEvents::NewTerms)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(NegotiationEvents::Reason).text().null())
                    .col(
                        ColumnDef::new(NegotiationEvents::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_negotiation_events_offer_id")
                            .from(NegotiationEvents::Table, NegotiationEvents::OfferId)
                            .to(Offers::Table, Offers::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One event per offer version
        manager
            .create_index(
                Index::create()
                    .name("uq_negotiation_events_offer_sequence")
                    .table(NegotiationEvents::Table)
                    .col(NegotiationEvents::OfferId)
                    .col(NegotiationEvents::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NegotiationEvents::Table).to_owned())
            .await
    }
}
