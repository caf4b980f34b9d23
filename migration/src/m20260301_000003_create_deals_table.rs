use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
    OfferId,
    CreatorId,
    MarketerId,
    Status,
    ContentStatus,
    ContentSubmissions,
    ContentFeedback,
    Proofs,
    CreatedAt,
    UpdatedAt,
    Version,
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
                    .table(Deals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Deals::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Deals::OfferId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Deals::CreatorId).uuid().not_null())
                    .col(ColumnDef::new(Deals::MarketerId).uuid().not_null())
                    .col(ColumnDef::new(Deals::Status).string().not_null())
                    .col(ColumnDef::new(Deals::ContentStatus).string().not_null())
                    .col(
                        ColumnDef::new(Deals::ContentSubmissions)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deals::ContentFeedback)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Deals::Proofs).json_binary().not_null())
                    .col(
                        ColumnDef::new(Deals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Deals::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deals_offer_id")
                            .from(Deals::Table, Deals::OfferId)
                            .to(Offers::Table, Offers::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Deals::Table).to_owned())
            .await
    }
}
