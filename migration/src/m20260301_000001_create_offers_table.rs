use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Identifiers for the `offers` table and its columns.
#[derive(DeriveIden)]
enum Offers {
    Table,
    Id,
    CreatorId,
    MarketerId,
    CreatedBy,
    OfferName,
    OfferType,
    Description,
    ProposedAmount,
    Deliverables,
    DesiredReviewDate,
    DesiredPostDate,
    MilestonePlan,
    Notes,
    AgreedToTerms,
    RequiresContentApproval,
    Attachments,
    Status,
    Awaiting,
    LastSentAt,
    DeletedAt,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Offers::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Offers::CreatorId).uuid().not_null())
                    .col(ColumnDef::new(Offers::MarketerId).uuid().not_null())
                    .col(ColumnDef::new(Offers::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Offers::OfferName).string().not_null())
                    .col(ColumnDef::new(Offers::OfferType).string().not_null())
                    .col(ColumnDef::new(Offers::Description).text().not_null())
                    .col(
                        ColumnDef::new(Offers::ProposedAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Offers::Deliverables).json_binary().not_null())
                    .col(ColumnDef::new(Offers::DesiredReviewDate).date().null())
                    .col(ColumnDef::new(Offers::DesiredPostDate).date().null())
                    .col(ColumnDef::new(Offers::MilestonePlan).json_binary().not_null())
                    .col(ColumnDef::new(Offers::Notes).text().null())
                    .col(
                        ColumnDef::new(Offers::AgreedToTerms)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Offers::RequiresContentApproval)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Offers::Attachments).json_binary().not_null())
                    .col(ColumnDef::new(Offers::Status).string().not_null())
                    .col(ColumnDef::new(Offers::Awaiting).string().null())
                    .col(
                        ColumnDef::new(Offers::LastSentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Offers::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Offers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Offers::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await
    }
}
