use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Offers {
    Table,
    CreatorId,
    MarketerId,
    Status,
    LastSentAt,
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    CreatorId,
    MarketerId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Offer listings per party
        manager
            .create_index(
                Index::create()
                    .name("idx_offers_creator_id")
                    .table(Offers::Table)
                    .col(Offers::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_offers_marketer_id")
                    .table(Offers::Table)
                    .col(Offers::MarketerId)
                    .to_owned(),
            )
            .await?;

        // Expiry sweep scans sent offers by last send time
        manager
            .create_index(
                Index::create()
                    .name("idx_offers_status_last_sent_at")
                    .table(Offers::Table)
                    .col(Offers::Status)
                    .col(Offers::LastSentAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deals_creator_id")
                    .table(Deals::Table)
                    .col(Deals::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_deals_marketer_id")
                    .table(Deals::Table)
                    .col(Deals::MarketerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "idx_offers_creator_id",
            "idx_offers_marketer_id",
            "idx_offers_status_last_sent_at",
            "idx_deals_creator_id",
            "idx_deals_marketer_id",
        ] {
            manager
                .drop_index(Index::drop().name(name).to_owned())
                .await?;
        }

        Ok(())
    }
}
