use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Milestones {
    Table,
    Id,
    DealId,
    Position,
    Name,
    Amount,
    DueDate,
    Status,
    Deliverables,
    Submissions,
    SocialLinks,
    FeedbackHistory,
    CreatedAt,
    UpdatedAt,
    Version,
}

#[derive(DeriveIden)]
enum Deals {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Milestones::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Milestones::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Milestones::DealId).uuid().not_null())
                    .col(ColumnDef::new(Milestones::Position).integer().not_null())
                    .col(ColumnDef::new(Milestones::Name).string().not_null())
                    .col(
                        ColumnDef::new(Milestones::Amount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Milestones::DueDate).date().null())
                    .col(ColumnDef::new(Milestones::Status).string().not_null())
                    .col(
                        ColumnDef::new(Milestones::Deliverables)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::Submissions)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::SocialLinks)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::FeedbackHistory)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Milestones::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_milestones_deal_id")
                            .from(Milestones::Table, Milestones::DealId)
                            .to(Deals::Table, Deals::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_milestones_deal_position")
                    .table(Milestones::Table)
                    .col(Milestones::DealId)
                    .col(Milestones::Position)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Milestones::Table).to_owned())
            .await
    }
}
