pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_offers_table;
mod m20260301_000002_create_negotiation_events_table;
mod m20260301_000003_create_deals_table;
mod m20260301_000004_create_milestones_table;
mod m20260301_000005_add_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_offers_table::Migration),
            Box::new(m20260301_000002_create_negotiation_events_table::Migration),
            Box::new(m20260301_000003_create_deals_table::Migration),
            Box::new(m20260301_000004_create_milestones_table::Migration),
            Box::new(m20260301_000005_add_indexes::Migration),
        ]
    }
}
