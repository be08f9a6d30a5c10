//! Database migrations for the wrapped service.
//!
//! Creates the job record, match index, match cache and year summary tables.

pub use sea_orm_migration::prelude::*;

mod m2025_12_01_000001_create_player_years;
mod m2025_12_01_000002_create_player_matches;
mod m2025_12_01_000003_create_match_cache;
mod m2025_12_01_000004_create_year_summaries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_12_01_000001_create_player_years::Migration),
            Box::new(m2025_12_01_000002_create_player_matches::Migration),
            Box::new(m2025_12_01_000003_create_match_cache::Migration),
            Box::new(m2025_12_01_000004_create_year_summaries::Migration),
        ]
    }
}
