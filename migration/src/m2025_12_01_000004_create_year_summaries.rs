//! Migration to create the year_summaries table.
//!
//! The summary document is stored as text rather than jsonb so recomputed
//! documents can be compared byte for byte.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(YearSummaries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(YearSummaries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(YearSummaries::Puuid).string_len(128).not_null())
                    .col(ColumnDef::new(YearSummaries::Year).integer().not_null())
                    .col(
                        ColumnDef::new(YearSummaries::ComputedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(YearSummaries::SummaryJson).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uk_year_summaries_puuid_year")
                    .table(YearSummaries::Table)
                    .col(YearSummaries::Puuid)
                    .col(YearSummaries::Year)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("uk_year_summaries_puuid_year").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(YearSummaries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum YearSummaries {
    Table,
    Id,
    Puuid,
    Year,
    ComputedAt,
    SummaryJson,
}
