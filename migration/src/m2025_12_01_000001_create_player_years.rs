//! Migration to create the player_years table.
//!
//! One row per (puuid, year) wrapped job. The row doubles as job history and as
//! the admission anchor that keeps a single ingestion run alive per key.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlayerYears::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlayerYears::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlayerYears::Puuid).string_len(128).not_null())
                    .col(ColumnDef::new(PlayerYears::Year).integer().not_null())
                    .col(ColumnDef::new(PlayerYears::Platform).string_len(16).not_null())
                    .col(ColumnDef::new(PlayerYears::RiotId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(PlayerYears::State)
                            .string_len(32)
                            .not_null()
                            .default("QUEUED"),
                    )
                    .col(
                        ColumnDef::new(PlayerYears::MatchIdsFound)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerYears::MatchesCached)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PlayerYears::SummaryReady)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PlayerYears::Message).string_len(512).not_null())
                    .col(
                        ColumnDef::new(PlayerYears::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PlayerYears::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uk_player_years_puuid_year")
                    .table(PlayerYears::Table)
                    .col(PlayerYears::Puuid)
                    .col(PlayerYears::Year)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Fast-path lookup by display identifier before the puuid is resolved
        manager
            .create_index(
                Index::create()
                    .name("idx_player_years_riot_id_year")
                    .table(PlayerYears::Table)
                    .col(PlayerYears::RiotId)
                    .col(PlayerYears::Year)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_player_years_riot_id_year")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("uk_player_years_puuid_year").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(PlayerYears::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PlayerYears {
    Table,
    Id,
    Puuid,
    Year,
    Platform,
    RiotId,
    State,
    MatchIdsFound,
    MatchesCached,
    SummaryReady,
    Message,
    CreatedAt,
    UpdatedAt,
}
