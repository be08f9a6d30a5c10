//! Migration to create the player_matches table (the match index).
//!
//! The unique (puuid, year, match_id) constraint is what makes repeated
//! inserts from restarted or concurrent jobs a no-op.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PlayerMatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlayerMatches::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlayerMatches::Puuid).string_len(128).not_null())
                    .col(ColumnDef::new(PlayerMatches::Year).integer().not_null())
                    .col(ColumnDef::new(PlayerMatches::MatchId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(PlayerMatches::CreatedAt)
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
                    .name("uk_player_matches_puuid_year_match")
                    .table(PlayerMatches::Table)
                    .col(PlayerMatches::Puuid)
                    .col(PlayerMatches::Year)
                    .col(PlayerMatches::MatchId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("uk_player_matches_puuid_year_match")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(PlayerMatches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PlayerMatches {
    Table,
    Id,
    Puuid,
    Year,
    MatchId,
    CreatedAt,
}
