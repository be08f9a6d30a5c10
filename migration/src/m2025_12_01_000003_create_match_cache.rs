//! Migration to create the match_cache table.
//!
//! Raw match payloads keyed by match id, shared by every player and year that
//! references the match.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MatchCache::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MatchCache::MatchId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MatchCache::Routing).string_len(16).not_null())
                    .col(
                        ColumnDef::new(MatchCache::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(MatchCache::Payload).json_binary().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MatchCache::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MatchCache {
    Table,
    MatchId,
    Routing,
    FetchedAt,
    Payload,
}
