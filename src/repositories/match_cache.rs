//! # MatchCache Repository
//!
//! SeaORM store for raw match documents. Writes are insert-or-ignore; an
//! existing document is never replaced.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait};

use super::{CachedMatch, MatchCacheStore};
use crate::error::RepositoryError;
use crate::models::match_cache::{ActiveModel, Column, Entity};

/// Repository for the match_cache table
pub struct MatchCacheRepository {
    db: DatabaseConnection,
}

impl MatchCacheRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatchCacheStore for MatchCacheRepository {
    async fn contains(&self, match_id: &str) -> Result<bool, RepositoryError> {
        let count = Entity::find_by_id(match_id.to_string())
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn get(&self, match_id: &str) -> Result<Option<CachedMatch>, RepositoryError> {
        let row = Entity::find_by_id(match_id.to_string())
            .one(&self.db)
            .await?;

        Ok(row.map(|row| CachedMatch {
            match_id: row.match_id,
            routing: row.routing,
            fetched_at: row.fetched_at.with_timezone(&Utc),
            payload: row.payload,
        }))
    }

    async fn insert_if_absent(&self, entry: CachedMatch) -> Result<bool, RepositoryError> {
        let match_id = entry.match_id.clone();
        let row = ActiveModel {
            match_id: Set(entry.match_id),
            routing: Set(entry.routing),
            fetched_at: Set(entry.fetched_at.fixed_offset()),
            payload: Set(entry.payload),
        };

        let result = Entity::insert(row)
            .on_conflict(OnConflict::column(Column::MatchId).do_nothing().to_owned())
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(err) => {
                tracing::error!("Failed to cache match {}: {}", match_id, err);
                Err(err.into())
            }
        }
    }
}
