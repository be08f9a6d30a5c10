//! # PlayerMatch Repository
//!
//! SeaORM store for the match index.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder,
};

use super::MatchIndexStore;
use crate::error::RepositoryError;
use crate::models::JobKey;
use crate::models::player_match::{ActiveModel, Column, Entity};

/// Repository for the player_matches table
pub struct PlayerMatchRepository {
    db: DatabaseConnection,
}

impl PlayerMatchRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatchIndexStore for PlayerMatchRepository {
    async fn insert_ignore(&self, key: &JobKey, match_id: &str) -> Result<bool, RepositoryError> {
        let entry = ActiveModel {
            puuid: Set(key.puuid.clone()),
            year: Set(key.year),
            match_id: Set(match_id.to_string()),
            created_at: Set(Utc::now().fixed_offset()),
            ..Default::default()
        };

        let result = Entity::insert(entry)
            .on_conflict(
                OnConflict::columns([Column::Puuid, Column::Year, Column::MatchId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await;

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(err) => {
                tracing::error!("Failed to index match {} for {}: {}", match_id, key, err);
                Err(err.into())
            }
        }
    }

    async fn list_match_ids(&self, key: &JobKey) -> Result<Vec<String>, RepositoryError> {
        let rows = Entity::find()
            .filter(Column::Puuid.eq(key.puuid.as_str()))
            .filter(Column::Year.eq(key.year))
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|row| row.match_id).collect())
    }
}
