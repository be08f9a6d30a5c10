//! # YearSummary Repository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use super::{StoredSummary, SummaryStore};
use crate::error::RepositoryError;
use crate::models::JobKey;
use crate::models::year_summary::{ActiveModel, Column, Entity};

/// Repository for the year_summaries table
pub struct YearSummaryRepository {
    db: DatabaseConnection,
}

impl YearSummaryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SummaryStore for YearSummaryRepository {
    async fn find(&self, key: &JobKey) -> Result<Option<StoredSummary>, RepositoryError> {
        let row = Entity::find()
            .filter(Column::Puuid.eq(key.puuid.as_str()))
            .filter(Column::Year.eq(key.year))
            .one(&self.db)
            .await?;

        Ok(row.map(|row| StoredSummary {
            key: JobKey::new(row.puuid, row.year),
            computed_at: row.computed_at.with_timezone(&Utc),
            summary_json: row.summary_json,
        }))
    }

    async fn upsert(&self, key: &JobKey, summary_json: String) -> Result<(), RepositoryError> {
        let row = ActiveModel {
            puuid: Set(key.puuid.clone()),
            year: Set(key.year),
            computed_at: Set(Utc::now().fixed_offset()),
            summary_json: Set(summary_json),
            ..Default::default()
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::Puuid, Column::Year])
                    .update_columns([Column::ComputedAt, Column::SummaryJson])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to upsert summary for {}: {}", key, e);
                RepositoryError::from(e)
            })?;

        Ok(())
    }
}
