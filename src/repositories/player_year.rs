//! # PlayerYear Repository
//!
//! SeaORM store for job records. `lock_or_create` holds `SELECT ... FOR UPDATE`
//! inside a transaction; the seed row is inserted under a savepoint so a lost
//! insert race can be rolled back without aborting the outer transaction.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use tracing::debug;

use super::{JobRecordStore, LockedJob};
use crate::error::{RepositoryError, is_unique_violation};
use crate::models::player_year::{ActiveModel, Column, Entity, Model};
use crate::models::{JobKey, JobRecord, JobState};

const ENTITY: &str = "player_year";

/// Repository for the player_years table
pub struct PlayerYearRepository {
    db: DatabaseConnection,
}

impl PlayerYearRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_record(model: Model) -> Result<JobRecord, RepositoryError> {
    let state = model
        .state
        .parse::<JobState>()
        .map_err(|reason| RepositoryError::CorruptRecord {
            entity: ENTITY,
            reason,
        })?;

    Ok(JobRecord {
        key: JobKey::new(model.puuid, model.year),
        platform: model.platform,
        riot_id: model.riot_id,
        state,
        match_ids_found: model.match_ids_found,
        matches_cached: model.matches_cached,
        summary_ready: model.summary_ready,
        message: model.message,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

/// Mutable columns of a record; identity and creation time are left unset.
fn changes(record: &JobRecord) -> ActiveModel {
    ActiveModel {
        platform: Set(record.platform.clone()),
        riot_id: Set(record.riot_id.clone()),
        state: Set(record.state.as_str().to_string()),
        match_ids_found: Set(record.match_ids_found),
        matches_cached: Set(record.matches_cached),
        summary_ready: Set(record.summary_ready),
        message: Set(record.message.clone()),
        updated_at: Set(record.updated_at.fixed_offset()),
        ..Default::default()
    }
}

fn seed_row(record: &JobRecord) -> ActiveModel {
    ActiveModel {
        puuid: Set(record.key.puuid.clone()),
        year: Set(record.key.year),
        created_at: Set(record.created_at.fixed_offset()),
        ..changes(record)
    }
}

async fn lock_row<C: ConnectionTrait>(conn: &C, key: &JobKey) -> Result<Option<Model>, DbErr> {
    Entity::find()
        .filter(Column::Puuid.eq(key.puuid.as_str()))
        .filter(Column::Year.eq(key.year))
        .lock(LockType::Update)
        .one(conn)
        .await
}

#[async_trait]
impl JobRecordStore for PlayerYearRepository {
    async fn find(&self, key: &JobKey) -> Result<Option<JobRecord>, RepositoryError> {
        Entity::find()
            .filter(Column::Puuid.eq(key.puuid.as_str()))
            .filter(Column::Year.eq(key.year))
            .one(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find job record {}: {}", key, e);
                RepositoryError::from(e)
            })?
            .map(to_record)
            .transpose()
    }

    async fn find_by_riot_id(
        &self,
        riot_id: &str,
        year: i32,
    ) -> Result<Option<JobRecord>, RepositoryError> {
        Entity::find()
            .filter(Column::RiotId.eq(riot_id))
            .filter(Column::Year.eq(year))
            .order_by_desc(Column::UpdatedAt)
            .one(&self.db)
            .await?
            .map(to_record)
            .transpose()
    }

    async fn save(&self, record: &JobRecord) -> Result<(), RepositoryError> {
        let result = Entity::update_many()
            .set(changes(record))
            .filter(Column::Puuid.eq(record.key.puuid.as_str()))
            .filter(Column::Year.eq(record.key.year))
            .exec(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to save job record {}: {}", record.key, e);
                RepositoryError::from(e)
            })?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: ENTITY,
                key: record.key.to_string(),
            });
        }
        Ok(())
    }

    async fn lock_or_create(&self, seed: JobRecord) -> Result<Box<dyn LockedJob>, RepositoryError> {
        let txn = self.db.begin().await?;

        if let Some(model) = lock_row(&txn, &seed.key).await? {
            return SeaOrmLockedJob::new(txn, model);
        }

        let savepoint = txn.begin().await?;
        match Entity::insert(seed_row(&seed)).exec(&savepoint).await {
            Ok(_) => savepoint.commit().await?,
            Err(err) if is_unique_violation(&err) => {
                debug!(key = %seed.key, "Job record inserted concurrently, re-locking existing row");
                savepoint.rollback().await?;
            }
            Err(err) => return Err(err.into()),
        }

        let model = lock_row(&txn, &seed.key)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: ENTITY,
                key: seed.key.to_string(),
            })?;
        SeaOrmLockedJob::new(txn, model)
    }
}

/// Row lock held by an open transaction; dropping it rolls the transaction back.
struct SeaOrmLockedJob {
    txn: DatabaseTransaction,
    row_id: i64,
    record: JobRecord,
}

impl SeaOrmLockedJob {
    fn new(txn: DatabaseTransaction, model: Model) -> Result<Box<dyn LockedJob>, RepositoryError> {
        let row_id = model.id;
        let record = to_record(model)?;
        Ok(Box::new(Self {
            txn,
            row_id,
            record,
        }))
    }
}

#[async_trait]
impl LockedJob for SeaOrmLockedJob {
    fn record(&self) -> &JobRecord {
        &self.record
    }

    async fn commit(self: Box<Self>, next: Option<JobRecord>) -> Result<(), RepositoryError> {
        if let Some(next) = next {
            Entity::update_many()
                .set(changes(&next))
                .filter(Column::Id.eq(self.row_id))
                .exec(&self.txn)
                .await?;
        }
        self.txn.commit().await?;
        Ok(())
    }
}
