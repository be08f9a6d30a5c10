//! PlayerMatch entity model
//!
//! SeaORM entity for the player_matches table (the match index). The
//! auto-increment id preserves discovery order.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "player_matches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub puuid: String,

    pub year: i32,

    pub match_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
