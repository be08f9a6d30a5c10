//! PlayerYear entity model
//!
//! SeaORM entity for the player_years table, one row per wrapped job key.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "player_years")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Resolved upstream player identifier
    pub puuid: String,

    pub year: i32,

    /// Platform tag supplied with the request (e.g. EUW1)
    pub platform: String,

    /// Display identifier in `Name#TAG` form
    pub riot_id: String,

    /// Job state, stored as its SCREAMING_SNAKE_CASE name
    pub state: String,

    pub match_ids_found: i32,

    pub matches_cached: i32,

    pub summary_ready: bool,

    /// Human-readable progress message shown to pollers
    pub message: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
