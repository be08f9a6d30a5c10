//! MatchCache entity model
//!
//! Raw match documents keyed by match id. Rows are written once and never
//! updated.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "match_cache")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub match_id: String,

    /// Regional routing tag the document was fetched from
    pub routing: String,

    pub fetched_at: DateTimeWithTimeZone,

    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
