//! YearSummary entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "year_summaries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub puuid: String,

    pub year: i32,

    pub computed_at: DateTimeWithTimeZone,

    /// Serialized summary document, kept as text so recomputes compare byte for byte
    #[sea_orm(column_type = "Text")]
    pub summary_json: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
