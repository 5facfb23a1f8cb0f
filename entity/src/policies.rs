use sea_orm::prelude::{DateTimeWithTimeZone, *};
use uuid::Uuid;

/// `actions` and `resources` hold JSON arrays of pattern strings.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub key: Option<String>,
    /// Canonical path form (`/a/b`, root as `/`). Scope filters compare exact strings.
    pub scope: String,
    pub position_key: Option<String>,
    pub effect: String,
    pub actions: Json,
    pub resources: Json,
    pub inherit: bool,
    pub spread: String,
    pub enabled: bool,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
