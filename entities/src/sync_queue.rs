//! `SeaORM` Entity for the durable job queue.

use super::sea_orm_active_enums::{JobAction, JobDirection, JobStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_queue")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub tenant: String,
    pub module: String,
    pub entity_type: String,
    pub direction: JobDirection,
    pub action: JobAction,
    pub local_id: Option<i64>,
    pub remote_id: Option<i64>,
    /// Canonical JSON bag. Stored as text so sqlite/mysql backends agree.
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub priority: i16,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub error_message: Option<String>,
    pub scheduled_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
