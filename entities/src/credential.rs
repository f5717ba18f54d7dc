//! `SeaORM` Entity for the per-tenant ERP connection record.

use super::sea_orm_active_enums::Protocol;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "credential")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub tenant: String,
    pub url: String,
    pub database: String,
    pub username: String,
    /// base64(nonce ‖ ciphertext ‖ tag). Never logged; decrypted value lives only in memory.
    pub encrypted_api_key: String,
    pub protocol: Protocol,
    pub timeout_seconds: i16,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
