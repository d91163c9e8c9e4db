use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum ContestLogType {
    #[sea_orm(string_value = "join")]
    Join,
    #[sea_orm(string_value = "leave")]
    Leave,
    #[sea_orm(string_value = "message")]
    Message,
}

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    #[sea_orm(string_value = "critical")]
    Critical,
    #[sea_orm(string_value = "warning")]
    Warning,
    #[sea_orm(string_value = "info")]
    Info,
}

/// Append-only. Rows are never updated or deleted, and the user fields are a
/// snapshot taken at log time, not a reference.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contest_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub room_code: String,
    pub log_type: ContestLogType,
    pub severity: LogSeverity,
    pub user_name: String,
    pub user_roll: String,
    pub user_handle: Option<String>,
    pub message: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub logged_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
