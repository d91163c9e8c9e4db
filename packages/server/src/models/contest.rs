use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::validate_name;
use crate::entity::contest_log::{ContestLogType, LogSeverity};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateContestRequest {
    #[schema(example = "Weekly Practice Round")]
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

pub fn validate_create_contest(payload: &CreateContestRequest) -> Result<(), AppError> {
    validate_name(&payload.name, "Contest name")?;
    if payload.ends_at <= payload.starts_at {
        return Err(AppError::Validation("Contest must end after it starts".into()));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct JoinContestRequest {
    #[schema(example = "A2b9Xq")]
    pub room_code: String,
    /// Judge handle to record alongside the join, if the contestant has one.
    pub handle: Option<String>,
}

/// Appends one log line to a contest room. Join lines are written by the join
/// operation itself and cannot be appended directly.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AppendLogRequest {
    pub room_code: String,
    pub log_type: ContestLogType,
    pub message: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    /// Defaults to `info`.
    pub severity: Option<LogSeverity>,
}

pub fn validate_append_log(payload: &AppendLogRequest) -> Result<(), AppError> {
    if payload.room_code.trim().is_empty() {
        return Err(AppError::Validation("Room code must not be empty".into()));
    }
    if matches!(payload.log_type, ContestLogType::Join) {
        return Err(AppError::Validation(
            "Join entries are recorded by the join operation".into(),
        ));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ContestLogQuery {
    pub log_type: Option<ContestLogType>,
    pub severity: Option<LogSeverity>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ContestResponse {
    pub id: i32,
    pub room_code: String,
    pub name: String,
    pub created_by: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::contest::Model> for ContestResponse {
    fn from(m: crate::entity::contest::Model) -> Self {
        Self {
            id: m.id,
            room_code: m.room_code,
            name: m.name,
            created_by: m.created_by,
            starts_at: m.starts_at,
            ends_at: m.ends_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ContestLogResponse {
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
    pub logged_at: DateTime<Utc>,
}

impl From<crate::entity::contest_log::Model> for ContestLogResponse {
    fn from(m: crate::entity::contest_log::Model) -> Self {
        Self {
            id: m.id,
            room_code: m.room_code,
            log_type: m.log_type,
            severity: m.severity,
            user_name: m.user_name,
            user_roll: m.user_roll,
            user_handle: m.user_handle,
            message: m.message,
            url: m.url,
            category: m.category,
            logged_at: m.logged_at,
        }
    }
}
