use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::double_option;
use crate::entity::attendance::AttendanceStatus;
use crate::error::AppError;

/// One entry of a bulk participation batch. The request body is a JSON array
/// of these.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ParticipateEntry {
    pub user_id: i32,
    pub event_id: i32,
    /// Points awarded. Forced to 0 when the status is `absent`.
    #[schema(example = 30)]
    pub points: i32,
    /// Defaults to `present`.
    #[serde(default)]
    pub status: Option<AttendanceStatus>,
}

/// The whole batch is rejected if any entry is invalid or repeats a
/// `(user_id, event_id)` pair; nothing is written in that case.
pub fn validate_participate(entries: &[ParticipateEntry]) -> Result<(), AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation("Batch must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.points < 0 {
            return Err(AppError::Validation("Points must not be negative".into()));
        }
        if !seen.insert((entry.user_id, entry.event_id)) {
            return Err(AppError::Validation(format!(
                "Duplicate entry for user {} and event {}",
                entry.user_id, entry.event_id
            )));
        }
    }
    Ok(())
}

/// One entry of a team marking batch, applied to a member of the team.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct TeamMarkEntry {
    pub user_id: i32,
    pub status: AttendanceStatus,
    pub points: i32,
    pub comment: Option<String>,
}

pub fn validate_team_mark(entries: &[TeamMarkEntry]) -> Result<(), AppError> {
    if entries.is_empty() {
        return Err(AppError::Validation("Batch must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.points < 0 {
            return Err(AppError::Validation("Points must not be negative".into()));
        }
        if !seen.insert(entry.user_id) {
            return Err(AppError::Validation(format!(
                "Duplicate entry for user {}",
                entry.user_id
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateAttendanceRequest {
    pub status: Option<AttendanceStatus>,
    /// Replaces the stored points outright.
    pub points: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub comment: Option<Option<String>>,
}

pub fn validate_update_attendance(payload: &UpdateAttendanceRequest) -> Result<(), AppError> {
    if payload.points.is_some_and(|p| p < 0) {
        return Err(AppError::Validation("Points must not be negative".into()));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct AttendanceListQuery {
    /// Records of this user.
    pub user_id: Option<i32>,
    /// Records of this event.
    pub event_id: Option<i32>,
    /// Records marked through this team.
    pub team_id: Option<i32>,
    pub status: Option<AttendanceStatus>,
    pub points_min: Option<i32>,
    pub points_max: Option<i32>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AttendanceResponse {
    pub id: i32,
    pub user_id: i32,
    pub event_id: i32,
    pub team_id: Option<i32>,
    pub status: AttendanceStatus,
    pub points: i32,
    pub comment: Option<String>,
    pub is_winner: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::attendance::Model> for AttendanceResponse {
    fn from(m: crate::entity::attendance::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            event_id: m.event_id,
            team_id: m.team_id,
            status: m.status,
            points: m.points,
            comment: m.comment,
            is_winner: m.is_winner,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
