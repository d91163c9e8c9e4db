use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{validate_id_list, validate_name};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTeamRequest {
    #[schema(example = "Null Pointers")]
    pub name: String,
    /// Event the team competes in.
    pub event_id: i32,
}

pub fn validate_create_team(payload: &CreateTeamRequest) -> Result<(), AppError> {
    validate_name(&payload.name, "Team name")
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    /// Users to add to the roster, subject to the event's team size cap.
    pub add_member_ids: Option<Vec<i32>>,
}

pub fn validate_update_team(payload: &UpdateTeamRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name, "Team name")?;
    }
    if let Some(ref ids) = payload.add_member_ids {
        validate_id_list(ids, "add_member_ids")?;
    }
    Ok(())
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct JoinTeamRequest {
    #[schema(example = "x7Kp2Q")]
    pub share_code: String,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TeamListQuery {
    /// Filter by exact team id.
    pub id: Option<i32>,
    /// Only teams competing in this event.
    pub event_id: Option<i32>,
    /// Only teams this user belongs to.
    pub user_id: Option<i32>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TeamResponse {
    pub id: i32,
    pub name: String,
    pub event_id: i32,
    pub leader_id: i32,
    /// Code other users present to join this team.
    pub share_code: String,
    pub member_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TeamResponse {
    pub fn from_model(m: crate::entity::team::Model, member_ids: Vec<i32>) -> Self {
        Self {
            id: m.id,
            name: m.name,
            event_id: m.event_id,
            leader_id: m.leader_id,
            share_code: m.share_code,
            member_ids,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
