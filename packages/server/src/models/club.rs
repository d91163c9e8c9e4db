use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_email, validate_name};
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateClubRequest {
    #[schema(example = "Robotics Club")]
    pub name: String,
    /// Contact address for the club, unique across clubs.
    #[schema(example = "robotics@university.edu")]
    pub email: String,
    pub description: Option<String>,
    /// Defaults to 0.
    pub rating: Option<i32>,
}

pub fn validate_create_club(payload: &CreateClubRequest) -> Result<(), AppError> {
    validate_name(&payload.name, "Club name")?;
    validate_email(&payload.email)?;
    if payload.rating.is_some_and(|r| r < 0) {
        return Err(AppError::Validation("Rating must not be negative".into()));
    }
    Ok(())
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateClubRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub rating: Option<i32>,
}

pub fn validate_update_club(payload: &UpdateClubRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name, "Club name")?;
    }
    if let Some(ref email) = payload.email {
        validate_email(email)?;
    }
    if payload.rating.is_some_and(|r| r < 0) {
        return Err(AppError::Validation("Rating must not be negative".into()));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AddClubMemberRequest {
    pub user_id: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AddClubCoordinatorRequest {
    pub user_id: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ClubMemberResponse {
    pub club_id: i32,
    pub user_id: i32,
    pub joined_at: DateTime<Utc>,
}

impl From<crate::entity::club_member::Model> for ClubMemberResponse {
    fn from(m: crate::entity::club_member::Model) -> Self {
        Self {
            club_id: m.club_id,
            user_id: m.user_id,
            joined_at: m.joined_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ClubCoordinatorResponse {
    pub club_id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entity::club_coordinator::Model> for ClubCoordinatorResponse {
    fn from(m: crate::entity::club_coordinator::Model) -> Self {
        Self {
            club_id: m.club_id,
            user_id: m.user_id,
            created_at: m.created_at,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ClubListQuery {
    /// Filter by exact club id.
    pub id: Option<i32>,
    /// Substring match on club name.
    pub search: Option<String>,
    pub rating_min: Option<i32>,
    pub rating_max: Option<i32>,
    /// Only clubs this user coordinates.
    pub coordinator_id: Option<i32>,
    /// Only clubs this user is a member of.
    pub user_id: Option<i32>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ClubResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub description: Option<String>,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::club::Model> for ClubResponse {
    fn from(m: crate::entity::club::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            description: m.description,
            rating: m.rating,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Club with its membership rosters, returned by the single-club read.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ClubDetailResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub description: Option<String>,
    pub rating: i32,
    pub member_ids: Vec<i32>,
    pub coordinator_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClubDetailResponse {
    pub fn from_model(
        m: crate::entity::club::Model,
        member_ids: Vec<i32>,
        coordinator_ids: Vec<i32>,
    ) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            description: m.description,
            rating: m.rating,
            member_ids,
            coordinator_ids,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
