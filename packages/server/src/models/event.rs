use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{double_option, validate_id_list, validate_name};
use crate::entity::event::EventStatus;
use crate::error::AppError;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEventRequest {
    #[schema(example = "Autumn Hackathon")]
    pub name: String,
    #[schema(example = "Main Auditorium")]
    pub venue: String,
    pub description: Option<String>,
    /// When the event takes place.
    pub date: DateTime<Utc>,
    #[schema(example = 180)]
    pub duration_minutes: i32,
    /// Upper bound for points awarded per attendance record.
    #[schema(example = 50)]
    pub max_points: i32,
    /// Defaults to `upcoming`.
    pub status: Option<EventStatus>,
    /// Team size cap, for team events.
    pub max_team_size: Option<i32>,
    /// Hosting clubs. At least one, all must exist.
    pub club_ids: Vec<i32>,
}

pub fn validate_create_event(payload: &CreateEventRequest) -> Result<(), AppError> {
    validate_name(&payload.name, "Event name")?;
    validate_name(&payload.venue, "Venue")?;
    if payload.duration_minutes <= 0 {
        return Err(AppError::Validation("Duration must be positive".into()));
    }
    if payload.max_points <= 0 {
        return Err(AppError::Validation("Max points must be positive".into()));
    }
    if payload.max_team_size.is_some_and(|n| n <= 0) {
        return Err(AppError::Validation("Team size cap must be positive".into()));
    }
    validate_id_list(&payload.club_ids, "club_ids")?;
    Ok(())
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub venue: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub max_points: Option<i32>,
    pub status: Option<EventStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_team_size: Option<Option<i32>>,
    /// Replaces the full set of hosting clubs when present.
    pub club_ids: Option<Vec<i32>>,
}

pub fn validate_update_event(payload: &UpdateEventRequest) -> Result<(), AppError> {
    if let Some(ref name) = payload.name {
        validate_name(name, "Event name")?;
    }
    if let Some(ref venue) = payload.venue {
        validate_name(venue, "Venue")?;
    }
    if payload.duration_minutes.is_some_and(|n| n <= 0) {
        return Err(AppError::Validation("Duration must be positive".into()));
    }
    if payload.max_points.is_some_and(|n| n <= 0) {
        return Err(AppError::Validation("Max points must be positive".into()));
    }
    if let Some(Some(n)) = payload.max_team_size {
        if n <= 0 {
            return Err(AppError::Validation("Team size cap must be positive".into()));
        }
    }
    if let Some(ref club_ids) = payload.club_ids {
        validate_id_list(club_ids, "club_ids")?;
    }
    Ok(())
}

/// Declares the winners of an event. Exactly one of the two fields must be
/// present: a winning team, or an explicit list of winning users.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct WinnersRequest {
    pub team_id: Option<i32>,
    pub user_ids: Option<Vec<i32>>,
}

pub fn validate_winners_request(payload: &WinnersRequest) -> Result<(), AppError> {
    match (&payload.team_id, &payload.user_ids) {
        (Some(_), Some(_)) | (None, None) => Err(AppError::Validation(
            "Provide either team_id or user_ids, not both".into(),
        )),
        (None, Some(user_ids)) => validate_id_list(user_ids, "user_ids"),
        (Some(_), None) => Ok(()),
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct EventListQuery {
    /// Filter by exact event id.
    pub id: Option<i32>,
    /// Only events hosted by this club.
    pub club_id: Option<i32>,
    /// Substring match on event name.
    pub search: Option<String>,
    /// Events on or after this instant. RFC 3339 or a bare `YYYY-MM-DD`.
    pub date_after: Option<String>,
    /// Events on or before this instant. A bare date covers the whole day.
    pub date_before: Option<String>,
    pub status: Option<EventStatus>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
    pub id: i32,
    pub name: String,
    pub venue: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub max_points: i32,
    pub status: EventStatus,
    pub max_team_size: Option<i32>,
    pub club_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventResponse {
    pub fn from_model(m: crate::entity::event::Model, club_ids: Vec<i32>) -> Self {
        Self {
            id: m.id,
            name: m.name,
            venue: m.venue,
            description: m.description,
            date: m.date,
            duration_minutes: m.duration_minutes,
            max_points: m.max_points,
            status: m.status,
            max_team_size: m.max_team_size,
            club_ids,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Event with its winner roster, returned by the single-event read.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EventDetailResponse {
    pub id: i32,
    pub name: String,
    pub venue: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub max_points: i32,
    pub status: EventStatus,
    pub max_team_size: Option<i32>,
    pub club_ids: Vec<i32>,
    /// Users flagged as winners of this event.
    pub winner_ids: Vec<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventDetailResponse {
    pub fn from_model(
        m: crate::entity::event::Model,
        club_ids: Vec<i32>,
        winner_ids: Vec<i32>,
    ) -> Self {
        Self {
            id: m.id,
            name: m.name,
            venue: m.venue,
            description: m.description,
            date: m.date,
            duration_minutes: m.duration_minutes,
            max_points: m.max_points,
            status: m.status,
            max_team_size: m.max_team_size,
            club_ids,
            winner_ids,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
