use std::collections::{HashMap, HashSet};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::attendance::{self, AttendanceStatus};
use crate::entity::{event, team};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::team::member_ids_of;
use crate::handlers::user::ensure_users_exist;
use crate::models::attendance::{
    AttendanceListQuery, AttendanceResponse, ParticipateEntry, TeamMarkEntry,
    UpdateAttendanceRequest, validate_participate, validate_team_mark,
    validate_update_attendance,
};
use crate::models::shared::page_window;
use crate::points::recompute_totals;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/participate",
    tag = "Attendance",
    operation_id = "participate",
    summary = "Record participation in bulk",
    description = "Requires `attendance:mark`. Takes a JSON array of `{user_id, event_id, points, status?}` entries. Every user and event must exist and points must stay within the event's maximum. If any pair already has a record (in the store, or twice in the batch) the whole batch is rejected with 400 and nothing is written. Absent entries are stored with 0 points. Affected totals are reconciled in the same transaction.",
    request_body = Vec<ParticipateEntry>,
    responses(
        (status = 201, description = "Records created", body = Vec<AttendanceResponse>),
        (status = 400, description = "Validation error or duplicate pair (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "A named user or event does not exist (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, entries = payload.len()))]
pub async fn participate(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<Vec<ParticipateEntry>>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("attendance:mark")?;
    validate_participate(&payload)?;

    let user_ids: Vec<i32> = payload.iter().map(|e| e.user_id).collect();
    let event_ids: Vec<i32> = payload.iter().map(|e| e.event_id).collect();
    let pairs: HashSet<(i32, i32)> = payload.iter().map(|e| (e.user_id, e.event_id)).collect();

    let txn = state.db.begin().await?;

    ensure_users_exist(&txn, &user_ids).await?;
    let events = load_events(&txn, &event_ids).await?;

    for entry in &payload {
        if let Some(owning_event) = events.get(&entry.event_id) {
            if entry.points > owning_event.max_points {
                return Err(AppError::Validation(format!(
                    "Points exceed the maximum of {} for event {}",
                    owning_event.max_points, entry.event_id
                )));
            }
        }
    }

    // One record per (user, event): any existing row poisons the whole batch.
    let existing = attendance::Entity::find()
        .filter(attendance::Column::UserId.is_in(user_ids.iter().copied()))
        .filter(attendance::Column::EventId.is_in(event_ids.iter().copied()))
        .all(&txn)
        .await?;
    if let Some(row) = existing
        .iter()
        .find(|r| pairs.contains(&(r.user_id, r.event_id)))
    {
        return Err(AppError::Validation(format!(
            "User {} already has a record for event {}",
            row.user_id, row.event_id
        )));
    }

    let now = chrono::Utc::now();
    let mut created = Vec::with_capacity(payload.len());
    for entry in &payload {
        let status = entry.status.clone().unwrap_or(AttendanceStatus::Present);
        let points = match status {
            AttendanceStatus::Present => entry.points,
            AttendanceStatus::Absent => 0,
        };
        let row = attendance::ActiveModel {
            user_id: Set(entry.user_id),
            event_id: Set(entry.event_id),
            team_id: Set(None),
            status: Set(status),
            points: Set(points),
            comment: Set(None),
            is_winner: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = row.insert(&txn).await.map_err(|e| match e.sql_err() {
            // Lost a race against a concurrent write; same contract as the
            // pre-check above.
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Validation("Duplicate attendance record in batch".into())
            }
            _ => AppError::from(e),
        })?;
        created.push(model);
    }

    recompute_totals(&txn, &user_ids).await?;
    txn.commit().await?;

    tracing::info!(
        records = created.len(),
        users = user_ids.len(),
        "Recorded bulk participation"
    );

    Ok((
        StatusCode::CREATED,
        Json(created.into_iter().map(AttendanceResponse::from).collect::<Vec<_>>()),
    ))
}

#[utoipa::path(
    put,
    path = "/team/{team_id}",
    tag = "Attendance",
    operation_id = "markTeamAttendance",
    summary = "Mark or update a team's attendance",
    description = "Requires `attendance:mark`. Upserts attendance rows for members of the team, scoped to the team's event: an existing row has its status, points and comment replaced; a missing one is created. Affected totals are reconciled in the same transaction.",
    params(("team_id" = i32, Path, description = "Team ID")),
    request_body = Vec<TeamMarkEntry>,
    responses(
        (status = 200, description = "Rows upserted", body = Vec<AttendanceResponse>),
        (status = 400, description = "Validation error or user not on the roster (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Team not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, entries = payload.len()))]
pub async fn mark_team_attendance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(team_id): Path<i32>,
    AppJson(payload): AppJson<Vec<TeamMarkEntry>>,
) -> Result<Json<Vec<AttendanceResponse>>, AppError> {
    auth_user.require_permission("attendance:mark")?;
    validate_team_mark(&payload)?;

    let txn = state.db.begin().await?;

    let team = {
        use sea_orm::sea_query::LockType;
        team::Entity::find_by_id(team_id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Team not found".into()))?
    };

    let roster = member_ids_of(&txn, team_id).await?;
    for entry in &payload {
        if !roster.contains(&entry.user_id) {
            return Err(AppError::Validation(format!(
                "User {} is not on the team roster",
                entry.user_id
            )));
        }
    }

    // The event may have been deleted out from under the team; without it
    // there is no points ceiling left to enforce.
    let owning_event = event::Entity::find_by_id(team.event_id).one(&txn).await?;
    if let Some(ref owning_event) = owning_event {
        for entry in &payload {
            if entry.points > owning_event.max_points {
                return Err(AppError::Validation(format!(
                    "Points exceed the maximum of {} for event {}",
                    owning_event.max_points, owning_event.id
                )));
            }
        }
    }

    let marked_ids: Vec<i32> = payload.iter().map(|e| e.user_id).collect();
    let existing: HashMap<i32, attendance::Model> = attendance::Entity::find()
        .filter(attendance::Column::EventId.eq(team.event_id))
        .filter(attendance::Column::UserId.is_in(marked_ids.iter().copied()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| (row.user_id, row))
        .collect();

    let now = chrono::Utc::now();
    let mut upserted = Vec::with_capacity(payload.len());
    for entry in &payload {
        let points = match entry.status {
            AttendanceStatus::Present => entry.points,
            AttendanceStatus::Absent => 0,
        };
        let model = match existing.get(&entry.user_id) {
            Some(row) => {
                let mut active: attendance::ActiveModel = row.clone().into();
                active.team_id = Set(Some(team_id));
                active.status = Set(entry.status.clone());
                active.points = Set(points);
                active.comment = Set(entry.comment.clone());
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                let row = attendance::ActiveModel {
                    user_id: Set(entry.user_id),
                    event_id: Set(team.event_id),
                    team_id: Set(Some(team_id)),
                    status: Set(entry.status.clone()),
                    points: Set(points),
                    comment: Set(entry.comment.clone()),
                    is_winner: Set(false),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                row.insert(&txn).await.map_err(|e| match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        AppError::Conflict("Attendance record changed concurrently".into())
                    }
                    _ => AppError::from(e),
                })?
            }
        };
        upserted.push(model);
    }

    recompute_totals(&txn, &marked_ids).await?;
    txn.commit().await?;

    tracing::info!(team_id, records = upserted.len(), "Marked team attendance");

    Ok(Json(upserted.into_iter().map(AttendanceResponse::from).collect()))
}

#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Attendance",
    operation_id = "updateAttendance",
    summary = "Update one attendance record",
    description = "Requires `attendance:mark`. Replaces the record's status, points and/or comment. The new points replace the old contribution outright: marking 30 and then updating to 10 leaves the user's total at 10. Points are checked against the owning event's maximum while that event still exists.",
    params(("id" = i32, Path, description = "Attendance record ID")),
    request_body = UpdateAttendanceRequest,
    responses(
        (status = 200, description = "Record updated", body = AttendanceResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_attendance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateAttendanceRequest>,
) -> Result<Json<AttendanceResponse>, AppError> {
    auth_user.require_permission("attendance:mark")?;
    validate_update_attendance(&payload)?;

    if payload == UpdateAttendanceRequest::default() {
        let existing = find_attendance(&state.db, id).await?;
        return Ok(Json(existing.into()));
    }

    let txn = state.db.begin().await?;
    let existing = find_attendance_for_update(&txn, id).await?;

    if let Some(points) = payload.points {
        let owning_event = event::Entity::find_by_id(existing.event_id).one(&txn).await?;
        if let Some(owning_event) = owning_event {
            if points > owning_event.max_points {
                return Err(AppError::Validation(format!(
                    "Points exceed the maximum of {} for event {}",
                    owning_event.max_points, owning_event.id
                )));
            }
        }
    }

    let user_id = existing.user_id;
    let effective_status = payload.status.clone().unwrap_or(existing.status.clone());

    let mut active: attendance::ActiveModel = existing.into();
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(points) = payload.points {
        active.points = Set(points);
    }
    if let Some(comment) = payload.comment {
        active.comment = Set(comment);
    }
    // Absent rows never carry points.
    if effective_status == AttendanceStatus::Absent {
        active.points = Set(0);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;

    recompute_totals(&txn, &[user_id]).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Attendance",
    operation_id = "listAttendance",
    summary = "List attendance records",
    params(AttendanceListQuery),
    responses(
        (status = 200, description = "Matching records", body = Vec<AttendanceResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_attendance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AttendanceListQuery>,
) -> Result<Json<Vec<AttendanceResponse>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = attendance::Entity::find();

    if let Some(user_id) = query.user_id {
        select = select.filter(attendance::Column::UserId.eq(user_id));
    }
    if let Some(event_id) = query.event_id {
        select = select.filter(attendance::Column::EventId.eq(event_id));
    }
    if let Some(team_id) = query.team_id {
        select = select.filter(attendance::Column::TeamId.eq(team_id));
    }
    if let Some(status) = query.status {
        select = select.filter(attendance::Column::Status.eq(status));
    }
    if let Some(points_min) = query.points_min {
        select = select.filter(attendance::Column::Points.gte(points_min));
    }
    if let Some(points_max) = query.points_max {
        select = select.filter(attendance::Column::Points.lte(points_max));
    }

    let rows = select
        .order_by_asc(attendance::Column::Id)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    Ok(Json(rows.into_iter().map(AttendanceResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Attendance",
    operation_id = "deleteAttendance",
    summary = "Delete one attendance record",
    description = "Requires `attendance:mark`. Removes the record and reconciles the owner's total, so the points it carried stop counting.",
    params(("id" = i32, Path, description = "Attendance record ID")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_attendance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("attendance:mark")?;

    let txn = state.db.begin().await?;
    let existing = find_attendance_for_update(&txn, id).await?;
    let user_id = existing.user_id;

    attendance::Entity::delete_by_id(id).exec(&txn).await?;
    recompute_totals(&txn, &[user_id]).await?;
    txn.commit().await?;

    tracing::info!(record_id = id, user_id, "Attendance record deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Load the named events into a map, failing with the missing IDs.
async fn load_events<C: ConnectionTrait>(
    db: &C,
    event_ids: &[i32],
) -> Result<HashMap<i32, event::Model>, AppError> {
    let found: HashMap<i32, event::Model> = event::Entity::find()
        .filter(event::Column::Id.is_in(event_ids.iter().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();

    let missing: Vec<String> = event_ids
        .iter()
        .filter(|id| !found.contains_key(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "Events not found: {}",
            missing.join(", ")
        )));
    }
    Ok(found)
}

async fn find_attendance<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<attendance::Model, AppError> {
    attendance::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Attendance record not found".into()))
}

async fn find_attendance_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<attendance::Model, AppError> {
    use sea_orm::sea_query::LockType;
    attendance::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Attendance record not found".into()))
}
