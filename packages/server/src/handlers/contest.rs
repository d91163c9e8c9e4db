use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::*;
use tracing::instrument;

use crate::entity::contest_log::{ContestLogType, LogSeverity};
use crate::entity::{contest, contest_log};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::user::find_user;
use crate::models::contest::{
    AppendLogRequest, ContestLogQuery, ContestLogResponse, ContestResponse, CreateContestRequest,
    JoinContestRequest, validate_append_log, validate_create_contest,
};
use crate::models::shared::page_window;
use crate::state::AppState;
use crate::utils::codes;

/// Attempts at drawing an unused room code before giving up.
const ROOM_CODE_ATTEMPTS: usize = 5;

#[utoipa::path(
    post,
    path = "/create",
    tag = "Contests",
    operation_id = "createContest",
    summary = "Create a contest room",
    description = "Any authenticated user may open a room. A unique 6-character room code is drawn for contestants to join with.",
    request_body = CreateContestRequest,
    responses(
        (status = 201, description = "Contest created", body = ContestResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, name = %payload.name))]
pub async fn create_contest(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateContestRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_contest(&payload)?;

    for _ in 0..ROOM_CODE_ATTEMPTS {
        let new_contest = contest::ActiveModel {
            room_code: Set(codes::short_code()),
            name: Set(payload.name.trim().to_string()),
            created_by: Set(auth_user.user_id),
            starts_at: Set(payload.starts_at),
            ends_at: Set(payload.ends_at),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        match new_contest.insert(&state.db).await {
            Ok(model) => {
                tracing::info!(contest_id = model.id, room_code = %model.room_code, "Contest created");
                return Ok((StatusCode::CREATED, Json(ContestResponse::from(model))));
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(AppError::Internal("Could not allocate a unique room code".into()))
}

#[utoipa::path(
    post,
    path = "/join",
    tag = "Contests",
    operation_id = "joinContest",
    summary = "Join an active contest room",
    description = "Verifies the room exists and its window covers the current time, then appends a `join` log line carrying a snapshot of the caller's name, roll number and judge handle.",
    request_body = JoinContestRequest,
    responses(
        (status = 201, description = "Join recorded", body = ContestLogResponse),
        (status = 400, description = "Room is not active (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Unknown room code (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, room_code = %payload.room_code))]
pub async fn join_contest(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<JoinContestRequest>,
) -> Result<impl IntoResponse, AppError> {
    let contest = find_room(&state.db, payload.room_code.trim()).await?;

    let now = chrono::Utc::now();
    if now < contest.starts_at || now > contest.ends_at {
        return Err(AppError::Validation("Contest is not active".into()));
    }

    let caller = find_user(&state.db, auth_user.user_id).await?;

    let entry = contest_log::ActiveModel {
        room_code: Set(contest.room_code),
        log_type: Set(ContestLogType::Join),
        severity: Set(LogSeverity::Info),
        user_name: Set(caller.full_name),
        user_roll: Set(caller.student_id),
        user_handle: Set(payload.handle),
        message: Set(None),
        url: Set(None),
        category: Set(None),
        logged_at: Set(now),
        ..Default::default()
    };
    let model = entry.insert(&state.db).await?;

    Ok((StatusCode::CREATED, Json(ContestLogResponse::from(model))))
}

#[utoipa::path(
    post,
    path = "/logs",
    tag = "Contests",
    operation_id = "appendContestLog",
    summary = "Append a log line to a contest room",
    description = "Appends a `leave` or `message` line with a snapshot of the caller. `join` lines are written by the join operation and are refused here. Logs are immutable once written.",
    request_body = AppendLogRequest,
    responses(
        (status = 201, description = "Log appended", body = ContestLogResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Unknown room code (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, room_code = %payload.room_code))]
pub async fn append_log(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<AppendLogRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_append_log(&payload)?;

    let contest = find_room(&state.db, payload.room_code.trim()).await?;
    let caller = find_user(&state.db, auth_user.user_id).await?;

    let entry = contest_log::ActiveModel {
        room_code: Set(contest.room_code),
        log_type: Set(payload.log_type),
        severity: Set(payload.severity.unwrap_or(LogSeverity::Info)),
        user_name: Set(caller.full_name),
        user_roll: Set(caller.student_id),
        user_handle: Set(None),
        message: Set(payload.message),
        url: Set(payload.url),
        category: Set(payload.category),
        logged_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let model = entry.insert(&state.db).await?;

    Ok((StatusCode::CREATED, Json(ContestLogResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/active",
    tag = "Contests",
    operation_id = "listActiveContests",
    summary = "List contests whose window covers now",
    responses(
        (status = 200, description = "Active contests", body = Vec<ContestResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn active_contests(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ContestResponse>>, AppError> {
    let now = chrono::Utc::now();
    let rows = contest::Entity::find()
        .filter(contest::Column::StartsAt.lte(now))
        .filter(contest::Column::EndsAt.gte(now))
        .order_by_asc(contest::Column::StartsAt)
        .all(&state.db)
        .await?;

    Ok(Json(rows.into_iter().map(ContestResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/logs",
    tag = "Contests",
    operation_id = "listContestLogs",
    summary = "List contest logs",
    description = "All rooms' logs, newest first.",
    params(ContestLogQuery),
    responses(
        (status = 200, description = "Log lines", body = Vec<ContestLogResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_logs(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ContestLogQuery>,
) -> Result<Json<Vec<ContestLogResponse>>, AppError> {
    let rows = log_query(query).all(&state.db).await?;
    Ok(Json(rows.into_iter().map(ContestLogResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/logs/{room_code}",
    tag = "Contests",
    operation_id = "listRoomLogs",
    summary = "List one room's logs",
    description = "The room's logs, newest first. 404 when no contest has this room code.",
    params(
        ("room_code" = String, Path, description = "Room code"),
        ContestLogQuery,
    ),
    responses(
        (status = 200, description = "Log lines", body = Vec<ContestLogResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Unknown room code (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn room_logs(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(query): Query<ContestLogQuery>,
) -> Result<Json<Vec<ContestLogResponse>>, AppError> {
    let contest = find_room(&state.db, room_code.trim()).await?;

    let rows = log_query(query)
        .filter(contest_log::Column::RoomCode.eq(contest.room_code))
        .all(&state.db)
        .await?;
    Ok(Json(rows.into_iter().map(ContestLogResponse::from).collect()))
}

fn log_query(query: ContestLogQuery) -> Select<contest_log::Entity> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = contest_log::Entity::find();
    if let Some(log_type) = query.log_type {
        select = select.filter(contest_log::Column::LogType.eq(log_type));
    }
    if let Some(severity) = query.severity {
        select = select.filter(contest_log::Column::Severity.eq(severity));
    }
    select
        .order_by_desc(contest_log::Column::LoggedAt)
        .offset(Some(skip))
        .limit(Some(limit))
}

async fn find_room<C: ConnectionTrait>(db: &C, room_code: &str) -> Result<contest::Model, AppError> {
    contest::Entity::find()
        .filter(contest::Column::RoomCode.eq(room_code))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("No contest with this room code".into()))
}
