use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use crate::entity::event::EventStatus;
use crate::entity::{attendance, club, event, event_club, team, team_member};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::event::{
    CreateEventRequest, EventDetailResponse, EventListQuery, EventResponse, UpdateEventRequest,
    WinnersRequest, validate_create_event, validate_update_event, validate_winners_request,
};
use crate::models::shared::{escape_like, page_window, parse_date_after, parse_date_before};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Create an event",
    description = "Requires `event:create`. The body names the hosting clubs; every one of them must exist.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "A hosting club does not exist (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("event:create")?;
    validate_create_event(&payload)?;

    let txn = state.db.begin().await?;
    ensure_clubs_exist(&txn, &payload.club_ids).await?;

    let now = chrono::Utc::now();
    let new_event = event::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        venue: Set(payload.venue.trim().to_string()),
        description: Set(payload.description),
        date: Set(payload.date),
        duration_minutes: Set(payload.duration_minutes),
        max_points: Set(payload.max_points),
        status: Set(payload.status.unwrap_or(EventStatus::Upcoming)),
        max_team_size: Set(payload.max_team_size),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_event.insert(&txn).await?;

    let links = payload.club_ids.iter().map(|&club_id| event_club::ActiveModel {
        event_id: Set(model.id),
        club_id: Set(club_id),
        created_at: Set(now),
    });
    event_club::Entity::insert_many(links).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(event_id = model.id, clubs = payload.club_ids.len(), "Event created");

    Ok((
        StatusCode::CREATED,
        Json(EventResponse::from_model(model, payload.club_ids)),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events",
    description = "Filtered event listing in insertion order (id ascending). `date_after` and `date_before` accept an RFC 3339 timestamp or a bare `YYYY-MM-DD`; both bounds are inclusive and a bare upper bound covers its whole day.",
    params(EventListQuery),
    responses(
        (status = 200, description = "Matching events", body = Vec<EventResponse>),
        (status = 400, description = "Malformed date bound (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_events(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<Vec<EventResponse>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = event::Entity::find();

    if let Some(id) = query.id {
        select = select.filter(event::Column::Id.eq(id));
    }
    if let Some(club_id) = query.club_id {
        select = select.filter(
            event::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(event_club::Column::EventId)
                    .from(event_club::Entity)
                    .and_where(event_club::Column::ClubId.eq(club_id))
                    .to_owned(),
            ),
        );
    }
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(event::Column::Name)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }
    if let Some(ref raw) = query.date_after {
        select = select.filter(event::Column::Date.gte(parse_date_after(raw)?));
    }
    if let Some(ref raw) = query.date_before {
        select = select.filter(event::Column::Date.lte(parse_date_before(raw)?));
    }
    if let Some(status) = query.status {
        select = select.filter(event::Column::Status.eq(status));
    }

    let events = select
        .order_by_asc(event::Column::Id)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    // One link query for the whole page instead of one per event.
    let event_ids: Vec<i32> = events.iter().map(|e| e.id).collect();
    let links = event_club::Entity::find()
        .filter(event_club::Column::EventId.is_in(event_ids))
        .order_by_asc(event_club::Column::ClubId)
        .all(&state.db)
        .await?;
    let mut clubs_by_event: HashMap<i32, Vec<i32>> = HashMap::new();
    for link in links {
        clubs_by_event.entry(link.event_id).or_default().push(link.club_id);
    }

    let out = events
        .into_iter()
        .map(|model| {
            let club_ids = clubs_by_event.remove(&model.id).unwrap_or_default();
            EventResponse::from_model(model, club_ids)
        })
        .collect();

    Ok(Json(out))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get an event with its clubs and winners",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn get_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventDetailResponse>, AppError> {
    let model = find_event(&state.db, id).await?;
    let club_ids = club_ids_of(&state.db, id).await?;
    let winner_ids = winner_ids_of(&state.db, id).await?;

    Ok(Json(EventDetailResponse::from_model(model, club_ids, winner_ids)))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an event",
    description = "Requires `event:manage`. PATCH semantics on scalar fields; when `club_ids` is present it replaces the full set of hosting clubs.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event or a named club not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission("event:manage")?;
    validate_update_event(&payload)?;

    if payload == UpdateEventRequest::default() {
        let existing = find_event(&state.db, id).await?;
        let club_ids = club_ids_of(&state.db, id).await?;
        return Ok(Json(EventResponse::from_model(existing, club_ids)));
    }

    let txn = state.db.begin().await?;
    let existing = find_event_for_update(&txn, id).await?;

    let mut active: event::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(ref venue) = payload.venue {
        active.venue = Set(venue.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(date) = payload.date {
        active.date = Set(date);
    }
    if let Some(duration_minutes) = payload.duration_minutes {
        active.duration_minutes = Set(duration_minutes);
    }
    if let Some(max_points) = payload.max_points {
        active.max_points = Set(max_points);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(max_team_size) = payload.max_team_size {
        active.max_team_size = Set(max_team_size);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;

    if let Some(ref club_ids) = payload.club_ids {
        ensure_clubs_exist(&txn, club_ids).await?;
        event_club::Entity::delete_many()
            .filter(event_club::Column::EventId.eq(id))
            .exec(&txn)
            .await?;
        let now = chrono::Utc::now();
        let links = club_ids.iter().map(|&club_id| event_club::ActiveModel {
            event_id: Set(id),
            club_id: Set(club_id),
            created_at: Set(now),
        });
        event_club::Entity::insert_many(links).exec(&txn).await?;
    }

    let club_ids = club_ids_of(&txn, id).await?;
    txn.commit().await?;

    Ok(Json(EventResponse::from_model(model, club_ids)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Events",
    operation_id = "deleteEvent",
    summary = "Delete an event",
    description = "Requires `event:manage`. Deletes the event and its club links only. Teams and attendance records that reference the event stay behind, and points already credited keep counting.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 204, description = "Event deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("event:manage")?;

    let txn = state.db.begin().await?;
    let _event = find_event_for_update(&txn, id).await?;

    event_club::Entity::delete_many()
        .filter(event_club::Column::EventId.eq(id))
        .exec(&txn)
        .await?;
    event::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(event_id = id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/{id}/winners",
    tag = "Events",
    operation_id = "setEventWinners",
    summary = "Declare an event's winners",
    description = "Requires `event:manage`. Clears every winner flag for the event and sets the flag on the named users' attendance rows, either a whole winning team's members or an explicit user list. No attendance rows are created: users without a record for the event are skipped.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = WinnersRequest,
    responses(
        (status = 200, description = "Winners set", body = EventDetailResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event or team not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn set_winners(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<WinnersRequest>,
) -> Result<Json<EventDetailResponse>, AppError> {
    auth_user.require_permission("event:manage")?;
    validate_winners_request(&payload)?;

    let txn = state.db.begin().await?;
    let model = find_event_for_update(&txn, id).await?;

    let winner_user_ids: Vec<i32> = match (payload.team_id, payload.user_ids) {
        (Some(team_id), None) => {
            let team = team::Entity::find_by_id(team_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Team not found".into()))?;
            if team.event_id != id {
                return Err(AppError::Validation(
                    "Team does not belong to this event".into(),
                ));
            }
            team_member::Entity::find()
                .filter(team_member::Column::TeamId.eq(team_id))
                .all(&txn)
                .await?
                .into_iter()
                .map(|m| m.user_id)
                .collect()
        }
        (None, Some(user_ids)) => user_ids,
        // validate_winners_request already rejected the other combinations
        _ => return Err(AppError::Validation("Provide either team_id or user_ids".into())),
    };

    attendance::Entity::update_many()
        .col_expr(attendance::Column::IsWinner, Expr::value(false))
        .filter(attendance::Column::EventId.eq(id))
        .filter(attendance::Column::IsWinner.eq(true))
        .exec(&txn)
        .await?;

    let flagged = attendance::Entity::update_many()
        .col_expr(attendance::Column::IsWinner, Expr::value(true))
        .filter(attendance::Column::EventId.eq(id))
        .filter(attendance::Column::UserId.is_in(winner_user_ids))
        .exec(&txn)
        .await?;

    let club_ids = club_ids_of(&txn, id).await?;
    let winner_ids = winner_ids_of(&txn, id).await?;
    txn.commit().await?;

    tracing::info!(event_id = id, flagged = flagged.rows_affected, "Event winners set");

    Ok(Json(EventDetailResponse::from_model(model, club_ids, winner_ids)))
}

async fn ensure_clubs_exist<C: ConnectionTrait>(db: &C, club_ids: &[i32]) -> Result<(), AppError> {
    let found: Vec<i32> = club::Entity::find()
        .filter(club::Column::Id.is_in(club_ids.iter().copied()))
        .select_only()
        .column(club::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let missing: Vec<String> = club_ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "Clubs not found: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub(crate) async fn club_ids_of<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
) -> Result<Vec<i32>, AppError> {
    Ok(event_club::Entity::find()
        .filter(event_club::Column::EventId.eq(event_id))
        .order_by_asc(event_club::Column::ClubId)
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.club_id)
        .collect())
}

async fn winner_ids_of<C: ConnectionTrait>(db: &C, event_id: i32) -> Result<Vec<i32>, AppError> {
    Ok(attendance::Entity::find()
        .filter(attendance::Column::EventId.eq(event_id))
        .filter(attendance::Column::IsWinner.eq(true))
        .order_by_asc(attendance::Column::UserId)
        .select_only()
        .column(attendance::Column::UserId)
        .into_tuple()
        .all(db)
        .await?)
}

pub(crate) async fn find_event<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<event::Model, AppError> {
    event::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

pub(crate) async fn find_event_for_update(
    txn: &DatabaseTransaction,
    id: i32,
) -> Result<event::Model, AppError> {
    use sea_orm::sea_query::LockType;
    event::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}
