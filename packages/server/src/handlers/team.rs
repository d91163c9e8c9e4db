use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::sea_query::Query as SeaQuery;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{attendance, event, team, team_member};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::event::find_event;
use crate::handlers::user::ensure_users_exist;
use crate::models::shared::page_window;
use crate::models::team::{
    CreateTeamRequest, JoinTeamRequest, TeamListQuery, TeamResponse, UpdateTeamRequest,
    validate_create_team, validate_update_team,
};
use crate::points::recompute_totals;
use crate::state::AppState;
use crate::utils::codes;

/// Attempts at drawing an unused share code before giving up.
const SHARE_CODE_ATTEMPTS: usize = 5;

#[utoipa::path(
    post,
    path = "/",
    tag = "Teams",
    operation_id = "createTeam",
    summary = "Create a team for an event",
    description = "Any authenticated user may create a team. The caller becomes the leader and sole member, and a unique 6-character share code is drawn for others to join with.",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id, name = %payload.name))]
pub async fn create_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTeamRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_team(&payload)?;

    // A colliding share code aborts the transaction, so the retry wraps the
    // whole attempt rather than the single insert.
    for _ in 0..SHARE_CODE_ATTEMPTS {
        let txn = state.db.begin().await?;
        let _event = find_event(&txn, payload.event_id).await?;

        let now = chrono::Utc::now();
        let new_team = team::ActiveModel {
            name: Set(payload.name.trim().to_string()),
            event_id: Set(payload.event_id),
            leader_id: Set(auth_user.user_id),
            share_code: Set(codes::short_code()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = match new_team.insert(&txn).await {
            Ok(model) => model,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let leader = team_member::ActiveModel {
            team_id: Set(model.id),
            user_id: Set(auth_user.user_id),
            joined_at: Set(now),
        };
        leader.insert(&txn).await?;
        txn.commit().await?;

        tracing::info!(team_id = model.id, event_id = model.event_id, "Team created");

        let member_ids = vec![auth_user.user_id];
        return Ok((
            StatusCode::CREATED,
            Json(TeamResponse::from_model(model, member_ids)),
        ));
    }

    Err(AppError::Internal("Could not allocate a unique share code".into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Teams",
    operation_id = "listTeams",
    summary = "List teams",
    params(TeamListQuery),
    responses(
        (status = 200, description = "Matching teams", body = Vec<TeamResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_teams(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<TeamListQuery>,
) -> Result<Json<Vec<TeamResponse>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = team::Entity::find();

    if let Some(id) = query.id {
        select = select.filter(team::Column::Id.eq(id));
    }
    if let Some(event_id) = query.event_id {
        select = select.filter(team::Column::EventId.eq(event_id));
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(
            team::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(team_member::Column::TeamId)
                    .from(team_member::Entity)
                    .and_where(team_member::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        );
    }

    let teams = select
        .order_by_asc(team::Column::Id)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    let team_ids: Vec<i32> = teams.iter().map(|t| t.id).collect();
    let memberships = team_member::Entity::find()
        .filter(team_member::Column::TeamId.is_in(team_ids))
        .order_by_asc(team_member::Column::UserId)
        .all(&state.db)
        .await?;
    let mut members_by_team: HashMap<i32, Vec<i32>> = HashMap::new();
    for membership in memberships {
        members_by_team
            .entry(membership.team_id)
            .or_default()
            .push(membership.user_id);
    }

    let out = teams
        .into_iter()
        .map(|model| {
            let member_ids = members_by_team.remove(&model.id).unwrap_or_default();
            TeamResponse::from_model(model, member_ids)
        })
        .collect();

    Ok(Json(out))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Teams",
    operation_id = "getTeam",
    summary = "Get a team with its roster",
    params(("id" = i32, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team details", body = TeamResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Team not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn get_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TeamResponse>, AppError> {
    let model = find_team(&state.db, id).await?;
    let member_ids = member_ids_of(&state.db, id).await?;
    Ok(Json(TeamResponse::from_model(model, member_ids)))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Teams",
    operation_id = "updateTeam",
    summary = "Rename a team or add members",
    description = "The leader (or `team:manage`) may rename the team and add members by user id. Additions respect the owning event's team size cap and fail with 409 when a user is already on the roster.",
    params(("id" = i32, Path, description = "Team ID")),
    request_body = UpdateTeamRequest,
    responses(
        (status = 200, description = "Team updated", body = TeamResponse),
        (status = 400, description = "Validation error or team full (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the leader (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Team or a named user not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "User already on the roster (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>, AppError> {
    validate_update_team(&payload)?;

    if payload == UpdateTeamRequest::default() {
        let existing = find_team(&state.db, id).await?;
        require_leader_or_manage(&auth_user, &existing)?;
        let member_ids = member_ids_of(&state.db, id).await?;
        return Ok(Json(TeamResponse::from_model(existing, member_ids)));
    }

    let txn = state.db.begin().await?;
    let existing = find_team_for_update(&txn, id).await?;
    require_leader_or_manage(&auth_user, &existing)?;

    if let Some(ref add_member_ids) = payload.add_member_ids {
        ensure_users_exist(&txn, add_member_ids).await?;

        let current = member_ids_of(&txn, id).await?;
        if let Some(already) = add_member_ids.iter().find(|uid| current.contains(uid)) {
            return Err(AppError::Conflict(format!(
                "User {} is already on the roster",
                already
            )));
        }
        ensure_capacity(&txn, &existing, current.len() + add_member_ids.len()).await?;

        let now = chrono::Utc::now();
        let rows = add_member_ids.iter().map(|&user_id| team_member::ActiveModel {
            team_id: Set(id),
            user_id: Set(user_id),
            joined_at: Set(now),
        });
        team_member::Entity::insert_many(rows)
            .exec(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    AppError::Conflict("User is already on the roster".into())
                }
                _ => AppError::from(e),
            })?;
    }

    let mut active: team::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    active.updated_at = Set(chrono::Utc::now());
    let model = active.update(&txn).await?;

    let member_ids = member_ids_of(&txn, id).await?;
    txn.commit().await?;

    Ok(Json(TeamResponse::from_model(model, member_ids)))
}

#[utoipa::path(
    post,
    path = "/join",
    tag = "Teams",
    operation_id = "joinTeam",
    summary = "Join a team by share code",
    description = "The authenticated user joins the team behind the share code. Fails with 400 once the roster has reached the owning event's team size cap, and with 409 when already a member.",
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Joined", body = TeamResponse),
        (status = 400, description = "Team full (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No team with this share code (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already a member (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(caller = auth_user.user_id))]
pub async fn join_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<JoinTeamRequest>,
) -> Result<Json<TeamResponse>, AppError> {
    let code = payload.share_code.trim();
    if code.is_empty() {
        return Err(AppError::Validation("Share code must not be empty".into()));
    }

    let txn = state.db.begin().await?;

    let team = {
        use sea_orm::sea_query::LockType;
        team::Entity::find()
            .filter(team::Column::ShareCode.eq(code))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("No team with this share code".into()))?
    };

    let current = member_ids_of(&txn, team.id).await?;
    if current.contains(&auth_user.user_id) {
        return Err(AppError::Conflict("Already a member of this team".into()));
    }
    ensure_capacity(&txn, &team, current.len() + 1).await?;

    let membership = team_member::ActiveModel {
        team_id: Set(team.id),
        user_id: Set(auth_user.user_id),
        joined_at: Set(chrono::Utc::now()),
    };
    match membership.insert(&txn).await {
        Ok(_) => {}
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("Already a member of this team".into()));
        }
        Err(e) => return Err(e.into()),
    }

    let member_ids = member_ids_of(&txn, team.id).await?;
    txn.commit().await?;

    tracing::info!(team_id = team.id, user_id = auth_user.user_id, "User joined team");

    Ok(Json(TeamResponse::from_model(team, member_ids)))
}

#[utoipa::path(
    post,
    path = "/{id}/leave",
    tag = "Teams",
    operation_id = "leaveTeam",
    summary = "Leave a team",
    description = "The caller leaves the roster. The leader cannot leave; a team without its leader must be deleted instead.",
    params(("id" = i32, Path, description = "Team ID")),
    responses(
        (status = 204, description = "Left the team"),
        (status = 400, description = "The leader cannot leave (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Team not found or not a member (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn leave_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let team = find_team(&state.db, id).await?;
    if team.leader_id == auth_user.user_id {
        return Err(AppError::Validation("The leader cannot leave the team".into()));
    }

    let result = team_member::Entity::delete_by_id((id, auth_user.user_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("You are not a member of this team".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/{id}/members/{user_id}",
    tag = "Teams",
    operation_id = "removeTeamMember",
    summary = "Remove a member from a team",
    description = "The leader (or `team:manage`) removes a member. The leader cannot be removed.",
    params(
        ("id" = i32, Path, description = "Team ID"),
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 400, description = "The leader cannot be removed (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the leader (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Team not found or user not a member (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn remove_team_member(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    let team = find_team(&state.db, id).await?;
    require_leader_or_manage(&auth_user, &team)?;
    if user_id == team.leader_id {
        return Err(AppError::Validation("The leader cannot be removed".into()));
    }

    let result = team_member::Entity::delete_by_id((id, user_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("User is not a member of this team".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Teams",
    operation_id = "deleteTeam",
    summary = "Delete a team",
    description = "The leader (or `team:manage`) deletes the team. The team's attendance records go with it and every affected user's points total is recomputed, all in one transaction.",
    params(("id" = i32, Path, description = "Team ID")),
    responses(
        (status = 204, description = "Team deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the leader (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Team not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_team(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let txn = state.db.begin().await?;
    let team = find_team_for_update(&txn, id).await?;
    require_leader_or_manage(&auth_user, &team)?;

    let affected: Vec<i32> = attendance::Entity::find()
        .filter(attendance::Column::TeamId.eq(id))
        .select_only()
        .column(attendance::Column::UserId)
        .into_tuple()
        .all(&txn)
        .await?;

    let removed = attendance::Entity::delete_many()
        .filter(attendance::Column::TeamId.eq(id))
        .exec(&txn)
        .await?;
    team_member::Entity::delete_many()
        .filter(team_member::Column::TeamId.eq(id))
        .exec(&txn)
        .await?;
    team::Entity::delete_by_id(id).exec(&txn).await?;

    recompute_totals(&txn, &affected).await?;
    txn.commit().await?;

    tracing::info!(
        team_id = id,
        attendance_removed = removed.rows_affected,
        users_reconciled = affected.len(),
        "Team deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

fn require_leader_or_manage(auth_user: &AuthUser, team: &team::Model) -> Result<(), AppError> {
    if auth_user.user_id == team.leader_id {
        return Ok(());
    }
    auth_user.require_permission("team:manage")
}

/// Reject a roster change that would push the team past the owning event's
/// size cap. Teams of events that were deleted, or events without a cap, are
/// unbounded.
async fn ensure_capacity<C: ConnectionTrait>(
    db: &C,
    team: &team::Model,
    new_size: usize,
) -> Result<(), AppError> {
    let cap = event::Entity::find_by_id(team.event_id)
        .one(db)
        .await?
        .and_then(|e| e.max_team_size);
    if let Some(cap) = cap {
        if new_size > cap as usize {
            return Err(AppError::Validation(format!(
                "Team is full ({} member limit)",
                cap
            )));
        }
    }
    Ok(())
}

pub(crate) async fn member_ids_of<C: ConnectionTrait>(
    db: &C,
    team_id: i32,
) -> Result<Vec<i32>, AppError> {
    Ok(team_member::Entity::find()
        .filter(team_member::Column::TeamId.eq(team_id))
        .order_by_asc(team_member::Column::UserId)
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect())
}

pub(crate) async fn find_team<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<team::Model, AppError> {
    team::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".into()))
}

async fn find_team_for_update(txn: &DatabaseTransaction, id: i32) -> Result<team::Model, AppError> {
    use sea_orm::sea_query::LockType;
    team::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".into()))
}
