use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{club, club_coordinator, club_member};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::user::find_user;
use crate::models::club::{
    AddClubCoordinatorRequest, AddClubMemberRequest, ClubCoordinatorResponse, ClubDetailResponse,
    ClubListQuery, ClubMemberResponse, ClubResponse, CreateClubRequest, UpdateClubRequest,
    validate_create_club, validate_update_club,
};
use crate::models::shared::{escape_like, page_window};
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Clubs",
    operation_id = "createClub",
    summary = "Create a club",
    description = "Requires `club:create`. Club names and contact emails are unique; collisions are refused by the store's constraints.",
    request_body = CreateClubRequest,
    responses(
        (status = 201, description = "Club created", body = ClubResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Name or email already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(name = %payload.name))]
pub async fn create_club(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateClubRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("club:create")?;
    validate_create_club(&payload)?;

    let now = chrono::Utc::now();
    let new_club = club::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        email: Set(payload.email.trim().to_lowercase()),
        description: Set(payload.description),
        rating: Set(payload.rating.unwrap_or(0)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_club.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("A club with this name or email already exists".into())
        }
        _ => AppError::from(e),
    })?;

    Ok((StatusCode::CREATED, Json(ClubResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Clubs",
    operation_id = "listClubs",
    summary = "List clubs",
    description = "Filtered club directory, ordered by id ascending.",
    params(ClubListQuery),
    responses(
        (status = 200, description = "Matching clubs", body = Vec<ClubResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_clubs(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ClubListQuery>,
) -> Result<Json<Vec<ClubResponse>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = club::Entity::find();

    if let Some(id) = query.id {
        select = select.filter(club::Column::Id.eq(id));
    }
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(club::Column::Name)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }
    if let Some(rating_min) = query.rating_min {
        select = select.filter(club::Column::Rating.gte(rating_min));
    }
    if let Some(rating_max) = query.rating_max {
        select = select.filter(club::Column::Rating.lte(rating_max));
    }
    if let Some(coordinator_id) = query.coordinator_id {
        select = select.filter(
            club::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(club_coordinator::Column::ClubId)
                    .from(club_coordinator::Entity)
                    .and_where(club_coordinator::Column::UserId.eq(coordinator_id))
                    .to_owned(),
            ),
        );
    }
    if let Some(user_id) = query.user_id {
        select = select.filter(
            club::Column::Id.in_subquery(
                SeaQuery::select()
                    .column(club_member::Column::ClubId)
                    .from(club_member::Entity)
                    .and_where(club_member::Column::UserId.eq(user_id))
                    .to_owned(),
            ),
        );
    }

    let clubs = select
        .order_by_asc(club::Column::Id)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    Ok(Json(clubs.into_iter().map(ClubResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Clubs",
    operation_id = "getClub",
    summary = "Get a club with its rosters",
    params(("id" = i32, Path, description = "Club ID")),
    responses(
        (status = 200, description = "Club details", body = ClubDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Club not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn get_club(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ClubDetailResponse>, AppError> {
    let model = find_club(&state.db, id).await?;

    let member_ids: Vec<i32> = club_member::Entity::find()
        .filter(club_member::Column::ClubId.eq(id))
        .order_by_asc(club_member::Column::UserId)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    let coordinator_ids: Vec<i32> = club_coordinator::Entity::find()
        .filter(club_coordinator::Column::ClubId.eq(id))
        .order_by_asc(club_coordinator::Column::UserId)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|m| m.user_id)
        .collect();

    Ok(Json(ClubDetailResponse::from_model(
        model,
        member_ids,
        coordinator_ids,
    )))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Clubs",
    operation_id = "updateClub",
    summary = "Update a club",
    description = "Requires `club:manage`. PATCH semantics; an empty payload returns the current resource unchanged.",
    params(("id" = i32, Path, description = "Club ID")),
    request_body = UpdateClubRequest,
    responses(
        (status = 200, description = "Club updated", body = ClubResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Club not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Name or email already in use (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_club(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateClubRequest>,
) -> Result<Json<ClubResponse>, AppError> {
    auth_user.require_permission("club:manage")?;
    validate_update_club(&payload)?;

    if payload == UpdateClubRequest::default() {
        let existing = find_club(&state.db, id).await?;
        return Ok(Json(existing.into()));
    }

    let txn = state.db.begin().await?;
    let existing = find_club_for_update(&txn, id).await?;

    let mut active: club::ActiveModel = existing.into();

    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(ref email) = payload.email {
        active.email = Set(email.trim().to_lowercase());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(rating) = payload.rating {
        active.rating = Set(rating);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict("A club with this name or email already exists".into())
        }
        _ => AppError::from(e),
    })?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Clubs",
    operation_id = "deleteClub",
    summary = "Delete a club",
    description = "Requires `club:manage`. Removes the club's membership and coordinator rows, then the club itself. Events that referenced the club keep their link rows.",
    params(("id" = i32, Path, description = "Club ID")),
    responses(
        (status = 204, description = "Club deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Club not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_club(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("club:manage")?;

    let txn = state.db.begin().await?;
    let _club = find_club_for_update(&txn, id).await?;

    club_member::Entity::delete_many()
        .filter(club_member::Column::ClubId.eq(id))
        .exec(&txn)
        .await?;
    club_coordinator::Entity::delete_many()
        .filter(club_coordinator::Column::ClubId.eq(id))
        .exec(&txn)
        .await?;
    club::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(club_id = id, "Club deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/members",
    tag = "Clubs",
    operation_id = "addClubMember",
    summary = "Add a member to a club",
    description = "Requires `club:manage`. Adding someone who is already a member returns 409.",
    params(("id" = i32, Path, description = "Club ID")),
    request_body = AddClubMemberRequest,
    responses(
        (status = 201, description = "Member added", body = ClubMemberResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Club or user not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already a member (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn add_club_member(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AddClubMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("club:manage")?;

    let txn = state.db.begin().await?;
    let _club = find_club_for_update(&txn, id).await?;
    let _user = find_user(&txn, payload.user_id).await?;

    let new_member = club_member::ActiveModel {
        club_id: Set(id),
        user_id: Set(payload.user_id),
        joined_at: Set(chrono::Utc::now()),
    };

    let model = match new_member.insert(&txn).await {
        Ok(model) => model,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("User is already a member of this club".into()));
        }
        Err(e) => return Err(e.into()),
    };

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ClubMemberResponse::from(model))))
}

#[utoipa::path(
    delete,
    path = "/{id}/members/{user_id}",
    tag = "Clubs",
    operation_id = "removeClubMember",
    summary = "Remove a member from a club",
    params(
        ("id" = i32, Path, description = "Club ID"),
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Club not found or user not a member (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn remove_club_member(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(i32, i32)>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("club:manage")?;

    let _club = find_club(&state.db, id).await?;

    let result = club_member::Entity::delete_by_id((id, user_id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("User is not a member of this club".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/coordinators",
    tag = "Clubs",
    operation_id = "addClubCoordinator",
    summary = "Promote a user to club coordinator",
    description = "Requires `club:manage`.",
    params(("id" = i32, Path, description = "Club ID")),
    request_body = AddClubCoordinatorRequest,
    responses(
        (status = 201, description = "Coordinator added", body = ClubCoordinatorResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Club or user not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already a coordinator (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn add_club_coordinator(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AddClubCoordinatorRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("club:manage")?;

    let txn = state.db.begin().await?;
    let _club = find_club_for_update(&txn, id).await?;
    let _user = find_user(&txn, payload.user_id).await?;

    let new_coordinator = club_coordinator::ActiveModel {
        club_id: Set(id),
        user_id: Set(payload.user_id),
        created_at: Set(chrono::Utc::now()),
    };

    let model = match new_coordinator.insert(&txn).await {
        Ok(model) => model,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict(
                "User is already a coordinator of this club".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(ClubCoordinatorResponse::from(model))))
}

pub(crate) async fn find_club<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<club::Model, AppError> {
    club::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".into()))
}

async fn find_club_for_update(txn: &DatabaseTransaction, id: i32) -> Result<club::Model, AppError> {
    use sea_orm::sea_query::LockType;
    club::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".into()))
}
