use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user::{self, UserRole};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::{escape_like, infer_batch, page_window};
use crate::models::user::{
    SignupRequest, UpdateUserRequest, UserListQuery, UserResponse, validate_signup_request,
    validate_update_user,
};
use crate::state::AppState;
use crate::utils::hash;

#[utoipa::path(
    post,
    path = "/",
    tag = "Users",
    operation_id = "signup",
    summary = "Create a user account",
    description = "Open signup. The password is optional; accounts without one can only authenticate through the federated login flow. Duplicate emails and roll numbers are refused by the store's unique constraints.",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Email or roll number already registered (EMAIL_TAKEN, CONFLICT)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_signup_request(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let batch = match payload.batch {
        Some(ref batch) if !batch.trim().is_empty() => batch.trim().to_string(),
        _ => infer_batch(&email),
    };

    let password_hash = match payload.password {
        Some(ref password) => Some(
            hash::hash_password(password)
                .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?,
        ),
        None => None,
    };

    let now = chrono::Utc::now();
    let new_user = user::ActiveModel {
        email: Set(email.clone()),
        full_name: Set(payload.full_name.trim().to_string()),
        student_id: Set(payload.student_id.trim().to_string()),
        role: Set(payload.role.unwrap_or(UserRole::Student)),
        batch: Set(batch),
        total_points: Set(0),
        photo_url: Set(payload.photo_url),
        password_hash: Set(password_hash),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = match new_user.insert(&state.db).await {
        Ok(model) => model,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(classify_signup_conflict(&state.db, &email).await?);
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = model.id, "User signed up");

    Ok((StatusCode::CREATED, Json(UserResponse::from(model))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users",
    description = "Filtered user directory, ordered by id ascending.",
    params(UserListQuery),
    responses(
        (status = 200, description = "Matching users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = user::Entity::find();

    if let Some(role) = query.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(ref batch) = query.batch {
        select = select.filter(user::Column::Batch.eq(batch.trim()));
    }
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            let pattern = format!("%{}%", term.to_lowercase());
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::FullName)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Email)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }
    }

    let users = select
        .order_by_asc(user::Column::Id)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user by ID",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.user_id))]
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<UserResponse>, AppError> {
    let model = find_user(&state.db, id).await?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Users",
    operation_id = "updateUser",
    summary = "Update a user's profile",
    description = "PATCH semantics on full_name, batch and photo_url. Users may edit themselves; editing anyone else requires `user:manage`. The points total is derived from attendance and cannot be written here.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if auth_user.user_id != id {
        auth_user.require_permission("user:manage")?;
    }
    validate_update_user(&payload)?;

    if payload == UpdateUserRequest::default() {
        let existing = find_user(&state.db, id).await?;
        return Ok(Json(existing.into()));
    }

    let txn = state.db.begin().await?;
    let existing = find_user_for_update(&txn, id).await?;

    let mut active: user::ActiveModel = existing.into();

    if let Some(ref full_name) = payload.full_name {
        active.full_name = Set(full_name.trim().to_string());
    }
    if let Some(ref batch) = payload.batch {
        active.batch = Set(batch.trim().to_string());
    }
    if let Some(photo_url) = payload.photo_url {
        active.photo_url = Set(photo_url);
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

/// Decide which unique constraint a signup insert tripped over.
async fn classify_signup_conflict(
    db: &DatabaseConnection,
    email: &str,
) -> Result<AppError, AppError> {
    let email_taken = user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some();
    if email_taken {
        Ok(AppError::EmailTaken)
    } else {
        Ok(AppError::Conflict("Student ID already registered".into()))
    }
}

/// Fail with the missing IDs when any of the given users does not exist.
pub(crate) async fn ensure_users_exist<C: ConnectionTrait>(
    db: &C,
    user_ids: &[i32],
) -> Result<(), AppError> {
    let found: Vec<i32> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids.iter().copied()))
        .select_only()
        .column(user::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    let missing: Vec<String> = user_ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::NotFound(format!(
            "Users not found: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub(crate) async fn find_user<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn find_user_for_update(txn: &DatabaseTransaction, id: i32) -> Result<user::Model, AppError> {
    use sea_orm::sea_query::LockType;
    user::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
