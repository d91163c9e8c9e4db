use axum::{Json, extract::State};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user::UserRole;
use crate::entity::{password_reset, role_permission, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MeResponse, MessageResponse,
    PasswordLoginRequest, ResetPasswordRequest, VerifyOtpRequest, validate_login_request,
    validate_otp, validate_password_login_request, validate_reset_password_request,
};
use crate::models::shared::{infer_batch, validate_email};
use crate::state::AppState;
use crate::utils::{codes, hash, jwt};

const OTP_TTL_MINUTES: i64 = 10;

#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in with a federated identity",
    description = "The upstream identity provider has already authenticated the caller; this endpoint matches the claimed identity against the user directory and issues a bearer token. If no account exists for the email, the claimed role is `student` and a full name is given, a password-less account is created on the spot.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unknown account that cannot be created (INVALID_CREDENTIALS)", body = ErrorBody),
        (status = 403, description = "Stored role differs from the claimed one (PERMISSION_DENIED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let email = payload.email.trim().to_lowercase();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;

    let user = match existing {
        Some(user) => {
            if user.role != payload.role {
                return Err(AppError::PermissionDenied);
            }
            refresh_photo(&state.db, user, payload.photo).await?
        }
        None => first_login_signup(&state.db, &email, &payload).await?,
    };

    session_response(&state, user).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/password-login",
    tag = "Auth",
    operation_id = "passwordLogin",
    summary = "Log in with email and password",
    request_body = PasswordLoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unknown email, password-less account, or wrong password (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn password_login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PasswordLoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_password_login_request(&payload)?;

    let email = payload.email.trim().to_lowercase();

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, stored_hash)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;
    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }

    session_response(&state, user).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Return the current authenticated user's claims",
    responses(
        (status = 200, description = "Authenticated claims", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(user_id = auth_user.user_id))]
pub async fn me(auth_user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: auth_user.user_id,
        email: auth_user.email,
        full_name: auth_user.full_name,
        role: auth_user.role,
        permissions: auth_user.permissions,
    })
}

#[utoipa::path(
    post,
    path = "/forgot-password",
    tag = "Auth",
    operation_id = "forgotPassword",
    summary = "Request a password reset OTP",
    description = "Issues a 6-digit OTP valid for 10 minutes and hands it to the mail path. Responds 200 whether or not the account exists, so callers cannot probe for registered emails.",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Acknowledged", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_email(&payload.email)?;

    let email = payload.email.trim().to_lowercase();

    let account = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;

    if account.is_some() {
        let now = chrono::Utc::now();
        let otp = codes::otp();
        let reset = password_reset::ActiveModel {
            email: Set(email.clone()),
            otp: Set(otp.clone()),
            expires_at: Set(now + chrono::Duration::minutes(OTP_TTL_MINUTES)),
            consumed: Set(false),
            created_at: Set(now),
            ..Default::default()
        };
        reset.insert(&state.db).await?;

        // Mail delivery is an external concern; the OTP goes out through the
        // log pipeline.
        tracing::info!(email = %email, otp = %otp, "Password reset OTP issued");
    }

    Ok(Json(MessageResponse {
        message: "If the account exists, an OTP has been sent",
    }))
}

#[utoipa::path(
    post,
    path = "/verify-otp",
    tag = "Auth",
    operation_id = "verifyOtp",
    summary = "Check a password reset OTP without consuming it",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP is live", body = MessageResponse),
        (status = 400, description = "Unknown, expired or consumed OTP (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn verify_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_email(&payload.email)?;
    validate_otp(&payload.otp)?;

    let email = payload.email.trim().to_lowercase();
    find_live_otp(&state.db, &email, &payload.otp).await?;

    Ok(Json(MessageResponse {
        message: "OTP verified",
    }))
}

#[utoipa::path(
    post,
    path = "/reset-password",
    tag = "Auth",
    operation_id = "resetPassword",
    summary = "Reset a password with a verified OTP",
    description = "Consumes the OTP and replaces the account's password hash.",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password replaced", body = MessageResponse),
        (status = 400, description = "Validation error or dead OTP (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "Account no longer exists (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_reset_password_request(&payload)?;

    let email = payload.email.trim().to_lowercase();

    let txn = state.db.begin().await?;

    let reset = find_live_otp(&txn, &email, &payload.otp).await?;
    let user = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let new_hash = hash::hash_password(&payload.new_password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let mut consumed: password_reset::ActiveModel = reset.into();
    consumed.consumed = Set(true);
    consumed.update(&txn).await?;

    let mut account: user::ActiveModel = user.into();
    account.password_hash = Set(Some(new_hash));
    account.updated_at = Set(chrono::Utc::now());
    account.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(email = %email, "Password reset completed");

    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

/// Create a password-less account on first federated login. Only students
/// are auto-created, and only when the provider handed over a display name.
async fn first_login_signup(
    db: &DatabaseConnection,
    email: &str,
    payload: &LoginRequest,
) -> Result<user::Model, AppError> {
    if payload.role != UserRole::Student {
        return Err(AppError::InvalidCredentials);
    }
    let full_name = match payload.full_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Err(AppError::InvalidCredentials),
    };

    let now = chrono::Utc::now();
    let new_user = user::ActiveModel {
        email: Set(email.to_string()),
        full_name: Set(full_name),
        student_id: Set(email.split('@').next().unwrap_or_default().to_uppercase()),
        role: Set(UserRole::Student),
        batch: Set(infer_batch(email)),
        total_points: Set(0),
        photo_url: Set(payload.photo.clone()),
        password_hash: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_user.insert(db).await {
        Ok(model) => {
            tracing::info!(email = %email, user_id = model.id, "Created account on first login");
            Ok(model)
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            // Two concurrent first logins: whoever lost the race reads the
            // winner's row back.
            user::Entity::find()
                .filter(user::Column::Email.eq(email))
                .one(db)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict("An account with this roll number already exists".into())
                })
        }
        Err(e) => Err(e.into()),
    }
}

/// Keep the stored photo in sync with what the identity provider reports.
async fn refresh_photo(
    db: &DatabaseConnection,
    user: user::Model,
    photo: Option<String>,
) -> Result<user::Model, AppError> {
    match photo {
        Some(photo) if user.photo_url.as_deref() != Some(photo.as_str()) => {
            let mut active: user::ActiveModel = user.into();
            active.photo_url = Set(Some(photo));
            active.updated_at = Set(chrono::Utc::now());
            Ok(active.update(db).await?)
        }
        _ => Ok(user),
    }
}

async fn session_response(state: &AppState, user: user::Model) -> Result<LoginResponse, AppError> {
    let permissions = role_permissions(&state.db, user.role.as_str()).await?;

    let token = jwt::sign(
        user.id,
        &user.email,
        &user.full_name,
        user.role.as_str(),
        permissions.clone(),
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_days,
    )
    .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

    Ok(LoginResponse {
        token,
        user_id: user.id,
        email: user.email,
        full_name: user.full_name,
        role: user.role.as_str().to_string(),
        permissions,
    })
}

async fn role_permissions<C: ConnectionTrait>(db: &C, role: &str) -> Result<Vec<String>, AppError> {
    let rows = role_permission::Entity::find()
        .filter(role_permission::Column::Role.eq(role))
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|rp| rp.permission).collect())
}

async fn find_live_otp<C: ConnectionTrait>(
    db: &C,
    email: &str,
    otp: &str,
) -> Result<password_reset::Model, AppError> {
    password_reset::Entity::find()
        .filter(password_reset::Column::Email.eq(email))
        .filter(password_reset::Column::Otp.eq(otp))
        .filter(password_reset::Column::Consumed.eq(false))
        .filter(password_reset::Column::ExpiresAt.gt(chrono::Utc::now()))
        .order_by_desc(password_reset::Column::CreatedAt)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid or expired OTP".into()))
}
