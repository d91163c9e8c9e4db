use serde::{Deserialize, Serialize};

use super::shared::validate_email;
use crate::entity::user::UserRole;
use crate::error::AppError;

/// Request body for the federated login flow. The upstream identity provider
/// has already authenticated the caller; this endpoint only matches the
/// claimed identity against the user directory and issues a token.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    /// Institutional email, verified upstream.
    #[schema(example = "2027csb1234@university.edu")]
    pub email: String,
    /// Role the client claims for this session. Must match the stored role.
    pub role: UserRole,
    /// Display name. Required only when the login should create the account.
    #[schema(example = "Ada Lovelace")]
    pub full_name: Option<String>,
    /// Profile photo URL passed through from the identity provider.
    pub photo: Option<String>,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    validate_email(&payload.email)
}

/// Request body for the password login flow.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct PasswordLoginRequest {
    #[schema(example = "2027csb1234@university.edu")]
    pub email: String,
    /// Account password.
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_password_login_request(payload: &PasswordLoginRequest) -> Result<(), AppError> {
    validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    /// ID of the authenticated user.
    #[schema(example = 42)]
    pub user_id: i32,
    pub email: String,
    pub full_name: String,
    /// User's role.
    #[schema(example = "student")]
    pub role: String,
    /// Permissions granted to the role.
    #[schema(example = json!(["event:create"]))]
    pub permissions: Vec<String>,
}

/// Current authenticated user's claims.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    pub user_id: i32,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub permissions: Vec<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    /// 6-digit one-time password.
    #[schema(example = "204863")]
    pub otp: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    /// New password (8-128 characters).
    pub new_password: String,
}

pub fn validate_reset_password_request(payload: &ResetPasswordRequest) -> Result<(), AppError> {
    validate_email(&payload.email)?;
    validate_otp(&payload.otp)?;
    validate_password(&payload.new_password)
}

pub fn validate_otp(otp: &str) -> Result<(), AppError> {
    if otp.len() != 6 || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation("OTP must be 6 digits".into()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 || password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    Ok(())
}

/// Generic acknowledgement body for flows that must not leak account state.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: &'static str,
}
