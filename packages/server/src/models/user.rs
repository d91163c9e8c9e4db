use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::auth::validate_password;
use super::shared::{double_option, validate_email, validate_name};
use crate::entity::user::UserRole;
use crate::error::AppError;

/// Request body for signup.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SignupRequest {
    #[schema(example = "2027csb1234@university.edu")]
    pub email: String,
    #[schema(example = "Ada Lovelace")]
    pub full_name: String,
    /// Institutional roll number.
    #[schema(example = "2027CSB1234")]
    pub student_id: String,
    /// Defaults to `student`.
    pub role: Option<UserRole>,
    /// Batch code; inferred from the email when omitted.
    #[schema(example = "2027")]
    pub batch: Option<String>,
    /// Password (8-128 characters). Accounts created through the federated
    /// login flow have none.
    pub password: Option<String>,
    pub photo_url: Option<String>,
}

pub fn validate_signup_request(payload: &SignupRequest) -> Result<(), AppError> {
    validate_email(&payload.email)?;
    validate_name(&payload.full_name, "Full name")?;
    let student_id = payload.student_id.trim();
    if student_id.is_empty() || student_id.chars().count() > 32 {
        return Err(AppError::Validation(
            "Student ID must be 1-32 characters".into(),
        ));
    }
    if let Some(ref password) = payload.password {
        validate_password(password)?;
    }
    Ok(())
}

#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub batch: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Option<Option<String>>,
}

pub fn validate_update_user(payload: &UpdateUserRequest) -> Result<(), AppError> {
    if let Some(ref full_name) = payload.full_name {
        validate_name(full_name, "Full name")?;
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    /// Filter by role.
    pub role: Option<UserRole>,
    /// Filter by batch code.
    pub batch: Option<String>,
    /// Substring match on name or email.
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub student_id: String,
    pub role: UserRole,
    pub batch: String,
    /// Sum of this user's `present` attendance points.
    pub total_points: i64,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::user::Model> for UserResponse {
    fn from(m: crate::entity::user::Model) -> Self {
        Self {
            id: m.id,
            email: m.email,
            full_name: m.full_name,
            student_id: m.student_id,
            role: m.role,
            batch: m.batch,
            total_points: m.total_points,
            photo_url: m.photo_url,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
