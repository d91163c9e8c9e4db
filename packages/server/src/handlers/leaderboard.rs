use axum::Json;
use axum::extract::{Query, State};
use sea_orm::*;
use tracing::instrument;

use crate::entity::user::{self, UserRole};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::leaderboard::{LeaderboardEntry, LeaderboardQuery};
use crate::models::shared::page_window;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/",
    tag = "Leaderboard",
    operation_id = "getLeaderboard",
    summary = "Rank students by points",
    description = "Students ordered by total points descending, ties broken by roll number ascending. Ranks are absolute positions in the full ordering, so a window starting at skip=30 begins at rank 31.",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Ranked students", body = Vec<LeaderboardEntry>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.user_id))]
pub async fn get_leaderboard(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let (limit, skip) = page_window(query.limit, query.skip);

    let mut select = user::Entity::find().filter(user::Column::Role.eq(UserRole::Student));

    if let Some(ref batch) = query.batch {
        select = select.filter(user::Column::Batch.eq(batch.trim()));
    }

    let rows = select
        .order_by_desc(user::Column::TotalPoints)
        .order_by_asc(user::Column::StudentId)
        .offset(Some(skip))
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    let entries = rows
        .into_iter()
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: skip + i as u64 + 1,
            user_id: u.id,
            full_name: u.full_name,
            student_id: u.student_id,
            batch: u.batch,
            total_points: u.total_points,
            photo_url: u.photo_url,
        })
        .collect();

    Ok(Json(entries))
}
