use serde::{Deserialize, Serialize};

#[derive(Deserialize, utoipa::IntoParams)]
pub struct LeaderboardQuery {
    /// Restrict the ranking to one batch.
    pub batch: Option<String>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// One row of the ranking. Ranks are absolute: a window starting at skip=30
/// begins at rank 31.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: i32,
    pub full_name: String,
    pub student_id: String,
    pub batch: String,
    pub total_points: i64,
    pub photo_url: Option<String>,
}
