use std::collections::{BTreeSet, HashMap};

use sea_orm::sea_query::Expr;
use sea_orm::*;

use crate::entity::{attendance, user};

/// Recompute `total_points` for the given users from their attendance rows.
///
/// A user's total is the sum of `points` over their rows with status
/// `present`. Every attendance mutation (bulk create, team marking, update,
/// delete, team delete) calls this for the affected users inside its own
/// transaction, which is what makes an update replace a contribution instead
/// of re-adding it, and a delete reverse one.
pub async fn recompute_totals<C: ConnectionTrait>(db: &C, user_ids: &[i32]) -> Result<(), DbErr> {
    // Dedupe; deterministic order keeps concurrent transactions from
    // updating users in conflicting orders.
    let ids: BTreeSet<i32> = user_ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok(());
    }

    let rows: Vec<(i32, i32)> = attendance::Entity::find()
        .select_only()
        .column(attendance::Column::UserId)
        .column(attendance::Column::Points)
        .filter(attendance::Column::UserId.is_in(ids.iter().copied()))
        .filter(attendance::Column::Status.eq(attendance::AttendanceStatus::Present))
        .into_tuple()
        .all(db)
        .await?;

    let mut totals: HashMap<i32, i64> = HashMap::new();
    for (user_id, points) in rows {
        *totals.entry(user_id).or_insert(0) += i64::from(points);
    }

    for user_id in ids {
        let total = totals.get(&user_id).copied().unwrap_or(0);
        user::Entity::update_many()
            .col_expr(user::Column::TotalPoints, Expr::value(total))
            .filter(user::Column::Id.eq(user_id))
            .exec(db)
            .await?;
    }

    Ok(())
}
