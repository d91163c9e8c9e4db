use sea_orm::sea_query::{Index, OnConflict};
use sea_orm::*;
use tracing::info;

use crate::entity::{attendance, contest_log, role_permission};

/// Default role-permission mappings seeded on startup.
const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    // Admin: all permissions
    ("admin", "user:manage"),
    ("admin", "club:create"),
    ("admin", "club:manage"),
    ("admin", "event:create"),
    ("admin", "event:manage"),
    ("admin", "attendance:mark"),
    ("admin", "team:manage"),
    // CoSA office: coordinator set plus user administration
    ("cosa", "user:manage"),
    ("cosa", "club:create"),
    ("cosa", "club:manage"),
    ("cosa", "event:create"),
    ("cosa", "event:manage"),
    ("cosa", "attendance:mark"),
    ("cosa", "team:manage"),
    // Coordinator
    ("coordinator", "club:create"),
    ("coordinator", "club:manage"),
    ("coordinator", "event:create"),
    ("coordinator", "event:manage"),
    ("coordinator", "attendance:mark"),
    ("coordinator", "team:manage"),
    // Faculty and students act on their own resources only
];

/// Seed the `role_permission` table with defaults.
pub async fn seed_role_permissions(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut perms_inserted = 0u64;
    for &(role, permission) in DEFAULT_MAPPINGS {
        let model = role_permission::ActiveModel {
            role: Set(role.to_string()),
            permission: Set(permission.to_string()),
        };

        let result = role_permission::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    role_permission::Column::Role,
                    role_permission::Column::Permission,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(n) => perms_inserted += n,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if perms_inserted > 0 {
        info!("Seeded {} new role-permission mappings", perms_inserted);
    }

    Ok(())
}

/// Ensure required database indexes exist.
///
/// Schema setup from entities doesn't cover composite indexes, so they are
/// created manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    // One attendance record per (user, event). Mutations rely on this
    // constraint, so a failure here is not survivable.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_attendance_user_event")
        .table(attendance::Entity)
        .col(attendance::Column::UserId)
        .col(attendance::Column::EventId)
        .to_owned();

    db.execute(backend.build(&stmt)).await?;
    info!("Ensured index idx_attendance_user_event exists");

    // Composite index for per-room log reads:
    // SELECT * FROM contest_log WHERE room_code = ? ORDER BY logged_at DESC
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_contest_log_room_logged")
        .table(contest_log::Entity)
        .col(contest_log::Column::RoomCode)
        .col(contest_log::Column::LoggedAt)
        .to_owned();

    match db.execute(backend.build(&stmt)).await {
        Ok(_) => {
            info!("Ensured index idx_contest_log_room_logged exists");
        }
        Err(e) => {
            tracing::warn!("Failed to create index idx_contest_log_room_logged: {}", e);
        }
    }

    Ok(())
}
