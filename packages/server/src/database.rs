use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::entity::{
    attendance, club, club_coordinator, club_member, contest, contest_log, event, event_club,
    password_reset, role_permission, team, team_member, user,
};

pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    // Set connection pool options
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .max_lifetime(Duration::from_secs(8))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;
    setup_schema(&db).await?;

    Ok(db)
}

/// Create any table that does not exist yet. Existing tables are left alone;
/// column migrations are out of scope for this service.
pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(club::Entity),
        schema.create_table_from_entity(club_member::Entity),
        schema.create_table_from_entity(club_coordinator::Entity),
        schema.create_table_from_entity(event::Entity),
        schema.create_table_from_entity(event_club::Entity),
        schema.create_table_from_entity(team::Entity),
        schema.create_table_from_entity(team_member::Entity),
        schema.create_table_from_entity(attendance::Entity),
        schema.create_table_from_entity(contest::Entity),
        schema.create_table_from_entity(contest_log::Entity),
        schema.create_table_from_entity(role_permission::Entity),
        schema.create_table_from_entity(password_reset::Entity),
    ];

    for mut stmt in tables {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    Ok(())
}
