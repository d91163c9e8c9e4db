use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::state::AppState;

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/clubs", club_routes())
        .nest("/events", event_routes())
        .nest("/teams", team_routes())
        .nest("/attendance", attendance_routes())
        .nest("/leaderboard", leaderboard_routes())
        .nest("/contest", contest_routes())
}

// The `routes!` macro needs the `__path_*` items that `#[utoipa::path]`
// generates next to each handler, hence the glob imports.

fn auth_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::auth::*;

    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(password_login))
        .routes(routes!(me))
        .routes(routes!(forgot_password))
        .routes(routes!(verify_otp))
        .routes(routes!(reset_password))
}

fn user_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::user::*;

    OpenApiRouter::new()
        .routes(routes!(list_users, signup))
        .routes(routes!(get_user, update_user))
}

fn club_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::club::*;

    OpenApiRouter::new()
        .routes(routes!(list_clubs, create_club))
        .routes(routes!(get_club, update_club, delete_club))
        .routes(routes!(add_club_member))
        .routes(routes!(remove_club_member))
        .routes(routes!(add_club_coordinator))
}

fn event_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::event::*;

    OpenApiRouter::new()
        .routes(routes!(list_events, create_event))
        .routes(routes!(get_event, update_event, delete_event))
        .routes(routes!(set_winners))
}

fn team_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::team::*;

    OpenApiRouter::new()
        .routes(routes!(list_teams, create_team))
        .routes(routes!(join_team))
        .routes(routes!(get_team, update_team, delete_team))
        .routes(routes!(leave_team))
        .routes(routes!(remove_team_member))
}

fn attendance_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::attendance::*;

    OpenApiRouter::new()
        .routes(routes!(list_attendance))
        .routes(routes!(participate))
        .routes(routes!(mark_team_attendance))
        .routes(routes!(update_attendance, delete_attendance))
}

fn leaderboard_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::leaderboard::*;

    OpenApiRouter::new().routes(routes!(get_leaderboard))
}

fn contest_routes() -> OpenApiRouter<AppState> {
    use crate::handlers::contest::*;

    OpenApiRouter::new()
        .routes(routes!(create_contest))
        .routes(routes!(join_contest))
        .routes(routes!(list_logs, append_log))
        .routes(routes!(active_contests))
        .routes(routes!(room_logs))
}
