use chrono::{Duration, Utc};
use serde_json::json;

use crate::common::{TestApp, routes};

/// Contest whose window opened an hour ago and closes in an hour.
async fn open_contest(app: &TestApp, token: &str, name: &str) -> (i32, String) {
    contest_with_window(app, token, name, -1, 1).await
}

async fn contest_with_window(
    app: &TestApp,
    token: &str,
    name: &str,
    starts_in_hours: i64,
    ends_in_hours: i64,
) -> (i32, String) {
    let res = app
        .post_with_token(
            routes::CONTEST_CREATE,
            &json!({
                "name": name,
                "starts_at": (Utc::now() + Duration::hours(starts_in_hours)).to_rfc3339(),
                "ends_at": (Utc::now() + Duration::hours(ends_in_hours)).to_rfc3339(),
            }),
            token,
        )
        .await;
    assert_eq!(res.status, 201, "contest create failed: {}", res.text);
    let room_code = res.body["room_code"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_default();
    (res.id(), room_code)
}

mod rooms {
    use super::*;

    #[tokio::test]
    async fn creating_a_contest_draws_a_room_code() {
        let app = TestApp::spawn().await;
        let (student_id, student) = app.create_user("2027csb1001@university.edu", "student").await;

        let res = app
            .post_with_token(
                routes::CONTEST_CREATE,
                &json!({
                    "name": "Weekly Practice Round",
                    "starts_at": Utc::now().to_rfc3339(),
                    "ends_at": (Utc::now() + Duration::hours(2)).to_rfc3339(),
                }),
                &student,
            )
            .await;

        assert_eq!(res.status, 201, "create failed: {}", res.text);
        assert_eq!(res.body["name"], "Weekly Practice Round");
        assert_eq!(res.body["created_by"], student_id);
        assert_eq!(res.body["room_code"].as_str().map(str::len), Some(6));
    }

    #[tokio::test]
    async fn a_contest_must_end_after_it_starts() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let instant = Utc::now().to_rfc3339();

        let res = app
            .post_with_token(
                routes::CONTEST_CREATE,
                &json!({"name": "Zero Width", "starts_at": instant, "ends_at": instant}),
                &student,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn active_contests_lists_only_open_rooms() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        contest_with_window(&app, &student, "Long Over", -3, -1).await;
        let (open_id, _) = open_contest(&app, &student, "Running Now").await;
        contest_with_window(&app, &student, "Not Yet", 1, 3).await;

        let res = app.get_with_token(routes::CONTEST_ACTIVE, &student).await;

        assert_eq!(res.status, 200, "listing failed: {}", res.text);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));
        assert_eq!(res.body[0]["id"], open_id);
        assert_eq!(res.body[0]["name"], "Running Now");
    }
}

mod joining {
    use super::*;

    #[tokio::test]
    async fn joining_an_open_room_writes_a_join_line() {
        let app = TestApp::spawn().await;
        let (_, host) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, room_code) = open_contest(&app, &host, "Practice Round").await;
        let (_, contestant) = app.create_user("2027csb1042@university.edu", "student").await;

        let res = app
            .post_with_token(
                routes::CONTEST_JOIN,
                &json!({"room_code": room_code, "handle": "tourist"}),
                &contestant,
            )
            .await;

        assert_eq!(res.status, 201, "join failed: {}", res.text);
        assert_eq!(res.body["log_type"], "join");
        assert_eq!(res.body["room_code"], room_code);
        assert_eq!(res.body["user_name"], "Test User");
        assert_eq!(res.body["user_roll"], "2027CSB1042");
        assert_eq!(res.body["user_handle"], "tourist");
    }

    #[tokio::test]
    async fn joining_outside_the_window_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, ended) = contest_with_window(&app, &student, "Already Over", -3, -1).await;
        let (_, upcoming) = contest_with_window(&app, &student, "Not Yet", 1, 3).await;

        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": ended}), &student)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": upcoming}), &student)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn an_unknown_room_code_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;

        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": "nosuch"}), &student)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod logs {
    use super::*;

    #[tokio::test]
    async fn message_and_leave_lines_can_be_appended() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, room_code) = open_contest(&app, &student, "Practice Round").await;

        let res = app
            .post_with_token(
                routes::CONTEST_LOGS,
                &json!({
                    "room_code": room_code,
                    "log_type": "message",
                    "message": "Solved problem A",
                    "category": "submission",
                    "severity": "warning",
                }),
                &student,
            )
            .await;
        assert_eq!(res.status, 201, "append failed: {}", res.text);
        assert_eq!(res.body["log_type"], "message");
        assert_eq!(res.body["message"], "Solved problem A");
        assert_eq!(res.body["severity"], "warning");
        assert_eq!(res.body["user_roll"], "2027CSB1001");

        let res = app
            .post_with_token(
                routes::CONTEST_LOGS,
                &json!({"room_code": room_code, "log_type": "leave"}),
                &student,
            )
            .await;
        assert_eq!(res.status, 201, "append failed: {}", res.text);
        assert_eq!(res.body["log_type"], "leave");
        assert_eq!(res.body["severity"], "info");
    }

    #[tokio::test]
    async fn join_lines_cannot_be_appended_directly() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, room_code) = open_contest(&app, &student, "Practice Round").await;

        let res = app
            .post_with_token(
                routes::CONTEST_LOGS,
                &json!({"room_code": room_code, "log_type": "join"}),
                &student,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn room_logs_come_back_newest_first() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, room_code) = open_contest(&app, &student, "Practice Round").await;
        let (_, other_room) = open_contest(&app, &student, "Other Round").await;

        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": &room_code}), &student)
            .await;
        assert_eq!(res.status, 201, "join failed: {}", res.text);
        let res = app
            .post_with_token(
                routes::CONTEST_LOGS,
                &json!({"room_code": &room_code, "log_type": "message", "message": "hello"}),
                &student,
            )
            .await;
        assert_eq!(res.status, 201, "append failed: {}", res.text);
        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": &other_room}), &student)
            .await;
        assert_eq!(res.status, 201, "other join failed: {}", res.text);

        let res = app
            .get_with_token(&routes::contest_room_logs(&room_code), &student)
            .await;
        assert_eq!(res.status, 200, "logs failed: {}", res.text);
        assert_eq!(res.body.as_array().map(Vec::len), Some(2));
        assert_eq!(res.body[0]["log_type"], "message");
        assert_eq!(res.body[1]["log_type"], "join");
    }

    #[tokio::test]
    async fn logs_of_an_unknown_room_are_not_found() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;

        let res = app
            .get_with_token(&routes::contest_room_logs("nosuch"), &student)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn the_global_listing_filters_by_type_and_severity() {
        let app = TestApp::spawn().await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, room_code) = open_contest(&app, &student, "Practice Round").await;

        let res = app
            .post_with_token(routes::CONTEST_JOIN, &json!({"room_code": &room_code}), &student)
            .await;
        assert_eq!(res.status, 201, "join failed: {}", res.text);
        let res = app
            .post_with_token(
                routes::CONTEST_LOGS,
                &json!({
                    "room_code": &room_code,
                    "log_type": "message",
                    "message": "judge is down",
                    "severity": "critical",
                }),
                &student,
            )
            .await;
        assert_eq!(res.status, 201, "append failed: {}", res.text);

        let res = app
            .get_with_token(&format!("{}?log_type=message", routes::CONTEST_LOGS), &student)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));
        assert_eq!(res.body[0]["message"], "judge is down");

        let res = app
            .get_with_token(&format!("{}?severity=critical", routes::CONTEST_LOGS), &student)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));

        let res = app
            .get_with_token(&format!("{}?severity=warning", routes::CONTEST_LOGS), &student)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, json!([]));
    }

    #[tokio::test]
    async fn contest_endpoints_require_authentication() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::CONTEST_CREATE, &json!({"name": "Anonymous"}))
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app.get_without_token(routes::CONTEST_ACTIVE).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}
