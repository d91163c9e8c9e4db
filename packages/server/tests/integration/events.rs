use serde_json::json;

use crate::common::{TestApp, routes};

mod crud {
    use super::*;

    #[tokio::test]
    async fn coordinator_can_create_an_event() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "name": "Robotics Finale",
                    "venue": "Lab 3",
                    "date": "2026-03-14T10:00:00Z",
                    "duration_minutes": 90,
                    "max_points": 50,
                    "club_ids": [club_id],
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "create failed: {}", res.text);
        assert_eq!(res.body["name"], "Robotics Finale");
        assert_eq!(res.body["venue"], "Lab 3");
        assert_eq!(res.body["max_points"], 50);
        assert_eq!(res.body["status"], "upcoming");
        assert_eq!(res.body["club_ids"], json!([club_id]));
    }

    #[tokio::test]
    async fn student_cannot_create_an_event() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let (_, student) = app.create_user("student@university.edu", "student").await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "name": "Rogue Event",
                    "venue": "Lab 3",
                    "date": "2026-03-14T10:00:00Z",
                    "duration_minutes": 90,
                    "max_points": 50,
                    "club_ids": [club_id],
                }),
                &student,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn creating_with_an_unknown_club_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "name": "Orphan Event",
                    "venue": "Lab 3",
                    "date": "2026-03-14T10:00:00Z",
                    "duration_minutes": 90,
                    "max_points": 50,
                    "club_ids": [9999],
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn the_detail_view_lists_clubs_and_winners() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let first = app.create_club(&token, "Robotics Club").await;
        let second = app.create_club(&token, "Debate Society").await;
        let event_id = app.create_event(&token, "Joint Showcase", &[first, second]).await;

        let res = app.get_with_token(&routes::event(event_id), &token).await;

        assert_eq!(res.status, 200, "get failed: {}", res.text);
        assert_eq!(res.body["club_ids"], json!([first, second]));
        assert_eq!(res.body["winner_ids"], json!([]));
    }

    #[tokio::test]
    async fn update_changes_scalars_and_replaces_the_club_set() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let old_club = app.create_club(&token, "Robotics Club").await;
        let new_club = app.create_club(&token, "Debate Society").await;
        let event_id = app.create_event(&token, "Showcase", &[old_club]).await;

        let res = app
            .patch_with_token(
                &routes::event(event_id),
                &json!({"max_points": 75, "club_ids": [new_club]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "update failed: {}", res.text);
        assert_eq!(res.body["max_points"], 75);
        assert_eq!(res.body["name"], "Showcase");
        assert_eq!(res.body["club_ids"], json!([new_club]));
    }

    #[tokio::test]
    async fn empty_patch_returns_the_current_state() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;
        let event_id = app.create_event(&token, "Showcase", &[club_id]).await;

        let res = app
            .patch_with_token(&routes::event(event_id), &json!({}), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["name"], "Showcase");
        assert_eq!(res.body["club_ids"], json!([club_id]));
    }

    #[tokio::test]
    async fn delete_removes_the_event() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;
        let event_id = app.create_event(&token, "Short-lived", &[club_id]).await;

        let res = app.delete_with_token(&routes::event(event_id), &token).await;
        assert_eq!(res.status, 204, "delete failed: {}", res.text);

        let res = app.get_with_token(&routes::event(event_id), &token).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod filters {
    use super::*;

    #[tokio::test]
    async fn date_bounds_are_inclusive_and_accept_bare_dates() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;
        // The helper schedules events at 2026-03-14T10:00:00Z.
        let event_id = app.create_event(&token, "Pi Day Special", &[club_id]).await;

        let res = app
            .get_with_token(
                &format!("{}?date_after=2026-03-14&date_before=2026-03-14", routes::EVENTS),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "list failed: {}", res.text);
        let listed: Vec<i64> = res.body.as_array().map_or(vec![], |events| {
            events.iter().filter_map(|e| e["id"].as_i64()).collect()
        });
        assert!(listed.contains(&(event_id as i64)), "event missing from: {}", res.text);

        let res = app
            .get_with_token(&format!("{}?date_before=2026-03-13", routes::EVENTS), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body, json!([]));
    }

    #[tokio::test]
    async fn malformed_date_bound_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;

        let res = app
            .get_with_token(&format!("{}?date_after=not-a-date", routes::EVENTS), &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn status_and_club_filters_narrow_the_listing() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let robotics = app.create_club(&token, "Robotics Club").await;
        let debate = app.create_club(&token, "Debate Society").await;
        app.create_event(&token, "Robotics Workshop", &[robotics]).await;

        let res = app
            .post_with_token(
                routes::EVENTS,
                &json!({
                    "name": "Debate Finals",
                    "venue": "Auditorium",
                    "date": "2026-02-01T09:00:00Z",
                    "duration_minutes": 60,
                    "max_points": 40,
                    "status": "completed",
                    "club_ids": [debate],
                }),
                &token,
            )
            .await;
        assert_eq!(res.status, 201, "create failed: {}", res.text);

        let res = app
            .get_with_token(&format!("{}?status=completed", routes::EVENTS), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));
        assert_eq!(res.body[0]["name"], "Debate Finals");

        let res = app
            .get_with_token(&format!("{}?club_id={}", routes::EVENTS, robotics), &token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));
        assert_eq!(res.body[0]["name"], "Robotics Workshop");
    }

    #[tokio::test]
    async fn search_matches_the_name_case_insensitively() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;
        app.create_event(&token, "Autumn Hackathon", &[club_id]).await;
        app.create_event(&token, "Chess Open", &[club_id]).await;

        let res = app
            .get_with_token(&format!("{}?search=HACK", routes::EVENTS), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));
        assert_eq!(res.body[0]["name"], "Autumn Hackathon");
    }
}

mod deletion_leftovers {
    use super::*;

    #[tokio::test]
    async fn deleting_an_event_leaves_teams_and_points_behind() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Doomed Event", &[club_id]).await;
        let (student_id, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (team_id, _) = app.create_team(&student, "Survivors", event_id).await;
        app.record_points(&coord, student_id, event_id, 40).await;

        let res = app.delete_with_token(&routes::event(event_id), &coord).await;
        assert_eq!(res.status, 204, "delete failed: {}", res.text);

        let res = app.get_with_token(&routes::team(team_id), &coord).await;
        assert_eq!(res.status, 200, "team should survive: {}", res.text);
        assert_eq!(res.body["event_id"], event_id);

        let res = app
            .get_with_token(&format!("{}?user_id={}", routes::ATTENDANCE, student_id), &coord)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().map(Vec::len), Some(1));

        assert_eq!(app.total_points(&coord, student_id).await, 40);
    }
}

mod winners {
    use super::*;

    #[tokio::test]
    async fn a_winning_team_flags_its_members_attendance() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Team Contest", &[club_id]).await;
        let (first_id, first) = app.create_user("2027csb1001@university.edu", "student").await;
        let (second_id, second) = app.create_user("2027csb1002@university.edu", "student").await;
        let (team_id, share_code) = app.create_team(&first, "Null Pointers", event_id).await;

        let res = app
            .post_with_token(routes::TEAMS_JOIN, &json!({"share_code": share_code}), &second)
            .await;
        assert_eq!(res.status, 200, "join failed: {}", res.text);

        let res = app
            .put_with_token(
                &routes::team_attendance(team_id),
                &json!([
                    {"user_id": first_id, "status": "present", "points": 30},
                    {"user_id": second_id, "status": "present", "points": 30},
                ]),
                &coord,
            )
            .await;
        assert_eq!(res.status, 200, "marking failed: {}", res.text);

        let res = app
            .put_with_token(&routes::event_winners(event_id), &json!({"team_id": team_id}), &coord)
            .await;

        assert_eq!(res.status, 200, "winners failed: {}", res.text);
        assert_eq!(res.body["winner_ids"], json!([first_id, second_id]));
    }

    #[tokio::test]
    async fn declaring_new_winners_clears_the_old_flags() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Contest", &[club_id]).await;
        let (first_id, _) = app.create_user("2027csb1001@university.edu", "student").await;
        let (second_id, _) = app.create_user("2027csb1002@university.edu", "student").await;
        app.record_points(&coord, first_id, event_id, 20).await;
        app.record_points(&coord, second_id, event_id, 20).await;

        let res = app
            .put_with_token(
                &routes::event_winners(event_id),
                &json!({"user_ids": [first_id, second_id]}),
                &coord,
            )
            .await;
        assert_eq!(res.status, 200, "winners failed: {}", res.text);
        assert_eq!(res.body["winner_ids"], json!([first_id, second_id]));

        let res = app
            .put_with_token(&routes::event_winners(event_id), &json!({"user_ids": [second_id]}), &coord)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["winner_ids"], json!([second_id]));
    }

    #[tokio::test]
    async fn members_without_an_attendance_record_are_skipped() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Contest", &[club_id]).await;
        let (first_id, first) = app.create_user("2027csb1001@university.edu", "student").await;
        let (_, second) = app.create_user("2027csb1002@university.edu", "student").await;
        let (team_id, share_code) = app.create_team(&first, "Half Marked", event_id).await;

        let res = app
            .post_with_token(routes::TEAMS_JOIN, &json!({"share_code": share_code}), &second)
            .await;
        assert_eq!(res.status, 200, "join failed: {}", res.text);

        // Only the first member ever gets a record.
        app.record_points(&coord, first_id, event_id, 25).await;

        let res = app
            .put_with_token(&routes::event_winners(event_id), &json!({"team_id": team_id}), &coord)
            .await;

        assert_eq!(res.status, 200, "winners failed: {}", res.text);
        assert_eq!(res.body["winner_ids"], json!([first_id]));
    }

    #[tokio::test]
    async fn a_team_from_another_event_is_rejected() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let target = app.create_event(&coord, "Target Event", &[club_id]).await;
        let other = app.create_event(&coord, "Other Event", &[club_id]).await;
        let (_, student) = app.create_user("2027csb1001@university.edu", "student").await;
        let (team_id, _) = app.create_team(&student, "Wrong Event Team", other).await;

        let res = app
            .put_with_token(&routes::event_winners(target), &json!({"team_id": team_id}), &coord)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn exactly_one_of_team_or_users_must_be_given() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Contest", &[club_id]).await;

        let res = app
            .put_with_token(
                &routes::event_winners(event_id),
                &json!({"team_id": 1, "user_ids": [1]}),
                &coord,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .put_with_token(&routes::event_winners(event_id), &json!({}), &coord)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn declaring_winners_requires_event_manage() {
        let app = TestApp::spawn().await;
        let (_, coord) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&coord, "Robotics Club").await;
        let event_id = app.create_event(&coord, "Contest", &[club_id]).await;
        let (student_id, student) = app.create_user("2027csb1001@university.edu", "student").await;

        let res = app
            .put_with_token(
                &routes::event_winners(event_id),
                &json!({"user_ids": [student_id]}),
                &student,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }
}
