use serde_json::json;

use crate::common::{TestApp, routes, signup_body};

mod signup {
    use super::*;

    #[tokio::test]
    async fn minimal_signup_defaults_to_a_student_account() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "2027mcs2001@university.edu",
                    "full_name": "Niklaus Wirth",
                    "student_id": "2027MCS2001",
                }),
            )
            .await;

        assert_eq!(res.status, 201, "Signup failed: {}", res.text);
        assert_eq!(res.body["role"], "student");
        assert_eq!(res.body["batch"], "2027");
        assert_eq!(res.body["total_points"], 0);
        assert!(res.body["id"].is_number());
    }

    #[tokio::test]
    async fn duplicate_email_is_email_taken() {
        let app = TestApp::spawn().await;

        let first = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "twice@university.edu",
                    "full_name": "First",
                    "student_id": "ROLL1",
                }),
            )
            .await;
        assert_eq!(first.status, 201, "First signup failed: {}", first.text);

        let res = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "twice@university.edu",
                    "full_name": "Second",
                    "student_id": "ROLL2",
                }),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "EMAIL_TAKEN");
    }

    #[tokio::test]
    async fn duplicate_roll_number_is_a_conflict() {
        let app = TestApp::spawn().await;

        let first = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "one@university.edu",
                    "full_name": "First",
                    "student_id": "SHARED1",
                }),
            )
            .await;
        assert_eq!(first.status, 201, "First signup failed: {}", first.text);

        let res = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "two@university.edu",
                    "full_name": "Second",
                    "student_id": "SHARED1",
                }),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn missing_required_fields_are_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::USERS, &json!({"email": "short@university.edu"}))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod directory {
    use super::*;

    #[tokio::test]
    async fn listing_requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::USERS).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn filters_by_role_and_batch() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("2026aaa1@university.edu", "student").await;
        app.create_user("2027bbb2@university.edu", "student").await;
        app.create_user("coord@university.edu", "coordinator").await;

        let coords = app
            .get_with_token(&format!("{}?role=coordinator", routes::USERS), &token)
            .await;
        assert_eq!(coords.status, 200);
        let list = coords.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["email"], "coord@university.edu");

        let batch = app
            .get_with_token(&format!("{}?batch=2027", routes::USERS), &token)
            .await;
        assert_eq!(batch.status, 200);
        let list = batch.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["email"], "2027bbb2@university.edu");
    }

    #[tokio::test]
    async fn search_matches_name_and_email_case_insensitively() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("finder@university.edu", "student").await;

        let reg = app
            .post_without_token(
                routes::USERS,
                &json!({
                    "email": "ada@university.edu",
                    "full_name": "Ada Lovelace",
                    "student_id": "ADA1",
                }),
            )
            .await;
        assert_eq!(reg.status, 201, "Signup failed: {}", reg.text);

        let res = app
            .get_with_token(&format!("{}?search=LOVELACE", routes::USERS), &token)
            .await;
        assert_eq!(res.status, 200);
        let list = res.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["email"], "ada@university.edu");
    }

    #[tokio::test]
    async fn results_are_ordered_by_id_and_windowed() {
        let app = TestApp::spawn().await;
        let (first, token) = app.create_user("w1@university.edu", "student").await;
        let (second, _) = app.create_user("w2@university.edu", "student").await;
        let (third, _) = app.create_user("w3@university.edu", "student").await;

        let page = app
            .get_with_token(&format!("{}?limit=2", routes::USERS), &token)
            .await;
        assert_eq!(page.status, 200);
        let list = page.body.as_array().expect("array");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["id"].as_i64(), Some(first as i64));
        assert_eq!(list[1]["id"].as_i64(), Some(second as i64));

        let rest = app
            .get_with_token(&format!("{}?limit=2&skip=2", routes::USERS), &token)
            .await;
        let list = rest.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"].as_i64(), Some(third as i64));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("probe@university.edu", "student").await;

        let res = app.get_with_token(&routes::user(99999), &token).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod profile_updates {
    use super::*;

    #[tokio::test]
    async fn user_can_update_their_own_profile() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_user("selfedit@university.edu", "student").await;

        let res = app
            .patch_with_token(&routes::user(id), &json!({"full_name": "New Name"}), &token)
            .await;

        assert_eq!(res.status, 200, "Update failed: {}", res.text);
        assert_eq!(res.body["full_name"], "New Name");
    }

    #[tokio::test]
    async fn cannot_update_someone_else_without_user_manage() {
        let app = TestApp::spawn().await;
        let (_, intruder) = app.create_user("intruder@university.edu", "student").await;
        let (victim, _) = app.create_user("victim@university.edu", "student").await;

        let res = app
            .patch_with_token(&routes::user(victim), &json!({"full_name": "Hax"}), &intruder)
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn admin_can_update_anyone() {
        let app = TestApp::spawn().await;
        let (_, admin) = app.create_user("admin@university.edu", "admin").await;
        let (student, _) = app.create_user("pupil@university.edu", "student").await;

        let res = app
            .patch_with_token(&routes::user(student), &json!({"batch": "2030"}), &admin)
            .await;

        assert_eq!(res.status, 200, "Update failed: {}", res.text);
        assert_eq!(res.body["batch"], "2030");
    }

    #[tokio::test]
    async fn explicit_null_clears_the_photo() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_user("photo@university.edu", "student").await;

        let set = app
            .patch_with_token(
                &routes::user(id),
                &json!({"photo_url": "https://cdn.university.edu/p/1.png"}),
                &token,
            )
            .await;
        assert_eq!(set.status, 200, "Update failed: {}", set.text);
        assert_eq!(set.body["photo_url"], "https://cdn.university.edu/p/1.png");

        let cleared = app
            .patch_with_token(&routes::user(id), &json!({"photo_url": null}), &token)
            .await;
        assert_eq!(cleared.status, 200);
        assert!(cleared.body["photo_url"].is_null());
    }

    #[tokio::test]
    async fn empty_patch_returns_the_current_state() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_user("noop@university.edu", "student").await;

        let res = app.patch_with_token(&routes::user(id), &json!({}), &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["email"], "noop@university.edu");
    }

    #[tokio::test]
    async fn points_total_cannot_be_written_through_the_profile() {
        let app = TestApp::spawn().await;
        let (id, token) = app.create_user("cheater@university.edu", "student").await;

        let res = app
            .patch_with_token(&routes::user(id), &json!({"total_points": 9999}), &token)
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["total_points"], 0);
    }
}
