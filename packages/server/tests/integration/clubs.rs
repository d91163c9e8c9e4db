use serde_json::json;

use crate::common::{TestApp, routes};

mod crud {
    use super::*;

    #[tokio::test]
    async fn coordinator_can_create_a_club() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;

        let res = app
            .post_with_token(
                routes::CLUBS,
                &json!({
                    "name": "Drama Society",
                    "email": "Drama@Clubs.University.edu",
                    "description": "Theatre and stagecraft",
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "create failed: {}", res.text);
        assert_eq!(res.body["name"], "Drama Society");
        assert_eq!(res.body["email"], "drama@clubs.university.edu");
        assert_eq!(res.body["rating"], 0);
    }

    #[tokio::test]
    async fn student_cannot_create_a_club() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("student@university.edu", "student").await;

        let res = app
            .post_with_token(
                routes::CLUBS,
                &json!({"name": "Rogue Club", "email": "rogue@clubs.university.edu"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 403);
        assert_eq!(res.body["code"], "PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn duplicate_club_name_is_a_conflict() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        app.create_club(&token, "Chess Club").await;

        let res = app
            .post_with_token(
                routes::CLUBS,
                &json!({"name": "Chess Club", "email": "other@clubs.university.edu"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn update_changes_only_the_given_fields() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Robotics Club").await;

        let res = app
            .patch_with_token(&routes::club(club_id), &json!({"rating": 5}), &token)
            .await;

        assert_eq!(res.status, 200, "update failed: {}", res.text);
        assert_eq!(res.body["rating"], 5);
        assert_eq!(res.body["name"], "Robotics Club");

        let noop = app
            .patch_with_token(&routes::club(club_id), &json!({}), &token)
            .await;
        assert_eq!(noop.status, 200);
        assert_eq!(noop.body["rating"], 5);
    }

    #[tokio::test]
    async fn delete_removes_the_club() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Ephemeral Club").await;

        let res = app.delete_with_token(&routes::club(club_id), &token).await;
        assert_eq!(res.status, 204);

        let gone = app.get_with_token(&routes::club(club_id), &token).await;
        assert_eq!(gone.status, 404);
        assert_eq!(gone.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn deleting_a_club_leaves_its_hosted_events_behind() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Vanishing Club").await;
        let event_id = app.create_event(&token, "Orphan Event", &[club_id]).await;

        let res = app.delete_with_token(&routes::club(club_id), &token).await;
        assert_eq!(res.status, 204);

        let event = app.get_with_token(&routes::event(event_id), &token).await;
        assert_eq!(event.status, 200, "event should survive: {}", event.text);
    }
}

mod membership {
    use super::*;

    #[tokio::test]
    async fn members_can_be_added_and_removed() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let (member, _) = app.create_user("member@university.edu", "student").await;
        let club_id = app.create_club(&token, "Film Society").await;

        let added = app
            .post_with_token(
                &routes::club_members(club_id),
                &json!({"user_id": member}),
                &token,
            )
            .await;
        assert_eq!(added.status, 201, "add member failed: {}", added.text);
        assert_eq!(added.body["user_id"].as_i64(), Some(member as i64));

        let detail = app.get_with_token(&routes::club(club_id), &token).await;
        assert_eq!(detail.body["member_ids"], json!([member]));

        let removed = app
            .delete_with_token(&routes::club_member(club_id, member), &token)
            .await;
        assert_eq!(removed.status, 204);

        let detail = app.get_with_token(&routes::club(club_id), &token).await;
        assert_eq!(detail.body["member_ids"], json!([]));
    }

    #[tokio::test]
    async fn adding_the_same_member_twice_is_a_conflict() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let (member, _) = app.create_user("member@university.edu", "student").await;
        let club_id = app.create_club(&token, "Debate Club").await;

        let first = app
            .post_with_token(
                &routes::club_members(club_id),
                &json!({"user_id": member}),
                &token,
            )
            .await;
        assert_eq!(first.status, 201, "add member failed: {}", first.text);

        let res = app
            .post_with_token(
                &routes::club_members(club_id),
                &json!({"user_id": member}),
                &token,
            )
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn removing_a_non_member_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let (outsider, _) = app.create_user("outsider@university.edu", "student").await;
        let club_id = app.create_club(&token, "Photography Club").await;

        let res = app
            .delete_with_token(&routes::club_member(club_id, outsider), &token)
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn adding_a_missing_user_is_not_found() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Music Club").await;

        let res = app
            .post_with_token(
                &routes::club_members(club_id),
                &json!({"user_id": 99999}),
                &token,
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn coordinators_are_tracked_separately_from_members() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let (lead, _) = app.create_user("lead@university.edu", "coordinator").await;
        let club_id = app.create_club(&token, "Astronomy Club").await;

        let res = app
            .post_with_token(
                &routes::club_coordinators(club_id),
                &json!({"user_id": lead}),
                &token,
            )
            .await;
        assert_eq!(res.status, 201, "add coordinator failed: {}", res.text);

        let detail = app.get_with_token(&routes::club(club_id), &token).await;
        assert_eq!(detail.body["coordinator_ids"], json!([lead]));
        assert_eq!(detail.body["member_ids"], json!([]));
    }
}

mod filters {
    use super::*;

    #[tokio::test]
    async fn rating_range_and_name_search() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let low = app.create_club(&token, "Quiet Readers").await;
        let high = app.create_club(&token, "Loud Gamers").await;

        let set = app
            .patch_with_token(&routes::club(high), &json!({"rating": 9}), &token)
            .await;
        assert_eq!(set.status, 200, "rating update failed: {}", set.text);

        let rated = app
            .get_with_token(&format!("{}?rating_min=5", routes::CLUBS), &token)
            .await;
        let list = rated.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"].as_i64(), Some(high as i64));

        let found = app
            .get_with_token(&format!("{}?search=readers", routes::CLUBS), &token)
            .await;
        let list = found.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"].as_i64(), Some(low as i64));
    }

    #[tokio::test]
    async fn membership_filters_return_only_the_users_clubs() {
        let app = TestApp::spawn().await;
        let (_, token) = app.create_user("coord@university.edu", "coordinator").await;
        let (member, member_token) = app.create_user("member@university.edu", "student").await;
        let joined = app.create_club(&token, "Joined Club").await;
        app.create_club(&token, "Other Club").await;

        let added = app
            .post_with_token(
                &routes::club_members(joined),
                &json!({"user_id": member}),
                &token,
            )
            .await;
        assert_eq!(added.status, 201, "add member failed: {}", added.text);

        let res = app
            .get_with_token(
                &format!("{}?user_id={member}", routes::CLUBS),
                &member_token,
            )
            .await;
        let list = res.body.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"].as_i64(), Some(joined as i64));
    }
}
