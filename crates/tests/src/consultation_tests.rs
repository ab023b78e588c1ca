use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn create_consultation_uses_token_identity() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_create", "Dana");

    let json = app.create_consultation(&user, "Retirement planning").await;

    assert_eq!(json["title"], "Retirement planning");
    assert_eq!(json["user_id"], user.id);
    assert_eq!(json["user_email"], user.email);
    assert_eq!(json["status"], "scheduled");
    assert_eq!(json["agent_name"], "Ava");
    assert_eq!(json["summary"], "");
    assert_eq!(json["transcript_length"], 0);
    assert!(json["feedback"].is_null());
    assert!(!json["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn create_accepts_matching_user_id_and_camel_case() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_camel", "Eli");

    let resp = app
        .auth_post("/api/consultation", &user.access_token)
        .json(&serde_json::json!({
            "userId": user.id,
            "title": "Debt review",
            "date": "2026-10-20",
            "duration": "15 min",
            "agentName": "Max",
            "status": "in-progress",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["agent_name"], "Max");
    assert_eq!(json["status"], "in-progress");
}

#[tokio::test]
async fn create_validates_required_fields() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_invalid", "Fay");

    let resp = app
        .auth_post("/api/consultation", &user.access_token)
        .json(&serde_json::json!({
            "title": "",
            "date": "2026-10-20",
            "duration": "15 min",
            "agent_name": "Max",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    // Missing agent_name never reaches validation.
    let resp = app
        .auth_post("/api/consultation", &user.access_token)
        .json(&serde_json::json!({
            "title": "Budget",
            "date": "2026-10-20",
            "duration": "15 min",
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn list_is_newest_first_and_paginated() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_list", "Gus");

    for title in ["First", "Second", "Third"] {
        app.create_consultation(&user, title).await;
    }

    let resp = app
        .auth_get("/api/consultation?page=1&per_page=2", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 3);
    assert_eq!(json["per_page"], 2);
    assert_eq!(json["total_pages"], 2);
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["title"], "Third");
    assert_eq!(items[1]["title"], "Second");
}

#[tokio::test]
async fn get_update_and_delete() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_crud", "Hal");
    let created = app.create_consultation(&user, "Tax strategy").await;
    let id = created["id"].as_str().unwrap();

    let resp = app
        .auth_get(&format!("/api/consultation/{}", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["title"], "Tax strategy");

    let resp = app
        .auth_patch(&format!("/api/consultation/{}", id), &user.access_token)
        .json(&serde_json::json!({
            "status": "completed",
            "duration": "42 min",
            "summary": "Discussed tax-advantaged accounts",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["duration"], "42 min");
    assert_eq!(json["summary"], "Discussed tax-advantaged accounts");
    assert_eq!(json["title"], "Tax strategy");

    let resp = app
        .auth_patch(&format!("/api/consultation/{}", id), &user.access_token)
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_delete(&format!("/api/consultation/{}", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = app
        .auth_get(&format!("/api/consultation/{}", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_delete(&format!("/api/consultation/{}", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn feedback_is_attached() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_feedback", "Ivy");
    let created = app.create_consultation(&user, "Insurance").await;
    let id = created["id"].as_str().unwrap();

    let resp = app
        .auth_post(&format!("/api/consultation/{}/feedback", id), &user.access_token)
        .json(&serde_json::json!({
            "rating": 5,
            "comment": "Very clear",
            "helpfulness": 4,
            "clarity": 5,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["feedback"]["rating"], 5);
    assert_eq!(json["feedback"]["comment"], "Very clear");
    assert_eq!(json["feedback"]["helpfulness"], 4);
    assert!(!json["feedback"]["timestamp"].as_str().unwrap().is_empty());

    let resp = app
        .auth_post(&format!("/api/consultation/{}/feedback", id), &user.access_token)
        .json(&serde_json::json!({ "rating": 0, "helpfulness": 4, "clarity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn transcript_of_new_consultation_is_empty() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_transcript", "Jo");
    let created = app.create_consultation(&user, "Savings").await;
    let id = created["id"].as_str().unwrap();

    let resp = app
        .auth_get(&format!("/api/consultation/{}/transcript", id), &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["consultation_id"], id);
    assert_eq!(json["messages"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_id_is_bad_request() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_badid", "Kim");

    let resp = app
        .auth_get("/api/consultation/not-an-object-id", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
