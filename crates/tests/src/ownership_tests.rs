use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/consultation"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(app.url("/api/consultation"))
        .json(&serde_json::json!({ "title": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn token_signed_with_other_secret_is_unauthorized() {
    let app = TestApp::spawn_with_settings(|s| s.auth.secret = "a-different-signing-secret".to_string()).await;
    let other = TestApp::spawn().await;
    let user = other.seed_user("user_foreign", "Lou");

    let resp = app
        .auth_get("/api/consultation", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn user_id_mismatch_is_forbidden() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("user_a", "Mia");

    let resp = app
        .auth_post("/api/consultation", &user.access_token)
        .json(&serde_json::json!({
            "user_id": "user_b",
            "title": "Not mine",
            "date": "2026-10-20",
            "duration": "15 min",
            "agent_name": "Ava",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn other_users_consultation_is_hidden() {
    let app = TestApp::spawn().await;
    let owner = app.seed_user("user_owner", "Ned");
    let intruder = app.seed_user("user_intruder", "Oz");
    let created = app.create_consultation(&owner, "Private plan").await;
    let id = created["id"].as_str().unwrap();
    let path = format!("/api/consultation/{}", id);

    let resp = app.auth_get(&path, &intruder.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_patch(&path, &intruder.access_token)
        .json(&serde_json::json!({ "title": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_post(&format!("{}/feedback", path), &intruder.access_token)
        .json(&serde_json::json!({ "rating": 1, "helpfulness": 1, "clarity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app
        .auth_get(&format!("{}/transcript", path), &intruder.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app.auth_delete(&path, &intruder.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // Untouched for the owner
    let resp = app.auth_get(&path, &owner.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["title"], "Private plan");

    // And absent from the intruder's list
    let resp = app
        .auth_get("/api/consultation", &intruder.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn live_socket_requires_owner() {
    let app = TestApp::spawn().await;
    let owner = app.seed_user("user_ws_owner", "Pat");
    let intruder = app.seed_user("user_ws_intruder", "Quinn");
    let created = app.create_consultation(&owner, "Live").await;
    let id = created["id"].as_str().unwrap();

    let result = tokio_tungstenite::connect_async(app.ws_url(&format!(
        "/ws/consultation/{}?token={}",
        id, intruder.access_token
    )))
    .await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status().as_u16(), 404)
        }
        other => panic!("expected HTTP rejection, got {:?}", other.map(|_| ())),
    }

    let result = tokio_tungstenite::connect_async(
        app.ws_url(&format!("/ws/consultation/{}?token=garbage", id)),
    )
    .await;
    match result {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
            assert_eq!(resp.status().as_u16(), 401)
        }
        other => panic!("expected HTTP rejection, got {:?}", other.map(|_| ())),
    }
}
