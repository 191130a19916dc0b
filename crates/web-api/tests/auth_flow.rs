mod support;

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use support::{admin_seed, spawn_server, USER_PASSWORD};

#[tokio::test]
async fn login_refresh_logout_flow() {
    let server = spawn_server(3500).await;
    let (access, refresh) = server.login_admin().await;

    let renewed = server.refresh(Some(&access), &refresh).await;
    assert_eq!(renewed.status(), StatusCode::OK);
    let renewed: Value = renewed.json().await.unwrap();
    let new_access = renewed["accessToken"].as_str().unwrap().to_string();
    let new_refresh = renewed["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(new_refresh, refresh);

    // 旧刷新令牌只能使用一次
    let replay = server.refresh(Some(&access), &refresh).await;
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
    let body: Value = replay.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REFRESH_TOKEN");

    let logout = server
        .client
        .post(format!("{}/auth/logout", server.base_http))
        .bearer_auth(&new_access)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after_logout = server.refresh(Some(&new_access), &new_refresh).await;
    assert_eq!(after_logout.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let server = spawn_server(3500).await;
    let seed = admin_seed();

    let wrong_password = server.login(&seed.admin_email, "not-the-password").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    let wrong_password: Value = wrong_password.json().await.unwrap();

    let unknown = server.login("nobody@example.com", USER_PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong_password, unknown);
    assert_eq!(unknown["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn registration_is_reserved_for_administrators() {
    let server = spawn_server(3500).await;

    let anonymous = server
        .register(None, "bob", "bob@example.com", USER_PASSWORD)
        .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let (bob_token, _) = server.user("bob").await;
    let by_user = server
        .register(Some(&bob_token), "carol", "carol@example.com", USER_PASSWORD)
        .await;
    assert_eq!(by_user.status(), StatusCode::FORBIDDEN);

    let (admin_token, _) = server.login_admin().await;
    let duplicate = server
        .register(Some(&admin_token), "bobby", "BOB@example.com", USER_PASSWORD)
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let weak = server
        .register(Some(&admin_token), "dave", "dave@example.com", "password")
        .await;
    assert_eq!(weak.status(), StatusCode::BAD_REQUEST);
    let body: Value = weak.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let long_email = format!("{}@example.com", "e".repeat(250));
    let oversized = server
        .register(Some(&admin_token), "erin", &long_email, USER_PASSWORD)
        .await;
    assert_eq!(oversized.status(), StatusCode::BAD_REQUEST);
    let body: Value = oversized.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn refresh_requires_an_identified_caller() {
    let server = spawn_server(3500).await;
    let (_, refresh) = server.login_admin().await;

    let response = server.refresh(None, &refresh).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = server.refresh(Some("not.a.jwt"), &refresh).await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_only_works_for_refresh() {
    let server = spawn_server(1).await;
    let (access, refresh) = server.login_admin().await;

    tokio::time::sleep(Duration::from_millis(2100)).await;

    let latest = server.latest(&access).await;
    assert_eq!(latest.status(), StatusCode::UNAUTHORIZED);
    let body: Value = latest.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_EXPIRED");

    let renewed = server.refresh(Some(&access), &refresh).await;
    assert_eq!(renewed.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_public() {
    let server = spawn_server(3500).await;
    let response = server
        .client
        .get(format!("{}/health", server.base_http))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
