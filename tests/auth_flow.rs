mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

fn signup_body(username: &str, email: &str, password: &str) -> serde_json::Value {
    json!({
        "fullName": "Some One",
        "username": username,
        "email": email,
        "password": password
    })
}

#[tokio::test]
async fn test_signup_sets_session_and_hides_password() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(signup_body("alice", "alice@example.com", "secret1")),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let cookie = response.set_cookie.unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));

    assert_eq!(response.body["username"], "alice");
    assert_eq!(response.body["fullName"], "Some One");
    assert_eq!(response.body["followers"], json!([]));
    assert!(response.body.get("password").is_none());
    assert!(response.body.get("passwordHash").is_none());

    let me = app.get("/api/auth/check", &response.session.unwrap()).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["_id"], response.body["_id"]);
    assert!(me.body.get("password").is_none());
}

#[tokio::test]
async fn test_signup_rejections() {
    let app = TestApp::new().await;
    app.signup("alice").await;

    let cases = [
        (signup_body("bob", "not-an-email", "secret1"), "Invalid email!"),
        (signup_body("alice", "bob@example.com", "secret1"), "Username is already taken"),
        (signup_body("bob", "alice@example.com", "secret1"), "Email is already taken"),
        (signup_body("bob", "bob@example.com", "12345"), "Password must be at least 6 characters"),
    ];

    for (body, message) in cases {
        let response = app.request(Method::POST, "/api/auth/signup", None, Some(body)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.body["message"], message);
        assert_eq!(response.body["status"], 400);
        assert!(response.session.is_none());
    }
}

#[tokio::test]
async fn test_login_errors_do_not_reveal_usernames() {
    let app = TestApp::new().await;
    app.signup("alice").await;

    let wrong_password = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-password" })),
        )
        .await;
    let unknown_user = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "nobody", "password": "secret1" })),
        )
        .await;

    assert_eq!(wrong_password.status, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_password.status, unknown_user.status);
    assert_eq!(wrong_password.body, unknown_user.body);
    assert_eq!(wrong_password.body["message"], "Invalid username or password");

    let ok = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "secret1" })),
        )
        .await;
    assert_eq!(ok.status, StatusCode::CREATED);
    assert!(ok.session.is_some());
}

#[tokio::test]
async fn test_protected_routes_require_valid_session() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/auth/check", None, None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.body["message"], "Unauthorized: No token provided");

    let forged = app.get("/api/post/all", "not.a.token").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.body["message"], "Unauthorized: Invalid token");

    // valid signature but the user does not exist
    let orphan = app.state.sessions.issue(social_api::core::EntityId(424242)).unwrap();
    let response = app.get("/api/auth/check", &orphan).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Unauthorized: User not found");
}

#[tokio::test]
async fn test_logout_expires_cookie() {
    let app = TestApp::new().await;
    let response = app.request(Method::POST, "/api/auth/logout", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Logged out successfully");
    assert_eq!(response.session.as_deref(), Some(""));
    assert!(response.set_cookie.unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
}
