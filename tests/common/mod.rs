#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use social_api::{
    api::create_router,
    app_state::AppState,
    config::Config,
    infrastructure::{Database, ImageHost, LocalImageHost},
};

pub const PIXEL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub struct TestResponse {
    pub status: StatusCode,
    /// Value of the `jwt` cookie if the response set one
    pub session: Option<String>,
    pub set_cookie: Option<String>,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub media: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let media = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.auth.password_hash_memory_kib = 1024;
        config.auth.password_hash_iterations = 1;
        config.media.dir = media.path().to_path_buf();
        customize(&mut config);

        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let images: Arc<dyn ImageHost> = Arc::new(LocalImageHost::new(&config.media));
        let state = AppState::from_parts(config, db, images).unwrap();
        let router = create_router(state.clone()).unwrap();

        Self { router, state, media }
    }

    pub async fn request(&self, method: Method, uri: &str, session: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = session {
            builder = builder.header(header::COOKIE, format!("jwt={}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("jwt="))
            .map(str::to_string);
        let session = set_cookie.as_deref().map(|cookie| {
            cookie
                .trim_start_matches("jwt=")
                .split(';')
                .next()
                .unwrap_or_default()
                .to_string()
        });

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            session,
            set_cookie,
            body,
        }
    }

    pub async fn get(&self, uri: &str, session: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(session), None).await
    }

    pub async fn post(&self, uri: &str, session: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(session), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, session: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(session), None).await
    }

    /// Creates `username` with password `secret1` and returns its id and session token.
    pub async fn signup(&self, username: &str) -> (String, String) {
        let response = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({
                    "fullName": format!("{} tester", username),
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "secret1"
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "signup failed: {}", response.body);

        let id = response.body["_id"].as_str().unwrap().to_string();
        (id, response.session.unwrap())
    }

    pub async fn create_post(&self, session: &str, content: &str) -> String {
        let response = self.post("/api/post/create", session, json!({ "content": content })).await;
        assert_eq!(response.status, StatusCode::CREATED, "create failed: {}", response.body);
        response.body["_id"].as_str().unwrap().to_string()
    }
}

/// Ids in a JSON array of string ids.
pub fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}
