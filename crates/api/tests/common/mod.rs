#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use autobids_api::auth::jwt::{generate_access_token, JwtConfig};
use autobids_api::auth::password::hash_password;
use autobids_api::config::ServerConfig;
use autobids_api::router::build_app_router;
use autobids_api::state::AppState;
use autobids_core::process::SystemRunner;
use autobids_db::models::user::{CreateUser, User};
use autobids_db::repositories::UserRepo;
use autobids_pipeline::{Pipeline, ToolConfig};
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "test_password_123!";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".parse().unwrap()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough".to_string(),
            access_token_expiry_mins: 60,
        },
    }
}

/// Tool configuration pointing at directories that do not exist, so only
/// the container heuristics are offered and no images are.
pub fn test_tools() -> ToolConfig {
    let mut tools = ToolConfig::from_env();
    tools.heuristic_repo_path = PathBuf::from("/nonexistent/autobids/heuristics");
    tools.tar2bids_image_dir = PathBuf::from("/nonexistent/autobids/images");
    tools
}

/// Build the full application router, using the given database pool.
///
/// Goes through [`build_app_router`] so integration tests exercise the same
/// middleware stack as production. Email delivery is disabled.
pub fn build_test_app(pool: PgPool) -> Router {
    let state = AppState {
        pipeline: Arc::new(Pipeline::new(pool.clone(), test_tools(), SystemRunner, None)),
        pool,
        config: Arc::new(test_config()),
    };
    build_app_router(state)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub async fn create_user(pool: &PgPool, email: &str, is_admin: bool) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: hash_password(TEST_PASSWORD).unwrap(),
            is_admin,
        },
    )
    .await
    .unwrap()
}

/// Bearer token for `user`, signed with the test secret.
pub fn token_for(user: &User) -> String {
    generate_access_token(user.id, user.role(), &test_config().jwt).unwrap()
}

/// A valid study request body.
pub fn study_request(principal: &str, project: &str) -> serde_json::Value {
    serde_json::json!({
        "name": "Jane Researcher",
        "email": "jane@example.org",
        "status": "faculty",
        "scanner": "type2",
        "scan_number": 12,
        "study_type": true,
        "familiarity_bids": "1",
        "familiarity_bidsapp": "2",
        "familiarity_python": "3",
        "familiarity_linux": "4",
        "familiarity_bash": "5",
        "familiarity_hpc": "1",
        "familiarity_openneuro": "2",
        "familiarity_cbrain": "3",
        "principal": principal,
        "project_name": project,
        "retrospective_data": false,
        "consent": true
    })
}

/// Submit a study through the API and return its id.
pub async fn submit_study(pool: &PgPool, principal: &str, project: &str) -> i64 {
    let app = build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/studies", study_request(principal, project)).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"]["id"].as_i64().unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

pub async fn delete_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), Some(body)).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
