//! API integration tests for warden-server.
//!
//! These tests drive the full router on the in-memory backend: registration,
//! password-grant tokens, profile, admin RBAC and the passkey ceremony routes.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::form_urlencoded;
use warden_server::{create_router, AppState, Config, PasswordPolicy};

const CLIENT_ID: &str = "warden-web";
const CLIENT_SECRET: &str = "warden-dev-secret";
const ADMIN_EMAIL: &str = "admin@example.com";

/// Build the test router on the in-memory backend with a cheap password policy
fn create_test_app() -> Router {
    let config = Config {
        admin_email: Some(ADMIN_EMAIL.to_string()),
        password_policy: PasswordPolicy {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        ..Config::default()
    };
    let state = AppState::in_memory(&config).unwrap();
    create_router(state, &config).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn form_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn register(app: &Router, email: &str, password: &str, name: &str) -> Response {
    send(
        app,
        json_request(
            "POST",
            "/register",
            None,
            json!({ "email": email, "password": password, "name": name }),
        ),
    )
    .await
}

async fn password_grant(app: &Router, username: &str, password: &str) -> Response {
    send(
        app,
        form_request(
            "/token",
            &[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
        ),
    )
    .await
}

/// Register an account and return a fresh access token for it
async fn sign_up(app: &Router, email: &str, password: &str) -> String {
    let response = register(app, email, password, "").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = password_grant(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let app = create_test_app();

    let response = send(&app, get_request("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["storage"], "memory");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = create_test_app();
    let response = send(&app, get_request("/ready", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["ready"], true);
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_creates_account() {
    let app = create_test_app();

    let response = register(&app, "Alice@Example.com", "wonderland", "Alice").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["email"], "alice@example.com");
    assert_eq!(json["name"], "Alice");
    assert!(json["id"].is_string());
    assert!(json.get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = create_test_app();

    let response = register(&app, "bob@example.com", "pw1", "Bob").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = register(&app, "  BOB@example.com ", "pw2", "Bobby").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_rejects_missing_fields() {
    let app = create_test_app();

    let response = register(&app, "", "pw", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_INPUT");

    let response = register(&app, "carol@example.com", "", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_bodies_are_bad_requests() {
    let app = create_test_app();
    let token = sign_up(&app, "olivia@example.com", "pw").await;

    let cases = [
        json_request("POST", "/register", None, json!({ "email": "a@x.com" })),
        json_request("PUT", "/profile", Some(&token), json!({})),
        json_request(
            "POST",
            "/webauthn/register/finish",
            Some(&token),
            json!({ "response": {} }),
        ),
    ];
    for request in cases {
        let uri = request.uri().to_string();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "INVALID_INPUT", "{uri}");
        // serde detail stays in the logs
        assert!(!json["error"].as_str().unwrap().contains("missing field"), "{uri}");
    }
}

#[tokio::test]
async fn test_json_body_without_content_type_is_bad_request() {
    let app = create_test_app();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/register")
            .body(Body::from(r#"{"email":"a@x.com","password":"pw"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_INPUT");

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Token Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_password_grant_issues_bearer_token() {
    let app = create_test_app();
    register(&app, "dave@example.com", "hunter2", "Dave").await;

    let response = password_grant(&app, "dave@example.com", "hunter2").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let json = body_json(response).await;
    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["expires_in"], 3600);
    assert!(!json["access_token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_password_grant_wrong_password_is_invalid_grant() {
    let app = create_test_app();
    register(&app, "erin@example.com", "right", "Erin").await;

    let response = password_grant(&app, "erin@example.com", "wrong").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "invalid_grant" }));

    // Unknown account answers exactly like a wrong password
    let response = password_grant(&app, "nobody@example.com", "right").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_rejects_unknown_client() {
    let app = create_test_app();
    register(&app, "frank@example.com", "pw", "Frank").await;

    let response = send(
        &app,
        form_request(
            "/token",
            &[
                ("grant_type", "password"),
                ("username", "frank@example.com"),
                ("password", "pw"),
                ("client_id", CLIENT_ID),
                ("client_secret", "not-the-secret"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_token_rejects_unsupported_grant_type() {
    let app = create_test_app();

    let response = send(
        &app,
        form_request(
            "/token",
            &[
                ("grant_type", "client_credentials"),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "unsupported_grant_type");

    let response = send(
        &app,
        form_request(
            "/token",
            &[("client_id", CLIENT_ID), ("client_secret", CLIENT_SECRET)],
        ),
    )
    .await;
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let app = create_test_app();
    let token = sign_up(&app, "grace@example.com", "pw").await;

    let response = send(
        &app,
        form_request(
            "/token/revoke",
            &[
                ("token", token.as_str()),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_request("/profile", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_INVALID_TOKEN");
}

// ============================================================================
// Profile Tests
// ============================================================================

#[tokio::test]
async fn test_profile_requires_token() {
    let app = create_test_app();

    let response = send(&app, get_request("/profile", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_MISSING_TOKEN");

    let response = send(&app, get_request("/profile", Some("made-up"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn test_profile_get_and_update() {
    let app = create_test_app();
    let token = sign_up(&app, "heidi@example.com", "pw").await;

    let response = send(&app, get_request("/profile", Some(&token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["email"], "heidi@example.com");
    assert_eq!(json["name"], "heidi");

    let response = send(
        &app,
        json_request("PUT", "/profile", Some(&token), json!({ "name": "Heidi K." })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["name"], "Heidi K.");

    let response = send(
        &app,
        json_request("PUT", "/profile", Some(&token), json!({ "name": "   " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Admin / RBAC Tests
// ============================================================================

#[tokio::test]
async fn test_admin_routes_forbidden_for_plain_users() {
    let app = create_test_app();
    let token = sign_up(&app, "ivan@example.com", "pw").await;

    for uri in ["/users", "/roles", "/permissions"] {
        let response = send(&app, get_request(uri, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }

    let response = send(&app, get_request("/users", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_users_roles_and_permissions() {
    let app = create_test_app();
    let admin = sign_up(&app, ADMIN_EMAIL, "root-pw").await;
    sign_up(&app, "judy@example.com", "pw").await;

    let response = send(&app, get_request("/users", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let users = body_json(response).await;
    assert_eq!(users.as_array().unwrap().len(), 2);

    let response = send(&app, get_request("/roles", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let roles = body_json(response).await;
    let names: Vec<&str> = roles
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"admin"));
    assert!(names.contains(&"user"));

    let response = send(&app, get_request("/permissions", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_get_and_delete_user() {
    let app = create_test_app();
    let admin = sign_up(&app, ADMIN_EMAIL, "root-pw").await;
    let victim_token = sign_up(&app, "mallory@example.com", "pw").await;

    let response = send(&app, get_request("/profile", Some(&victim_token))).await;
    let victim_id = body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(&app, get_request(&format!("/users/{victim_id}"), Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["email"], "mallory@example.com");

    let response = send(&app, get_request("/users/not-a-uuid", Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/users/{victim_id}"))
            .header(header::AUTHORIZATION, format!("Bearer {admin}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], victim_id.as_str());
    assert_eq!(json["revoked_tokens"], 1);

    // Tokens of the deleted account stop working immediately
    let response = send(&app, get_request("/profile", Some(&victim_token))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, get_request(&format!("/users/{victim_id}"), Some(&admin))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// WebAuthn Ceremony Tests
// ============================================================================

#[tokio::test]
async fn test_webauthn_begin_requires_token() {
    let app = create_test_app();
    let response = send(
        &app,
        json_request("POST", "/webauthn/register/begin", None, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webauthn_begin_returns_options_and_session() {
    let app = create_test_app();
    let token = sign_up(&app, "peggy@example.com", "pw").await;

    let response = send(
        &app,
        json_request("POST", "/webauthn/register/begin", Some(&token), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(!json["session_id"].as_str().unwrap().is_empty());
    assert!(json["public_key"]["publicKey"]["challenge"].is_string());
    assert_eq!(json["public_key"]["publicKey"]["rp"]["id"], "localhost");
}

#[tokio::test]
async fn test_webauthn_finish_consumes_session_on_failure() {
    let app = create_test_app();
    let token = sign_up(&app, "trent@example.com", "pw").await;

    let response = send(
        &app,
        json_request("POST", "/webauthn/register/begin", Some(&token), json!({})),
    )
    .await;
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let finish = json!({ "session_id": session_id, "response": { "garbage": true } });
    let response = send(
        &app,
        json_request("POST", "/webauthn/register/finish", Some(&token), finish.clone()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The session was consumed by the failed attempt
    let response = send(
        &app,
        json_request("POST", "/webauthn/register/finish", Some(&token), finish),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("Unknown registration session"));
}

#[tokio::test]
async fn test_webauthn_finish_rejects_other_accounts_session() {
    let app = create_test_app();
    let owner = sign_up(&app, "victor@example.com", "pw").await;
    let intruder = sign_up(&app, "walter@example.com", "pw").await;

    let response = send(
        &app,
        json_request("POST", "/webauthn/register/begin", Some(&owner), json!({})),
    )
    .await;
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        json_request(
            "POST",
            "/webauthn/register/finish",
            Some(&intruder),
            json!({ "session_id": session_id, "response": {} }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("another account"));
}

// ============================================================================
// Documentation Tests
// ============================================================================

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_test_app();
    let response = send(&app, get_request("/api-docs/openapi.json", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/token"].is_object());
}
