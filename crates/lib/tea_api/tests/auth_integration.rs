//! Integration test: build the router over the in-memory store and drive the
//! login, refresh and gate flows end to end.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode, header};
use serde_json::{Value, json};
use tea_api::config::{ApiConfig, CookieConfig};
use tea_api::{AppState, router};
use tea_core::auth::memory::MemoryUserStore;
use tea_core::auth::session::check_access_token;
use tea_core::auth::store::UserStore;
use tea_core::auth::telegram::{self, KeyDerivation, LoginPayload};
use tea_core::models::auth::Role;
use tower::ServiceExt;
use uuid::Uuid;

const BOT_TOKEN: &str = "123456:integration-bot-token";
const JWT_SECRET: &str = "integration-secret";

fn app() -> (Router, Arc<MemoryUserStore>) {
    let store = Arc::new(MemoryUserStore::new());
    let state = AppState {
        store: store.clone(),
        config: ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            jwt_secret: JWT_SECRET.into(),
            bot_token: BOT_TOKEN.into(),
            cookie: CookieConfig::default(),
        },
    };
    (router(state), store)
}

fn login_body(id: i64, first_name: &str) -> Value {
    let mut payload = LoginPayload {
        id,
        first_name: first_name.into(),
        auth_date: chrono::Utc::now().timestamp(),
        ..Default::default()
    };
    payload.hash =
        telegram::sign(&payload.check_string(), BOT_TOKEN, KeyDerivation::LoginWidget).unwrap();
    json!({
        "id": payload.id,
        "first_name": payload.first_name,
        "auth_date": payload.auth_date,
        "hash": payload.hash,
    })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("parse JSON")
    };
    (status, headers, json)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn refresh_request(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/auth/refresh");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn get_with_bearer(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// The `name=value` pair of the refresh cookie from a response.
fn refresh_cookie_pair(headers: &HeaderMap) -> String {
    let set_cookie = headers
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().trim().to_string()
}

/// Log in and return `(access token, refresh cookie pair)`.
async fn login(app: &Router, id: i64, first_name: &str) -> (String, String) {
    let (status, headers, body) = send(app, post_json("/auth", &login_body(id, first_name))).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    (
        body["token"].as_str().unwrap().to_string(),
        refresh_cookie_pair(&headers),
    )
}

#[tokio::test]
async fn login_then_refresh_rotates_and_rejects_replay() {
    let (app, store) = app();

    let (status, headers, body) = send(&app, post_json("/auth", &login_body(42, "Ann"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 3600);

    let user = store.get_by_telegram_id(42).await.unwrap().expect("user provisioned");
    let token = body["token"].as_str().unwrap();
    let claims = check_access_token(token, JWT_SECRET.as_bytes()).unwrap();
    assert_eq!(claims.id, user.id);
    assert_eq!(claims.first_name, "Ann");
    assert_eq!(claims.role, Role::User);

    let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("refresh_token="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Secure"));
    assert!(set_cookie.contains("Path=/auth"));
    assert!(set_cookie.contains("Expires="));
    let original = refresh_cookie_pair(&headers);

    let (status, headers, body) = send(&app, refresh_request(Some(&original))).await;
    assert_eq!(status, StatusCode::OK, "refresh failed: {body}");
    let rotated = refresh_cookie_pair(&headers);
    assert_ne!(rotated, original);
    assert!(body["token"].is_string());

    let (status, _, body) = send(&app, refresh_request(Some(&original))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "user is not authorized");

    // The replay attempt does not disturb the rotated session.
    let (status, _, _) = send(&app, refresh_request(Some(&rotated))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_without_cookie_is_distinct_unauthorized() {
    let (app, _) = app();
    let (status, _, body) = send(&app, refresh_request(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["message"], "no refresh token");

    let (status, _, body) = send(&app, refresh_request(Some("refresh_token=garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "user is not authorized");
}

#[tokio::test]
async fn tampered_login_is_forbidden() {
    let (app, store) = app();
    let mut body = login_body(42, "Ann");
    body["first_name"] = json!("Mallory");

    let (status, headers, body) = send(&app, post_json("/auth", &body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "user is not authorized");
    assert!(headers.get(header::SET_COOKIE).is_none());
    assert!(!store.exists(42).await.unwrap());
}

#[tokio::test]
async fn malformed_login_body_is_bad_request() {
    let (app, _) = app();
    let (status, _, body) = send(&app, post_json("/auth", &json!({"first_name": "Ann"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn mini_app_login_issues_tokens() {
    let (app, store) = app();
    let user = r#"{"id":77,"first_name":"Mia"}"#;
    let auth_date = chrono::Utc::now().timestamp().to_string();
    let check = telegram::check_string([("auth_date", auth_date.as_str()), ("user", user)]);
    let hash = telegram::sign(&check, BOT_TOKEN, KeyDerivation::WebApp).unwrap();
    let init_data = format!(
        "user={}&auth_date={auth_date}&hash={hash}",
        user.replace('{', "%7B")
            .replace('}', "%7D")
            .replace('"', "%22")
            .replace(':', "%3A")
            .replace(',', "%2C")
    );

    let (status, headers, body) =
        send(&app, post_json("/auth/mini-app", &json!({ "initData": init_data }))).await;
    assert_eq!(status, StatusCode::OK, "mini-app login failed: {body}");
    assert!(headers.get(header::SET_COOKIE).is_some());
    assert!(store.exists(77).await.unwrap());

    let (status, _, _) = send(
        &app,
        post_json("/auth/mini-app", &json!({ "initData": "user=%7B%7D" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn optional_gate_passes_anonymous_required_gate_does_not() {
    let (app, _) = app();

    let (status, _, body) = send(&app, get_with_bearer("/auth/session", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "authenticated": false }));

    let (status, _, _) = send(&app, get_with_bearer("/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (token, _) = login(&app, 42, "Ann").await;

    let (status, _, body) = send(&app, get_with_bearer("/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["firstName"], "Ann");

    let (status, _, body) = send(&app, get_with_bearer("/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn invalid_bearer_is_rejected_even_when_optional() {
    let (app, _) = app();
    for uri in ["/auth/session", "/auth/me"] {
        let (status, _, _) = send(&app, get_with_bearer(uri, Some("not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

        let basic = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, "Basic YW5uOnB3")
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&app, basic).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn empty_authorization_header_counts_as_anonymous() {
    let (app, _) = app();
    for value in ["", "   "] {
        let req = |uri: &str| {
            Request::builder()
                .uri(uri)
                .header(header::AUTHORIZATION, value)
                .body(Body::empty())
                .unwrap()
        };

        let (status, _, body) = send(&app, req("/auth/session")).await;
        assert_eq!(status, StatusCode::OK, "{value:?}");
        assert_eq!(body, json!({ "authenticated": false }));

        let (status, _, body) = send(&app, req("/auth/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{value:?}");
        assert_eq!(body["message"], "missing authorization header");
    }
}

fn revoke_request(user_id: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("DELETE")
        .uri(format!("/admin/users/{user_id}/session"));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn admin_gate_refuses_users_and_revokes_for_admins() {
    let (app, store) = app();
    let (user_token, user_cookie) = login(&app, 42, "Ann").await;
    let ann = store.get_by_telegram_id(42).await.unwrap().unwrap();

    let (status, _, _) = send(&app, revoke_request(&ann.id.to_string(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) =
        send(&app, revoke_request(&ann.id.to_string(), Some(&user_token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!body["message"].as_str().unwrap().contains(&ann.id.to_string()));

    login(&app, 1, "Root").await;
    let root = store.get_by_telegram_id(1).await.unwrap().unwrap();
    assert!(store.set_admin(root.id, true));
    let (admin_token, _) = login(&app, 1, "Root").await;

    let (status, _, body) =
        send(&app, revoke_request(&ann.id.to_string(), Some(&admin_token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(store.refresh_identifier(ann.id), None);

    let (status, _, _) = send(&app, refresh_request(Some(&user_cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        revoke_request(&Uuid::new_v4().to_string(), Some(&admin_token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, revoke_request("not-a-uuid", Some(&admin_token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
