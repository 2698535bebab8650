//! Stub European (CCSP) brand backend shared by the integration tests
//!
//! One axum router serves the API, the HTML login form and the identity
//! provider, matching `TestServer::environment`. Every handler records its
//! name in the [`CallLog`] so tests can assert which paths were taken.

#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use bluelink_client::testing::{CallLog, TestServer};
use bluelink_client::{ControllerConfig, SessionController};
use bluelink_core::{Brand, Credentials, Region};
use serde_json::{json, Value};

pub const USERNAME: &str = "driver@example.com";
pub const PASSWORD: &str = "correct-horse";
pub const PIN: &str = "1234";
pub const SESSION_KEY: &str = "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0";
pub const SEGMENT: &str = "a1b2c3d4-e5f6-4789-8abc-def012345678";

pub const LOGIN_PAGE: &str = "<html><body>\
    <form id='kc-form-login' action='/login-actions/authenticate?session_code=abc&amp;tab_id=xyz' method='post'>\
    <input name='username'/><input name='password' type='password'/>\
    </form></body></html>";

/// Three-segment code returned by the identity provider
pub fn idp_code() -> String {
    format!("{0}.{0}.{0}", SEGMENT)
}

/// How each stub endpoint behaves
#[derive(Clone)]
pub struct Stub {
    pub log: CallLog,
    /// `redirectUrl` returned by the JSON signin; `None` returns `{}`
    pub direct_redirect: Option<String>,
    pub integration_info: bool,
    /// `Location` of the form submit response
    pub form_redirect: String,
    /// Body returned for the authorization code grant
    pub code_grant: Value,
    /// Body returned for the refresh token grant
    pub refresh_grant: Value,
    pub refresh_delay: Duration,
    /// Whether the identity provider accepts the connector signin
    pub idp_accepts: bool,
    /// First PIN entry yields an already expired control token
    pub first_pin_expired: bool,
    /// `expiresTime` returned by the PIN endpoint
    pub pin_expires_time: i64,
}

impl Default for Stub {
    fn default() -> Self {
        Self {
            log: CallLog::new(),
            direct_redirect: Some(
                "https://api.example/api/v1/user/oauth2/redirect?code=DIRECT-CODE&state=test".to_string(),
            ),
            integration_info: true,
            form_redirect: "/api/v1/user/integration/redirect/login?code=FORM-CODE&state=svc:usr"
                .to_string(),
            code_grant: json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "token_type": "Bearer",
                "expires_in": 86400,
            }),
            refresh_grant: json!({
                "access_token": "Bearer access-2",
                "token_type": "Bearer",
                "expires_in": "1800",
            }),
            refresh_delay: Duration::ZERO,
            idp_accepts: true,
            first_pin_expired: false,
            pin_expires_time: 600,
        }
    }
}

pub fn router(stub: Stub) -> Router {
    Router::new()
        .route("/api/v1/user/oauth2/authorize", get(session))
        .route("/api/v1/spa/notifications/register", post(register))
        .route("/api/v1/user/language", post(language))
        .route("/api/v1/user/signin", post(signin))
        .route("/api/v1/user/integrationinfo", get(integration_info))
        .route(
            "/auth/realms/{realm}/protocol/openid-connect/auth",
            get(login_page),
        )
        .route("/login-actions/authenticate", post(form_submit))
        .route("/nowhere", get(nowhere))
        .route("/auth/api/v2/user/oauth2/authorize", get(idp_authorize))
        .route("/web/v1/user/authorize", get(idp_landing))
        .route("/auth/account/signin", post(idp_signin))
        .route("/api/v1/user/oauth2/token", post(token))
        .route("/auth/api/v2/user/oauth2/token", post(idp_token))
        .route("/api/v1/user/pin", put(pin))
        .with_state(stub)
}

pub async fn start(stub: Stub) -> TestServer {
    TestServer::start(router(stub)).await.unwrap()
}

pub fn controller(server: &TestServer, brand: Brand, pin: Option<&str>) -> SessionController {
    let config = ControllerConfig {
        credentials: Credentials::new(USERNAME, PASSWORD),
        brand,
        region: Region::Eu,
        language: Some("de".to_string()),
        pin: pin.map(str::to_string),
    };
    let env = server.environment(brand, Region::Eu).unwrap();
    SessionController::with_environment(config, env).unwrap()
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

async fn session(State(stub): State<Stub>) -> impl IntoResponse {
    stub.log.record("session");
    (
        [(header::SET_COOKIE, "account=primed; Path=/")],
        "session initialised",
    )
}

async fn register(State(stub): State<Stub>, Json(body): Json<Value>) -> Response {
    stub.log.record("register");
    if body["pushRegId"].as_str().map(str::len) != Some(64) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "retCode": "S", "resMsg": { "deviceId": "server-device-id" } })).into_response()
}

async fn language(State(stub): State<Stub>, Json(body): Json<Value>) -> StatusCode {
    stub.log.record(format!("language:{}", body["language"].as_str().unwrap_or("")));
    StatusCode::OK
}

async fn signin(State(stub): State<Stub>, Json(body): Json<Value>) -> Json<Value> {
    stub.log.record("signin");
    assert_eq!(body["email"], USERNAME);
    match stub.direct_redirect {
        Some(url) => Json(json!({ "redirectUrl": url })),
        None => Json(json!({})),
    }
}

async fn integration_info(State(stub): State<Stub>) -> Response {
    stub.log.record("integrationinfo");
    if stub.integration_info {
        Json(json!({ "serviceId": "svc", "userId": "usr" })).into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

async fn login_page(
    State(stub): State<Stub>,
    Path(realm): Path<String>,
    headers: HeaderMap,
) -> Html<&'static str> {
    stub.log.record(format!("login-page:{}", realm));
    // The session cookie from the first request must travel with the jar.
    if headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains("account=primed"))
    {
        stub.log.record("cookie");
    }
    Html(LOGIN_PAGE)
}

async fn form_submit(
    State(stub): State<Stub>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    stub.log.record("form-submit");
    if form.get("username").map(String::as_str) != Some(USERNAME)
        || form.get("password").map(String::as_str) != Some(PASSWORD)
    {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    found(&stub.form_redirect)
}

async fn nowhere(State(stub): State<Stub>) -> StatusCode {
    stub.log.record("nowhere");
    StatusCode::NOT_FOUND
}

async fn idp_authorize(State(stub): State<Stub>) -> Response {
    stub.log.record("idp-authorize");
    found(&format!(
        "/web/v1/user/authorize?lang=de&connector_session_key={}",
        SESSION_KEY
    ))
}

async fn idp_landing() -> Html<&'static str> {
    Html("<html>sign in</html>")
}

async fn idp_signin(
    State(stub): State<Stub>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    stub.log.record("idp-signin");
    if !stub.idp_accepts
        || form.get("connector_session_key").map(String::as_str) != Some(SESSION_KEY)
        || form.get("state").map(String::as_str) != Some("ccsp")
    {
        return StatusCode::BAD_REQUEST.into_response();
    }
    found(&format!(
        "https://api.example/api/v1/user/oauth2/redirect?code={}&state=ccsp&login_success=y",
        idp_code()
    ))
}

async fn token(State(stub): State<Stub>, Form(form): Form<HashMap<String, String>>) -> Response {
    grant(&stub, &form).await
}

async fn idp_token(State(stub): State<Stub>, Form(form): Form<HashMap<String, String>>) -> Response {
    stub.log.record("idp-token");
    grant(&stub, &form).await
}

async fn grant(stub: &Stub, form: &HashMap<String, String>) -> Response {
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    match grant_type.as_str() {
        "authorization_code" => {
            stub.log.record(format!("code:{}", form.get("code").cloned().unwrap_or_default()));
            Json(stub.code_grant.clone()).into_response()
        }
        "refresh_token" => {
            stub.log.record(format!(
                "refresh:{}",
                form.get("refresh_token").cloned().unwrap_or_default()
            ));
            tokio::time::sleep(stub.refresh_delay).await;
            Json(stub.refresh_grant.clone()).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn pin(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    stub.log.record("pin");
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "));
    if !authorized || body["pin"] != PIN {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let expires = if stub.first_pin_expired && stub.log.count("pin") == 1 {
        -1
    } else {
        stub.pin_expires_time
    };
    Json(json!({
        "deviceId": body["deviceId"],
        "controlToken": format!("control-{}", stub.log.count("pin")),
        "expiresTime": expires,
    }))
    .into_response()
}
