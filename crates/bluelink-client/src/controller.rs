//! Session controller: login, token refresh and PIN-gated control tokens
//!
//! One controller owns one [`Session`]. Vehicle collaborators share it
//! through an `Arc` and obtain pre-authorized requests from
//! [`SessionController::api_request`] (access token) and
//! [`SessionController::vehicle_request`] (control token).
//!
//! Token refreshes are single-flight: concurrent callers that arrive while a
//! refresh is running wait for it and reuse its result instead of issuing
//! their own, so one-time-use refresh tokens are never spent twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bluelink_core::{Brand, Credentials, Language, Region, Session, TokenSet};
use chrono::{Local, Utc};
use parking_lot::RwLock;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::auth::{login_plan, LoginPlan};
use crate::environment::{BrandEnvironment, MissingRefreshToken, StampProvider};
use crate::error::{BluelinkError, Result};
use crate::token::TokenExchanger;

const USER_AGENT_REGISTRATION: &str = "okhttp/3.10.0";
const USER_AGENT_OK_HTTP: &str = "okhttp/3.12.0";

/// Everything needed to build a [`SessionController`]
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub brand: Brand,
    pub region: Region,
    /// Defaults to English; must be one of the supported codes
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRegistration {
    res_msg: DeviceRegistrationMsg,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRegistrationMsg {
    device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinResponse {
    control_token: String,
    expires_time: i64,
}

/// Which token a request is authorized with
#[derive(Debug, Clone, Copy)]
enum Grant {
    Access,
    Control,
}

/// Owns the session for one user and vehicle fleet
pub struct SessionController {
    env: Arc<BrandEnvironment>,
    credentials: Credentials,
    language: Language,
    pin: Option<String>,
    http: Client,
    tokens: TokenExchanger,
    session: RwLock<Session>,
    /// Held for the duration of a refresh
    refresh_gate: Mutex<()>,
    /// Bumped after every successful refresh
    refresh_generation: AtomicU64,
    /// Held while checking or acquiring the control token
    pin_gate: Mutex<()>,
}

impl SessionController {
    /// Create a controller for the configured brand and region
    ///
    /// Fails if the language is not supported or the brand has no backend
    /// in the region.
    pub fn new(config: ControllerConfig, stamp: Arc<dyn StampProvider>) -> Result<Self> {
        let env = BrandEnvironment::new(config.brand, config.region, stamp)?;
        Self::with_environment(config, env)
    }

    /// Create a controller against an explicit environment
    pub fn with_environment(config: ControllerConfig, env: BrandEnvironment) -> Result<Self> {
        let language = match config.language.as_deref() {
            Some(code) => code.parse::<Language>()?,
            None => Language::default(),
        };
        let env = Arc::new(env);
        let http = Client::builder().build()?;
        let tokens = TokenExchanger::new(env.clone(), http.clone());

        debug!(brand = %env.brand, region = %env.region, "Session controller created");
        Ok(Self {
            env,
            credentials: config.credentials,
            language,
            pin: config.pin,
            http,
            tokens,
            session: RwLock::new(Session::new(Uuid::new_v4().to_string())),
            refresh_gate: Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            pin_gate: Mutex::new(()),
        })
    }

    pub fn environment(&self) -> &BrandEnvironment {
        &self.env
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Shared HTTP client (connection pool only, no auth headers)
    pub fn http_client(&self) -> &Client {
        &self.http
    }

    pub(crate) fn username(&self) -> &str {
        &self.credentials.username
    }

    pub(crate) fn pin(&self) -> Option<&str> {
        self.pin.as_deref()
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Authenticate and populate the session
    ///
    /// Device registration and language negotiation are best-effort. The
    /// strategies of the brand's plan are tried in order; if none yields a
    /// code the call fails with [`BluelinkError::Login`].
    #[instrument(skip(self), fields(brand = %self.env.brand, region = %self.env.region))]
    pub async fn login(&self) -> Result<()> {
        self.register_device().await;
        self.set_session_language().await;

        match login_plan(&self.env, &self.language) {
            LoginPlan::RefreshTokenSeed => {
                debug!("Using configured password as refresh token");
                self.session.write().refresh_token = Some(self.credentials.password.clone());
                self.refresh_access_token().await?;
            }
            LoginPlan::PasswordGrant => {
                let tokens = self.tokens.password_grant(&self.credentials).await?;
                self.store_tokens(tokens);
            }
            LoginPlan::AuthorizationCode(strategies) => {
                let mut attempts = Vec::new();
                let mut code = None;
                for strategy in &strategies {
                    match strategy.login(&self.credentials, None).await {
                        Ok(auth) => {
                            info!(strategy = strategy.name(), "Authorization code obtained");
                            code = Some(auth.code);
                            break;
                        }
                        Err(e) => {
                            warn!(strategy = strategy.name(), error = %e, "Auth strategy failed, trying next");
                            attempts.push(e.to_string());
                        }
                    }
                }
                let code = code.ok_or(BluelinkError::Login { attempts })?;
                self.complete_code_login(&code).await?;
            }
        }

        // A new access token requires a new PIN challenge.
        self.session.write().invalidate_control_token();
        info!("Login successful");
        Ok(())
    }

    /// Logout is local only; the backend has no revocation call
    pub async fn logout(&self) -> Result<String> {
        Ok("OK".to_string())
    }

    async fn complete_code_login(&self, code: &str) -> Result<()> {
        let mut tokens = self.tokens.exchange_code(code).await?;
        if tokens.refresh_token.is_none() {
            let refresh = match self.env.missing_refresh {
                MissingRefreshToken::FetchWithAccessToken => {
                    debug!("No refresh token in code exchange, fetching one");
                    self.tokens.fetch_refresh_token(&tokens.access_token).await?
                }
                MissingRefreshToken::ReuseAuthorizationCode => code.to_string(),
            };
            tokens.refresh_token = Some(refresh);
        }
        self.store_tokens(tokens);
        Ok(())
    }

    fn store_tokens(&self, tokens: TokenSet) {
        self.session.write().apply_tokens(tokens, now());
        // Invalidate any waiters' view of the previous generation.
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Register this device for push notifications
    ///
    /// The backend may assign its own device id. Failures are ignored.
    async fn register_device(&self) {
        let Some(url) = self.env.endpoints.device_registration.as_deref() else {
            return;
        };
        match self.request_device_id(url).await {
            Ok(device_id) => {
                self.session.write().device_id = device_id;
                debug!("Device registered");
            }
            Err(e) => debug!(error = %e, "Device registration skipped"),
        }
    }

    async fn request_device_id(&self, url: &str) -> Result<String> {
        let device_id = self.session.read().device_id.clone();
        let response = self
            .http
            .post(url)
            .header("ccsp-service-id", &self.env.client_id)
            .header("ccsp-application-id", &self.env.app_id)
            .header("Stamp", self.env.stamp().await?)
            .header(USER_AGENT, USER_AGENT_REGISTRATION)
            .json(&json!({
                "pushRegId": push_registration_id(),
                "pushType": self.env.push_type,
                "uuid": device_id,
            }))
            .send()
            .await?
            .error_for_status()?;
        let registration: DeviceRegistration = response
            .json()
            .await
            .map_err(|e| BluelinkError::ParseError(e.to_string()))?;
        Ok(registration.res_msg.device_id)
    }

    /// Tell the backend which language to use. Failures are ignored.
    async fn set_session_language(&self) {
        let Some(url) = self.env.endpoints.language.as_deref() else {
            return;
        };
        let result = self
            .http
            .post(url)
            .header(USER_AGENT, USER_AGENT_OK_HTTP)
            .json(&json!({ "language": self.language.as_str() }))
            .send()
            .await;
        if let Err(e) = result {
            debug!(error = %e, "Session language not set");
        }
    }

    // =========================================================================
    // Token lifecycle
    // =========================================================================

    /// Exchange the refresh token for a fresh access token
    ///
    /// Always refreshes; there is no staleness shortcut. Callers that arrive
    /// while another refresh is in flight wait for it and return its outcome
    /// without refreshing again.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<()> {
        let observed = self.refresh_generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;
        if self.refresh_generation.load(Ordering::SeqCst) != observed {
            debug!("Joined a token refresh that completed while waiting");
            return Ok(());
        }

        let refresh_token = self
            .session
            .read()
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BluelinkError::TokenExchange("no refresh token; login first".to_string()))?;

        let tokens = self.tokens.refresh(&refresh_token).await?;
        self.store_tokens(tokens);
        debug!("Access token refreshed");
        Ok(())
    }

    /// Exchange the access token and `pin` for a control token
    ///
    /// Fails without any network call when no access token is set.
    pub async fn enter_pin(&self, pin: &str) -> Result<()> {
        let _gate = self.pin_gate.lock().await;
        self.enter_pin_locked(pin).await
    }

    #[instrument(skip_all)]
    async fn enter_pin_locked(&self, pin: &str) -> Result<()> {
        let (access_token, device_id) = {
            let session = self.session.read();
            if !session.has_access_token() {
                return Err(BluelinkError::Pin("Token not set".to_string()));
            }
            (
                session.access_token.clone().unwrap_or_default(),
                session.device_id.clone(),
            )
        };

        let response = self
            .http
            .put(&self.env.endpoints.pin)
            .header(AUTHORIZATION, access_token)
            .header(CONTENT_TYPE, "application/json")
            .json(&json!({ "deviceId": device_id, "pin": pin }))
            .send()
            .await
            .map_err(|e| BluelinkError::Pin(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BluelinkError::Pin(e.to_string()))?;
        if !status.is_success() {
            return Err(BluelinkError::Pin(format!(
                "{} returned {}: {}",
                self.env.endpoints.pin, status, body
            )));
        }
        let parsed: PinResponse = serde_json::from_str(&body)
            .map_err(|e| BluelinkError::Pin(format!("unreadable PIN response: {}", e)))?;

        let mut session = self.session.write();
        session.control_token = Some(format!("Bearer {}", parsed.control_token));
        session.control_token_expires_at = now().saturating_add(parsed.expires_time);
        info!(valid_for = parsed.expires_time, "PIN accepted");
        Ok(())
    }

    /// Gate run before every control operation
    ///
    /// Refreshes the access token, then re-enters the PIN if the control
    /// token is missing or expired.
    pub async fn check_control_token(&self) -> Result<()> {
        self.refresh_access_token().await?;

        let _gate = self.pin_gate.lock().await;
        if !self.session.read().control_token_stale(now()) {
            return Ok(());
        }
        let pin = self
            .pin
            .as_deref()
            .ok_or_else(|| BluelinkError::Pin("no PIN configured".to_string()))?;
        self.enter_pin_locked(pin).await
    }

    // =========================================================================
    // Request capabilities
    // =========================================================================

    /// Request authorized with the access token (read/query operations)
    pub async fn api_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.refresh_access_token().await?;
        self.decorated(method, path, Grant::Access).await
    }

    /// Request authorized with the control token (vehicle-control operations)
    pub async fn vehicle_request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.check_control_token().await?;
        self.decorated(method, path, Grant::Control).await
    }

    async fn decorated(&self, method: Method, path: &str, grant: Grant) -> Result<RequestBuilder> {
        let stamp = self.env.stamp().await?;
        let (authorization, device_id) = {
            let session = self.session.read();
            let token = match grant {
                Grant::Access => session.access_token.clone(),
                Grant::Control => session.control_token.clone(),
            };
            (token.unwrap_or_default(), session.device_id.clone())
        };

        let url = format!("{}/{}", self.env.base_url, path.trim_start_matches('/'));
        Ok(self
            .http
            .request(method, url)
            .header(AUTHORIZATION, authorization)
            .header("Stamp", stamp)
            .header("offset", timezone_offset())
            .header("ccsp-device-id", device_id)
            .header("ccsp-application-id", &self.env.app_id)
            .header(CONTENT_TYPE, "application/json"))
    }

    /// Current access token, without refreshing
    pub(crate) fn access_token(&self) -> Option<String> {
        self.session.read().access_token.clone()
    }
}

/// Seconds since the Unix epoch
fn now() -> i64 {
    Utc::now().timestamp()
}

/// Hours behind UTC, formatted like the official app (`-1.00` for CET)
fn timezone_offset() -> String {
    let seconds_west = -Local::now().offset().local_minus_utc();
    format!("{:.2}", f64::from(seconds_west) / 3600.0)
}

/// 64 random hex characters
fn push_registration_id() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}
