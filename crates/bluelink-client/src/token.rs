//! Authorization-code and refresh-token exchange

use std::sync::Arc;

use bluelink_core::{bare_token, prefix_token_type, Credentials, TokenSet};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use tracing::{debug, instrument};

use crate::environment::{BrandEnvironment, GrantStyle};
use crate::error::{BluelinkError, Result};

const USER_AGENT_OK_HTTP: &str = "okhttp/3.12.0";
const DEFAULT_TOKEN_TYPE: &str = "Bearer";
const FETCH_REFRESH_REDIRECT: &str = "https://www.getpostman.com/oauth2/callback";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
}

/// `expires_in` arrives as a number from some backends and a string from others
fn lenient_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(n)) => Some(n),
        Some(Raw::Float(f)) => Some(f as i64),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

impl TokenResponse {
    fn token_type(&self) -> &str {
        self.token_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TOKEN_TYPE)
    }

    fn into_token_set(self, raw_body: &str) -> Result<TokenSet> {
        let token_type = self.token_type().to_string();
        let access = self.access_token.as_deref().filter(|t| !t.is_empty()).ok_or_else(|| {
            BluelinkError::TokenExchange(format!("no access_token in response: {}", raw_body))
        })?;
        Ok(TokenSet {
            access_token: prefix_token_type(&token_type, access),
            refresh_token: self
                .refresh_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| prefix_token_type(&token_type, t)),
            expires_in: self.expires_in.unwrap_or(0),
        })
    }
}

/// Turns codes, refresh tokens or passwords into a [`TokenSet`]
///
/// Every token returned carries its token-type prefix exactly once.
#[derive(Clone)]
pub struct TokenExchanger {
    env: Arc<BrandEnvironment>,
    http: Client,
}

impl TokenExchanger {
    pub fn new(env: Arc<BrandEnvironment>, http: Client) -> Self {
        Self { env, http }
    }

    /// Exchange an authorization code
    #[instrument(skip_all, fields(brand = %self.env.brand))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let form = [
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.env.endpoints.redirect_uri.as_str()),
            ("code", code),
        ];
        self.post_form(&self.env.endpoints.token, &form).await
    }

    /// Exchange a refresh token for a new token set
    #[instrument(skip_all, fields(brand = %self.env.brand))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        match self.env.grant_style {
            GrantStyle::CcspForm => {
                let mut form = vec![
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("redirect_uri", self.env.endpoints.redirect_uri.as_str()),
                ];
                if let Some(secret) = self.env.client_secret.as_deref() {
                    form.push(("client_id", self.env.client_id.as_str()));
                    form.push(("client_secret", secret));
                }
                self.post_form(&self.env.endpoints.refresh, &form).await
            }
            GrantStyle::UsJson => {
                let body = json!({ "refresh_token": bare_token(refresh_token) });
                self.post_json(&self.env.endpoints.refresh, &body).await
            }
        }
    }

    /// Username/password grant
    #[instrument(skip_all, fields(brand = %self.env.brand))]
    pub async fn password_grant(&self, credentials: &Credentials) -> Result<TokenSet> {
        let body = json!({
            "username": credentials.username,
            "password": credentials.password,
        });
        self.post_json(&self.env.endpoints.token, &body).await
    }

    /// Obtain a refresh token using an access token as the seed
    ///
    /// Used when a code exchange returned only an access token. The access
    /// token of the response becomes the refresh token.
    #[instrument(skip_all, fields(brand = %self.env.brand))]
    pub async fn fetch_refresh_token(&self, access_token: &str) -> Result<String> {
        let form = [
            ("grant_type", "refresh_token"),
            ("redirect_uri", FETCH_REFRESH_REDIRECT),
            ("refresh_token", access_token),
        ];
        let tokens = self.post_form(&self.env.endpoints.token, &form).await?;
        Ok(tokens.access_token)
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<TokenSet> {
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, &self.env.basic_token)
            .header("Stamp", self.env.stamp().await?)
            .header(USER_AGENT, USER_AGENT_OK_HTTP)
            .form(form)
            .send()
            .await?;
        self.parse(url, response).await
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<TokenSet> {
        let mut request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, USER_AGENT_OK_HTTP)
            .header("client_id", &self.env.client_id)
            .json(body);
        if let Some(secret) = self.env.client_secret.as_deref() {
            request = request.header("client_secret", secret);
        }
        let response = request.send().await?;
        self.parse(url, response).await
    }

    async fn parse(&self, url: &str, response: reqwest::Response) -> Result<TokenSet> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BluelinkError::TokenExchange(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            BluelinkError::TokenExchange(format!("unreadable token response from {}: {}", url, e))
        })?;
        let tokens = parsed.into_token_set(&body)?;
        debug!(expires_in = tokens.expires_in, "Token exchange succeeded");
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<TokenSet> {
        let parsed: TokenResponse = serde_json::from_str(body).unwrap();
        parsed.into_token_set(body)
    }

    #[test]
    fn test_prefixes_access_and_refresh_tokens() {
        let tokens = parse(
            r#"{"access_token":"acc","refresh_token":"ref","token_type":"Bearer","expires_in":86400}"#,
        )
        .unwrap();
        assert_eq!(tokens.access_token, "Bearer acc");
        assert_eq!(tokens.refresh_token.as_deref(), Some("Bearer ref"));
        assert_eq!(tokens.expires_in, 86400);
    }

    #[test]
    fn test_already_prefixed_refresh_token_is_reused() {
        let tokens = parse(
            r#"{"access_token":"acc","refresh_token":"Bearer ref","token_type":"Bearer","expires_in":1}"#,
        )
        .unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("Bearer ref"));
    }

    #[test]
    fn test_defaults_token_type_and_expiry() {
        let tokens = parse(r#"{"access_token":"acc"}"#).unwrap();
        assert_eq!(tokens.access_token, "Bearer acc");
        assert_eq!(tokens.refresh_token, None);
        assert_eq!(tokens.expires_in, 0);
    }

    #[test]
    fn test_expires_in_as_string() {
        let tokens = parse(r#"{"access_token":"acc","expires_in":"1799"}"#).unwrap();
        assert_eq!(tokens.expires_in, 1799);
    }

    #[test]
    fn test_missing_access_token_is_a_hard_failure() {
        let err = parse(r#"{"refresh_token":"ref","error":"invalid_grant"}"#).unwrap_err();
        match err {
            BluelinkError::TokenExchange(msg) => assert!(msg.contains("invalid_grant")),
            other => panic!("Expected TokenExchange, got {:?}", other),
        }
        assert!(parse(r#"{"access_token":""}"#).is_err());
    }
}
