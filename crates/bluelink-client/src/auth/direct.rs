//! JSON signin: credentials posted straight to the brand API

use std::sync::Arc;

use async_trait::async_trait;
use bluelink_core::Credentials;
use reqwest::cookie::Jar;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::{browser_client, init_session, strategy_failure, AuthCode, AuthStrategy};
use crate::environment::BrandEnvironment;
use crate::error::{BluelinkError, Result};
use crate::scrape::code_from_query;

const NAME: &str = "DirectSignin";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigninResponse {
    redirect_url: Option<String>,
}

/// POSTs `{email, password}` and reads `code` from the returned `redirectUrl`
pub struct DirectSigninStrategy {
    env: Arc<BrandEnvironment>,
}

impl DirectSigninStrategy {
    pub fn new(env: Arc<BrandEnvironment>) -> Self {
        Self { env }
    }

    async fn acquire(&self, credentials: &Credentials, cookies: Option<Arc<Jar>>) -> Result<AuthCode> {
        let jar = init_session(&self.env, cookies).await?;
        let client = browser_client(&jar, true)?;

        let response = client
            .post(&self.env.endpoints.login)
            .header(reqwest::header::CONTENT_TYPE, "application/json;charset=UTF-8")
            .json(&json!({
                "email": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BluelinkError::strategy(
                NAME,
                format!("signin returned {}: {}", status, body),
            ));
        }

        let parsed: SigninResponse = serde_json::from_str(&body)
            .map_err(|e| BluelinkError::strategy(NAME, format!("invalid signin body: {}", e)))?;
        let redirect_url = parsed
            .redirect_url
            .ok_or_else(|| BluelinkError::strategy(NAME, "No redirectUrl in response"))?;
        let redirect = Url::parse(&redirect_url)?;
        let code = code_from_query(&redirect)
            .ok_or_else(|| BluelinkError::strategy(NAME, "AuthCode not found in redirectUrl"))?;

        debug!("Authorization code obtained via JSON signin");
        Ok(AuthCode { code, cookies: jar })
    }
}

#[async_trait]
impl AuthStrategy for DirectSigninStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip_all, fields(strategy = NAME, brand = %self.env.brand))]
    async fn login(&self, credentials: &Credentials, cookies: Option<Arc<Jar>>) -> Result<AuthCode> {
        self.acquire(credentials, cookies)
            .await
            .map_err(strategy_failure(NAME))
    }
}
