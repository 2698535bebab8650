//! Form-scrape login: fetch the brand's HTML login page and submit it

use std::sync::Arc;

use async_trait::async_trait;
use bluelink_core::{Brand, Credentials, Language};
use reqwest::cookie::Jar;
use reqwest::header::USER_AGENT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    browser_client, init_session, location, strategy_failure, AuthCode, AuthStrategy,
    USER_AGENT_BROWSER,
};
use crate::environment::BrandEnvironment;
use crate::error::{BluelinkError, Result};
use crate::scrape::{code_from_query, extract_form_action};

const NAME: &str = "FormScrape";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntegrationInfo {
    service_id: String,
    user_id: String,
}

/// Integration lookup, authorize redirect, HTML form submission
///
/// Hyundai and Genesis use a Keycloak realm; Kia uses its own authorize
/// path. Either way the page's `<form action='...'>` is posted with the
/// credentials and the code is read from the resulting redirect.
pub struct FormScrapeStrategy {
    env: Arc<BrandEnvironment>,
    language: Language,
}

impl FormScrapeStrategy {
    pub fn new(env: Arc<BrandEnvironment>, language: Language) -> Self {
        Self { env, language }
    }

    /// Authorize URL for the login page, carrying `state=serviceId:userId`
    pub fn authorize_url(&self, service_id: &str, user_id: &str) -> Result<Url> {
        let state = format!("{}:{}", service_id, user_id);
        let host = &self.env.login_form_host;
        let url = match self.env.brand {
            Brand::Hyundai | Brand::Genesis => {
                let realm = if self.env.brand == Brand::Hyundai {
                    "euhyundaiidm"
                } else {
                    "eugenesisidm"
                };
                Url::parse_with_params(
                    &format!("{}/auth/realms/{}/protocol/openid-connect/auth", host, realm),
                    &[
                        ("client_id", self.env.client_id.as_str()),
                        ("scope", "openid profile email phone"),
                        ("response_type", "code"),
                        ("hkid_session_reset", "true"),
                        ("redirect_uri", self.env.endpoints.integration_redirect.as_str()),
                        ("ui_locales", self.language.as_str()),
                        ("state", state.as_str()),
                    ],
                )?
            }
            Brand::Kia => Url::parse_with_params(
                &format!("{}/auth/api/v2/user/oauth2/authorize", host),
                &[
                    ("response_type", "code"),
                    ("client_id", self.env.client_id.as_str()),
                    ("redirect_uri", self.env.endpoints.redirect_uri.as_str()),
                    ("lang", self.language.as_str()),
                    ("state", state.as_str()),
                ],
            )?,
        };
        Ok(url)
    }

    async fn integration_info(&self, client: &Client) -> Result<IntegrationInfo> {
        let response = client
            .get(&self.env.endpoints.integration_info)
            .header(USER_AGENT, USER_AGENT_BROWSER)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BluelinkError::server_error(
                status.as_u16(),
                &self.env.endpoints.integration_info,
                body,
            ));
        }
        serde_json::from_str(&body)
            .map_err(|e| BluelinkError::ParseError(format!("integration info: {}: {}", e, body)))
    }

    /// Fetch the login page HTML and the URL it was served from
    async fn login_page(&self, plain: &Client, follow: &Client, authorize: Url) -> Result<(String, Url)> {
        let response = plain
            .get(authorize.clone())
            .header(USER_AGENT, USER_AGENT_BROWSER)
            .send()
            .await?;
        let redirect = location(&response);

        if let Some(loc) = redirect.as_deref().filter(|l| l.contains("connector_session_key")) {
            let target = authorize.join(loc)?;
            debug!("Consuming connector session redirect");
            plain
                .get(target)
                .header(USER_AGENT, USER_AGENT_BROWSER)
                .send()
                .await?;
        }

        if response.status() == StatusCode::OK {
            let url = response.url().clone();
            return Ok((response.text().await?, url));
        }

        match redirect {
            Some(loc) => {
                let target = authorize.join(&loc)?;
                let page = follow
                    .get(target)
                    .header(USER_AGENT, USER_AGENT_BROWSER)
                    .send()
                    .await?;
                let url = page.url().clone();
                Ok((page.text().await?, url))
            }
            None => Err(BluelinkError::strategy(
                NAME,
                format!(
                    "Could not retrieve login form page (status {})",
                    response.status()
                ),
            )),
        }
    }

    /// Run the form flow; `Ok(None)` means no code was obtained
    async fn acquire_code(&self, credentials: &Credentials, jar: &Arc<Jar>) -> Result<Option<String>> {
        let plain = browser_client(jar, false)?;
        let follow = browser_client(jar, true)?;

        let info = self.integration_info(&follow).await?;
        let authorize = self.authorize_url(&info.service_id, &info.user_id)?;
        let (html, page_url) = self.login_page(&plain, &follow, authorize).await?;

        let action = page_url.join(&extract_form_action(&html)?)?;
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("credentialId", ""),
            ("rememberMe", "on"),
        ];
        let submitted = plain
            .post(action.clone())
            .header(USER_AGENT, USER_AGENT_BROWSER)
            .form(&form)
            .send()
            .await?;

        if submitted.status() != StatusCode::FOUND {
            warn!(status = %submitted.status(), "Login form was not accepted");
            return Ok(None);
        }
        let Some(next) = location(&submitted) else {
            return Ok(None);
        };
        let next = action.join(&next)?;

        if next.as_str().contains("code=") {
            return Ok(code_from_query(&next));
        }

        let last = plain
            .get(next)
            .header(USER_AGENT, USER_AGENT_BROWSER)
            .send()
            .await?;
        let final_url = match location(&last) {
            Some(loc) => last.url().join(&loc)?,
            None => last.url().clone(),
        };
        Ok(code_from_query(&final_url))
    }
}

#[async_trait]
impl AuthStrategy for FormScrapeStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip_all, fields(strategy = NAME, brand = %self.env.brand))]
    async fn login(&self, credentials: &Credentials, cookies: Option<Arc<Jar>>) -> Result<AuthCode> {
        let attempt = async {
            let jar = init_session(&self.env, cookies).await?;
            match self.acquire_code(credentials, &jar).await? {
                Some(code) => {
                    debug!("Authorization code obtained via login form");
                    Ok(AuthCode { code, cookies: jar })
                }
                None => Err(BluelinkError::strategy(
                    NAME,
                    "Authorization code not obtained",
                )),
            }
        };
        attempt.await.map_err(strategy_failure(NAME))
    }
}
