//! Connector-session signin against the European identity provider

use std::sync::Arc;

use async_trait::async_trait;
use bluelink_core::{Credentials, Language};
use reqwest::cookie::Jar;
use reqwest::header::{ORIGIN, USER_AGENT};
use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use super::{
    browser_client, init_session, location, strategy_failure, AuthCode, AuthStrategy,
    USER_AGENT_IOS,
};
use crate::environment::BrandEnvironment;
use crate::error::{BluelinkError, Result};
use crate::scrape::{extract_code, extract_session_key};

const NAME: &str = "IdpConnect";

/// Follows the IDP authorize redirects to learn the connector session key,
/// then posts the full signin form and reads the code from the 302.
pub struct IdpConnectStrategy {
    env: Arc<BrandEnvironment>,
    language: Language,
}

impl IdpConnectStrategy {
    pub fn new(env: Arc<BrandEnvironment>, language: Language) -> Self {
        Self { env, language }
    }

    pub fn authorize_url(&self) -> Result<Url> {
        Ok(Url::parse_with_params(
            &format!("{}/auth/api/v2/user/oauth2/authorize", self.env.idp_host),
            &[
                ("response_type", "code"),
                ("client_id", self.env.client_id.as_str()),
                ("redirect_uri", self.env.endpoints.redirect_uri.as_str()),
                ("lang", self.language.as_str()),
                ("state", "ccsp"),
            ],
        )?)
    }

    async fn acquire(&self, credentials: &Credentials, jar: &Arc<Jar>) -> Result<String> {
        let follow = browser_client(jar, true)?;
        let plain = browser_client(jar, false)?;

        // Status is irrelevant here, only where the redirects end up.
        let landing = follow
            .get(self.authorize_url()?)
            .header(USER_AGENT, USER_AGENT_IOS)
            .send()
            .await?;
        let session_key = extract_session_key(landing.url().as_str())?;
        debug!("Connector session key obtained");

        let form = [
            ("client_id", self.env.client_id.as_str()),
            ("encryptedPassword", "false"),
            ("orgHmgSid", ""),
            ("password", credentials.password.as_str()),
            ("redirect_uri", self.env.endpoints.redirect_uri.as_str()),
            ("state", "ccsp"),
            ("username", credentials.username.as_str()),
            ("remember_me", "false"),
            ("connector_session_key", session_key.as_str()),
            ("_csrf", ""),
        ];
        let signin_url = format!("{}/auth/account/signin", self.env.idp_host);
        let response = plain
            .post(&signin_url)
            .header(ORIGIN, &self.env.idp_host)
            .header(USER_AGENT, USER_AGENT_IOS)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(BluelinkError::strategy(
                NAME,
                format!("Signin failed with status {}: {}", status.as_u16(), body),
            ));
        }

        let redirect = location(&response).ok_or_else(|| {
            BluelinkError::strategy(NAME, "No redirect location found after signin")
        })?;
        Ok(extract_code(&redirect)?)
    }
}

#[async_trait]
impl AuthStrategy for IdpConnectStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    #[instrument(skip_all, fields(strategy = NAME, brand = %self.env.brand))]
    async fn login(&self, credentials: &Credentials, cookies: Option<Arc<Jar>>) -> Result<AuthCode> {
        let attempt = async {
            let jar = init_session(&self.env, cookies).await?;
            let code = self.acquire(credentials, &jar).await?;
            Ok::<_, BluelinkError>(AuthCode { code, cookies: jar })
        };
        attempt.await.map_err(strategy_failure(NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticStamp;
    use bluelink_core::{Brand, Region};

    #[test]
    fn test_authorize_url() {
        let env = BrandEnvironment::new(Brand::Hyundai, Region::Eu, Arc::new(StaticStamp::new("s")))
            .unwrap();
        let strategy = IdpConnectStrategy::new(Arc::new(env), "fr".parse().unwrap());
        let url = strategy.authorize_url().unwrap();

        assert_eq!(url.host_str(), Some("idpconnect-eu.hyundai.com"));
        assert_eq!(url.path(), "/auth/api/v2/user/oauth2/authorize");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("state".to_string(), "ccsp".to_string())));
        assert!(pairs.contains(&("lang".to_string(), "fr".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://prd.eu-ccapi.hyundai.com:8080/api/v1/user/oauth2/redirect".to_string()
        )));
    }
}
