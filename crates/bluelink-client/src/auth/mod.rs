//! Brand-specific login strategies
//!
//! Each strategy turns credentials into an OAuth authorization code. The
//! [`login_plan`] factory decides, per brand and region, which strategies
//! to try and in what order, or whether code acquisition is skipped.
//!
//! A strategy failure is deterministic (a missing session key, form action,
//! status or code), so the controller moves on to the next strategy instead
//! of retrying.

mod direct;
mod form;
mod idp_connect;

pub use direct::DirectSigninStrategy;
pub use form::FormScrapeStrategy;
pub use idp_connect::IdpConnectStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use bluelink_core::{Brand, Credentials, Language, Region};
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use tracing::debug;

use crate::environment::BrandEnvironment;
use crate::error::{BluelinkError, Result};

/// Mobile browser user agent expected by the login pages
pub const USER_AGENT_BROWSER: &str = "Mozilla/5.0 (Linux; Android 4.1.1; Galaxy Nexus Build/JRO03C) AppleWebKit/535.19 (KHTML, like Gecko) Chrome/18.0.1025.166 Mobile Safari/535.19_CCS_APP_AOS";

/// iOS Safari user agent used by the connector-session signin
pub const USER_AGENT_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 11_1 like Mac OS X) AppleWebKit/604.3.5 (KHTML, like Gecko) Version/11.0 Mobile/15B92 Safari/604.1";

/// Authorization code plus the cookie jar it was obtained with
#[derive(Clone)]
pub struct AuthCode {
    pub code: String,
    pub cookies: Arc<Jar>,
}

/// One way of logging in to a brand backend
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Name used in logs and login error reports
    fn name(&self) -> &'static str;

    /// Run the login sequence and return an authorization code
    ///
    /// A supplied cookie jar is reused; otherwise a fresh one is created so
    /// cookies never leak between users.
    async fn login(&self, credentials: &Credentials, cookies: Option<Arc<Jar>>)
        -> Result<AuthCode>;
}

/// How a login obtains its first token set
pub enum LoginPlan {
    /// Try each strategy in order until one yields an authorization code
    AuthorizationCode(Vec<Box<dyn AuthStrategy>>),
    /// The configured password is a long-lived refresh token
    RefreshTokenSeed,
    /// Username and password are exchanged directly for tokens
    PasswordGrant,
}

impl LoginPlan {
    /// Strategy names in attempt order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        match self {
            LoginPlan::AuthorizationCode(strategies) => {
                strategies.iter().map(|s| s.name()).collect()
            }
            LoginPlan::RefreshTokenSeed | LoginPlan::PasswordGrant => vec![],
        }
    }
}

/// Select the login plan for the environment's brand and region
pub fn login_plan(env: &Arc<BrandEnvironment>, language: &Language) -> LoginPlan {
    match (env.brand, env.region) {
        (_, Region::Us) => LoginPlan::PasswordGrant,
        (Brand::Kia, Region::Eu) => LoginPlan::RefreshTokenSeed,
        (Brand::Hyundai, Region::Eu) => LoginPlan::AuthorizationCode(vec![
            Box::new(DirectSigninStrategy::new(env.clone())),
            Box::new(FormScrapeStrategy::new(env.clone(), language.clone())),
            Box::new(IdpConnectStrategy::new(env.clone(), language.clone())),
        ]),
        (Brand::Genesis, Region::Eu) => LoginPlan::AuthorizationCode(vec![Box::new(
            FormScrapeStrategy::new(env.clone(), language.clone()),
        )]),
    }
}

/// HTTP client bound to one login attempt's cookie jar
pub(crate) fn browser_client(jar: &Arc<Jar>, follow_redirects: bool) -> Result<Client> {
    let policy = if follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    Ok(Client::builder()
        .cookie_provider(jar.clone())
        .redirect(policy)
        .build()?)
}

/// Prime the cookie jar by hitting the session endpoint
///
/// Only the cookie side effects matter; the body is discarded.
pub async fn init_session(env: &BrandEnvironment, cookies: Option<Arc<Jar>>) -> Result<Arc<Jar>> {
    let jar = cookies.unwrap_or_default();
    let client = browser_client(&jar, true)?;
    let response = client.get(&env.endpoints.session).send().await?;
    debug!(status = %response.status(), "Session cookies primed");
    Ok(jar)
}

/// Read a `Location` header as a string
pub(crate) fn location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Map any error from inside a strategy to a failure of that strategy
pub(crate) fn strategy_failure(strategy: &'static str) -> impl Fn(BluelinkError) -> BluelinkError {
    move |err| match err {
        failed @ BluelinkError::AuthStrategy { .. } => failed,
        other => BluelinkError::strategy(strategy, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::StaticStamp;

    fn env(brand: Brand, region: Region) -> Arc<BrandEnvironment> {
        Arc::new(
            BrandEnvironment::new(brand, region, Arc::new(StaticStamp::new("s"))).unwrap(),
        )
    }

    #[test]
    fn test_plan_per_brand_and_region() {
        let lang = Language::default();

        let hyundai = login_plan(&env(Brand::Hyundai, Region::Eu), &lang);
        assert_eq!(
            hyundai.strategy_names(),
            vec!["DirectSignin", "FormScrape", "IdpConnect"]
        );

        let genesis = login_plan(&env(Brand::Genesis, Region::Eu), &lang);
        assert_eq!(genesis.strategy_names(), vec!["FormScrape"]);

        assert!(matches!(
            login_plan(&env(Brand::Kia, Region::Eu), &lang),
            LoginPlan::RefreshTokenSeed
        ));
        assert!(matches!(
            login_plan(&env(Brand::Hyundai, Region::Us), &lang),
            LoginPlan::PasswordGrant
        ));
    }

    #[test]
    fn test_strategy_failure_wraps_other_errors() {
        let wrap = strategy_failure("FormScrape");
        let err = wrap(BluelinkError::ParseError("bad json".to_string()));
        match err {
            BluelinkError::AuthStrategy { strategy, reason } => {
                assert_eq!(strategy, "FormScrape");
                assert!(reason.contains("bad json"));
            }
            other => panic!("Expected AuthStrategy, got {:?}", other),
        }

        let failed = BluelinkError::strategy("DirectSignin", "no redirectUrl");
        assert!(matches!(
            wrap(failed),
            BluelinkError::AuthStrategy {
                strategy: "DirectSignin",
                ..
            }
        ));
    }
}
