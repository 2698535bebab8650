//! Per-brand, per-region backend configuration
//!
//! A [`BrandEnvironment`] is built once from a brand/region pair and never
//! mutated afterwards. Host overrides (`with_base_url` and friends) return a
//! new value with every endpoint re-derived from the new host.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bluelink_core::{Brand, ConfigError, Region};
use url::Url;

use crate::error::Result;

/// Source of the `Stamp` anti-tampering header
///
/// The value changes over time, so it is requested again for every call.
#[async_trait]
pub trait StampProvider: Send + Sync {
    async fn stamp(&self) -> Result<String>;
}

/// Stamp provider that always returns the same value
#[derive(Debug, Clone)]
pub struct StaticStamp(String);

impl StaticStamp {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }
}

#[async_trait]
impl StampProvider for StaticStamp {
    async fn stamp(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// How tokens are requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStyle {
    /// URL-encoded OAuth bodies with Basic client credentials (EU CCSP)
    CcspForm,
    /// JSON bodies with `client_id`/`client_secret` headers (US)
    UsJson,
}

/// What to do when a code exchange returns no refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRefreshToken {
    /// Ask the token endpoint for one using the access token
    FetchWithAccessToken,
    /// Keep the authorization code as the refresh token
    ReuseAuthorizationCode,
}

/// Endpoint URLs derived from the environment hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Cookie-priming authorize request
    pub session: String,
    /// Session language negotiation (EU only)
    pub language: Option<String>,
    /// Push-notification device registration (EU only)
    pub device_registration: Option<String>,
    /// JSON signin
    pub login: String,
    /// `serviceId`/`userId` lookup for the form login
    pub integration_info: String,
    /// Code and password exchange
    pub token: String,
    /// Refresh-token exchange
    pub refresh: String,
    /// OAuth redirect registered for the client
    pub redirect_uri: String,
    /// Redirect used by the integration (form) login
    pub integration_redirect: String,
    /// Control-token (PIN) exchange
    pub pin: String,
}

struct BrandConstants {
    base_url: &'static str,
    client_id: &'static str,
    client_secret: Option<&'static str>,
    app_id: &'static str,
    basic_token: &'static str,
    login_form_host: &'static str,
    idp_host: &'static str,
    push_type: &'static str,
    grant_style: GrantStyle,
    missing_refresh: MissingRefreshToken,
    refresh_on_idp: bool,
}

fn constants(brand: Brand, region: Region) -> std::result::Result<BrandConstants, ConfigError> {
    match (brand, region) {
        (Brand::Hyundai, Region::Eu) => Ok(BrandConstants {
            base_url: "https://prd.eu-ccapi.hyundai.com:8080",
            client_id: "6d477c38-3ca4-4cf3-9557-2a1929a94654",
            client_secret: None,
            app_id: "014d2225-8495-4735-812d-2616334fd15d",
            basic_token: "Basic NmQ0NzdjMzgtM2NhNC00Y2YzLTk1NTctMmExOTI5YTk0NjU0OktVeTQ5WHhQekxwTHVvSzB4aEJDNzdXNlZYaG10UVI5aVFobUlGampvWTRJcHhzVg==",
            login_form_host: "https://eu-account.hyundai.com",
            idp_host: "https://idpconnect-eu.hyundai.com",
            push_type: "GCM",
            grant_style: GrantStyle::CcspForm,
            missing_refresh: MissingRefreshToken::FetchWithAccessToken,
            refresh_on_idp: false,
        }),
        (Brand::Kia, Region::Eu) => Ok(BrandConstants {
            base_url: "https://prd.eu-ccapi.kia.com:8080",
            client_id: "fdc85c00-0a2f-4c64-bcb4-2cfb1500730a",
            client_secret: Some("secret"),
            app_id: "a2b8469b-30a3-4361-8e13-6fceea8fbe74",
            basic_token: "Basic ZmRjODVjMDAtMGEyZi00YzY0LWJjYjQtMmNmYjE1MDA3MzBhOnNlY3JldA==",
            login_form_host: "https://idpconnect-eu.kia.com",
            idp_host: "https://idpconnect-eu.kia.com",
            push_type: "APNS",
            grant_style: GrantStyle::CcspForm,
            missing_refresh: MissingRefreshToken::ReuseAuthorizationCode,
            refresh_on_idp: true,
        }),
        (Brand::Genesis, Region::Eu) => Ok(BrandConstants {
            base_url: "https://prd-eu-ccapi.genesis.com",
            client_id: "3020afa2-30ff-412a-aa51-d28fbe901e10",
            client_secret: None,
            app_id: "f11f2b86-e0e7-4851-90df-5600b01d8b70",
            basic_token: "Basic MzAyMGFmYTItMzBmZi00MTJhLWFhNTEtZDI4ZmJlOTAxZTEwOkZLRGRsZWYyZmZkZGxGRkRrZmxkc2Zsa2RmbHNrZg==",
            login_form_host: "https://accounts-eu.genesis.com",
            idp_host: "https://accounts-eu.genesis.com",
            push_type: "GCM",
            grant_style: GrantStyle::CcspForm,
            missing_refresh: MissingRefreshToken::ReuseAuthorizationCode,
            refresh_on_idp: false,
        }),
        (Brand::Hyundai, Region::Us) => Ok(BrandConstants {
            base_url: "https://api.telematics.hyundaiusa.com",
            client_id: "m66129Bb-em93-SPAHYN-bZ91-am4540zp19920",
            client_secret: Some("v558o935-6nne-423i-baa8"),
            app_id: "",
            basic_token: "",
            login_form_host: "https://api.telematics.hyundaiusa.com",
            idp_host: "https://api.telematics.hyundaiusa.com",
            push_type: "GCM",
            grant_style: GrantStyle::UsJson,
            missing_refresh: MissingRefreshToken::ReuseAuthorizationCode,
            refresh_on_idp: false,
        }),
        (brand, region) => Err(ConfigError::UnsupportedCombination { brand, region }),
    }
}

/// Immutable backend configuration for one brand/region pair
#[derive(Clone)]
pub struct BrandEnvironment {
    pub brand: Brand,
    pub region: Region,
    /// Scheme + host (+ port), no trailing slash
    pub base_url: String,
    /// `host[:port]` of `base_url`
    pub host: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub app_id: String,
    /// `Basic <client credentials>` header value
    pub basic_token: String,
    /// Host serving the HTML login form
    pub login_form_host: String,
    /// Identity-provider host used by the connector-session signin
    pub idp_host: String,
    pub push_type: &'static str,
    pub grant_style: GrantStyle,
    pub missing_refresh: MissingRefreshToken,
    /// Refresh tokens are exchanged on the identity provider, not the API host
    pub refresh_on_idp: bool,
    pub endpoints: Endpoints,
    stamp: Arc<dyn StampProvider>,
}

impl BrandEnvironment {
    /// Build the environment for `brand` in `region`
    pub fn new(
        brand: Brand,
        region: Region,
        stamp: Arc<dyn StampProvider>,
    ) -> std::result::Result<Self, ConfigError> {
        let c = constants(brand, region)?;
        let mut env = Self {
            brand,
            region,
            base_url: String::new(),
            host: String::new(),
            client_id: c.client_id.to_string(),
            client_secret: c.client_secret.map(str::to_string),
            app_id: c.app_id.to_string(),
            basic_token: c.basic_token.to_string(),
            login_form_host: normalize_host(c.login_form_host)?,
            idp_host: normalize_host(c.idp_host)?,
            push_type: c.push_type,
            grant_style: c.grant_style,
            missing_refresh: c.missing_refresh,
            refresh_on_idp: c.refresh_on_idp,
            endpoints: Endpoints::placeholder(),
            stamp,
        };
        env.set_base_url(c.base_url)?;
        Ok(env)
    }

    /// Point the API at a different host
    pub fn with_base_url(mut self, base_url: &str) -> std::result::Result<Self, ConfigError> {
        self.set_base_url(base_url)?;
        Ok(self)
    }

    /// Point the HTML login form at a different host
    pub fn with_login_form_host(mut self, host: &str) -> std::result::Result<Self, ConfigError> {
        self.login_form_host = normalize_host(host)?;
        self.endpoints = self.derive_endpoints();
        Ok(self)
    }

    /// Point the identity provider at a different host
    pub fn with_idp_host(mut self, host: &str) -> std::result::Result<Self, ConfigError> {
        self.idp_host = normalize_host(host)?;
        self.endpoints = self.derive_endpoints();
        Ok(self)
    }

    /// Fresh `Stamp` header value
    pub async fn stamp(&self) -> Result<String> {
        self.stamp.stamp().await
    }

    fn set_base_url(&mut self, base_url: &str) -> std::result::Result<(), ConfigError> {
        let parsed = parse_url(base_url)?;
        let host = parsed.host_str().unwrap_or_default();
        self.host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.endpoints = self.derive_endpoints();
        Ok(())
    }

    fn derive_endpoints(&self) -> Endpoints {
        let base = &self.base_url;
        match self.grant_style {
            GrantStyle::CcspForm => {
                let user_api = format!("{}/api/v1/user", base);
                let redirect_uri = format!("{}/oauth2/redirect", user_api);
                let refresh = if self.refresh_on_idp {
                    format!("{}/auth/api/v2/user/oauth2/token", self.idp_host)
                } else {
                    format!("{}/oauth2/token", user_api)
                };
                Endpoints {
                    session: format!(
                        "{}/oauth2/authorize?response_type=code&state=test&client_id={}&redirect_uri={}",
                        user_api, self.client_id, redirect_uri
                    ),
                    language: Some(format!("{}/language", user_api)),
                    device_registration: Some(format!("{}/api/v1/spa/notifications/register", base)),
                    login: format!("{}/signin", user_api),
                    integration_info: format!("{}/integrationinfo", user_api),
                    token: format!("{}/oauth2/token", user_api),
                    refresh,
                    redirect_uri,
                    integration_redirect: format!("{}/integration/redirect/login", user_api),
                    pin: format!("{}/pin", user_api),
                }
            }
            // The password grant only uses `token` and `refresh`.
            GrantStyle::UsJson => Endpoints {
                session: base.clone(),
                language: None,
                device_registration: None,
                login: base.clone(),
                integration_info: base.clone(),
                token: format!("{}/v2/ac/oauth/token", base),
                refresh: format!("{}/v2/ac/oauth/token/refresh", base),
                redirect_uri: base.clone(),
                integration_redirect: base.clone(),
                pin: base.clone(),
            },
        }
    }
}

impl Endpoints {
    fn placeholder() -> Self {
        Self {
            session: String::new(),
            language: None,
            device_registration: None,
            login: String::new(),
            integration_info: String::new(),
            token: String::new(),
            refresh: String::new(),
            redirect_uri: String::new(),
            integration_redirect: String::new(),
            pin: String::new(),
        }
    }
}

impl fmt::Debug for BrandEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrandEnvironment")
            .field("brand", &self.brand)
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("login_form_host", &self.login_form_host)
            .field("idp_host", &self.idp_host)
            .field("grant_style", &self.grant_style)
            .finish_non_exhaustive()
    }
}

fn parse_url(raw: &str) -> std::result::Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

fn normalize_host(raw: &str) -> std::result::Result<String, ConfigError> {
    parse_url(raw)?;
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp() -> Arc<dyn StampProvider> {
        Arc::new(StaticStamp::new("test-stamp"))
    }

    #[test]
    fn test_hyundai_eu_endpoints() {
        let env = BrandEnvironment::new(Brand::Hyundai, Region::Eu, stamp()).unwrap();
        assert_eq!(env.host, "prd.eu-ccapi.hyundai.com:8080");
        assert_eq!(
            env.endpoints.token,
            "https://prd.eu-ccapi.hyundai.com:8080/api/v1/user/oauth2/token"
        );
        assert_eq!(env.endpoints.refresh, env.endpoints.token);
        assert_eq!(
            env.endpoints.redirect_uri,
            "https://prd.eu-ccapi.hyundai.com:8080/api/v1/user/oauth2/redirect"
        );
        assert!(env.endpoints.language.is_some());
    }

    #[test]
    fn test_kia_eu_refreshes_on_idp() {
        let env = BrandEnvironment::new(Brand::Kia, Region::Eu, stamp()).unwrap();
        assert_eq!(
            env.endpoints.refresh,
            "https://idpconnect-eu.kia.com/auth/api/v2/user/oauth2/token"
        );
        assert_eq!(env.client_secret.as_deref(), Some("secret"));
    }

    #[test]
    fn test_host_overrides_rederive_endpoints() {
        let env = BrandEnvironment::new(Brand::Kia, Region::Eu, stamp())
            .unwrap()
            .with_base_url("http://127.0.0.1:4000/")
            .unwrap()
            .with_idp_host("http://127.0.0.1:4001")
            .unwrap();
        assert_eq!(env.base_url, "http://127.0.0.1:4000");
        assert_eq!(env.host, "127.0.0.1:4000");
        assert_eq!(
            env.endpoints.login,
            "http://127.0.0.1:4000/api/v1/user/signin"
        );
        assert_eq!(
            env.endpoints.refresh,
            "http://127.0.0.1:4001/auth/api/v2/user/oauth2/token"
        );
    }

    #[test]
    fn test_unsupported_combination() {
        let err = BrandEnvironment::new(Brand::Kia, Region::Us, stamp()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedCombination {
                brand: Brand::Kia,
                region: Region::Us
            }
        );
    }

    #[test]
    fn test_invalid_override_url() {
        let env = BrandEnvironment::new(Brand::Genesis, Region::Eu, stamp()).unwrap();
        assert!(matches!(
            env.with_base_url("not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_static_stamp() {
        let env = BrandEnvironment::new(Brand::Hyundai, Region::Us, stamp()).unwrap();
        assert_eq!(tokio_test::block_on(env.stamp()).unwrap(), "test-stamp");
        assert_eq!(env.grant_style, GrantStyle::UsJson);
    }
}
