//! Extraction of login artifacts from HTML and redirect URLs
//!
//! The brand login pages are a de-facto protocol. Every helper here returns
//! an explicit [`ScrapeError`] when its artifact is absent; callers decide
//! whether that means falling back to another strategy.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// A required artifact was not found
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Could not extract connector_session_key from URL: {0}")]
    SessionKey(String),

    #[error("Could not find login form action in page")]
    FormAction,

    #[error("Could not extract authorization code from: {0}")]
    AuthorizationCode(String),
}

static SESSION_KEY_ENCODED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"connector_session_key%3D([0-9a-fA-F-]{36})").ok());

static SESSION_KEY_RAW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"connector_session_key=([0-9a-fA-F-]{36})").ok());

// Brand markup always single-quotes the action attribute.
static FORM_ACTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<form[^>]*action='([^']+)'[^>]*>").ok());

static CODE_STRICT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"code=([0-9a-fA-F-]{36}\.[0-9a-fA-F-]{36}\.[0-9a-fA-F-]{36})").ok()
});

static CODE_LOOSE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"code=([^&]+)").ok());

fn first_capture(pattern: &LazyLock<Option<Regex>>, haystack: &str) -> Option<String> {
    pattern
        .as_ref()?
        .captures(haystack)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Find the 36-character connector session key in a URL
///
/// The key may appear URL-encoded (inside a nested redirect) or raw.
pub fn extract_session_key(url: &str) -> Result<String, ScrapeError> {
    first_capture(&SESSION_KEY_ENCODED, url)
        .or_else(|| first_capture(&SESSION_KEY_RAW, url))
        .ok_or_else(|| ScrapeError::SessionKey(url.to_string()))
}

/// Find the login form's `action` URL, with `&amp;` unescaped
pub fn extract_form_action(html: &str) -> Result<String, ScrapeError> {
    first_capture(&FORM_ACTION, html)
        .map(|action| action.replace("&amp;", "&"))
        .ok_or(ScrapeError::FormAction)
}

/// Pull the authorization code out of a redirect location
///
/// Prefers the three-segment dot-delimited code; falls back to any
/// `code=` value.
pub fn extract_code(location: &str) -> Result<String, ScrapeError> {
    first_capture(&CODE_STRICT, location)
        .or_else(|| first_capture(&CODE_LOOSE, location))
        .ok_or_else(|| ScrapeError::AuthorizationCode(location.to_string()))
}

/// The decoded `code` query parameter of an absolute URL
pub fn code_from_query(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9";

    #[test]
    fn test_session_key_url_encoded() {
        let url = format!(
            "https://idp.example/login?next=%2Fauthorize%3Fconnector_session_key%3D{}%26x%3D1",
            KEY
        );
        assert_eq!(extract_session_key(&url).unwrap(), KEY);
    }

    #[test]
    fn test_session_key_raw() {
        let url = format!("https://idp.example/login?connector_session_key={}&lang=de", KEY);
        assert_eq!(extract_session_key(&url).unwrap(), KEY);
    }

    #[test]
    fn test_session_key_missing() {
        let err = extract_session_key("https://idp.example/login?lang=de").unwrap_err();
        assert_eq!(
            err,
            ScrapeError::SessionKey("https://idp.example/login?lang=de".to_string())
        );
        // Too short to be a key
        assert!(extract_session_key("connector_session_key=abc").is_err());
    }

    #[test]
    fn test_form_action_unescapes_ampersands() {
        let html = "<html><body><form id='kc-form-login' method='post' \
                    action='https://login.example/auth?session_code=x&amp;execution=y&amp;tab_id=z'>\
                    <input name='username'/></form></body></html>";
        assert_eq!(
            extract_form_action(html).unwrap(),
            "https://login.example/auth?session_code=x&execution=y&tab_id=z"
        );
    }

    #[test]
    fn test_form_action_double_quotes_not_matched() {
        let html = r#"<form method="post" action="https://login.example/auth">"#;
        assert_eq!(extract_form_action(html), Err(ScrapeError::FormAction));
    }

    #[test]
    fn test_code_strict_pattern() {
        let code = format!("{}.{}.{}", KEY, KEY, KEY);
        let location = format!("https://api.example/redirect?code={}&state=ccsp", code);
        assert_eq!(extract_code(&location).unwrap(), code);
    }

    #[test]
    fn test_code_loose_fallback() {
        let location = "https://api.example/redirect?state=ccsp&code=short-code&x=1";
        assert_eq!(extract_code(location).unwrap(), "short-code");
    }

    #[test]
    fn test_code_missing() {
        assert!(matches!(
            extract_code("https://api.example/redirect?state=ccsp"),
            Err(ScrapeError::AuthorizationCode(_))
        ));
    }

    #[test]
    fn test_code_from_query() {
        let url = Url::parse("https://api.example/redirect?state=a%3Ab&code=abc%2Bdef").unwrap();
        assert_eq!(code_from_query(&url).as_deref(), Some("abc+def"));

        let url = Url::parse("https://api.example/redirect?code=").unwrap();
        assert_eq!(code_from_query(&url), None);
    }
}
