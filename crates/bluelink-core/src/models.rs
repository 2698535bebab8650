//! Credential and session models
//!
//! Secrets held here never appear in `Debug` output.

use std::fmt;

use serde::Deserialize;

/// Username/password pair used to log in
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token triple returned by a code or refresh exchange
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Access token, already prefixed with its token type
    pub access_token: String,
    /// Refresh token, prefixed the same way when the backend returned one
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    pub expires_in: i64,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Mutable authentication state for one user
///
/// Created empty, filled in by login, refreshed in place afterwards.
/// Expiry instants are seconds since the Unix epoch.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub device_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub control_token: Option<String>,
    pub token_expires_at: i64,
    pub control_token_expires_at: i64,
}

impl Session {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    /// True when an access token is set and non-empty
    pub fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the control token must be re-acquired at `now`
    pub fn control_token_stale(&self, now: i64) -> bool {
        self.control_token.as_deref().map_or(true, str::is_empty)
            || now > self.control_token_expires_at
    }

    /// Store a freshly exchanged token set
    ///
    /// A missing refresh token keeps the current one. The lifetime comes
    /// from the backend unchecked, so the expiry saturates.
    pub fn apply_tokens(&mut self, tokens: TokenSet, now: i64) {
        self.access_token = Some(tokens.access_token);
        if let Some(refresh) = tokens.refresh_token {
            self.refresh_token = Some(refresh);
        }
        self.token_expires_at = now.saturating_add(tokens.expires_in);
    }

    /// Drop the control token, forcing a new PIN challenge
    pub fn invalidate_control_token(&mut self) {
        self.control_token = None;
        self.control_token_expires_at = 0;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("Session")
            .field("device_id", &self.device_id)
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("control_token", &mask(&self.control_token))
            .field("token_expires_at", &self.token_expires_at)
            .field("control_token_expires_at", &self.control_token_expires_at)
            .finish()
    }
}

/// Prefix `token` with `token_type` unless it already carries it
///
/// Some backends hand back refresh tokens that are already prefixed and
/// some do not; applying this twice yields the same string as once.
pub fn prefix_token_type(token_type: &str, token: &str) -> String {
    if token.starts_with(token_type) {
        token.to_string()
    } else {
        format!("{} {}", token_type, token)
    }
}

/// Strip a leading `<type> ` prefix, if any
pub fn bare_token(token: &str) -> &str {
    token.split_once(' ').map_or(token, |(_, rest)| rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_token_type_is_idempotent() {
        let once = prefix_token_type("Bearer", "abc.def");
        let twice = prefix_token_type("Bearer", &once);
        assert_eq!(once, "Bearer abc.def");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_prefix_token_type_keeps_prefixed_refresh_token() {
        assert_eq!(prefix_token_type("Bearer", "Bearer xyz"), "Bearer xyz");
        assert_eq!(prefix_token_type("MAC", "xyz"), "MAC xyz");
    }

    #[test]
    fn test_bare_token() {
        assert_eq!(bare_token("Bearer abc"), "abc");
        assert_eq!(bare_token("abc"), "abc");
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("me@example.com"));
        assert!(!rendered.contains("hunter2"));

        let mut session = Session::new("device-1");
        session.access_token = Some("Bearer secret-access".to_string());
        session.refresh_token = Some("Bearer secret-refresh".to_string());
        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("device-1"));
    }

    #[test]
    fn test_apply_tokens_keeps_refresh_token_when_absent() {
        let mut session = Session::new("d");
        session.refresh_token = Some("Bearer old".to_string());
        session.apply_tokens(
            TokenSet {
                access_token: "Bearer new-access".to_string(),
                refresh_token: None,
                expires_in: 3600,
            },
            1_000,
        );
        assert_eq!(session.access_token.as_deref(), Some("Bearer new-access"));
        assert_eq!(session.refresh_token.as_deref(), Some("Bearer old"));
        assert_eq!(session.token_expires_at, 4_600);
    }

    #[test]
    fn test_apply_tokens_saturates_huge_lifetimes() {
        let mut session = Session::new("d");
        let tokens = |expires_in| TokenSet {
            access_token: "Bearer a".to_string(),
            refresh_token: None,
            expires_in,
        };

        session.apply_tokens(tokens(i64::MAX), 1_700_000_000);
        assert_eq!(session.token_expires_at, i64::MAX);

        session.apply_tokens(tokens(i64::MIN), -1);
        assert_eq!(session.token_expires_at, i64::MIN);
    }

    #[test]
    fn test_control_token_staleness() {
        let mut session = Session::new("d");
        assert!(session.control_token_stale(0));

        session.control_token = Some("Bearer ctl".to_string());
        session.control_token_expires_at = 100;
        assert!(!session.control_token_stale(100));
        assert!(session.control_token_stale(101));

        session.invalidate_control_token();
        assert!(session.control_token_stale(0));
    }
}
