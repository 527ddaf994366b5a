//! Session context: who is looking at the triage view.
//!
//! The role picks which request list is loaded. Only [`Role::User`] viewers
//! have a [`ViewMode`]; administrators always see every request.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::core::errors::{CrvError, Result};

/// Capability level of the current viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Elevated role. Sees all requests, unfiltered.
    #[serde(alias = "ROLE_ADMIN", alias = "ADMIN")]
    Admin,
    #[serde(alias = "ROLE_USER", alias = "USER")]
    User,
}

impl Role {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(upper.as_str()) {
            "ADMIN" => Ok(Self::Admin),
            "USER" => Ok(Self::User),
            _ => Err(format!("unknown role {raw:?}")),
        }
    }
}

/// Which side of the request flow a USER viewer is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewMode {
    /// Requests the viewer submitted.
    #[default]
    ByMe,
    /// Requests waiting for the viewer's decision.
    FromMe,
}

impl ViewMode {
    #[must_use]
    pub const fn from_by_me(by_me: bool) -> Self {
        if by_me { Self::ByMe } else { Self::FromMe }
    }

    #[must_use]
    pub const fn is_by_me(self) -> bool {
        matches!(self, Self::ByMe)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ByMe => "by-me",
            Self::FromMe => "from-me",
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "by-me" | "byme" => Ok(Self::ByMe),
            "from-me" | "fromme" => Ok(Self::FromMe),
            _ => Err(format!("unknown view mode {raw:?} (expected by-me or from-me)")),
        }
    }
}

/// Source of the current viewer's role.
pub trait AuthProvider: Send + Sync {
    /// Read the role. Failure is unrecoverable for the triage view.
    fn role(&self) -> Result<Role>;
}

/// Fixed role, typically from config or a CLI flag.
#[derive(Debug, Clone, Copy)]
pub struct StaticSession {
    role: Role,
}

impl StaticSession {
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self { role }
    }
}

impl AuthProvider for StaticSession {
    fn role(&self) -> Result<Role> {
        Ok(self.role)
    }
}

/// Role decoded from the `role` claim of a JWT bearer token.
///
/// The signature is not checked; the backend enforces authorization and this
/// value only picks which list to show.
#[derive(Debug, Clone)]
pub struct TokenSession {
    token: Option<String>,
}

impl TokenSession {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl AuthProvider for TokenSession {
    fn role(&self) -> Result<Role> {
        let token = self.token.as_deref().ok_or_else(|| CrvError::Session {
            details: "no bearer token configured".to_string(),
        })?;
        role_from_jwt(token)
    }
}

/// Extract the `role` claim from a JWT payload.
pub fn role_from_jwt(token: &str) -> Result<Role> {
    let payload = token.split('.').nth(1).ok_or_else(|| CrvError::Session {
        details: "token is not a JWT (missing payload segment)".to_string(),
    })?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| CrvError::Session {
            details: format!("token payload is not base64url: {e}"),
        })?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| CrvError::Session {
            details: format!("token payload is not JSON: {e}"),
        })?;
    let raw = claims
        .get("role")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CrvError::Session {
            details: "token has no role claim".to_string(),
        })?;
    raw.parse::<Role>()
        .map_err(|details| CrvError::Session { details })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt(claims: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256"}"#),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    #[test]
    fn role_parses_spring_style_names() {
        assert_eq!("ROLE_ADMIN".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("role_user".parse::<Role>(), Ok(Role::User));
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert!("ROLE_AUDITOR".parse::<Role>().is_err());
    }

    #[test]
    fn role_serde_accepts_aliases() {
        let role: Role = serde_json::from_str(r#""ROLE_USER""#).unwrap();
        assert_eq!(role, Role::User);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), r#""admin""#);
    }

    #[test]
    fn view_mode_maps_toggle() {
        assert_eq!(ViewMode::from_by_me(true), ViewMode::ByMe);
        assert_eq!(ViewMode::from_by_me(false), ViewMode::FromMe);
        assert!(ViewMode::default().is_by_me());
        assert_eq!("from_me".parse::<ViewMode>(), Ok(ViewMode::FromMe));
        assert_eq!("By-Me".parse::<ViewMode>(), Ok(ViewMode::ByMe));
        assert!("everyone".parse::<ViewMode>().is_err());
    }

    #[test]
    fn token_session_reads_role_claim() {
        let session = TokenSession::new(Some(jwt(r#"{"sub":"ana@example.com","role":"ROLE_USER"}"#)));
        assert_eq!(session.role().unwrap(), Role::User);
    }

    #[test]
    fn token_without_role_is_session_error() {
        let session = TokenSession::new(Some(jwt(r#"{"sub":"ana@example.com"}"#)));
        let err = session.role().unwrap_err();
        assert_eq!(err.code(), "CRV-1101");
    }

    #[test]
    fn missing_token_is_session_error() {
        let err = TokenSession::new(None).role().unwrap_err();
        assert!(matches!(err, CrvError::Session { .. }));
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(role_from_jwt("not-a-jwt").is_err());
        assert!(role_from_jwt("a.!!!.c").is_err());
        let not_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        let err = role_from_jwt(&not_json).unwrap_err();
        assert_eq!(err.code(), "CRV-1101");
    }

    #[test]
    fn static_session_returns_fixed_role() {
        assert_eq!(StaticSession::new(Role::Admin).role().unwrap(), Role::Admin);
    }
}
