//! CRV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, CrvError>;

/// Top-level error type for cert_review.
#[derive(Debug, Error)]
pub enum CrvError {
    #[error("[CRV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[CRV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[CRV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[CRV-1101] session unavailable: {details}")]
    Session { details: String },

    #[error("[CRV-2001] transport failure calling {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("[CRV-2002] backend returned HTTP {status} for {endpoint}")]
    Http { endpoint: String, status: u16 },

    #[error("[CRV-2003] not permitted: {endpoint}")]
    Forbidden { endpoint: String },

    #[error("[CRV-2004] request {id} not found")]
    NotFound { id: u64 },

    #[error("[CRV-2005] backend rejected {endpoint}: {details}")]
    Rejected { endpoint: String, details: String },

    #[error("[CRV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[CRV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CRV-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[CRV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl CrvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "CRV-1001",
            Self::MissingConfig { .. } => "CRV-1002",
            Self::ConfigParse { .. } => "CRV-1003",
            Self::Session { .. } => "CRV-1101",
            Self::Transport { .. } => "CRV-2001",
            Self::Http { .. } => "CRV-2002",
            Self::Forbidden { .. } => "CRV-2003",
            Self::NotFound { .. } => "CRV-2004",
            Self::Rejected { .. } => "CRV-2005",
            Self::Serialization { .. } => "CRV-2101",
            Self::Io { .. } => "CRV-3002",
            Self::ChannelClosed { .. } => "CRV-3003",
            Self::Runtime { .. } => "CRV-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            Self::Transport { .. }
            | Self::Io { .. }
            | Self::ChannelClosed { .. }
            | Self::Runtime { .. } => true,
            _ => false,
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for CrvError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for CrvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<CrvError> {
        vec![
            CrvError::InvalidConfig {
                details: String::new(),
            },
            CrvError::MissingConfig {
                path: PathBuf::new(),
            },
            CrvError::ConfigParse {
                context: "",
                details: String::new(),
            },
            CrvError::Session {
                details: String::new(),
            },
            CrvError::Transport {
                endpoint: String::new(),
                details: String::new(),
            },
            CrvError::Http {
                endpoint: String::new(),
                status: 500,
            },
            CrvError::Forbidden {
                endpoint: String::new(),
            },
            CrvError::NotFound { id: 0 },
            CrvError::Rejected {
                endpoint: String::new(),
                details: String::new(),
            },
            CrvError::Serialization {
                context: "",
                details: String::new(),
            },
            CrvError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            CrvError::ChannelClosed { component: "" },
            CrvError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(CrvError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_includes_code_prefix() {
        for err in all_variants() {
            let rendered = err.to_string();
            assert!(
                rendered.starts_with(&format!("[{}]", err.code())),
                "{rendered} should start with its code"
            );
        }
    }

    #[test]
    fn only_server_side_http_errors_are_retryable() {
        let server = CrvError::Http {
            endpoint: "/api/request/all".to_string(),
            status: 503,
        };
        let client = CrvError::Http {
            endpoint: "/api/request/all".to_string(),
            status: 418,
        };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!CrvError::NotFound { id: 7 }.is_retryable());
    }

    #[test]
    fn serde_json_errors_convert() {
        let err: CrvError = serde_json::from_str::<u64>("nope").unwrap_err().into();
        assert_eq!(err.code(), "CRV-2101");
    }
}
