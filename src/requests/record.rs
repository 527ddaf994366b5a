//! Certificate request records as returned by the backend.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Stable backend identifier of a certificate request.
pub type RequestId = u64;

/// Lifecycle status of a request. Only the backend changes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Pending,
    Accepted,
    /// Spelled `DENIED` by the backend, `DECLINED` by older clients.
    Declined,
    /// Any status this client does not know about. Never pending.
    Other(String),
}

impl RequestStatus {
    /// Wire spelling used by the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DENIED",
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "ACCEPTED" => Self::Accepted,
            "DENIED" | "DECLINED" => Self::Declined,
            _ => Self::Other(raw.to_string()),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RequestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Issuer certificate summary attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct IssuerSummary {
    pub serial_number: Option<String>,
    /// E-mail of the user the issuer certificate was issued to.
    pub issued_to: Option<String>,
}

/// A certificate request row.
///
/// Field names follow the backend DTO (camelCase). Everything except `id`
/// and `status` is display-only and optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub id: RequestId,
    pub status: RequestStatus,
    #[serde(default, alias = "date", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub certificate_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<IssuerSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl CertificateRequest {
    /// Minimal record with only the fields the triage logic needs.
    #[must_use]
    pub fn new(id: RequestId, status: RequestStatus) -> Self {
        Self {
            id,
            status,
            created_at: None,
            certificate_type: None,
            issuer_serial_number: None,
            issuer: None,
            requester: None,
            rejection_reason: None,
        }
    }

    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    #[must_use]
    pub fn with_certificate_type(mut self, certificate_type: impl Into<String>) -> Self {
        self.certificate_type = Some(certificate_type.into());
        self
    }

    #[must_use]
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Serial of the issuing certificate, from whichever field the backend filled.
    #[must_use]
    pub fn issuer_serial(&self) -> Option<&str> {
        self.issuer_serial_number
            .as_deref()
            .or_else(|| self.issuer.as_ref()?.serial_number.as_deref())
    }
}
