//! Request-service boundary: the backend operations the triage view consumes.
//!
//! [`RequestService`] is the seam between the deterministic triage model and
//! the outside world. [`http::HttpRequestService`] talks to the real backend;
//! [`memory::InMemoryRequestService`] is a scripted stand-in for tests and
//! demos.

#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;

use crate::core::errors::Result;
use crate::requests::{CertificateRequest, RequestId};

pub mod http;
pub mod memory;

pub use http::HttpRequestService;
pub use memory::{CallKind, InMemoryRequestService, ServiceCall};

/// Backend operations used by the triage view.
///
/// Every method is a single blocking round trip; the runtime runs them off
/// the caller's thread.
pub trait RequestService: Send + Sync {
    /// Whether the viewer last chose the "requests by me" list.
    fn is_by_me_selected(&self) -> Result<bool>;

    /// Persist the viewer's by-me / from-me choice.
    fn set_by_me_selected(&self, by_me: bool) -> Result<()>;

    /// Every request in the system. Privileged.
    fn get_all_requests(&self) -> Result<Vec<CertificateRequest>>;

    /// Requests the viewer submitted.
    fn get_requests_by_me(&self) -> Result<Vec<CertificateRequest>>;

    /// Requests awaiting the viewer's decision.
    fn get_requests_from_me(&self) -> Result<Vec<CertificateRequest>>;

    fn accept_request(&self, id: RequestId) -> Result<()>;

    fn decline_request(&self, id: RequestId, reason: Option<&str>) -> Result<()>;
}

/// A mutating triage decision on one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
