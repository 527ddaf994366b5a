//! Which request list to load for a given viewer.

#![allow(missing_docs)]

use std::fmt;

use crate::core::errors::Result;
use crate::requests::CertificateRequest;
use crate::service::RequestService;
use crate::session::{Role, ViewMode};

/// The three list fetches the triage view can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestScope {
    /// Every request. Administrators only.
    All,
    /// Requests the viewer submitted.
    ByMe,
    /// Requests awaiting the viewer's decision.
    FromMe,
}

impl RequestScope {
    /// Pick the scope for a viewer. `view_mode` is ignored for administrators.
    #[must_use]
    pub const fn resolve(role: Role, view_mode: ViewMode) -> Self {
        match (role, view_mode) {
            (Role::Admin, _) => Self::All,
            (Role::User, ViewMode::ByMe) => Self::ByMe,
            (Role::User, ViewMode::FromMe) => Self::FromMe,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ByMe => "by-me",
            Self::FromMe => "from-me",
        }
    }

    /// Issue the fetch that belongs to this scope.
    pub fn fetch(self, service: &dyn RequestService) -> Result<Vec<CertificateRequest>> {
        match self {
            Self::All => service.get_all_requests(),
            Self::ByMe => service.get_requests_by_me(),
            Self::FromMe => service.get_requests_from_me(),
        }
    }
}

impl fmt::Display for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
