//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use cert_review::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{CrvError, Result};

// Requests
pub use crate::requests::{Buckets, CertificateRequest, RequestId, RequestStatus, partition};

// Session
pub use crate::session::{AuthProvider, Role, StaticSession, TokenSession, ViewMode};

// Service
pub use crate::service::{Decision, HttpRequestService, InMemoryRequestService, RequestService};

// Triage
pub use crate::triage::{
    ActionReport, RequestScope, Tab, TriageModel, TriageMsg, TriageRuntime, TriageSettings,
};
