#![forbid(unsafe_code)]

//! cert_review (crv): triage view for certificate signing requests.
//!
//! Fetches the requests visible to the current viewer, splits them into
//! pending and not-pending tabs, and forwards accept/decline decisions to the
//! certificate-manager backend.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use cert_review::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use cert_review::core::config::Config;
//! use cert_review::triage::runtime::TriageRuntime;
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod requests;
pub mod service;
pub mod session;
pub mod triage;
