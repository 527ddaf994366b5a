//! Certificate request records, bucket partitioning, display formatting.

pub mod format;
pub mod partition;
pub mod record;

pub use partition::{Buckets, partition};
pub use record::{CertificateRequest, IssuerSummary, RequestId, RequestStatus};
