//! Stable pending / not-pending partition of a loaded request list.

use super::record::{CertificateRequest, RequestId};

/// The two in-memory buckets derived from the most recent load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    pub pending: Vec<CertificateRequest>,
    pub not_pending: Vec<CertificateRequest>,
}

impl Buckets {
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len() + self.not_pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.not_pending.is_empty()
    }

    /// Whether either bucket holds a request with `id`.
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.pending
            .iter()
            .chain(&self.not_pending)
            .any(|req| req.id == id)
    }
}

/// Split `requests` on `status == PENDING` in a single pass.
///
/// Relative order inside each bucket matches the input. The result never
/// shares state with any previous partition.
#[must_use]
pub fn partition(requests: &[CertificateRequest]) -> Buckets {
    let (pending, not_pending): (Vec<_>, Vec<_>) = requests
        .iter()
        .cloned()
        .partition(CertificateRequest::is_pending);
    Buckets {
        pending,
        not_pending,
    }
}
