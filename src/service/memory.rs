//! In-process request service with call recording and failure injection.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::RequestService;
use crate::core::errors::{CrvError, Result};
use crate::requests::{CertificateRequest, IssuerSummary, RequestId, RequestStatus};

/// Kind of backend call, without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    IsByMeSelected,
    SetByMeSelected,
    GetAll,
    GetByMe,
    GetFromMe,
    Accept,
    Decline,
}

/// One recorded call, with arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    IsByMeSelected,
    SetByMeSelected(bool),
    GetAll,
    GetByMe,
    GetFromMe,
    Accept(RequestId),
    Decline(RequestId, Option<String>),
}

impl ServiceCall {
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::IsByMeSelected => CallKind::IsByMeSelected,
            Self::SetByMeSelected(_) => CallKind::SetByMeSelected,
            Self::GetAll => CallKind::GetAll,
            Self::GetByMe => CallKind::GetByMe,
            Self::GetFromMe => CallKind::GetFromMe,
            Self::Accept(_) => CallKind::Accept,
            Self::Decline(..) => CallKind::Decline,
        }
    }
}

#[derive(Debug)]
struct State {
    requests: Vec<CertificateRequest>,
    by_me_selected: bool,
    calls: Vec<ServiceCall>,
    failing: HashSet<CallKind>,
    latency: Duration,
}

/// Scripted backend.
///
/// "By me" means `requester == viewer`; "from me" means the issuer
/// certificate was issued to the viewer. Accept/decline mutate the stored
/// status the way the real backend does, including rejecting non-pending
/// requests.
#[derive(Debug)]
pub struct InMemoryRequestService {
    viewer: String,
    state: Mutex<State>,
}

impl InMemoryRequestService {
    #[must_use]
    pub fn new(viewer: impl Into<String>, requests: Vec<CertificateRequest>) -> Self {
        Self {
            viewer: viewer.into(),
            state: Mutex::new(State {
                requests,
                by_me_selected: true,
                calls: Vec::new(),
                failing: HashSet::new(),
                latency: Duration::ZERO,
            }),
        }
    }

    /// Small fixed data set used by `crv --demo`.
    #[must_use]
    pub fn demo() -> Self {
        let viewer = "demo@example.com";
        let issued_by = |serial: &str, owner: &str| IssuerSummary {
            serial_number: Some(serial.to_string()),
            issued_to: Some(owner.to_string()),
        };
        let mut requests = vec![
            CertificateRequest::new(1, RequestStatus::Pending)
                .with_created_at("2024-05-02T09:41:00")
                .with_certificate_type("END")
                .with_requester("ana@example.com"),
            CertificateRequest::new(2, RequestStatus::Accepted)
                .with_created_at("2024-04-18T16:03:00")
                .with_certificate_type("INTERMEDIATE")
                .with_requester(viewer),
            CertificateRequest::new(3, RequestStatus::Pending)
                .with_created_at("2024-05-03T11:20:00")
                .with_certificate_type("END")
                .with_requester("milan@example.com"),
            CertificateRequest::new(4, RequestStatus::Declined)
                .with_created_at("2024-03-29T08:00:00")
                .with_certificate_type("END")
                .with_requester(viewer),
        ];
        requests[0].issuer = Some(issued_by("5c1e", viewer));
        requests[1].issuer = Some(issued_by("0001", "root@example.com"));
        requests[2].issuer = Some(issued_by("5c1e", viewer));
        requests[3].issuer = Some(issued_by("0001", "root@example.com"));
        requests[3].rejection_reason = Some("duplicate subject".to_string());
        Self::new(viewer, requests)
    }

    #[must_use]
    pub fn with_by_me_selected(self, by_me: bool) -> Self {
        self.state.lock().by_me_selected = by_me;
        self
    }

    /// Make every future call of `kind` fail with a transport error.
    pub fn fail(&self, kind: CallKind) {
        self.state.lock().failing.insert(kind);
    }

    pub fn recover(&self, kind: CallKind) {
        self.state.lock().failing.remove(&kind);
    }

    /// Delay applied to every call before it answers.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Replace the stored requests.
    pub fn set_requests(&self, requests: Vec<CertificateRequest>) {
        self.state.lock().requests = requests;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    #[must_use]
    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    #[must_use]
    pub fn status_of(&self, id: RequestId) -> Option<RequestStatus> {
        self.state
            .lock()
            .requests
            .iter()
            .find(|req| req.id == id)
            .map(|req| req.status.clone())
    }

    /// Record the call, sleep for the configured latency, then check failure injection.
    fn enter(&self, call: ServiceCall) -> Result<()> {
        let kind = call.kind();
        let (latency, failing) = {
            let mut state = self.state.lock();
            state.calls.push(call);
            (state.latency, state.failing.contains(&kind))
        };
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        if failing {
            return Err(CrvError::Transport {
                endpoint: format!("memory:{kind:?}"),
                details: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn filtered<F>(&self, keep: F) -> Vec<CertificateRequest>
    where
        F: Fn(&CertificateRequest) -> bool,
    {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|req| keep(req))
            .cloned()
            .collect()
    }

    fn decide(&self, id: RequestId, status: RequestStatus, reason: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        let req = state
            .requests
            .iter_mut()
            .find(|req| req.id == id)
            .ok_or(CrvError::NotFound { id })?;
        if !req.is_pending() {
            return Err(CrvError::Rejected {
                endpoint: format!("memory:{id}"),
                details: "request is not pending".to_string(),
            });
        }
        req.status = status;
        req.rejection_reason = reason.map(str::to_string);
        Ok(())
    }
}

impl RequestService for InMemoryRequestService {
    fn is_by_me_selected(&self) -> Result<bool> {
        self.enter(ServiceCall::IsByMeSelected)?;
        Ok(self.state.lock().by_me_selected)
    }

    fn set_by_me_selected(&self, by_me: bool) -> Result<()> {
        self.enter(ServiceCall::SetByMeSelected(by_me))?;
        self.state.lock().by_me_selected = by_me;
        Ok(())
    }

    fn get_all_requests(&self) -> Result<Vec<CertificateRequest>> {
        self.enter(ServiceCall::GetAll)?;
        Ok(self.filtered(|_| true))
    }

    fn get_requests_by_me(&self) -> Result<Vec<CertificateRequest>> {
        self.enter(ServiceCall::GetByMe)?;
        Ok(self.filtered(|req| req.requester.as_deref() == Some(self.viewer.as_str())))
    }

    fn get_requests_from_me(&self) -> Result<Vec<CertificateRequest>> {
        self.enter(ServiceCall::GetFromMe)?;
        Ok(self.filtered(|req| {
            req.issuer
                .as_ref()
                .and_then(|issuer| issuer.issued_to.as_deref())
                == Some(self.viewer.as_str())
        }))
    }

    fn accept_request(&self, id: RequestId) -> Result<()> {
        self.enter(ServiceCall::Accept(id))?;
        self.decide(id, RequestStatus::Accepted, None)
    }

    fn decline_request(&self, id: RequestId, reason: Option<&str>) -> Result<()> {
        self.enter(ServiceCall::Decline(id, reason.map(str::to_string)))?;
        self.decide(id, RequestStatus::Declined, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scopes_split_by_viewer() {
        let svc = InMemoryRequestService::demo();
        let all: Vec<RequestId> = svc.get_all_requests().unwrap().iter().map(|r| r.id).collect();
        let by_me: Vec<RequestId> = svc.get_requests_by_me().unwrap().iter().map(|r| r.id).collect();
        let from_me: Vec<RequestId> =
            svc.get_requests_from_me().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(by_me, vec![2, 4]);
        assert_eq!(from_me, vec![1, 3]);
    }

    #[test]
    fn accept_moves_status_and_records_call() {
        let svc = InMemoryRequestService::demo();
        svc.accept_request(3).unwrap();
        assert_eq!(svc.status_of(3), Some(RequestStatus::Accepted));
        assert_eq!(svc.calls(), vec![ServiceCall::Accept(3)]);
    }

    #[test]
    fn deciding_twice_is_rejected() {
        let svc = InMemoryRequestService::demo();
        svc.decline_request(1, Some("bad csr")).unwrap();
        let err = svc.accept_request(1).unwrap_err();
        assert_eq!(err.code(), "CRV-2005");
        assert_eq!(svc.count(CallKind::Accept), 1);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let svc = InMemoryRequestService::demo();
        assert!(matches!(
            svc.accept_request(99),
            Err(CrvError::NotFound { id: 99 })
        ));
    }

    #[test]
    fn injected_failures_can_be_cleared() {
        let svc = InMemoryRequestService::demo();
        svc.fail(CallKind::GetByMe);
        assert!(svc.get_requests_by_me().is_err());
        svc.recover(CallKind::GetByMe);
        assert!(svc.get_requests_by_me().is_ok());
        assert_eq!(svc.count(CallKind::GetByMe), 2);
    }

    #[test]
    fn toggle_round_trips() {
        let svc = InMemoryRequestService::demo().with_by_me_selected(false);
        assert!(!svc.is_by_me_selected().unwrap());
        svc.set_by_me_selected(true).unwrap();
        assert!(svc.is_by_me_selected().unwrap());
    }
}
