//! Property-based tests for triage reducer invariants.
//!
//! Arbitrary message sequences must keep the buckets a stable partition of
//! the loaded list, never let a superseded load overwrite newer data, and
//! never revive a disposed model.

use proptest::prelude::*;

use super::loader::RequestScope;
use super::model::{Tab, TriageCmd, TriageModel, TriageMsg, TriageSettings};
use super::update::update;
use crate::core::errors::CrvError;
use crate::requests::{CertificateRequest, RequestId, RequestStatus};
use crate::service::Decision;
use crate::session::{Role, ViewMode};

// ──────────────────── strategies ────────────────────

fn arb_status() -> impl Strategy<Value = RequestStatus> {
    prop_oneof![
        3 => Just(RequestStatus::Pending),
        1 => Just(RequestStatus::Accepted),
        1 => Just(RequestStatus::Declined),
        1 => Just(RequestStatus::Other("REVOKED".to_string())),
    ]
}

fn arb_requests() -> impl Strategy<Value = Vec<CertificateRequest>> {
    prop::collection::vec((1u64..20, arb_status()), 0..12).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(id, status)| CertificateRequest::new(id, status))
            .collect()
    })
}

fn arb_scope() -> impl Strategy<Value = RequestScope> {
    prop_oneof![
        Just(RequestScope::All),
        Just(RequestScope::ByMe),
        Just(RequestScope::FromMe),
    ]
}

/// Cloneable stand-in for [`TriageMsg`], which carries non-cloneable errors.
#[derive(Debug, Clone)]
enum Step {
    Start,
    ViewModeLoaded(Option<bool>),
    SetViewMode(ViewMode),
    Reload,
    Loaded {
        generation: u64,
        scope: RequestScope,
        result: Option<Vec<CertificateRequest>>,
    },
    ChangeTab(Tab),
    Select(RequestId),
    Accept,
    Decline,
    DecisionDone(bool),
    Shutdown,
}

impl Step {
    fn into_msg(self) -> TriageMsg {
        let failure = || CrvError::Transport {
            endpoint: "/api/request/all".to_string(),
            details: "injected".to_string(),
        };
        match self {
            Self::Start => TriageMsg::Start,
            Self::ViewModeLoaded(by_me) => TriageMsg::ViewModeLoaded(by_me.ok_or_else(failure)),
            Self::SetViewMode(mode) => TriageMsg::SetViewMode(mode),
            Self::Reload => TriageMsg::Reload,
            Self::Loaded {
                generation,
                scope,
                result,
            } => TriageMsg::Loaded {
                generation,
                scope,
                result: result.ok_or_else(failure),
            },
            Self::ChangeTab(tab) => TriageMsg::ChangeTab(tab),
            Self::Select(id) => TriageMsg::Select(id),
            Self::Accept => TriageMsg::Accept,
            Self::Decline => TriageMsg::Decline {
                reason: Some("rejected in property test".to_string()),
            },
            Self::DecisionDone(ok) => TriageMsg::DecisionDone {
                decision: Decision::Accept,
                id: 1,
                result: if ok { Ok(()) } else { Err(failure()) },
            },
            Self::Shutdown => TriageMsg::Shutdown,
        }
    }
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        2 => Just(Step::Start),
        1 => prop::option::of(any::<bool>()).prop_map(Step::ViewModeLoaded),
        1 => prop_oneof![Just(ViewMode::ByMe), Just(ViewMode::FromMe)].prop_map(Step::SetViewMode),
        2 => Just(Step::Reload),
        6 => (0u64..6, arb_scope(), prop::option::weighted(0.8, arb_requests())).prop_map(
            |(generation, scope, result)| Step::Loaded {
                generation,
                scope,
                result,
            }
        ),
        3 => prop_oneof![Just(Tab::Pending), Just(Tab::NotPending)].prop_map(Step::ChangeTab),
        3 => (1u64..20).prop_map(Step::Select),
        1 => Just(Step::Accept),
        1 => Just(Step::Decline),
        1 => any::<bool>().prop_map(Step::DecisionDone),
        1 => Just(Step::Shutdown),
    ]
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::User)]
}

// ──────────────────── invariants ────────────────────

fn assert_partition_invariants(model: &TriageModel) {
    assert!(model.buckets.pending.iter().all(CertificateRequest::is_pending));
    assert!(!model.buckets.not_pending.iter().any(CertificateRequest::is_pending));
    assert_eq!(model.buckets.len(), model.all_requests.len());

    let pending: Vec<RequestId> = model
        .all_requests
        .iter()
        .filter(|r| r.is_pending())
        .map(|r| r.id)
        .collect();
    let bucket: Vec<RequestId> = model.buckets.pending.iter().map(|r| r.id).collect();
    assert_eq!(pending, bucket, "pending bucket lost backend order");

    if model.role == Role::Admin {
        assert_eq!(model.view_mode, None);
    }
}

// ──────────────────── properties ────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any message sequence keeps the buckets a stable partition.
    #[test]
    fn reducer_preserves_partition(
        role in arb_role(),
        steps in prop::collection::vec(arb_step(), 1..40)
    ) {
        let mut model = TriageModel::new(role, TriageSettings::default());
        for step in steps {
            let _ = update(&mut model, step.into_msg());
            assert_partition_invariants(&model);
        }
    }

    /// Load generations never go backwards.
    #[test]
    fn generation_is_monotonic(
        role in arb_role(),
        steps in prop::collection::vec(arb_step(), 1..40)
    ) {
        let mut model = TriageModel::new(role, TriageSettings::default());
        let mut last = model.load_generation;
        for step in steps {
            let _ = update(&mut model, step.into_msg());
            prop_assert!(model.load_generation >= last);
            last = model.load_generation;
        }
    }

    /// A completion tagged with an old generation leaves the data alone.
    #[test]
    fn stale_completion_never_applies(
        first in arb_requests(),
        stale in arb_requests(),
    ) {
        let mut model = TriageModel::new(Role::Admin, TriageSettings::default());
        let _ = update(&mut model, TriageMsg::Start);
        let _ = update(&mut model, TriageMsg::Reload);
        let current = model.load_generation;
        let _ = update(&mut model, TriageMsg::Loaded {
            generation: current,
            scope: RequestScope::All,
            result: Ok(first.clone()),
        });
        let _ = update(&mut model, TriageMsg::Loaded {
            generation: current - 1,
            scope: RequestScope::All,
            result: Ok(stale),
        });
        prop_assert_eq!(model.all_requests, first);
    }

    /// After a tab change the selection is either cleared or displayed.
    #[test]
    fn tab_change_keeps_selection_visible(
        requests in arb_requests(),
        id in 1u64..20,
        tab in prop_oneof![Just(Tab::Pending), Just(Tab::NotPending)],
    ) {
        let mut model = TriageModel::new(Role::Admin, TriageSettings::default());
        let _ = update(&mut model, TriageMsg::Start);
        let generation = model.load_generation;
        let _ = update(&mut model, TriageMsg::Loaded {
            generation,
            scope: RequestScope::All,
            result: Ok(requests),
        });
        let _ = update(&mut model, TriageMsg::Select(id));
        let _ = update(&mut model, TriageMsg::ChangeTab(tab));
        if let Some(selected) = model.selected {
            prop_assert!(model.displayed().iter().any(|r| r.id == selected));
        }
    }

    /// Once disposed, every message is ignored and no command escapes.
    #[test]
    fn disposal_is_terminal(
        role in arb_role(),
        steps in prop::collection::vec(arb_step(), 0..20),
        after in prop::collection::vec(arb_step(), 1..20),
    ) {
        let mut model = TriageModel::new(role, TriageSettings::default());
        for step in steps {
            let _ = update(&mut model, step.into_msg());
        }
        let _ = update(&mut model, TriageMsg::Shutdown);
        let ids: Vec<RequestId> = model.all_requests.iter().map(|r| r.id).collect();
        for step in after {
            prop_assert_eq!(update(&mut model, step.into_msg()), TriageCmd::None);
        }
        prop_assert!(model.disposed);
        let after_ids: Vec<RequestId> = model.all_requests.iter().map(|r| r.id).collect();
        prop_assert_eq!(ids, after_ids);
    }
}
