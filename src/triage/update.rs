//! Pure update function for the triage view.
//!
//! `update()` takes the current model and a message, mutates the model, and
//! returns a command describing any side-effects the runtime should execute.
//!
//! **Design invariant:** this module performs zero I/O. All effects are
//! described as [`TriageCmd`] values.

use super::model::{LoadState, TriageCmd, TriageModel, TriageMsg};
use crate::service::Decision;
use crate::session::{Role, ViewMode};

/// Apply a message to the model and return the next command for the runtime.
pub fn update(model: &mut TriageModel, msg: TriageMsg) -> TriageCmd {
    if model.disposed {
        return TriageCmd::None;
    }

    match msg {
        TriageMsg::Start | TriageMsg::Reload => issue_load(model),

        TriageMsg::ViewModeLoaded(result) => {
            if model.role == Role::Admin || model.view_mode.is_some() {
                return TriageCmd::None;
            }
            // An unreadable toggle falls back to the by-me list.
            let by_me = result.unwrap_or(true);
            model.view_mode = Some(ViewMode::from_by_me(by_me));
            issue_load(model)
        }

        TriageMsg::SetViewMode(mode) => {
            if model.role == Role::Admin || model.view_mode == Some(mode) {
                return TriageCmd::None;
            }
            model.view_mode = Some(mode);
            model.selected = None;
            TriageCmd::Batch(vec![TriageCmd::PersistViewMode(mode), issue_load(model)])
        }

        TriageMsg::Loaded {
            generation,
            scope,
            result,
        } => {
            if generation != model.load_generation {
                // Superseded by a newer load.
                return TriageCmd::None;
            }
            match result {
                Ok(requests) => model.apply_load(scope, requests),
                Err(err) => model.fail_load(scope, &err),
            }
            TriageCmd::None
        }

        TriageMsg::ChangeTab(tab) => {
            model.change_tab(tab);
            TriageCmd::None
        }

        TriageMsg::Select(id) => {
            model.selected = Some(id);
            TriageCmd::None
        }

        TriageMsg::Accept => decide(model, Decision::Accept, None),

        TriageMsg::Decline { reason } => decide(model, Decision::Decline, reason),

        TriageMsg::DecisionDone { result, .. } => {
            // Failures are reported by the runtime; the model and selection stay as they are.
            if result.is_ok() && model.refresh_after_action {
                issue_load(model)
            } else {
                TriageCmd::None
            }
        }

        TriageMsg::Shutdown => {
            model.disposed = true;
            TriageCmd::CancelInFlight
        }
    }
}

/// Start a load for the current scope, or resolve the view mode first.
fn issue_load(model: &mut TriageModel) -> TriageCmd {
    match model.scope() {
        Some(scope) => {
            let generation = model.next_generation();
            model.load_state = LoadState::Loading { generation, scope };
            TriageCmd::Load { generation, scope }
        }
        None => {
            model.load_state = LoadState::ResolvingViewMode;
            TriageCmd::ReadViewMode
        }
    }
}

fn decide(model: &TriageModel, decision: Decision, reason: Option<String>) -> TriageCmd {
    match model.selected {
        Some(id) => TriageCmd::Decide {
            decision,
            id,
            reason,
        },
        None => TriageCmd::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::CrvError;
    use crate::requests::{CertificateRequest, RequestId, RequestStatus};
    use crate::triage::loader::RequestScope;
    use crate::triage::model::{Tab, TriageSettings};

    fn req(id: RequestId, status: RequestStatus) -> CertificateRequest {
        CertificateRequest::new(id, status)
    }

    fn sample() -> Vec<CertificateRequest> {
        vec![
            req(1, RequestStatus::Pending),
            req(2, RequestStatus::Accepted),
            req(3, RequestStatus::Pending),
        ]
    }

    fn transport_error() -> CrvError {
        CrvError::Transport {
            endpoint: "/api/request/by-me".to_string(),
            details: "connection reset".to_string(),
        }
    }

    fn displayed_ids(model: &TriageModel) -> Vec<RequestId> {
        model.displayed().iter().map(|r| r.id).collect()
    }

    /// Start an admin model and complete its first load with `sample()`.
    fn started_admin() -> TriageModel {
        let mut model = TriageModel::new(Role::Admin, TriageSettings::default());
        let cmd = update(&mut model, TriageMsg::Start);
        let TriageCmd::Load { generation, scope } = cmd else {
            panic!("expected load, got {cmd:?}");
        };
        update(
            &mut model,
            TriageMsg::Loaded {
                generation,
                scope,
                result: Ok(sample()),
            },
        );
        model
    }

    #[test]
    fn admin_start_loads_all_without_reading_toggle() {
        let mut model = TriageModel::new(Role::Admin, TriageSettings::default());
        let cmd = update(&mut model, TriageMsg::Start);
        assert_eq!(
            cmd,
            TriageCmd::Load {
                generation: 1,
                scope: RequestScope::All
            }
        );
        assert!(model.is_loading());
    }

    #[test]
    fn admin_scenario_partitions_and_displays_pending() {
        let model = started_admin();
        assert_eq!(displayed_ids(&model), vec![1, 3]);
        let not_pending: Vec<RequestId> = model.buckets.not_pending.iter().map(|r| r.id).collect();
        assert_eq!(not_pending, vec![2]);
    }

    #[test]
    fn user_start_reads_toggle_then_loads() {
        let mut model = TriageModel::new(Role::User, TriageSettings::default());
        assert_eq!(update(&mut model, TriageMsg::Start), TriageCmd::ReadViewMode);
        assert_eq!(model.load_state, LoadState::ResolvingViewMode);

        let cmd = update(&mut model, TriageMsg::ViewModeLoaded(Ok(false)));
        assert_eq!(model.view_mode, Some(ViewMode::FromMe));
        assert_eq!(
            cmd,
            TriageCmd::Load {
                generation: 1,
                scope: RequestScope::FromMe
            }
        );
    }

    #[test]
    fn unreadable_toggle_falls_back_to_by_me() {
        let mut model = TriageModel::new(Role::User, TriageSettings::default());
        update(&mut model, TriageMsg::Start);
        let cmd = update(&mut model, TriageMsg::ViewModeLoaded(Err(transport_error())));
        assert_eq!(model.view_mode, Some(ViewMode::ByMe));
        assert!(matches!(
            cmd,
            TriageCmd::Load {
                scope: RequestScope::ByMe,
                ..
            }
        ));
    }

    #[test]
    fn view_mode_override_skips_toggle_read() {
        let settings = TriageSettings {
            view_mode_override: Some(ViewMode::FromMe),
            ..TriageSettings::default()
        };
        let mut model = TriageModel::new(Role::User, settings);
        assert!(matches!(
            update(&mut model, TriageMsg::Start),
            TriageCmd::Load {
                scope: RequestScope::FromMe,
                ..
            }
        ));
    }

    #[test]
    fn user_fetch_error_empties_displayed_list() {
        let settings = TriageSettings {
            view_mode_override: Some(ViewMode::ByMe),
            ..TriageSettings::default()
        };
        let mut model = TriageModel::new(Role::User, settings);
        let TriageCmd::Load { generation, scope } = update(&mut model, TriageMsg::Start) else {
            panic!("expected load");
        };
        update(
            &mut model,
            TriageMsg::Loaded {
                generation,
                scope,
                result: Ok(sample()),
            },
        );
        assert_eq!(displayed_ids(&model), vec![1, 3]);

        let TriageCmd::Load { generation, scope } = update(&mut model, TriageMsg::Reload) else {
            panic!("expected reload");
        };
        update(
            &mut model,
            TriageMsg::Loaded {
                generation,
                scope,
                result: Err(transport_error()),
            },
        );
        assert!(displayed_ids(&model).is_empty());
        assert!(matches!(model.load_state, LoadState::Failed { .. }));
    }

    #[test]
    fn stale_load_completion_is_ignored() {
        let mut model = TriageModel::new(Role::Admin, TriageSettings::default());
        let TriageCmd::Load { generation: first, .. } = update(&mut model, TriageMsg::Start) else {
            panic!("expected load");
        };
        let TriageCmd::Load { generation: second, .. } = update(&mut model, TriageMsg::Reload)
        else {
            panic!("expected load");
        };

        update(
            &mut model,
            TriageMsg::Loaded {
                generation: second,
                scope: RequestScope::All,
                result: Ok(vec![req(7, RequestStatus::Pending)]),
            },
        );
        // The older request finishes last; it must not overwrite the newer data.
        update(
            &mut model,
            TriageMsg::Loaded {
                generation: first,
                scope: RequestScope::All,
                result: Ok(sample()),
            },
        );
        assert_eq!(displayed_ids(&model), vec![7]);
    }

    #[test]
    fn accept_without_selection_is_a_no_op() {
        let mut model = started_admin();
        assert_eq!(update(&mut model, TriageMsg::Accept), TriageCmd::None);
        assert_eq!(
            update(&mut model, TriageMsg::Decline { reason: None }),
            TriageCmd::None
        );
    }

    #[test]
    fn accept_issues_one_decision_and_keeps_selection() {
        let mut model = started_admin();
        update(&mut model, TriageMsg::Select(3));
        assert_eq!(
            update(&mut model, TriageMsg::Accept),
            TriageCmd::Decide {
                decision: Decision::Accept,
                id: 3,
                reason: None
            }
        );

        let cmd = update(
            &mut model,
            TriageMsg::DecisionDone {
                decision: Decision::Accept,
                id: 3,
                result: Ok(()),
            },
        );
        assert_eq!(model.selected, Some(3));
        assert!(matches!(cmd, TriageCmd::Load { .. }));
    }

    #[test]
    fn decline_forwards_reason() {
        let mut model = started_admin();
        update(&mut model, TriageMsg::Select(1));
        assert_eq!(
            update(
                &mut model,
                TriageMsg::Decline {
                    reason: Some("wrong issuer".to_string())
                }
            ),
            TriageCmd::Decide {
                decision: Decision::Decline,
                id: 1,
                reason: Some("wrong issuer".to_string())
            }
        );
    }

    #[test]
    fn legacy_mode_does_not_refresh_after_action() {
        let settings = TriageSettings {
            refresh_after_action: false,
            ..TriageSettings::default()
        };
        let mut model = TriageModel::new(Role::Admin, settings);
        update(&mut model, TriageMsg::Start);
        update(&mut model, TriageMsg::Select(1));
        let cmd = update(
            &mut model,
            TriageMsg::DecisionDone {
                decision: Decision::Accept,
                id: 1,
                result: Ok(()),
            },
        );
        assert_eq!(cmd, TriageCmd::None);
    }

    #[test]
    fn failed_decision_leaves_state_untouched() {
        let mut model = started_admin();
        update(&mut model, TriageMsg::Select(1));
        let generation = model.load_generation;
        let cmd = update(
            &mut model,
            TriageMsg::DecisionDone {
                decision: Decision::Decline,
                id: 1,
                result: Err(transport_error()),
            },
        );
        assert_eq!(cmd, TriageCmd::None);
        assert_eq!(model.selected, Some(1));
        assert_eq!(model.load_generation, generation);
        assert_eq!(displayed_ids(&model), vec![1, 3]);
    }

    #[test]
    fn tab_round_trip_matches_single_switch() {
        let mut model = started_admin();
        update(&mut model, TriageMsg::ChangeTab(Tab::Pending));
        update(&mut model, TriageMsg::ChangeTab(Tab::NotPending));
        update(&mut model, TriageMsg::ChangeTab(Tab::Pending));
        let round_trip = displayed_ids(&model);

        let direct = started_admin();
        assert_eq!(round_trip, displayed_ids(&direct));
    }

    #[test]
    fn set_view_mode_persists_and_reloads() {
        let settings = TriageSettings {
            view_mode_override: Some(ViewMode::ByMe),
            ..TriageSettings::default()
        };
        let mut model = TriageModel::new(Role::User, settings);
        update(&mut model, TriageMsg::Start);
        update(&mut model, TriageMsg::Select(1));

        let cmds = update(&mut model, TriageMsg::SetViewMode(ViewMode::FromMe)).flatten();
        assert_eq!(cmds[0], TriageCmd::PersistViewMode(ViewMode::FromMe));
        assert!(matches!(
            cmds[1],
            TriageCmd::Load {
                scope: RequestScope::FromMe,
                ..
            }
        ));
        assert_eq!(model.selected, None);

        assert_eq!(
            update(&mut model, TriageMsg::SetViewMode(ViewMode::FromMe)),
            TriageCmd::None
        );
    }

    #[test]
    fn admin_ignores_view_mode_changes() {
        let mut model = started_admin();
        assert_eq!(
            update(&mut model, TriageMsg::SetViewMode(ViewMode::FromMe)),
            TriageCmd::None
        );
        assert_eq!(model.view_mode, None);
    }

    #[test]
    fn shutdown_disposes_and_ignores_later_messages() {
        let mut model = started_admin();
        assert_eq!(update(&mut model, TriageMsg::Shutdown), TriageCmd::CancelInFlight);
        assert!(model.disposed);

        update(&mut model, TriageMsg::Select(1));
        assert_eq!(model.selected, None);
        assert_eq!(update(&mut model, TriageMsg::Reload), TriageCmd::None);
    }
}
