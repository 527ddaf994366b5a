//! Elm-style state model for the request triage view.
//!
//! All view state lives in [`TriageModel`]. User intents and backend results
//! arrive as [`TriageMsg`] values; side-effects are represented as
//! [`TriageCmd`] values returned from the update function.
//!
//! No I/O happens here.

#![allow(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CrvError, Result};
use crate::requests::{Buckets, CertificateRequest, RequestId, partition};
use crate::service::Decision;
use crate::session::{Role, ViewMode};
use crate::triage::loader::RequestScope;

// ──────────────────── tabs ────────────────────

/// The two tabs of the triage view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tab {
    #[default]
    Pending,
    NotPending,
}

impl Tab {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::NotPending => "not-pending",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pending" => Ok(Self::Pending),
            "not-pending" | "notpending" => Ok(Self::NotPending),
            _ => Err(format!("unknown tab {raw:?} (expected pending or not-pending)")),
        }
    }
}

// ──────────────────── load state ────────────────────

/// Progress of the most recently issued list load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing issued yet.
    Idle,
    /// Waiting for the viewer's by-me / from-me choice.
    ResolvingViewMode,
    Loading { generation: u64, scope: RequestScope },
    Loaded { scope: RequestScope, count: usize },
    /// The last load failed; the buckets were reset to empty. Retriable via reload.
    Failed {
        scope: RequestScope,
        code: &'static str,
        message: String,
        retryable: bool,
    },
}

// ──────────────────── settings ────────────────────

/// Construction-time knobs for a [`TriageModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriageSettings {
    pub start_tab: Tab,
    /// Re-fetch the list after a successful accept/decline.
    pub refresh_after_action: bool,
    /// Skip reading the persisted toggle and use this mode (USER only).
    pub view_mode_override: Option<ViewMode>,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            start_tab: Tab::Pending,
            refresh_after_action: true,
            view_mode_override: None,
        }
    }
}

// ──────────────────── model ────────────────────

/// Complete view state for the triage view.
#[derive(Debug)]
pub struct TriageModel {
    pub role: Role,
    /// Resolved by-me / from-me choice. Always `None` for administrators.
    pub view_mode: Option<ViewMode>,
    pub active_tab: Tab,
    /// The most recently loaded list, in backend order.
    pub all_requests: Vec<CertificateRequest>,
    pub buckets: Buckets,
    pub selected: Option<RequestId>,
    pub load_state: LoadState,
    /// Generation of the newest issued load. Completions for older ones are dropped.
    pub load_generation: u64,
    pub refresh_after_action: bool,
    /// Set at teardown; every later message is ignored.
    pub disposed: bool,
}

impl TriageModel {
    #[must_use]
    pub fn new(role: Role, settings: TriageSettings) -> Self {
        let view_mode = match role {
            Role::Admin => None,
            Role::User => settings.view_mode_override,
        };
        Self {
            role,
            view_mode,
            active_tab: settings.start_tab,
            all_requests: Vec::new(),
            buckets: Buckets::default(),
            selected: None,
            load_state: LoadState::Idle,
            load_generation: 0,
            refresh_after_action: settings.refresh_after_action,
            disposed: false,
        }
    }

    /// The list shown under the active tab.
    #[must_use]
    pub fn displayed(&self) -> &[CertificateRequest] {
        match self.active_tab {
            Tab::Pending => &self.buckets.pending,
            Tab::NotPending => &self.buckets.not_pending,
        }
    }

    /// Scope the next load should use, or `None` while a USER's view mode is unknown.
    #[must_use]
    pub fn scope(&self) -> Option<RequestScope> {
        match self.role {
            Role::Admin => Some(RequestScope::All),
            Role::User => self
                .view_mode
                .map(|mode| RequestScope::resolve(Role::User, mode)),
        }
    }

    /// The selected record, if it is in the displayed bucket.
    #[must_use]
    pub fn selected_request(&self) -> Option<&CertificateRequest> {
        let id = self.selected?;
        self.displayed().iter().find(|req| req.id == id)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            self.load_state,
            LoadState::Loading { .. } | LoadState::ResolvingViewMode
        )
    }

    /// Switch tabs. Re-slices the existing buckets; never fetches.
    pub fn change_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
        self.prune_selection();
    }

    /// Record the request's id as the selection. Trusts the caller.
    pub fn select_request(&mut self, request: &CertificateRequest) {
        self.selected = Some(request.id);
    }

    /// Reserve the next load generation.
    pub fn next_generation(&mut self) -> u64 {
        self.load_generation = self.load_generation.wrapping_add(1);
        self.load_generation
    }

    /// Replace all loaded data with `requests`.
    pub fn apply_load(&mut self, scope: RequestScope, requests: Vec<CertificateRequest>) {
        self.buckets = partition(&requests);
        self.all_requests = requests;
        self.load_state = LoadState::Loaded {
            scope,
            count: self.all_requests.len(),
        };
        self.prune_selection();
    }

    /// Reset to an empty list and record the failure.
    pub fn fail_load(&mut self, scope: RequestScope, error: &CrvError) {
        self.all_requests.clear();
        self.buckets = Buckets::default();
        self.load_state = LoadState::Failed {
            scope,
            code: error.code(),
            message: error.to_string(),
            retryable: error.is_retryable(),
        };
        self.prune_selection();
    }

    /// Drop the selection when it is not in the displayed bucket.
    fn prune_selection(&mut self) {
        if let Some(id) = self.selected
            && !self.displayed().iter().any(|req| req.id == id)
        {
            self.selected = None;
        }
    }
}

// ──────────────────── messages ────────────────────

/// Everything that can change the model.
#[derive(Debug)]
pub enum TriageMsg {
    /// Begin the session: resolve the view mode if needed, then load.
    Start,
    /// The persisted by-me toggle arrived.
    ViewModeLoaded(Result<bool>),
    /// The viewer switched between by-me and from-me.
    SetViewMode(ViewMode),
    /// Re-issue the current scope's load.
    Reload,
    /// A list load finished.
    Loaded {
        generation: u64,
        scope: RequestScope,
        result: Result<Vec<CertificateRequest>>,
    },
    ChangeTab(Tab),
    Select(RequestId),
    Accept,
    Decline { reason: Option<String> },
    /// An accept/decline call finished.
    DecisionDone {
        decision: Decision,
        id: RequestId,
        result: Result<()>,
    },
    /// Teardown.
    Shutdown,
}

// ──────────────────── commands ────────────────────

/// Side-effects returned by the update function for the runtime to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageCmd {
    None,
    /// Ask the request service for the persisted by-me toggle.
    ReadViewMode,
    /// Fetch the list for `scope` and answer with `Loaded { generation, .. }`.
    Load { generation: u64, scope: RequestScope },
    /// Issue one accept/decline call.
    Decide {
        decision: Decision,
        id: RequestId,
        reason: Option<String>,
    },
    /// Store the by-me toggle.
    PersistViewMode(ViewMode),
    /// Discard every in-flight result.
    CancelInFlight,
    Batch(Vec<Self>),
}

impl TriageCmd {
    /// Flatten nested batches into a list of leaf commands, dropping `None`.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::None => Vec::new(),
            Self::Batch(cmds) => cmds.into_iter().flat_map(Self::flatten).collect(),
            leaf => vec![leaf],
        }
    }
}

// ──────────────────── tests ────────────────────
