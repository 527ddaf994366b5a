//! Plain-text and JSON views of a [`TriageModel`].
//!
//! Pure functions: the model in, a `String` or serializable snapshot out.

#![allow(missing_docs)]

use std::fmt::Write as _;

use serde::Serialize;

use super::model::{LoadState, Tab, TriageModel};
use crate::requests::format::display_timestamp;
use crate::requests::{CertificateRequest, RequestId};

/// One displayed request with its date already formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRow {
    pub id: RequestId,
    pub status: String,
    pub certificate_type: String,
    pub issuer: String,
    pub requester: String,
    /// `at H:MM, D.M.YYYY`, or `-` when missing or unparseable.
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub selected: bool,
}

impl RequestRow {
    #[must_use]
    pub fn new(request: &CertificateRequest, selected: bool) -> Self {
        let issuer = match (
            request.issuer_serial(),
            request.issuer.as_ref().and_then(|i| i.issued_to.as_deref()),
        ) {
            (Some(serial), Some(owner)) => format!("{serial} ({owner})"),
            (Some(serial), None) => serial.to_string(),
            (None, Some(owner)) => owner.to_string(),
            (None, None) => "-".to_string(),
        };
        Self {
            id: request.id,
            status: request.status.as_str().to_string(),
            certificate_type: request
                .certificate_type
                .clone()
                .unwrap_or_else(|| "-".to_string()),
            issuer,
            requester: request.requester.clone().unwrap_or_else(|| "-".to_string()),
            created: display_timestamp(request.created_at.as_deref()),
            rejection_reason: request.rejection_reason.clone(),
            selected,
        }
    }
}

/// Serializable snapshot of what the view currently shows.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_mode: Option<String>,
    pub tab: Tab,
    pub pending_count: usize,
    pub not_pending_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub requests: Vec<RequestRow>,
}

impl ViewSnapshot {
    #[must_use]
    pub fn of(model: &TriageModel) -> Self {
        let error = match &model.load_state {
            LoadState::Failed { message, .. } => Some(message.clone()),
            _ => None,
        };
        Self {
            role: model.role.label().to_string(),
            view_mode: model.view_mode.map(|mode| mode.label().to_string()),
            tab: model.active_tab,
            pending_count: model.buckets.pending.len(),
            not_pending_count: model.buckets.not_pending.len(),
            selected: model.selected,
            error,
            requests: rows(model),
        }
    }
}

/// Rows for the active tab, in backend order.
#[must_use]
pub fn rows(model: &TriageModel) -> Vec<RequestRow> {
    model
        .displayed()
        .iter()
        .map(|req| RequestRow::new(req, model.selected == Some(req.id)))
        .collect()
}

/// Tab strip, e.g. `[Pending (2)]  Not pending (1)`.
#[must_use]
pub fn tab_strip(model: &TriageModel) -> String {
    let label = |tab: Tab, count: usize| {
        let name = match tab {
            Tab::Pending => "Pending",
            Tab::NotPending => "Not pending",
        };
        if tab == model.active_tab {
            format!("[{name} ({count})]")
        } else {
            format!(" {name} ({count}) ")
        }
    };
    format!(
        "{} {}",
        label(Tab::Pending, model.buckets.pending.len()),
        label(Tab::NotPending, model.buckets.not_pending.len())
    )
}

/// Full plain-text view.
#[must_use]
pub fn render_view(model: &TriageModel) -> String {
    let mut out = String::new();
    let scope = model.scope().map_or("resolving", |scope| scope.label());
    let _ = writeln!(out, "{}    role={} list={scope}", tab_strip(model), model.role.label());

    if let LoadState::Failed { message, .. } = &model.load_state {
        let _ = writeln!(out, "  could not load requests: {message}");
    }
    if model.is_loading() {
        let _ = writeln!(out, "  loading…");
    }

    let rows = rows(model);
    if rows.is_empty() {
        let _ = writeln!(out, "  (no requests)");
        return out;
    }
    for row in &rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}

/// One line per request; `>` marks the selection.
#[must_use]
pub fn render_row(row: &RequestRow) -> String {
    let marker = if row.selected { '>' } else { ' ' };
    let mut line = format!(
        "{marker} #{:<5} {:<9} {:<13} issuer {:<28} by {:<24} {}",
        row.id, row.status, row.certificate_type, row.issuer, row.requester, row.created
    );
    if let Some(reason) = &row.rejection_reason {
        let _ = write!(line, "  reason: {reason}");
    }
    line
}
