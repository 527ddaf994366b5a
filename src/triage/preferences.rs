//! Persisted viewer preferences with safe atomic persistence.
//!
//! Holds the by-me / from-me toggle that the request service exposes through
//! `is_by_me_selected` / `set_by_me_selected`, plus the tab the triage view
//! opens on. Persistence failures never block the view: a missing or corrupt
//! file yields defaults.
//!
//! # Merge Order
//!
//! ```text
//! compiled defaults → persisted preferences → CLI/session overrides
//! ```

#![allow(missing_docs)]

use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::model::Tab;
use crate::session::ViewMode;

/// Current schema version.
const SCHEMA_VERSION: u32 = 1;

// ──────────────────── core preferences ────────────────────

/// Persisted triage preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewPreferences {
    pub schema_version: u32,

    /// `true` lists requests the viewer submitted; `false` lists requests
    /// awaiting the viewer's decision.
    #[serde(default = "default_by_me_selected")]
    pub by_me_selected: bool,

    /// Tab to open on. `None` defers to `view.start_tab` in the config file.
    pub start_tab: Option<Tab>,
}

impl Default for ViewPreferences {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            by_me_selected: default_by_me_selected(),
            start_tab: None,
        }
    }
}

fn default_by_me_selected() -> bool {
    true
}

// ──────────────────── validation ────────────────────

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Validate loaded preferences. Returns them with a report of any issues.
pub fn validate(prefs: ViewPreferences) -> (ViewPreferences, ValidationReport) {
    let mut report = ValidationReport::default();

    if prefs.schema_version > SCHEMA_VERSION {
        report.warnings.push(format!(
            "preferences schema version {} is newer than supported {}; \
             unknown fields will be ignored",
            prefs.schema_version, SCHEMA_VERSION,
        ));
    }

    (prefs, report)
}

// ──────────────────── persistence ────────────────────

/// Load outcome from the persistence layer.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        prefs: ViewPreferences,
        report: ValidationReport,
    },
    /// File not found (normal before the first toggle).
    Missing,
    /// File exists but is unparseable.
    Corrupt {
        details: String,
        defaults: ViewPreferences,
    },
    IoError {
        details: String,
        defaults: ViewPreferences,
    },
}

impl LoadOutcome {
    /// Extract the effective preferences regardless of load status.
    #[must_use]
    pub fn into_prefs(self) -> ViewPreferences {
        match self {
            Self::Loaded { prefs, .. } => prefs,
            Self::Missing => ViewPreferences::default(),
            Self::Corrupt { defaults, .. } | Self::IoError { defaults, .. } => defaults,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Loaded { .. } | Self::Missing)
    }
}

/// Load preferences from a file path. Never panics.
pub fn load(path: &Path) -> LoadOutcome {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return LoadOutcome::Missing,
        // Invalid UTF-8 is corrupt content, not an I/O error.
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            return LoadOutcome::Corrupt {
                details: format!("{e}"),
                defaults: ViewPreferences::default(),
            };
        }
        Err(e) => {
            return LoadOutcome::IoError {
                details: format!("{e}"),
                defaults: ViewPreferences::default(),
            };
        }
    };

    match serde_json::from_str::<ViewPreferences>(&content) {
        Ok(prefs) => {
            let (prefs, report) = validate(prefs);
            LoadOutcome::Loaded { prefs, report }
        }
        Err(e) => LoadOutcome::Corrupt {
            details: format!("{e}"),
            defaults: ViewPreferences::default(),
        },
    }
}

/// Atomic save: serialize → temp file → fsync → rename.
///
/// Creates parent directories as needed. Returns the path written.
pub fn save(prefs: &ViewPreferences, path: &Path) -> io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(prefs)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;

    Ok(path.to_path_buf())
}

// ──────────────────── merge ────────────────────

/// Per-invocation overrides from CLI flags. Never persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOverrides {
    pub view_mode: Option<ViewMode>,
    pub start_tab: Option<Tab>,
}

/// Merge persisted preferences with session overrides.
#[must_use]
pub fn merge(persisted: &ViewPreferences, overrides: &SessionOverrides) -> ViewPreferences {
    ViewPreferences {
        schema_version: persisted.schema_version,
        by_me_selected: overrides
            .view_mode
            .map_or(persisted.by_me_selected, ViewMode::is_by_me),
        start_tab: overrides.start_tab.or(persisted.start_tab),
    }
}

// ──────────────────── tests ────────────────────
