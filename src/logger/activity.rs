//! Activity logger thread.
//!
//! A dedicated thread owns the [`JsonlWriter`]. Other threads send
//! [`ActivityEvent`]s through a bounded crossbeam channel with `try_send()`,
//! so triage work is never blocked by logging back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{CrvError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use crate::requests::RequestId;
use crate::service::Decision;

const CHANNEL_CAPACITY: usize = 256;

// ──────────────────── public event type ────────────────────

#[derive(Debug, Clone)]
pub enum ActivityEvent {
    SessionStarted {
        role: String,
        version: String,
        config_hash: String,
    },
    SessionEnded {
        reason: String,
    },
    LoadCompleted {
        scope: String,
        count: usize,
        pending: usize,
        duration_ms: u64,
    },
    LoadFailed {
        scope: String,
        code: String,
        message: String,
    },
    DecisionApplied {
        decision: Decision,
        id: RequestId,
        duration_ms: u64,
    },
    DecisionFailed {
        decision: Decision,
        id: RequestId,
        code: String,
        message: String,
    },
    ViewModeChanged {
        to: String,
        persisted: bool,
    },
    Error {
        code: String,
        message: String,
    },
    /// Flush and stop the logger thread.
    Shutdown,
}

impl ActivityEvent {
    /// Build an `Error` event from a crate error.
    #[must_use]
    pub fn error(err: &CrvError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ──────────────────── public handle ────────────────────

/// Cheaply cloneable handle for sending log events. Never blocks.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Drops it if the channel is full.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle plus its join handle.
pub fn spawn_logger(config: JsonlConfig) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(CHANNEL_CAPACITY);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("crv-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped_clone))
        .map_err(|e| CrvError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted {
            role,
            version,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.role = Some(role.clone());
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::SessionEnded { reason } => {
            let mut e = LogEntry::new(EventType::SessionEnd, Severity::Info);
            e.details = Some(format!("reason={reason}"));
            e
        }
        ActivityEvent::LoadCompleted {
            scope,
            count,
            pending,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::LoadComplete, Severity::Info);
            e.scope = Some(scope.clone());
            e.count = Some(*count);
            e.pending = Some(*pending);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::LoadFailed {
            scope,
            code,
            message,
        } => {
            let mut e =
                LogEntry::new(EventType::LoadFailed, Severity::Warning).with_error(code, message);
            e.scope = Some(scope.clone());
            e
        }
        ActivityEvent::DecisionApplied {
            decision,
            id,
            duration_ms,
        } => {
            let event = match decision {
                Decision::Accept => EventType::DecisionAccepted,
                Decision::Decline => EventType::DecisionDeclined,
            };
            let mut e = LogEntry::new(event, Severity::Info);
            e.request_id = Some(*id);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e
        }
        ActivityEvent::DecisionFailed {
            decision,
            id,
            code,
            message,
        } => {
            let mut e =
                LogEntry::new(EventType::DecisionFailed, Severity::Warning).with_error(code, message);
            e.request_id = Some(*id);
            e.details = Some(format!("decision={decision}"));
            e
        }
        ActivityEvent::ViewModeChanged { to, persisted } => {
            let mut e = LogEntry::new(EventType::ViewModeChanged, Severity::Info);
            e.scope = Some(to.clone());
            e.ok = Some(*persisted);
            e
        }
        ActivityEvent::Error { code, message } => {
            LogEntry::new(EventType::Error, Severity::Critical).with_error(code, message)
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::SessionEnd, Severity::Info),
    }
}

// ──────────────────── tests ────────────────────
