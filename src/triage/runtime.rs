//! Runtime that executes [`TriageCmd`]s against the outside world.
//!
//! Service calls run on short-lived worker threads and answer through an
//! unbounded crossbeam channel. The runtime feeds those answers back through
//! [`update`], so the model is only ever touched on the caller's thread.
//!
//! Teardown sets a shared cancel flag; workers that finish afterwards drop
//! their result instead of sending it.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use serde::Serialize;

use super::loader::RequestScope;
use super::model::{TriageCmd, TriageModel, TriageMsg, TriageSettings};
use super::update::update;
use crate::core::errors::{CrvError, Result};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::requests::RequestId;
use crate::service::{Decision, RequestService};
use crate::session::{AuthProvider, ViewMode};

/// Longest single wait inside [`TriageRuntime::pump`]; cancelled workers never answer.
const PUMP_SLICE: Duration = Duration::from_millis(25);

// ──────────────────── action reports ────────────────────

/// How one accept/decline call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Applied,
    Failed {
        code: &'static str,
        message: String,
        retryable: bool,
    },
}

/// Result of one accept/decline, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub decision: Decision,
    pub id: RequestId,
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

impl ActionReport {
    fn from_result(decision: Decision, id: RequestId, result: &Result<()>) -> Self {
        let outcome = match result {
            Ok(()) => ActionOutcome::Applied,
            Err(err) => ActionOutcome::Failed {
                code: err.code(),
                message: err.to_string(),
                retryable: err.is_retryable(),
            },
        };
        Self {
            decision,
            id,
            outcome,
        }
    }

    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.outcome == ActionOutcome::Applied
    }
}

// ──────────────────── runtime ────────────────────

pub struct TriageRuntime {
    auth: Arc<dyn AuthProvider>,
    service: Arc<dyn RequestService>,
    logger: Option<ActivityLoggerHandle>,
    tx: Sender<TriageMsg>,
    rx: Receiver<TriageMsg>,
    cancelled: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl TriageRuntime {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthProvider>, service: Arc<dyn RequestService>) -> Self {
        let (tx, rx) = unbounded();
        Self {
            auth,
            service,
            logger: None,
            tx,
            rx,
            cancelled: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Send activity events to `logger`.
    #[must_use]
    pub fn with_logger(mut self, logger: ActivityLoggerHandle) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Read the viewer's role and begin the first load.
    ///
    /// # Errors
    /// Returns the auth provider's error when the role cannot be determined.
    pub fn start(&self, settings: TriageSettings) -> Result<TriageModel> {
        let role = self.auth.role().inspect_err(|err| {
            self.log(ActivityEvent::error(err));
        })?;
        let mut model = TriageModel::new(role, settings);
        self.dispatch(&mut model, TriageMsg::Start);
        Ok(model)
    }

    /// Apply a viewer intent and launch whatever it requires.
    pub fn dispatch(&self, model: &mut TriageModel, msg: TriageMsg) {
        let cmd = update(model, msg);
        self.execute(cmd);
    }

    /// Number of service calls still running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Apply every answer that has already arrived, without blocking.
    ///
    /// # Errors
    /// Returns [`CrvError::ChannelClosed`] if the answer channel disconnected.
    pub fn poll(&self, model: &mut TriageModel) -> Result<Vec<ActionReport>> {
        let mut reports = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(msg) => reports.extend(self.handle(model, msg)),
                Err(TryRecvError::Empty) => return Ok(reports),
                Err(TryRecvError::Disconnected) => {
                    return Err(CrvError::ChannelClosed {
                        component: "triage-runtime",
                    });
                }
            }
        }
    }

    /// Apply answers until no call is outstanding.
    ///
    /// # Errors
    /// Returns [`CrvError::Runtime`] if calls are still running after `timeout`.
    pub fn pump(&self, model: &mut TriageModel, timeout: Duration) -> Result<Vec<ActionReport>> {
        let deadline = Instant::now() + timeout;
        let mut reports = Vec::new();
        loop {
            // Workers send before they decrement, so an empty channel with no
            // outstanding calls means nothing else can arrive.
            if self.in_flight() == 0 && self.rx.is_empty() {
                return Ok(reports);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining.min(PUMP_SLICE)) {
                Ok(msg) => reports.extend(self.handle(model, msg)),
                Err(RecvTimeoutError::Timeout) if remaining > PUMP_SLICE => {}
                Err(RecvTimeoutError::Timeout) => {
                    if self.in_flight() == 0 && self.rx.is_empty() {
                        return Ok(reports);
                    }
                    return Err(CrvError::Runtime {
                        details: format!(
                            "{} backend call(s) still running after {}ms",
                            self.in_flight(),
                            timeout.as_millis()
                        ),
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CrvError::ChannelClosed {
                        component: "triage-runtime",
                    });
                }
            }
        }
    }

    /// Dispose the model and discard every in-flight answer.
    pub fn shutdown(&self, model: &mut TriageModel, reason: &str) {
        self.dispatch(model, TriageMsg::Shutdown);
        self.log(ActivityEvent::SessionEnded {
            reason: reason.to_string(),
        });
    }

    // ──────────────────── internals ────────────────────

    fn handle(&self, model: &mut TriageModel, msg: TriageMsg) -> Option<ActionReport> {
        let report = match &msg {
            TriageMsg::DecisionDone {
                decision,
                id,
                result,
            } if !model.disposed => Some(ActionReport::from_result(*decision, *id, result)),
            _ => None,
        };
        self.dispatch(model, msg);
        report
    }

    fn execute(&self, cmd: TriageCmd) {
        for leaf in cmd.flatten() {
            match leaf {
                TriageCmd::None | TriageCmd::Batch(_) => {}
                TriageCmd::CancelInFlight => self.cancelled.store(true, Ordering::SeqCst),
                TriageCmd::ReadViewMode => self.read_view_mode(),
                TriageCmd::Load { generation, scope } => self.load(generation, scope),
                TriageCmd::Decide {
                    decision,
                    id,
                    reason,
                } => self.decide(decision, id, reason),
                TriageCmd::PersistViewMode(mode) => self.persist_view_mode(mode),
            }
        }
    }

    fn read_view_mode(&self) {
        let service = Arc::clone(&self.service);
        let logger = self.logger.clone();
        let spawned = self.spawn_worker("crv-view-mode", move || {
            let result = service.is_by_me_selected();
            if let (Err(err), Some(logger)) = (&result, &logger) {
                logger.send(ActivityEvent::error(err));
            }
            Some(TriageMsg::ViewModeLoaded(result))
        });
        if let Err(err) = spawned {
            self.inject(TriageMsg::ViewModeLoaded(Err(err)));
        }
    }

    fn load(&self, generation: u64, scope: RequestScope) {
        let service = Arc::clone(&self.service);
        let logger = self.logger.clone();
        let spawned = self.spawn_worker("crv-load", move || {
            let started = Instant::now();
            let result = scope.fetch(service.as_ref());
            if let Some(logger) = &logger {
                logger.send(match &result {
                    Ok(requests) => ActivityEvent::LoadCompleted {
                        scope: scope.label().to_string(),
                        count: requests.len(),
                        pending: requests.iter().filter(|r| r.is_pending()).count(),
                        duration_ms: elapsed_ms(started),
                    },
                    Err(err) => ActivityEvent::LoadFailed {
                        scope: scope.label().to_string(),
                        code: err.code().to_string(),
                        message: err.to_string(),
                    },
                });
            }
            Some(TriageMsg::Loaded {
                generation,
                scope,
                result,
            })
        });
        if let Err(err) = spawned {
            self.inject(TriageMsg::Loaded {
                generation,
                scope,
                result: Err(err),
            });
        }
    }

    fn decide(&self, decision: Decision, id: RequestId, reason: Option<String>) {
        let service = Arc::clone(&self.service);
        let logger = self.logger.clone();
        let spawned = self.spawn_worker("crv-decide", move || {
            let started = Instant::now();
            let result = match decision {
                Decision::Accept => service.accept_request(id),
                Decision::Decline => service.decline_request(id, reason.as_deref()),
            };
            if let Some(logger) = &logger {
                logger.send(match &result {
                    Ok(()) => ActivityEvent::DecisionApplied {
                        decision,
                        id,
                        duration_ms: elapsed_ms(started),
                    },
                    Err(err) => ActivityEvent::DecisionFailed {
                        decision,
                        id,
                        code: err.code().to_string(),
                        message: err.to_string(),
                    },
                });
            }
            Some(TriageMsg::DecisionDone {
                decision,
                id,
                result,
            })
        });
        if let Err(err) = spawned {
            self.inject(TriageMsg::DecisionDone {
                decision,
                id,
                result: Err(err),
            });
        }
    }

    fn persist_view_mode(&self, mode: ViewMode) {
        let service = Arc::clone(&self.service);
        let logger = self.logger.clone();
        let spawned = self.spawn_worker("crv-persist", move || {
            let result = service.set_by_me_selected(mode.is_by_me());
            if let Some(logger) = &logger {
                if let Err(err) = &result {
                    logger.send(ActivityEvent::error(err));
                }
                logger.send(ActivityEvent::ViewModeChanged {
                    to: mode.label().to_string(),
                    persisted: result.is_ok(),
                });
            }
            None
        });
        if let Err(err) = spawned {
            self.log(ActivityEvent::error(&err));
        }
    }

    /// Run `job` on a worker thread and send its answer unless cancelled.
    fn spawn_worker<F>(&self, name: &str, job: F) -> Result<()>
    where
        F: FnOnce() -> Option<TriageMsg> + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancelled = Arc::clone(&self.cancelled);
        let in_flight = Arc::clone(&self.in_flight);
        in_flight.fetch_add(1, Ordering::SeqCst);

        let spawned = thread::Builder::new().name(name.to_string()).spawn({
            let in_flight = Arc::clone(&in_flight);
            move || {
                let answer = job();
                if let Some(msg) = answer
                    && !cancelled.load(Ordering::SeqCst)
                {
                    let _ = tx.send(msg);
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        });

        match spawned {
            Ok(_detached) => Ok(()),
            Err(e) => {
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Err(CrvError::Runtime {
                    details: format!("failed to spawn {name} worker: {e}"),
                })
            }
        }
    }

    /// Queue an answer produced on the caller's thread.
    fn inject(&self, msg: TriageMsg) {
        if !self.cancelled.load(Ordering::SeqCst) {
            let _ = self.tx.send(msg);
        }
    }

    fn log(&self, event: ActivityEvent) {
        if let Some(logger) = &self.logger {
            logger.send(event);
        }
    }
}

impl Drop for TriageRuntime {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ──────────────────── tests ────────────────────
