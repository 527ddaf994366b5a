//! Request triage view: model, pure update, runtime, rendering.
//!
//! The seams mirror an Elm architecture. [`model`] holds state, [`update`]
//! maps messages to commands without I/O, [`runtime`] executes commands
//! against a [`crate::service::RequestService`], and [`render`] turns the
//! model into text or JSON.

pub mod loader;
pub mod model;
pub mod preferences;
pub mod render;
pub mod runtime;
pub mod update;

#[cfg(test)]
mod test_properties;

pub use loader::RequestScope;
pub use model::{LoadState, Tab, TriageCmd, TriageModel, TriageMsg, TriageSettings};
pub use runtime::{ActionOutcome, ActionReport, TriageRuntime};
