//! The client-side collaborative editing core: rebase engine, plugin
//! state, schema adapter, sync loop state machine and the cooperative
//! work-loop scheduler that drives it.
//!
//! This crate consumes, but does not implement, the "editor runtime"
//! (the document tree, its steps, and its transaction/mapping
//! machinery) and the "content client" (snapshot/operation/stream RPCs
//! to the authoritative server). Both are expressed here as trait
//! boundaries -- [`step::Step`] / [`step::Transform`] and
//! [`content_client::ContentClient`] -- so a host integration supplies
//! the concrete implementations. The `testing` module ships a minimal
//! flat-text implementation of both boundaries, used by this crate's
//! own convergence tests and available to integrators as a worked
//! example.

pub mod config;
pub mod content_client;
pub mod editor_host;
pub mod mapping;
pub mod plugin_state;
pub mod rebase;
pub mod rebaseable;
pub mod scheduler;
pub mod schema_adapter;
pub mod step;
pub mod sync_loop;
pub mod sync_state;
#[cfg(any(test, feature = "test_utils"))]
pub mod testing;

pub use config::SyncConfig;
pub use content_client::{ContentClient, OperationStream};
pub use editor_host::{DispatchedState, EditorHost, Selection, ViewState};
pub use mapping::{Bias, Mapping, MapResult, StepMap};
pub use plugin_state::PluginState;
pub use rebase::{rebase, RebaseOutcome};
pub use rebaseable::Rebaseable;
pub use step::{Step, Transform};
pub use sync_loop::SyncLoop;
pub use sync_state::SyncState;
