//! # Refactoring Workflow
//!
//! This module implements the refactor store: a state machine that walks a
//! session through listing, picking, parameter collection and execution,
//! calling out to providers asynchronously and tolerating cancellation.

pub mod actions;
pub mod state;
pub mod store;
pub mod stream;

pub use actions::RefactorAction;
pub use state::{Phase, RefactorState};
pub use store::RefactorStore;
pub use stream::StateStream;
