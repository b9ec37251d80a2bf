//! # Refactor State
//!
//! Snapshot of the store's state machine, as published to observers.

use crate::types::{AvailableRefactoring, RefactorRequest, SymbolAtPoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "phase", rename_all = "snake_case")]
pub enum RefactorState {
    #[default]
    Closed,
    Open(Phase),
}

/// Sub-state of an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the provider to list refactorings at the cursor
    GetRefactorings,
    /// Waiting for the user to pick one of the candidates
    Pick {
        available_refactorings: Vec<AvailableRefactoring>,
    },
    /// Collecting the new name for a rename
    Rename { symbol_at_point: SymbolAtPoint },
    /// Waiting for the provider to compute the edits
    Execute { request: RefactorRequest },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::GetRefactorings => "get_refactorings",
            Phase::Pick { .. } => "pick",
            Phase::Rename { .. } => "rename",
            Phase::Execute { .. } => "execute",
        }
    }
}

impl RefactorState {
    pub fn is_closed(&self) -> bool {
        matches!(self, RefactorState::Closed)
    }

    pub fn phase(&self) -> Option<&Phase> {
        match self {
            RefactorState::Closed => None,
            RefactorState::Open(phase) => Some(phase),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RefactorState::Closed => "closed",
            RefactorState::Open(phase) => phase.name(),
        }
    }
}
