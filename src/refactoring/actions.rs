//! # Refactor Actions
//!
//! Actions accepted by the store, plus the internal completion messages
//! that provider calls send back into the store's queue.

use crate::errors::RefactorError;
use crate::provider::RefactorProvider;
use crate::types::{AvailableRefactoring, RefactorRequest, RefactorResponse};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// User-facing actions.
#[derive(Clone)]
pub enum RefactorAction {
    /// Start a session on the active editor
    Open,
    /// The user picked one of the offered refactorings
    PickedRefactor(AvailableRefactoring),
    /// Run the refactoring with the collected parameters
    Execute {
        provider: Arc<dyn RefactorProvider>,
        request: RefactorRequest,
    },
    /// Abandon the session
    Close,
}

impl RefactorAction {
    pub fn name(&self) -> &'static str {
        match self {
            RefactorAction::Open => "open",
            RefactorAction::PickedRefactor(_) => "picked_refactor",
            RefactorAction::Execute { .. } => "execute",
            RefactorAction::Close => "close",
        }
    }
}

impl fmt::Debug for RefactorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefactorAction::Open => write!(f, "Open"),
            RefactorAction::PickedRefactor(refactoring) => {
                f.debug_tuple("PickedRefactor").field(refactoring).finish()
            }
            RefactorAction::Execute { provider, request } => f
                .debug_struct("Execute")
                .field("provider", &provider.name())
                .field("request", request)
                .finish(),
            RefactorAction::Close => write!(f, "Close"),
        }
    }
}

/// Messages processed by the store task.
pub(crate) enum Message {
    Action(RefactorAction),
    GotRefactorings {
        generation: u64,
        result: Result<Vec<AvailableRefactoring>, RefactorError>,
    },
    Refactored {
        generation: u64,
        result: Result<Option<RefactorResponse>, RefactorError>,
    },
    Flush(oneshot::Sender<()>),
    WaitIdle(oneshot::Sender<()>),
}
