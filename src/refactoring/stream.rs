use super::state::RefactorState;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

/// Subscription to the store's state transitions.
///
/// Yields the state current at subscription time first, then every
/// subsequent transition in order.
pub struct StateStream {
    initial: Option<RefactorState>,
    receiver: broadcast::Receiver<RefactorState>,
}

impl StateStream {
    pub(crate) fn new(initial: RefactorState, receiver: broadcast::Receiver<RefactorState>) -> Self {
        Self {
            initial: Some(initial),
            receiver,
        }
    }

    /// Next state, or `None` once the store has shut down.
    pub async fn next(&mut self) -> Option<RefactorState> {
        if let Some(state) = self.initial.take() {
            return Some(state);
        }
        loop {
            match self.receiver.recv().await {
                Ok(state) => return Some(state),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("State subscriber lagged, skipped {} transitions", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next state if one is already available.
    pub fn try_next(&mut self) -> Option<RefactorState> {
        if let Some(state) = self.initial.take() {
            return Some(state);
        }
        loop {
            match self.receiver.try_recv() {
                Ok(state) => return Some(state),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("State subscriber lagged, skipped {} transitions", skipped);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Skip states until one satisfies `predicate`.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&RefactorState) -> bool,
    ) -> Option<RefactorState> {
        while let Some(state) = self.next().await {
            if predicate(&state) {
                return Some(state);
            }
        }
        None
    }
}
