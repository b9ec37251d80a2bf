//! # Refactor Store
//!
//! Drives one refactor session at a time. All transitions run on a single
//! task fed by an action queue; provider calls run on spawned tasks and
//! report back through the same queue, tagged with the generation that was
//! current when they were issued. A completion whose generation no longer
//! matches is stale and is never applied.

use super::actions::{Message, RefactorAction};
use super::state::{Phase, RefactorState};
use super::stream::StateStream;
use crate::config::StoreConfig;
use crate::editor::{EditorSession, Workspace};
use crate::errors::RefactorError;
use crate::provider::{ProviderRegistry, RefactorProvider};
use crate::types::{AvailableRefactoring, Point, RefactorRequest, RefactorResponse};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// State shared between the store handles and the store task.
struct Shared {
    state: Mutex<RefactorState>,
    state_tx: broadcast::Sender<RefactorState>,
    error_tx: broadcast::Sender<RefactorError>,
}

impl Shared {
    fn current(&self) -> RefactorState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Handle to a running refactor store. Cheap to clone.
///
/// Must be created from within a tokio runtime.
#[derive(Clone)]
pub struct RefactorStore {
    sender: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
}

impl RefactorStore {
    pub fn new(registry: ProviderRegistry, workspace: Arc<dyn Workspace>) -> Self {
        Self::with_config(registry, workspace, StoreConfig::default())
    }

    pub fn with_config(
        registry: ProviderRegistry,
        workspace: Arc<dyn Workspace>,
        config: StoreConfig,
    ) -> Self {
        let (state_tx, _) = broadcast::channel(config.state_channel_capacity.max(1));
        let (error_tx, _) = broadcast::channel(config.error_channel_capacity.max(1));
        let shared = Arc::new(Shared {
            state: Mutex::new(RefactorState::Closed),
            state_tx,
            error_tx,
        });

        let (sender, receiver) = mpsc::unbounded_channel();
        let actor = StoreActor {
            registry,
            workspace,
            shared: shared.clone(),
            sender: sender.downgrade(),
            generation: 0,
            editor: None,
            pending: 0,
            idle_waiters: Vec::new(),
        };
        tokio::spawn(actor.run(receiver));

        Self { sender, shared }
    }

    /// Queue an action. Never fails; provider errors go to [`RefactorStore::errors`].
    pub fn dispatch(&self, action: RefactorAction) {
        debug!("Dispatching {}", action.name());
        if self.sender.send(Message::Action(action)).is_err() {
            warn!("Refactor store has shut down, dropping action");
        }
    }

    pub fn open(&self) {
        self.dispatch(RefactorAction::Open);
    }

    pub fn picked_refactor(&self, refactoring: AvailableRefactoring) {
        self.dispatch(RefactorAction::PickedRefactor(refactoring));
    }

    pub fn execute(&self, provider: Arc<dyn RefactorProvider>, request: RefactorRequest) {
        self.dispatch(RefactorAction::Execute { provider, request });
    }

    pub fn close(&self) {
        self.dispatch(RefactorAction::Close);
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RefactorState {
        self.shared.current()
    }

    /// Current state followed by every later transition.
    pub fn subscribe(&self) -> StateStream {
        let state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        StateStream::new(state.clone(), self.shared.state_tx.subscribe())
    }

    /// Provider rejections and edit failures, including those of stale calls.
    pub fn errors(&self) -> broadcast::Receiver<RefactorError> {
        self.shared.error_tx.subscribe()
    }

    /// Resolves once every message already in the queue has been handled.
    /// Unlike [`RefactorStore::wait_idle`] it does not wait for provider calls.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Message::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Resolves once every action queued so far has been handled and every
    /// provider call issued so far has completed and been processed.
    pub async fn wait_idle(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Message::WaitIdle(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }
}

struct StoreActor {
    registry: ProviderRegistry,
    workspace: Arc<dyn Workspace>,
    shared: Arc<Shared>,
    sender: mpsc::WeakUnboundedSender<Message>,
    generation: u64,
    /// Editor the open session runs against
    editor: Option<Arc<dyn EditorSession>>,
    /// Provider calls spawned but not yet processed
    pending: usize,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl StoreActor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Message>) {
        while let Some(message) = receiver.recv().await {
            self.handle(message);
        }
        debug!("Refactor store stopped");
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Action(action) => self.handle_action(action),
            Message::GotRefactorings { generation, result } => {
                self.got_refactorings(generation, result);
                self.call_finished();
            }
            Message::Refactored { generation, result } => {
                self.refactored(generation, result);
                self.call_finished();
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
            Message::WaitIdle(waiter) => {
                if self.pending == 0 {
                    let _ = waiter.send(());
                } else {
                    self.idle_waiters.push(waiter);
                }
            }
        }
    }

    fn handle_action(&mut self, action: RefactorAction) {
        let state = self.shared.current();
        match (action, state) {
            (RefactorAction::Open, RefactorState::Closed) => self.open(),
            (RefactorAction::Open, RefactorState::Open(phase)) => {
                debug!("Ignoring open, a session is already in phase {}", phase.name());
            }
            (
                RefactorAction::PickedRefactor(refactoring),
                RefactorState::Open(Phase::Pick { .. }),
            ) => match refactoring {
                AvailableRefactoring::Rename { symbol_at_point } => {
                    self.transition(RefactorState::Open(Phase::Rename { symbol_at_point }));
                }
            },
            (
                RefactorAction::Execute { provider, request },
                RefactorState::Open(Phase::Rename { .. }),
            ) => self.execute(provider, request),
            (RefactorAction::Close, _) => self.close(),
            (action, state) => {
                debug!("Ignoring {} in state {}", action.name(), state.name());
            }
        }
    }

    fn open(&mut self) {
        self.transition(RefactorState::Open(Phase::GetRefactorings));

        let Some(editor) = self.workspace.active_editor() else {
            debug!("No active editor, closing");
            self.close();
            return;
        };
        let scope = editor.grammar_scope();
        let Some(provider) = self.registry.find(&scope) else {
            debug!("No refactor provider for scope {}, closing", scope);
            self.close();
            return;
        };

        let point = editor.cursor_position();
        info!("Listing refactorings from '{}' at {}", provider.name(), point);
        self.editor = Some(editor.clone());
        self.spawn_enumerate(provider, editor, point);
    }

    fn execute(&mut self, provider: Arc<dyn RefactorProvider>, request: RefactorRequest) {
        let Some(editor) = self.editor.clone() else {
            warn!("Execute without an editor, closing");
            self.close();
            return;
        };
        info!("Running {} refactoring with '{}'", request.kind(), provider.name());
        self.transition(RefactorState::Open(Phase::Execute {
            request: request.clone(),
        }));
        self.spawn_refactor(provider, editor, request);
    }

    fn close(&mut self) {
        self.editor = None;
        self.transition(RefactorState::Closed);
    }

    fn got_refactorings(
        &mut self,
        generation: u64,
        result: Result<Vec<AvailableRefactoring>, RefactorError>,
    ) {
        let stale = generation != self.generation;
        match result {
            Err(err) => {
                self.report(err);
                if !stale {
                    self.close();
                }
            }
            Ok(_) if stale => {
                debug!("Discarding stale refactorings from generation {}", generation);
            }
            Ok(available) if available.is_empty() => {
                debug!("No refactorings available, closing");
                self.close();
            }
            Ok(available) => {
                debug!("{} refactorings available", available.len());
                self.transition(RefactorState::Open(Phase::Pick {
                    available_refactorings: available,
                }));
            }
        }
    }

    fn refactored(
        &mut self,
        generation: u64,
        result: Result<Option<RefactorResponse>, RefactorError>,
    ) {
        let stale = generation != self.generation;
        match result {
            Err(err) => {
                self.report(err);
                if !stale {
                    self.close();
                }
            }
            Ok(_) if stale => {
                debug!("Discarding stale refactor result from generation {}", generation);
            }
            Ok(None) => {
                debug!("Provider returned no edits");
                self.close();
            }
            Ok(Some(response)) => {
                if let Some(editor) = self.editor.take() {
                    self.apply(&editor, &response);
                }
                self.close();
            }
        }
    }

    fn apply(&self, editor: &Arc<dyn EditorSession>, response: &RefactorResponse) {
        debug!(
            "Applying {} edits across {} files",
            response.total_edits(),
            response.edits.len()
        );
        let editor_path = editor.path();
        for (path, edits) in &response.edits {
            let target = if editor_path.as_deref() == Some(path.as_path()) {
                Some(editor.clone())
            } else {
                self.workspace.editor_for_path(path)
            };
            let result = match target {
                Some(target) => target.apply_edits(edits),
                None => Err(RefactorError::InvalidEdit("no open editor".to_string())),
            };
            match result {
                Ok(()) => info!("Applied {} edits to {}", edits.len(), path.display()),
                Err(err) => self.report(RefactorError::EditApplicationFailure {
                    path: path.clone(),
                    message: err.to_string(),
                }),
            }
        }
    }

    fn transition(&mut self, next: RefactorState) {
        let mut state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == next {
            return;
        }
        self.generation += 1;
        debug!(
            "Refactor state {} -> {} (generation {})",
            state.name(),
            next.name(),
            self.generation
        );
        *state = next.clone();
        let _ = self.shared.state_tx.send(next);
    }

    fn report(&self, err: RefactorError) {
        error!(kind = err.kind(), "{}", err);
        let _ = self.shared.error_tx.send(err);
    }

    fn call_finished(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn spawn_enumerate(
        &mut self,
        provider: Arc<dyn RefactorProvider>,
        editor: Arc<dyn EditorSession>,
        point: Point,
    ) {
        let generation = self.generation;
        self.spawn(async move {
            // Call inside the guard: providers may panic before returning a future.
            let call = AssertUnwindSafe(async {
                provider.refactorings_at_point(editor, point).await
            });
            let result = match call.catch_unwind().await {
                Ok(Ok(available)) => Ok(available),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(panic) => Err(panic_message(panic.as_ref())),
            };
            Message::GotRefactorings {
                generation,
                result: result.map_err(|message| RefactorError::ProviderEnumerationFailure {
                    provider: provider.name().to_string(),
                    message,
                }),
            }
        });
    }

    fn spawn_refactor(
        &mut self,
        provider: Arc<dyn RefactorProvider>,
        editor: Arc<dyn EditorSession>,
        request: RefactorRequest,
    ) {
        let generation = self.generation;
        self.spawn(async move {
            let call = AssertUnwindSafe(async { provider.refactor(editor, request).await });
            let result = match call.catch_unwind().await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(format!("{err:#}")),
                Err(panic) => Err(panic_message(panic.as_ref())),
            };
            Message::Refactored {
                generation,
                result: result.map_err(|message| RefactorError::ProviderExecutionFailure {
                    provider: provider.name().to_string(),
                    message,
                }),
            }
        });
    }

    fn spawn<F>(&mut self, call: F)
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let Some(sender) = self.sender.upgrade() else {
            return;
        };
        self.pending += 1;
        tokio::spawn(async move {
            let message = call.await;
            let _ = sender.send(message);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_string()
    }
}
