// Common test utilities
#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use refactorizer::editor::{EditorSession, InMemoryWorkspace, TextBuffer};
use refactorizer::provider::{ProviderRegistry, RefactorProvider};
use refactorizer::{
    AvailableRefactoring, Point, Range, RefactorRequest, RefactorResponse, RefactorState,
    RefactorStore, RenameRequest, StateStream, SymbolAtPoint, TextEdit,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, oneshot};

pub const FIXTURE_TEXT: &str = "foo\nbar\nfoo\n";
pub const FIXTURE_SCOPE: &str = "text.plain";

/// What a scripted provider call does.
pub enum Reply<T> {
    Value(T),
    Fail(String),
    Panic,
    /// Resolved later by the test through the paired sender
    Deferred(oneshot::Receiver<anyhow::Result<T>>),
}

impl<T: Clone> Reply<T> {
    fn take(slot: &Mutex<Reply<T>>) -> Reply<T> {
        let mut slot = slot.lock().unwrap();
        if matches!(*slot, Reply::Deferred(_)) {
            return std::mem::replace(&mut *slot, Reply::Fail("deferred reply already used".into()));
        }
        match &*slot {
            Reply::Value(value) => Reply::Value(value.clone()),
            Reply::Fail(message) => Reply::Fail(message.clone()),
            Reply::Panic => Reply::Panic,
            Reply::Deferred(_) => unreachable!(),
        }
    }

    async fn resolve(self) -> anyhow::Result<T> {
        match self {
            Reply::Value(value) => Ok(value),
            Reply::Fail(message) => Err(anyhow!(message)),
            Reply::Panic => panic!("provider blew up"),
            Reply::Deferred(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(anyhow!("deferred reply dropped"))),
        }
    }
}

/// Create a deferred reply and the sender that resolves it.
pub fn deferred<T>() -> (oneshot::Sender<anyhow::Result<T>>, Reply<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Reply::Deferred(rx))
}

/// Provider whose answers are scripted by the test.
pub struct ScriptedProvider {
    scopes: Vec<String>,
    refactorings: Mutex<Reply<Vec<AvailableRefactoring>>>,
    response: Mutex<Reply<Option<RefactorResponse>>>,
    pub enumerate_calls: AtomicUsize,
    pub refactor_calls: AtomicUsize,
    /// Signalled each time `refactorings_at_point` returns
    pub enumerate_returned: Notify,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scopes: vec![FIXTURE_SCOPE.to_string(), "text.plain.null-grammar".to_string()],
            refactorings: Mutex::new(Reply::Value(vec![])),
            response: Mutex::new(Reply::Value(None)),
            enumerate_calls: AtomicUsize::new(0),
            refactor_calls: AtomicUsize::new(0),
            enumerate_returned: Notify::new(),
        }
    }

    pub fn set_refactorings(&self, reply: Reply<Vec<AvailableRefactoring>>) {
        *self.refactorings.lock().unwrap() = reply;
    }

    pub fn set_response(&self, reply: Reply<Option<RefactorResponse>>) {
        *self.response.lock().unwrap() = reply;
    }
}

#[async_trait]
impl RefactorProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn grammar_scopes(&self) -> &[String] {
        &self.scopes
    }

    fn priority(&self) -> i32 {
        1
    }

    async fn refactorings_at_point(
        &self,
        _editor: Arc<dyn EditorSession>,
        _point: Point,
    ) -> anyhow::Result<Vec<AvailableRefactoring>> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);
        let result = Reply::take(&self.refactorings).resolve().await;
        self.enumerate_returned.notify_one();
        result
    }

    async fn refactor(
        &self,
        _editor: Arc<dyn EditorSession>,
        _request: RefactorRequest,
    ) -> anyhow::Result<Option<RefactorResponse>> {
        self.refactor_calls.fetch_add(1, Ordering::SeqCst);
        Reply::take(&self.response).resolve().await
    }
}

pub fn fixture_path() -> PathBuf {
    PathBuf::from("/fixtures/refactor-fixture.txt")
}

pub fn symbol_at_point() -> SymbolAtPoint {
    SymbolAtPoint {
        text: "foo".to_string(),
        range: Range::on_row(0, 0, 3),
    }
}

pub fn rename_candidate() -> AvailableRefactoring {
    AvailableRefactoring::Rename {
        symbol_at_point: symbol_at_point(),
    }
}

pub fn rename_request(new_name: &str) -> RefactorRequest {
    RefactorRequest::Rename(RenameRequest {
        symbol_at_point: symbol_at_point(),
        new_name: new_name.to_string(),
    })
}

pub fn fixture_edits() -> Vec<TextEdit> {
    vec![
        TextEdit {
            old_range: Range::on_row(0, 0, 3),
            old_text: "foo".to_string(),
            new_text: "bar".to_string(),
        },
        TextEdit {
            old_range: Range::on_row(2, 0, 3),
            old_text: "foo".to_string(),
            new_text: "bar".to_string(),
        },
    ]
}

pub fn fixture_response() -> RefactorResponse {
    RefactorResponse {
        edits: BTreeMap::from([(fixture_path(), fixture_edits())]),
    }
}

/// Store wired to an in-memory workspace, with a subscription taken before
/// any action is dispatched.
pub struct Harness {
    pub store: RefactorStore,
    pub states: StateStream,
    pub errors: tokio::sync::broadcast::Receiver<refactorizer::errors::RefactorError>,
    pub registry: ProviderRegistry,
    pub workspace: Arc<InMemoryWorkspace>,
}

impl Harness {
    pub fn new() -> Self {
        let registry = ProviderRegistry::new();
        let workspace = Arc::new(InMemoryWorkspace::new());
        let store = RefactorStore::new(registry.clone(), workspace.clone());
        let states = store.subscribe();
        let errors = store.errors();
        Self {
            store,
            states,
            errors,
            registry,
            workspace,
        }
    }

    /// Open the fixture file as the active editor.
    pub fn open_fixture(&self) -> Arc<TextBuffer> {
        let buffer = Arc::new(TextBuffer::new(
            Some(fixture_path()),
            FIXTURE_SCOPE,
            FIXTURE_TEXT,
        ));
        self.workspace.open(buffer.clone());
        buffer
    }

    pub fn add_provider(&self) -> Arc<ScriptedProvider> {
        let provider = Arc::new(ScriptedProvider::new());
        self.registry.add_provider(provider.clone());
        provider
    }

    pub async fn next_state(&mut self) -> RefactorState {
        tokio::time::timeout(Duration::from_secs(5), self.states.next())
            .await
            .expect("timed out waiting for a state")
            .expect("store stopped")
    }

    /// Wait until the session reaches the named phase (`closed` for Closed).
    pub async fn wait_for(&mut self, name: &str) -> RefactorState {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.states.wait_for(|state| state.name() == name),
        )
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
        .expect("store stopped")
    }

    /// Number of errors published so far.
    pub fn drain_errors(&mut self) -> usize {
        let mut count = 0;
        while self.errors.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}
