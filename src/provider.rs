//! # Refactor Providers
//!
//! Providers enumerate and execute refactorings for the grammar scopes they
//! declare. The registry picks one provider per document.

use crate::editor::EditorSession;
use crate::types::{AvailableRefactoring, Point, RefactorRequest, RefactorResponse};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[async_trait]
pub trait RefactorProvider: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    fn grammar_scopes(&self) -> &[String];

    /// Higher wins when several providers serve the same scope.
    fn priority(&self) -> i32;

    async fn refactorings_at_point(
        &self,
        editor: Arc<dyn EditorSession>,
        point: Point,
    ) -> anyhow::Result<Vec<AvailableRefactoring>>;

    /// `Ok(None)` means there is nothing to change.
    async fn refactor(
        &self,
        editor: Arc<dyn EditorSession>,
        request: RefactorRequest,
    ) -> anyhow::Result<Option<RefactorResponse>>;
}

/// Registered providers, in registration order.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<Vec<Arc<dyn RefactorProvider>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&self, provider: Arc<dyn RefactorProvider>) {
        debug!("Registering refactor provider '{}'", provider.name());
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    /// Remove a previously added provider. Returns false if it was not registered.
    pub fn remove_provider(&self, provider: &Arc<dyn RefactorProvider>) -> bool {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        let before = providers.len();
        providers.retain(|p| !Arc::ptr_eq(p, provider));
        before != providers.len()
    }

    pub fn len(&self) -> usize {
        self.providers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provider for `scope`: highest priority first, ties go to the earliest registered.
    pub fn find(&self, scope: &str) -> Option<Arc<dyn RefactorProvider>> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        let mut best: Option<&Arc<dyn RefactorProvider>> = None;
        for provider in providers.iter() {
            if !provider.grammar_scopes().iter().any(|s| s == scope) {
                continue;
            }
            if best.is_none_or(|b| provider.priority() > b.priority()) {
                best = Some(provider);
            }
        }
        best.cloned()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_list()
            .entries(providers.iter().map(|p| p.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: String,
        scopes: Vec<String>,
        priority: i32,
    }

    #[async_trait]
    impl RefactorProvider for Named {
        fn name(&self) -> &str {
            &self.name
        }

        fn grammar_scopes(&self) -> &[String] {
            &self.scopes
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn refactorings_at_point(
            &self,
            _editor: Arc<dyn EditorSession>,
            _point: Point,
        ) -> anyhow::Result<Vec<AvailableRefactoring>> {
            Ok(vec![])
        }

        async fn refactor(
            &self,
            _editor: Arc<dyn EditorSession>,
            _request: RefactorRequest,
        ) -> anyhow::Result<Option<RefactorResponse>> {
            Ok(None)
        }
    }

    fn provider(name: &str, scope: &str, priority: i32) -> Arc<dyn RefactorProvider> {
        Arc::new(Named {
            name: name.to_string(),
            scopes: vec![scope.to_string()],
            priority,
        })
    }

    #[test]
    fn test_find_prefers_highest_priority() {
        let registry = ProviderRegistry::new();
        registry.add_provider(provider("low", "source.rust", 1));
        registry.add_provider(provider("high", "source.rust", 5));
        registry.add_provider(provider("other", "source.js", 10));

        assert_eq!(registry.find("source.rust").unwrap().name(), "high");
        assert_eq!(registry.find("source.js").unwrap().name(), "other");
        assert!(registry.find("source.python").is_none());
    }

    #[test]
    fn test_find_breaks_ties_by_registration_order() {
        let registry = ProviderRegistry::new();
        registry.add_provider(provider("first", "text.plain", 1));
        registry.add_provider(provider("second", "text.plain", 1));
        assert_eq!(registry.find("text.plain").unwrap().name(), "first");
    }

    #[test]
    fn test_remove_provider() {
        let registry = ProviderRegistry::new();
        let p = provider("only", "text.plain", 1);
        registry.add_provider(p.clone());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_provider(&p));
        assert!(!registry.remove_provider(&p));
        assert!(registry.find("text.plain").is_none());
        assert!(registry.is_empty());
    }
}
