pub mod config;
pub mod editor;
pub mod errors;
pub mod provider;
pub mod refactoring;
pub mod types;
pub mod word_rename;

// Re-export commonly used types
pub use refactoring::{Phase, RefactorAction, RefactorState, RefactorStore, StateStream};
pub use types::*;
