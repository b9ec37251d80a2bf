//! # Editor Collaborators
//!
//! The store only talks to editors through [`EditorSession`] and
//! [`Workspace`]. [`TextBuffer`] and [`InMemoryWorkspace`] are in-memory
//! implementations used by the command line tool and the tests.

use crate::errors::RefactorError;
use crate::types::{Point, TextEdit};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// A live editor: cursor, text and an entry point for applying edits.
pub trait EditorSession: Send + Sync {
    /// File backing the editor, `None` for untitled buffers.
    fn path(&self) -> Option<PathBuf>;
    /// Grammar scope of the document, e.g. `source.rust`.
    fn grammar_scope(&self) -> String;
    fn cursor_position(&self) -> Point;
    fn text(&self) -> String;
    /// Apply all edits or none of them.
    fn apply_edits(&self, edits: &[TextEdit]) -> Result<(), RefactorError>;
}

/// The host's set of open editors.
pub trait Workspace: Send + Sync {
    fn active_editor(&self) -> Option<Arc<dyn EditorSession>>;
    fn editor_for_path(&self, path: &Path) -> Option<Arc<dyn EditorSession>>;
}

#[derive(Debug)]
struct BufferState {
    text: String,
    cursor: Point,
}

/// Thread-safe in-memory text buffer.
#[derive(Debug)]
pub struct TextBuffer {
    path: Option<PathBuf>,
    grammar_scope: String,
    state: RwLock<BufferState>,
}

impl TextBuffer {
    pub fn new(path: Option<PathBuf>, grammar_scope: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path,
            grammar_scope: grammar_scope.into(),
            state: RwLock::new(BufferState {
                text: text.into(),
                cursor: Point::new(0, 0),
            }),
        }
    }

    /// Read `path` into a new buffer.
    pub fn load(path: impl Into<PathBuf>, grammar_scope: impl Into<String>) -> Result<Self, RefactorError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path)?;
        Ok(Self::new(Some(path), grammar_scope, text))
    }

    /// Write the buffer back to its path.
    pub fn save(&self) -> Result<(), RefactorError> {
        let path = self.path.as_ref().ok_or_else(|| {
            RefactorError::InvalidEdit("cannot save an untitled buffer".to_string())
        })?;
        std::fs::write(path, self.text())?;
        debug!("Saved buffer to {}", path.display());
        Ok(())
    }

    pub fn set_cursor(&self, point: Point) {
        self.write_state().cursor = point;
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BufferState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BufferState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Byte offset of `point` in `text`, if the point exists.
fn offset_of(text: &str, point: Point) -> Option<usize> {
    let mut line_start = 0;
    for (row, line) in text.split('\n').enumerate() {
        if row == point.row {
            if point.column == 0 {
                return Some(line_start);
            }
            return line
                .char_indices()
                .map(|(idx, _)| idx)
                .chain(std::iter::once(line.len()))
                .nth(point.column)
                .map(|idx| line_start + idx);
        }
        line_start += line.len() + 1;
    }
    None
}

/// Resolve, validate and splice `edits` into `text`.
fn splice(text: &str, edits: &[TextEdit]) -> Result<String, RefactorError> {
    let mut resolved = Vec::with_capacity(edits.len());
    for edit in edits {
        let start = offset_of(text, edit.old_range.start);
        let end = offset_of(text, edit.old_range.end);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if start <= end => (start, end),
            _ => {
                return Err(RefactorError::InvalidEdit(format!(
                    "range {}-{} is outside the buffer",
                    edit.old_range.start, edit.old_range.end
                )));
            }
        };
        let found = &text[start..end];
        if found != edit.old_text {
            return Err(RefactorError::InvalidEdit(format!(
                "expected '{}' at {} but found '{}'",
                edit.old_text, edit.old_range.start, found
            )));
        }
        resolved.push((start, end, edit.new_text.as_str()));
    }

    resolved.sort_by_key(|(start, end, _)| (*start, *end));
    if resolved.windows(2).any(|pair| pair[0].1 > pair[1].0) {
        return Err(RefactorError::InvalidEdit("edits overlap".to_string()));
    }

    let mut result = text.to_string();
    for (start, end, new_text) in resolved.into_iter().rev() {
        result.replace_range(start..end, new_text);
    }
    Ok(result)
}

impl EditorSession for TextBuffer {
    fn path(&self) -> Option<PathBuf> {
        self.path.clone()
    }

    fn grammar_scope(&self) -> String {
        self.grammar_scope.clone()
    }

    fn cursor_position(&self) -> Point {
        self.read_state().cursor
    }

    fn text(&self) -> String {
        self.read_state().text.clone()
    }

    fn apply_edits(&self, edits: &[TextEdit]) -> Result<(), RefactorError> {
        let mut state = self.write_state();
        state.text = splice(&state.text, edits)?;
        debug!("Applied {} edits", edits.len());
        Ok(())
    }
}

/// Workspace holding [`TextBuffer`]s, one of which may be active.
#[derive(Debug, Default)]
pub struct InMemoryWorkspace {
    buffers: RwLock<Vec<Arc<TextBuffer>>>,
    active: RwLock<Option<usize>>,
}

impl InMemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a buffer and make it the active editor.
    pub fn open(&self, buffer: Arc<TextBuffer>) {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        buffers.push(buffer);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(buffers.len() - 1);
    }

    /// Make the buffer open at `path` active. Returns false if none is.
    pub fn activate(&self, path: &Path) -> bool {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        match buffers.iter().position(|b| b.path.as_deref() == Some(path)) {
            Some(idx) => {
                *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear_active(&self) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Workspace for InMemoryWorkspace {
    fn active_editor(&self) -> Option<Arc<dyn EditorSession>> {
        let active = *self.active.read().unwrap_or_else(PoisonError::into_inner);
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        active
            .and_then(|idx| buffers.get(idx).cloned())
            .map(|buffer| buffer as Arc<dyn EditorSession>)
    }

    fn editor_for_path(&self, path: &Path) -> Option<Arc<dyn EditorSession>> {
        let buffers = self.buffers.read().unwrap_or_else(PoisonError::into_inner);
        buffers
            .iter()
            .find(|b| b.path.as_deref() == Some(path))
            .cloned()
            .map(|buffer| buffer as Arc<dyn EditorSession>)
    }
}
