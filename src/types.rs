use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Zero-based position in a buffer. `column` counts characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl Point {
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

/// Half-open range `[start, end)` between two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Point,
    pub end: Point,
}

impl Range {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Range on a single row.
    pub const fn on_row(row: usize, start_column: usize, end_column: usize) -> Self {
        Self::new(Point::new(row, start_column), Point::new(row, end_column))
    }

    /// True if `point` lies inside the range or touches either end.
    pub fn touches(&self, point: Point) -> bool {
        self.start <= point && point <= self.end
    }
}

/// The symbol a refactoring was requested on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAtPoint {
    pub text: String,
    pub range: Range,
}

/// A refactoring a provider is able to perform at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AvailableRefactoring {
    Rename { symbol_at_point: SymbolAtPoint },
}

impl AvailableRefactoring {
    pub fn kind(&self) -> &'static str {
        match self {
            AvailableRefactoring::Rename { .. } => "rename",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequest {
    pub symbol_at_point: SymbolAtPoint,
    pub new_name: String,
}

/// Provider-specific parameters collected from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefactorRequest {
    Rename(RenameRequest),
}

impl RefactorRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            RefactorRequest::Rename(_) => "rename",
        }
    }
}

/// Replace `old_text` found at `old_range` with `new_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub old_range: Range,
    pub old_text: String,
    pub new_text: String,
}

/// Edits to perform, grouped by file. Edits within a file are ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefactorResponse {
    pub edits: BTreeMap<PathBuf, Vec<TextEdit>>,
}

impl RefactorResponse {
    pub fn total_edits(&self) -> usize {
        self.edits.values().map(Vec::len).sum()
    }
}
