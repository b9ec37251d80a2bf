//! # Word Rename Provider
//!
//! Built-in provider that renames the identifier under the cursor by
//! replacing every whole-word occurrence of it in the document.

use crate::editor::EditorSession;
use crate::provider::RefactorProvider;
use crate::types::{
    AvailableRefactoring, Point, Range, RefactorRequest, RefactorResponse, SymbolAtPoint,
    TextEdit,
};
use anyhow::{Context, bail};
use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

const IDENTIFIER: &str = r"[A-Za-z_][A-Za-z0-9_]*";

pub struct WordRenameProvider {
    scopes: Vec<String>,
    priority: i32,
    identifier: Regex,
    valid_name: Regex,
}

impl WordRenameProvider {
    pub fn new(scopes: Vec<String>, priority: i32) -> Self {
        Self {
            scopes,
            priority,
            // Unicode word boundaries keep `0x1f` and `éfoo` from matching `x1f` and `foo`.
            identifier: Regex::new(&format!(r"\b{IDENTIFIER}\b"))
                .expect("identifier regex is valid"),
            valid_name: Regex::new(&format!("^{IDENTIFIER}$")).expect("identifier regex is valid"),
        }
    }

    /// Identifier touching `point`, if any.
    pub fn symbol_at(&self, text: &str, point: Point) -> Option<SymbolAtPoint> {
        let line = text.split('\n').nth(point.row)?;
        self.identifier
            .find_iter(line)
            .map(|m| SymbolAtPoint {
                text: m.as_str().to_string(),
                range: Range::on_row(
                    point.row,
                    char_column(line, m.start()),
                    char_column(line, m.end()),
                ),
            })
            .find(|symbol| symbol.range.touches(point))
    }

    /// One edit per whole-word occurrence of `old` in `text`.
    pub fn occurrences(&self, text: &str, old: &str, new: &str) -> Vec<TextEdit> {
        let mut edits = Vec::new();
        for (row, line) in text.split('\n').enumerate() {
            for m in self.identifier.find_iter(line) {
                if m.as_str() != old {
                    continue;
                }
                edits.push(TextEdit {
                    old_range: Range::on_row(
                        row,
                        char_column(line, m.start()),
                        char_column(line, m.end()),
                    ),
                    old_text: old.to_string(),
                    new_text: new.to_string(),
                });
            }
        }
        edits
    }
}

fn char_column(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset].chars().count()
}

#[async_trait]
impl RefactorProvider for WordRenameProvider {
    fn name(&self) -> &str {
        "word-rename"
    }

    fn grammar_scopes(&self) -> &[String] {
        &self.scopes
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn refactorings_at_point(
        &self,
        editor: Arc<dyn EditorSession>,
        point: Point,
    ) -> anyhow::Result<Vec<AvailableRefactoring>> {
        let text = editor.text();
        Ok(self
            .symbol_at(&text, point)
            .map(|symbol_at_point| AvailableRefactoring::Rename { symbol_at_point })
            .into_iter()
            .collect())
    }

    async fn refactor(
        &self,
        editor: Arc<dyn EditorSession>,
        request: RefactorRequest,
    ) -> anyhow::Result<Option<RefactorResponse>> {
        let RefactorRequest::Rename(rename) = request;
        if !self.valid_name.is_match(&rename.new_name) {
            bail!("'{}' is not a valid identifier", rename.new_name);
        }
        let old = rename.symbol_at_point.text;
        if old == rename.new_name {
            return Ok(None);
        }

        let path: PathBuf = editor.path().context("cannot rename in an untitled editor")?;
        let edits = self.occurrences(&editor.text(), &old, &rename.new_name);
        debug!("Renaming {} occurrences of {}", edits.len(), old);
        if edits.is_empty() {
            return Ok(None);
        }
        Ok(Some(RefactorResponse {
            edits: BTreeMap::from([(path, edits)]),
        }))
    }
}
