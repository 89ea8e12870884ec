use crate::ast::Block;
use dashmap::DashMap;
use std::sync::Arc;

/// Compilation cache keyed by verbatim source text.
///
/// Two tables share the key: the compiled block, and the pre-split
/// source lines used for error snippets. Entries are immutable once
/// published; concurrent inserts of the same key are structurally
/// equivalent, so last-writer-wins is fine.
pub(crate) struct CompileCache {
    blocks: DashMap<String, Arc<Block>>,
    lines: DashMap<String, Arc<Vec<String>>>,
}

impl CompileCache {
    pub(crate) fn new() -> Self {
        Self {
            blocks: DashMap::new(),
            lines: DashMap::new(),
        }
    }

    pub(crate) fn get_block(&self, script: &str) -> Option<Arc<Block>> {
        self.blocks.get(script).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert_block(&self, script: &str, block: Arc<Block>) {
        self.blocks.insert(script.to_string(), block);
    }

    /// The split line table for a script, computed and cached lazily so
    /// the compile-failure path can still produce snippets.
    pub(crate) fn lines_for(&self, script: &str) -> Arc<Vec<String>> {
        if let Some(entry) = self.lines.get(script) {
            return entry.value().clone();
        }
        let lines = Arc::new(split_lines(script));
        self.lines.insert(script.to_string(), lines.clone());
        lines
    }

    pub(crate) fn clear(&self) {
        self.blocks.clear();
        self.lines.clear();
    }
}

/// Splits source into display lines; CRLF and LF both terminate a line.
pub(crate) fn split_lines(script: &str) -> Vec<String> {
    script.lines().map(|l| l.to_string()).collect()
}
