//! Ownership-scoped undo/redo history.
//!
//! The stacks only record actions whose subject is a stroke owned by the
//! local participant. Applying an entry lives in [`Canvas`](crate::Canvas);
//! this module owns the data and the stack discipline.

use crate::stroke::Stroke;

/// A removed stroke together with the index it occupied when removed.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub stroke: Stroke,
    pub index: usize,
}

impl BatchEntry {
    pub fn new(stroke: Stroke, index: usize) -> Self {
        Self { stroke, index }
    }
}

/// Which gesture produced a batch removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    /// One continuous erase gesture.
    Erase,
    /// A clear-all of the local participant's strokes.
    Clear,
}

/// One undoable local action.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    /// A stroke was added at `index`.
    Draw { stroke: Stroke, index: usize },
    /// One erase gesture removed these strokes, in removal order.
    EraseBatch { entries: Vec<BatchEntry> },
    /// A clear removed these strokes, in removal order.
    ClearBatch { entries: Vec<BatchEntry> },
}

impl UndoEntry {
    /// Build a batch entry of the given kind.
    pub fn batch(kind: BatchKind, entries: Vec<BatchEntry>) -> Self {
        match kind {
            BatchKind::Erase => UndoEntry::EraseBatch { entries },
            BatchKind::Clear => UndoEntry::ClearBatch { entries },
        }
    }

    /// Ids of every stroke this entry refers to.
    pub fn stroke_ids(&self) -> Vec<&str> {
        match self {
            UndoEntry::Draw { stroke, .. } => vec![stroke.id.as_str()],
            UndoEntry::EraseBatch { entries } | UndoEntry::ClearBatch { entries } => {
                entries.iter().map(|e| e.stroke.id.as_str()).collect()
            }
        }
    }

    /// True if every stroke this entry names is owned by `owner`.
    pub fn is_owned_by(&self, owner: &str) -> bool {
        match self {
            UndoEntry::Draw { stroke, .. } => stroke.is_owned_by(owner),
            UndoEntry::EraseBatch { entries } | UndoEntry::ClearBatch { entries } => {
                entries.iter().all(|e| e.stroke.is_owned_by(owner))
            }
        }
    }
}

/// Keep only batch entries whose stroke is owned by `owner`.
pub fn retain_owned(entries: Vec<BatchEntry>, owner: &str) -> Vec<BatchEntry> {
    entries
        .into_iter()
        .filter(|e| e.stroke.is_owned_by(owner))
        .collect()
}

/// Undo and redo stacks.
#[derive(Debug, Clone, Default)]
pub struct History {
    undo: Vec<UndoEntry>,
    redo: Vec<UndoEntry>,
    /// Maximum number of undo entries kept (oldest dropped first).
    limit: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    /// Record a new local action. Clears the redo stack.
    pub fn record(&mut self, entry: UndoEntry) {
        self.push_undo(entry);
        self.redo.clear();
    }

    /// Push onto the undo stack without touching redo (used by redo itself).
    pub fn push_undo(&mut self, entry: UndoEntry) {
        self.undo.push(entry);
        if let Some(limit) = self.limit {
            if self.undo.len() > limit {
                let excess = self.undo.len() - limit;
                self.undo.drain(..excess);
            }
        }
    }

    pub fn push_redo(&mut self, entry: UndoEntry) {
        self.redo.push(entry);
    }

    pub fn pop_undo(&mut self) -> Option<UndoEntry> {
        self.undo.pop()
    }

    pub fn pop_redo(&mut self) -> Option<UndoEntry> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_entries(&self) -> &[UndoEntry] {
        &self.undo
    }

    pub fn redo_entries(&self) -> &[UndoEntry] {
        &self.redo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn draw(owner: &str) -> UndoEntry {
        UndoEntry::Draw {
            stroke: Stroke::begin(owner, "#000", 2.0, Point::ZERO),
            index: 0,
        }
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new();
        history.record(draw("me"));
        let entry = history.pop_undo().unwrap();
        history.push_redo(entry);
        assert!(history.can_redo());

        history.record(draw("me"));
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }

    #[test]
    fn test_push_undo_keeps_redo() {
        let mut history = History::new();
        history.push_redo(draw("me"));
        history.push_undo(draw("me"));
        assert!(history.can_redo());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::with_limit(Some(2));
        let first = draw("me");
        history.record(first.clone());
        history.record(draw("me"));
        history.record(draw("me"));
        assert_eq!(history.undo_entries().len(), 2);
        assert!(!history.undo_entries().contains(&first));
    }

    #[test]
    fn test_retain_owned() {
        let entries = vec![
            BatchEntry::new(Stroke::begin("me", "#000", 1.0, Point::ZERO), 0),
            BatchEntry::new(Stroke::begin("them", "#000", 1.0, Point::ZERO), 1),
        ];
        let kept = retain_owned(entries, "me");
        assert_eq!(kept.len(), 1);
        assert!(UndoEntry::batch(BatchKind::Erase, kept).is_owned_by("me"));
    }

    #[test]
    fn test_batch_kind_tags() {
        assert!(matches!(UndoEntry::batch(BatchKind::Clear, vec![]), UndoEntry::ClearBatch { .. }));
        assert!(matches!(UndoEntry::batch(BatchKind::Erase, vec![]), UndoEntry::EraseBatch { .. }));
    }
}
