//! Pointer capture state machine.
//!
//! `Idle → Drawing → Idle` for pen and marker, `Idle → Erasing → Idle` for
//! the eraser. The transitions themselves are driven by
//! [`Canvas`](crate::Canvas), which owns the store and history they touch.

use crate::history::BatchEntry;
use crate::stroke::Stroke;

/// Strokes removed so far by the current erase gesture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EraseBatch {
    entries: Vec<BatchEntry>,
}

impl EraseBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a removal at the index the stroke had when it was removed.
    pub fn record(&mut self, stroke: Stroke, index: usize) {
        self.entries.push(BatchEntry::new(stroke, index));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }
}

/// What the pointer is currently doing.
#[derive(Debug, Clone, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Authoring a stroke. The stroke already has its id and owner.
    Drawing {
        stroke: Stroke,
        pointer_id: Option<i64>,
    },
    /// Inside one continuous erase gesture.
    Erasing {
        batch: EraseBatch,
        pointer_id: Option<i64>,
    },
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, CaptureState::Idle)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, CaptureState::Drawing { .. })
    }

    pub fn is_erasing(&self) -> bool {
        matches!(self, CaptureState::Erasing { .. })
    }

    /// Pointer that started the active gesture, if any.
    pub fn pointer_id(&self) -> Option<i64> {
        match self {
            CaptureState::Idle => None,
            CaptureState::Drawing { pointer_id, .. } | CaptureState::Erasing { pointer_id, .. } => *pointer_id,
        }
    }

    /// The in-progress stroke, while drawing.
    pub fn in_progress(&self) -> Option<&Stroke> {
        match self {
            CaptureState::Drawing { stroke, .. } => Some(stroke),
            _ => None,
        }
    }

    /// Leave the current state, returning it.
    pub fn take(&mut self) -> CaptureState {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn test_take_resets_to_idle() {
        let mut state = CaptureState::Drawing {
            stroke: Stroke::begin("me", "#000", 2.0, Point::ZERO),
            pointer_id: Some(7),
        };
        assert!(state.is_drawing());
        assert_eq!(state.pointer_id(), Some(7));
        assert!(state.in_progress().is_some());

        let previous = state.take();
        assert!(state.is_idle());
        assert!(matches!(previous, CaptureState::Drawing { .. }));
    }

    #[test]
    fn test_erase_batch() {
        let mut batch = EraseBatch::new();
        assert!(batch.is_empty());
        batch.record(Stroke::begin("me", "#000", 2.0, Point::ZERO), 3);
        assert_eq!(batch.len(), 1);
        let entries = batch.into_entries();
        assert_eq!(entries[0].index, 3);
    }
}
