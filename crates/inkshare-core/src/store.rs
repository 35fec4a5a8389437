//! Ordered stroke collection.
//!
//! Insertion order doubles as render z-order (later strokes draw on top) and
//! as hit-test priority (searched from the end).

use crate::stroke::Stroke;

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A stroke with the same id existed and was replaced at this index.
    Replaced(usize),
    /// The stroke was appended at this index.
    Appended(usize),
}

/// The committed strokes of one participant's canvas.
#[derive(Debug, Clone, Default)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strokes in z-order (back to front).
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Stroke> {
        self.strokes.get(index)
    }

    /// Index of the stroke with this id.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.strokes.iter().position(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Stroke> {
        self.strokes.iter().find(|s| s.id == id)
    }

    /// Append a stroke on top. Empty strokes are refused.
    /// Returns the index it landed at.
    pub fn push(&mut self, stroke: Stroke) -> Option<usize> {
        if stroke.is_empty() {
            return None;
        }
        self.strokes.push(stroke);
        Some(self.strokes.len() - 1)
    }

    /// Insert at `index`, clamped to the current length.
    /// Returns the index actually used.
    pub fn insert(&mut self, index: usize, stroke: Stroke) -> Option<usize> {
        if stroke.is_empty() {
            return None;
        }
        let index = index.min(self.strokes.len());
        self.strokes.insert(index, stroke);
        Some(index)
    }

    /// Replace a stroke with the same id in place, or append it.
    pub fn upsert(&mut self, stroke: Stroke) -> Option<Upsert> {
        if stroke.is_empty() {
            return None;
        }
        match self.position(&stroke.id) {
            Some(index) => {
                self.strokes[index] = stroke;
                Some(Upsert::Replaced(index))
            }
            None => self.push(stroke).map(Upsert::Appended),
        }
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Stroke> {
        (index < self.strokes.len()).then(|| self.strokes.remove(index))
    }

    /// Remove the stroke with this id, returning it with the index it had.
    pub fn remove_by_id(&mut self, id: &str) -> Option<(usize, Stroke)> {
        let index = self.position(id)?;
        Some((index, self.strokes.remove(index)))
    }

    /// Remove every stroke matching `predicate`, returning how many went.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&Stroke) -> bool) -> usize {
        let before = self.strokes.len();
        self.strokes.retain(|s| !predicate(s));
        before - self.strokes.len()
    }

    /// Remove every stroke owned by `owner`, scanning from the top down.
    ///
    /// Each returned entry carries the index the stroke occupied at the
    /// moment it was removed. Because removal proceeds from the end, those
    /// indices are also the stroke's original positions.
    pub fn drain_owned(&mut self, owner: &str) -> Vec<(Stroke, usize)> {
        let mut removed = Vec::new();
        for index in (0..self.strokes.len()).rev() {
            if self.strokes[index].is_owned_by(owner) {
                removed.push((self.strokes.remove(index), index));
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.strokes.iter().map(|s| s.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn stroke(owner: &str) -> Stroke {
        Stroke::begin(owner, "#000", 2.0, Point::ZERO)
    }

    #[test]
    fn test_push_and_order() {
        let mut store = StrokeStore::new();
        let a = stroke("a");
        let b = stroke("a");
        store.push(a.clone());
        store.push(b.clone());
        assert_eq!(store.ids(), vec![a.id, b.id]);
    }

    #[test]
    fn test_refuses_empty_stroke() {
        let mut store = StrokeStore::new();
        let mut s = stroke("a");
        s.points.clear();
        assert!(store.push(s.clone()).is_none());
        assert!(store.upsert(s.clone()).is_none());
        assert!(store.insert(0, s).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut store = StrokeStore::new();
        let a = stroke("a");
        let b = stroke("b");
        store.push(a.clone());
        store.push(b.clone());

        let mut a2 = a.clone();
        a2.color = "#f00".to_string();
        assert_eq!(store.upsert(a2), Some(Upsert::Replaced(0)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().color, "#f00");

        assert_eq!(store.upsert(stroke("c")), Some(Upsert::Appended(2)));
    }

    #[test]
    fn test_insert_clamps() {
        let mut store = StrokeStore::new();
        store.push(stroke("a"));
        assert_eq!(store.insert(10, stroke("a")), Some(1));
        assert_eq!(store.insert(0, stroke("a")), Some(0));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_remove_by_id() {
        let mut store = StrokeStore::new();
        let a = stroke("a");
        let b = stroke("a");
        store.push(a.clone());
        store.push(b.clone());
        let (index, removed) = store.remove_by_id(&b.id).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed.id, b.id);
        assert!(store.remove_by_id(&b.id).is_none());
        assert!(store.remove_at(5).is_none());
    }

    #[test]
    fn test_drain_owned_records_original_indices() {
        let mut store = StrokeStore::new();
        let mine0 = stroke("me");
        let theirs = stroke("them");
        let mine2 = stroke("me");
        store.push(mine0.clone());
        store.push(theirs.clone());
        store.push(mine2.clone());

        let removed = store.drain_owned("me");
        let summary: Vec<(String, usize)> = removed.iter().map(|(s, i)| (s.id.clone(), *i)).collect();
        assert_eq!(summary, vec![(mine2.id, 2), (mine0.id, 0)]);
        assert_eq!(store.ids(), vec![theirs.id]);
    }

    #[test]
    fn test_remove_where() {
        let mut store = StrokeStore::new();
        store.push(stroke("a"));
        store.push(stroke("b"));
        store.push(stroke("a"));
        assert_eq!(store.remove_where(|s| s.owner == "a"), 2);
        assert_eq!(store.len(), 1);
    }
}
