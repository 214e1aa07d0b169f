/// Bounded linear undo/redo history over full-state snapshots.
///
/// A single cursor marks the current entry. Pushing after an undo truncates
/// the redo branch; exceeding capacity evicts the oldest entry and keeps the
/// cursor pointing at the same snapshot. Snapshots are immutable once pushed
/// (segment buffers are shared via `Arc`), which is what makes restoring an
/// old entry safe after later edits.
#[derive(Debug, Clone)]
pub struct EditHistory<T: Clone> {
    entries: Vec<T>,
    cursor: usize,
    cap: usize,
}

pub const DEFAULT_HISTORY_CAP: usize = 50;

impl<T: Clone> EditHistory<T> {
    pub fn new(initial: T, cap: usize) -> Self {
        Self {
            entries: vec![initial],
            cursor: 0,
            cap: cap.max(1),
        }
    }

    pub fn current(&self) -> &T {
        &self.entries[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a snapshot, discarding any redo branch first.
    pub fn push(&mut self, state: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(state);
        if self.entries.len() > self.cap {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Move the cursor back one entry. No-op at the oldest retained entry.
    pub fn undo(&mut self) -> Option<&T> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor])
    }

    pub fn redo(&mut self) -> Option<&T> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor])
    }

    /// Discard everything and start over from `state`. Used on file load;
    /// undo history for a different source is meaningless.
    pub fn reset(&mut self, state: T) {
        self.entries.clear();
        self.entries.push(state);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_after_undo_truncates_redo_branch() {
        let mut h = EditHistory::new(0, 10);
        h.push(1);
        h.push(2);
        assert_eq!(h.undo(), Some(&1));
        h.push(9);
        assert!(!h.can_redo());
        assert_eq!(*h.current(), 9);
        assert_eq!(h.undo(), Some(&1));
        assert_eq!(h.undo(), Some(&0));
        assert_eq!(h.undo(), None);
    }

    #[test]
    fn eviction_keeps_cursor_on_latest() {
        let mut h = EditHistory::new(0, 3);
        for i in 1..=5 {
            h.push(i);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(*h.current(), 5);
        assert_eq!(h.undo(), Some(&4));
        assert_eq!(h.undo(), Some(&3));
        // 0..=2 were evicted
        assert_eq!(h.undo(), None);
    }
}
