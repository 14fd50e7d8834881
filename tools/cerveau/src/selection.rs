use crate::workspace::{ScanResult, WorkspaceItem};

/// Index into the latest scan. Items are matched by position, not identity,
/// so a rescan that reorders directories simply retargets the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    index: usize,
}

impl SelectionState {
    pub fn at(index: usize) -> Self {
        Self { index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Truncates after a resize; `0` is the inert value for an empty scan.
    pub fn clamp_to(&mut self, len: usize) {
        self.index = if len == 0 { 0 } else { self.index.min(len - 1) };
    }

    /// Wrapping move used by navigation. No-op on an empty scan.
    pub fn shift(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        let len = len as isize;
        let current = self.index.min(len as usize - 1) as isize;
        self.index = (current + delta).rem_euclid(len) as usize;
    }

    pub fn select_next(&mut self, len: usize) {
        self.shift(1, len);
    }

    pub fn select_previous(&mut self, len: usize) {
        self.shift(-1, len);
    }

    pub fn selected<'a>(&self, scan: &'a ScanResult) -> Option<&'a WorkspaceItem> {
        scan.get(self.index)
    }
}
