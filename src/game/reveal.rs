use crate::protocol::{Album, StepKind};

/// Position of the reveal within the album list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RevealCursor {
    pub album_index: usize,
    pub step_index: usize,
}

impl RevealCursor {
    /// Cursor on the first step of the first album.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> (usize, usize) {
        (self.album_index, self.step_index)
    }

    /// Move to the next step, rolling over to the next album's first step.
    /// Returns false, leaving the cursor untouched, once every album has
    /// been shown.
    pub fn advance(&mut self, albums: &[Album]) -> bool {
        let Some(album) = albums.get(self.album_index) else {
            return false;
        };
        if self.step_index + 1 < album.len() {
            self.step_index += 1;
            return true;
        }
        // Skip albums with nothing to show.
        let mut next = self.album_index + 1;
        while let Some(album) = albums.get(next) {
            if !album.is_empty() {
                self.album_index = next;
                self.step_index = 0;
                return true;
            }
            next += 1;
        }
        false
    }

    /// Kind of the step under the cursor, which decides its dwell time.
    pub fn current_kind(&self, albums: &[Album]) -> Option<StepKind> {
        albums
            .get(self.album_index)
            .and_then(|a| a.steps.get(self.step_index))
            .map(|s| s.kind)
    }
}
