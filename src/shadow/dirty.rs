use bitmaps::Bitmap;

use crate::shadow::{
    ShadowError,
    layout::{RECORD_COUNT, RecordId},
};

/// Per-record dirty flags plus one aggregate flag.
///
/// A record is dirty while its mirror content has not been written back to
/// the physical device. The aggregate is set together with any record flag
/// and is cleared at the end of every sync pass.
#[derive(Debug, Clone)]
pub struct DirtyFlags {
    records: Bitmap<RECORD_COUNT>,
    is_dirty: bool,
}

impl DirtyFlags {
    pub fn new() -> Self {
        Self {
            records: Bitmap::new(),
            is_dirty: false,
        }
    }

    /// Marks `record` and the aggregate dirty.
    pub fn mark(&mut self, record: RecordId) -> Result<(), ShadowError> {
        let span = record.span()?;
        self.records.set(span.slot, true);
        self.is_dirty = true;
        Ok(())
    }

    /// Returns true if `record` is waiting for write-back.
    pub fn is_marked(&self, record: RecordId) -> bool {
        record
            .span()
            .map(|span| self.records.get(span.slot))
            .unwrap_or(false)
    }

    /// Returns the aggregate flag.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Number of records currently marked.
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Clears the flag at `slot`, returning whether it was set.
    pub(crate) fn take(&mut self, slot: usize) -> bool {
        self.records.set(slot, false)
    }

    pub(crate) fn clear_aggregate(&mut self) {
        self.is_dirty = false;
    }

    pub(crate) fn clear_all(&mut self) {
        self.records = Bitmap::new();
        self.is_dirty = false;
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        Self::new()
    }
}
