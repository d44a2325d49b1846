use crate::shadow::{
    ShadowError,
    eeprom::EepromKind,
    layout::{RecordId, RecordSpan},
};

/// Record-level access to the settings address space.
///
/// The only path writers use: every write is checksummed, and when the
/// shadow is installed it also marks the record dirty. A write is visible to
/// the next read through the same registry.
pub trait SettingsRegistry {
    /// Kind of storage behind this registry.
    fn kind(&self) -> EepromKind;

    /// Reads the version byte, or `None` without storage.
    fn read_version(&self) -> Option<u8>;

    /// Stores the version byte. Not a tracked record.
    fn write_version(&mut self, version: u8);

    /// Writes a record payload followed by its checksum.
    ///
    /// # Errors
    /// * [`ShadowError::InvalidRecord`] - if the record index is out of range
    /// * [`ShadowError::LengthMismatch`] - if `data` is not exactly the record length
    fn write(&mut self, record: RecordId, data: &[u8]) -> Result<(), ShadowError>;

    /// Reads a record payload into `out`.
    ///
    /// Returns `Ok(false)` when the stored checksum does not match; `out`
    /// then holds whatever bytes were stored.
    fn read(&self, record: RecordId, out: &mut [u8]) -> Result<bool, ShadowError>;
}

/// Factory-defaults collaborator invoked while installing the shadow.
pub trait Defaults {
    /// Writes every default record through `registry`.
    fn restore_all(&mut self, registry: &mut dyn SettingsRegistry);

    /// Called against the physical device, before it is mirrored, when its
    /// version byte differs from the expected one.
    fn version_mismatch(&mut self, registry: &mut dyn SettingsRegistry) {
        self.restore_all(registry)
    }
}

/// Resolves `record` and checks the caller's buffer matches its length.
pub(crate) fn checked_span(record: RecordId, len: usize) -> Result<RecordSpan, ShadowError> {
    let span = record.span()?;
    if len != span.len {
        return Err(ShadowError::LengthMismatch);
    }
    Ok(span)
}
