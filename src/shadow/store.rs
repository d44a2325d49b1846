use alloc::boxed::Box;

use crate::shadow::{
    Checksum, DefaultChecksum, ShadowError,
    dirty::DirtyFlags,
    eeprom::{Direct, Eeprom, EepromKind},
    layout::{ADDR_VERSION, EEPROM_SIZE, RecordId, SETTINGS_VERSION},
    registry::{Defaults, SettingsRegistry, checked_span},
    table::ShadowTable,
};

/// Installed shadow: mirror buffer, dirty flags and the device it fronts.
///
/// # Type Parameters
/// - `P`: Physical device retained from before installation, if there was one
/// - `C`: Checksum appended to records in the mirror
///
/// Owned by the main loop. Nothing here is touched from interrupt context,
/// so it needs no locking; sync must only be called while the machine is
/// idle (see [`Protocol`](crate::realtime::Protocol)).
pub struct ShadowStore<P: Eeprom, C: Checksum = DefaultChecksum> {
    table: ShadowTable<C>,
    dirty: DirtyFlags,
    physical: Option<P>,
}

impl<P: Eeprom, C: Checksum> ShadowStore<P, C> {
    /// Builds the shadow over `mirror` and brings it to a consistent state.
    ///
    /// With a device: re-initializes it first on version mismatch, then
    /// copies its whole address range into the mirror. Without one: restores
    /// every default record into the mirror. All dirty flags end up clear.
    pub(crate) fn install(
        mut physical: Option<P>,
        defaults: &mut dyn Defaults,
        mirror: Box<[u8]>,
    ) -> Self {
        let mut table = ShadowTable::new(mirror);

        if let Some(dev) = physical.as_mut() {
            let stored = dev.get_byte(ADDR_VERSION);
            if stored != SETTINGS_VERSION {
                log::warn!(
                    "stored settings version {stored} != {SETTINGS_VERSION}, writing defaults to device"
                );
                defaults.version_mismatch(&mut Direct::new(dev));
            }

            for addr in 0..EEPROM_SIZE as u32 {
                table.put_byte(addr, dev.get_byte(addr));
            }
        }

        let mut store = Self {
            table,
            dirty: DirtyFlags::new(),
            physical,
        };

        if store.physical.is_none() {
            defaults.restore_all(&mut store);
        }

        store.dirty.clear_all();
        log::info!(
            "settings shadow installed ({EEPROM_SIZE} bytes, physical backing: {})",
            store.physical.is_some()
        );
        store
    }

    /// Flushes dirty records to the physical device.
    ///
    /// Each dirty record's flag is cleared before its single checksummed
    /// write is issued. Without a device nothing is written and all flags are
    /// dropped, since the mirror is the only copy. The aggregate flag is
    /// always clear afterwards. Cheap when nothing is dirty.
    pub fn sync(&mut self) {
        if self.dirty.is_dirty() {
            match self.physical.as_mut() {
                Some(dev) => {
                    for span in RecordId::all() {
                        if !self.dirty.take(span.slot) {
                            continue;
                        }
                        let flushed = self.table.with_bytes(span.addr, span.len, |data| {
                            dev.write_with_checksum(span.addr, data)
                        });
                        match flushed {
                            Ok(()) => log::debug!("flushed {:?} at {}", span.id, span.addr),
                            Err(err) => log::error!("cannot flush {:?}: {err}", span.id),
                        }
                    }
                }
                None => self.dirty.clear_all(),
            }
        }

        self.dirty.clear_aggregate();
    }

    /// Dirty state of the mirror.
    pub fn dirty(&self) -> &DirtyFlags {
        &self.dirty
    }

    /// The device retained at installation, if any.
    pub fn physical(&self) -> Option<&P> {
        self.physical.as_ref()
    }

    /// Reads a raw byte of the mirror.
    pub fn get_byte(&self, addr: u32) -> u8 {
        self.table.get_byte(addr)
    }
}

impl<P: Eeprom, C: Checksum> SettingsRegistry for ShadowStore<P, C> {
    fn kind(&self) -> EepromKind {
        EepromKind::Emulated
    }

    fn read_version(&self) -> Option<u8> {
        Some(self.table.get_byte(ADDR_VERSION))
    }

    fn write_version(&mut self, version: u8) {
        self.table.put_byte(ADDR_VERSION, version);
    }

    fn write(&mut self, record: RecordId, data: &[u8]) -> Result<(), ShadowError> {
        let span = checked_span(record, data.len())?;
        self.table.write_with_checksum(span.addr, data);
        self.dirty.mark(record)
    }

    fn read(&self, record: RecordId, out: &mut [u8]) -> Result<bool, ShadowError> {
        let span = checked_span(record, out.len())?;
        Ok(self.table.read_with_checksum(out, span.addr))
    }
}

impl<P: Eeprom, C: Checksum> core::fmt::Debug for ShadowStore<P, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowStore")
            .field("dirty", &self.dirty)
            .field("physical", &self.physical.is_some())
            .finish_non_exhaustive()
    }
}
