use alloc::boxed::Box;

use crate::shadow::{
    Checksum, DefaultChecksum, ShadowError,
    eeprom::{Direct, Eeprom, EepromKind},
    layout::{ADDR_VERSION, EEPROM_SIZE, RecordId},
    registry::{Defaults, SettingsRegistry, checked_span},
    store::ShadowStore,
    table::allocate_mirror,
};

/// The active storage behind the settings registry.
///
/// Starts as [`Backend::Absent`] or [`Backend::Physical`] and moves to
/// [`Backend::Shadowed`] at most once, through [`Backend::install_shadow`].
/// The shadowed variant keeps the device it replaced for write-back.
pub enum Backend<P: Eeprom, C: Checksum = DefaultChecksum> {
    /// No non-volatile storage.
    Absent,
    /// Device accessed directly, without caching.
    Physical(P),
    /// RAM mirror installed.
    Shadowed(ShadowStore<P, C>),
}

impl<P: Eeprom, C: Checksum> Backend<P, C> {
    pub fn kind(&self) -> EepromKind {
        match self {
            Backend::Absent => EepromKind::None,
            Backend::Physical(_) => EepromKind::Physical,
            Backend::Shadowed(_) => EepromKind::Emulated,
        }
    }

    /// Installs the RAM shadow, allocating the mirror from the heap.
    ///
    /// See [`Self::install_shadow_with`].
    pub fn install_shadow(&mut self, defaults: &mut dyn Defaults) -> Result<(), ShadowError> {
        self.install_shadow_with(defaults, allocate_mirror)
    }

    /// Installs the RAM shadow over a buffer obtained from `alloc`.
    ///
    /// `alloc` is asked for [`EEPROM_SIZE`] bytes; a larger buffer is accepted
    /// but only its first [`EEPROM_SIZE`] bytes mirror the device. On success
    /// the backend is [`Backend::Shadowed`], its content established from the
    /// device (or from `defaults` when there is none) and all dirty flags clear.
    ///
    /// # Errors
    /// * [`ShadowError::Unavailable`] - if no buffer was obtained; the backend is left as it was
    /// * [`ShadowError::AlreadyShadowed`] - if the shadow is already installed
    pub fn install_shadow_with(
        &mut self,
        defaults: &mut dyn Defaults,
        alloc: impl FnOnce(usize) -> Option<Box<[u8]>>,
    ) -> Result<(), ShadowError> {
        if matches!(self, Backend::Shadowed(_)) {
            return Err(ShadowError::AlreadyShadowed);
        }

        let Some(mirror) = alloc(EEPROM_SIZE).filter(|m| m.len() >= EEPROM_SIZE) else {
            log::warn!("no memory for settings shadow, staying on {:?}", self.kind());
            return Err(ShadowError::Unavailable);
        };

        let physical = match core::mem::replace(self, Backend::Absent) {
            Backend::Absent => None,
            Backend::Physical(dev) => Some(dev),
            shadowed @ Backend::Shadowed(_) => {
                *self = shadowed;
                return Err(ShadowError::AlreadyShadowed);
            }
        };

        *self = Backend::Shadowed(ShadowStore::install(physical, defaults, mirror));
        Ok(())
    }

    /// Writes dirty records back to the device.
    ///
    /// Only does anything once shadowed. The caller must have observed the
    /// machine idle: device writes may take erase/program time.
    pub fn sync(&mut self) {
        if let Backend::Shadowed(store) = self {
            store.sync();
        }
    }

    /// Returns true if the shadow holds records not yet written back.
    pub fn is_dirty(&self) -> bool {
        match self {
            Backend::Shadowed(store) => store.dirty().is_dirty(),
            _ => false,
        }
    }

    /// The physical device, whether accessed directly or behind the shadow.
    pub fn physical(&self) -> Option<&P> {
        match self {
            Backend::Absent => None,
            Backend::Physical(dev) => Some(dev),
            Backend::Shadowed(store) => store.physical(),
        }
    }

    /// The installed shadow, if any.
    pub fn store(&self) -> Option<&ShadowStore<P, C>> {
        match self {
            Backend::Shadowed(store) => Some(store),
            _ => None,
        }
    }
}

impl<P: Eeprom, C: Checksum> SettingsRegistry for Backend<P, C> {
    fn kind(&self) -> EepromKind {
        Backend::kind(self)
    }

    fn read_version(&self) -> Option<u8> {
        match self {
            Backend::Absent => None,
            Backend::Physical(dev) => Some(dev.get_byte(ADDR_VERSION)),
            Backend::Shadowed(store) => store.read_version(),
        }
    }

    fn write_version(&mut self, version: u8) {
        match self {
            Backend::Absent => {}
            Backend::Physical(dev) => Direct::new(dev).write_version(version),
            Backend::Shadowed(store) => store.write_version(version),
        }
    }

    fn write(&mut self, record: RecordId, data: &[u8]) -> Result<(), ShadowError> {
        match self {
            Backend::Absent => checked_span(record, data.len()).map(|_| ()),
            Backend::Physical(dev) => Direct::new(dev).write(record, data),
            Backend::Shadowed(store) => store.write(record, data),
        }
    }

    fn read(&self, record: RecordId, out: &mut [u8]) -> Result<bool, ShadowError> {
        match self {
            Backend::Absent => checked_span(record, out.len()).map(|_| false),
            Backend::Physical(dev) => {
                let span = checked_span(record, out.len())?;
                Ok(dev.read_with_checksum(out, span.addr))
            }
            Backend::Shadowed(store) => store.read(record, out),
        }
    }
}

impl<P: Eeprom, C: Checksum> core::fmt::Debug for Backend<P, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Backend::Absent => f.write_str("Absent"),
            Backend::Physical(_) => f.debug_tuple("Physical").finish_non_exhaustive(),
            Backend::Shadowed(store) => f.debug_tuple("Shadowed").field(store).finish(),
        }
    }
}
