//! Test support utilities - only compiled in test builds.

use alloc::{boxed::Box, vec};

use crate::shadow::{
    Backend, ShadowStore,
    eeprom::{Eeprom, read_bytes_with_checksum, write_bytes_with_checksum},
    layout::{ADDR_VERSION, EEPROM_SIZE, MAX_STORED_LINE_LENGTH, RecordId, SETTINGS_VERSION},
    registry::{Defaults, SettingsRegistry},
    DefaultChecksum,
};

pub type TestStore = ShadowStore<MockEeprom>;
pub type TestBackend = Backend<MockEeprom>;

/// Build-info text written by [`MarkerDefaults`].
pub const MARKER: &[u8] = b"factory-defaults";

/// Zeroed buffer usable as a mirror.
pub fn zeroed(len: usize) -> Box<[u8]> {
    vec![0u8; len].into_boxed_slice()
}

/// In-memory physical EEPROM that records every checksummed write.
#[derive(Clone, PartialEq, Eq)]
pub struct MockEeprom {
    pub bytes: [u8; EEPROM_SIZE],
    /// `(address, payload length)` of each checksummed write, in order.
    pub checksummed_writes: heapless::Vec<(u32, usize), 64>,
}

impl MockEeprom {
    /// Erased device (all zeros, so the version byte mismatches).
    pub fn new() -> Self {
        Self {
            bytes: [0; EEPROM_SIZE],
            checksummed_writes: heapless::Vec::new(),
        }
    }

    pub fn with_version(version: u8) -> Self {
        let mut dev = Self::new();
        dev.bytes[ADDR_VERSION as usize] = version;
        dev
    }
}

impl core::fmt::Debug for MockEeprom {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MockEeprom")
            .field("version", &self.bytes[ADDR_VERSION as usize])
            .field("checksummed_writes", &self.checksummed_writes)
            .finish_non_exhaustive()
    }
}

impl Eeprom for MockEeprom {
    fn get_byte(&self, addr: u32) -> u8 {
        self.bytes[addr as usize]
    }

    fn put_byte(&mut self, addr: u32, value: u8) {
        self.bytes[addr as usize] = value;
    }

    fn write_with_checksum(&mut self, dest: u32, src: &[u8]) {
        self.checksummed_writes
            .push((dest, src.len()))
            .expect("too many writes recorded");
        write_bytes_with_checksum::<DefaultChecksum, _>(self, dest, src);
    }

    fn read_with_checksum(&self, dest: &mut [u8], src: u32) -> bool {
        read_bytes_with_checksum::<DefaultChecksum, _>(self, dest, src)
    }
}

/// Defaults collaborator that writes the version byte and a build-info
/// marker, and counts how it was invoked.
#[derive(Debug, Default)]
pub struct MarkerDefaults {
    pub restore_calls: usize,
    pub version_mismatch_calls: usize,
}

impl MarkerDefaults {
    fn write_marker(registry: &mut dyn SettingsRegistry) {
        let mut line = [0u8; MAX_STORED_LINE_LENGTH];
        line[..MARKER.len()].copy_from_slice(MARKER);
        registry.write_version(SETTINGS_VERSION);
        registry.write(RecordId::BuildInfo, &line).unwrap();
    }
}

impl Defaults for MarkerDefaults {
    fn restore_all(&mut self, registry: &mut dyn SettingsRegistry) {
        self.restore_calls += 1;
        Self::write_marker(registry);
    }

    fn version_mismatch(&mut self, registry: &mut dyn SettingsRegistry) {
        self.version_mismatch_calls += 1;
        Self::write_marker(registry);
    }
}
