//! Byte-level storage capability and the direct (unshadowed) registry adapter.

use crate::shadow::{
    Checksum, DefaultChecksum, ShadowError,
    layout::{ADDR_VERSION, RecordId},
    registry::{SettingsRegistry, checked_span},
};

/// Kind of storage currently backing the settings address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromKind {
    /// No non-volatile storage; writes are dropped.
    None,
    /// Byte-addressable non-volatile device accessed directly.
    Physical,
    /// RAM mirror installed in front of (or instead of) a device.
    Emulated,
}

/// Byte-addressable non-volatile storage device.
///
/// Implemented by the board's EEPROM/flash driver. The checksummed bulk
/// operations have provided implementations in terms of `get_byte`/`put_byte`
/// using [`DefaultChecksum`]; drivers with faster page access may override them
/// as long as the on-device format stays the same.
pub trait Eeprom {
    /// Reads the byte stored at `addr`.
    fn get_byte(&self, addr: u32) -> u8;

    /// Stores `value` at `addr`.
    fn put_byte(&mut self, addr: u32, value: u8);

    /// Writes `src` at `dest` followed by one checksum byte over `src`.
    fn write_with_checksum(&mut self, dest: u32, src: &[u8]) {
        write_bytes_with_checksum::<DefaultChecksum, _>(self, dest, src)
    }

    /// Copies `dest.len()` bytes from `src` and returns whether the checksum
    /// stored right after them matches.
    fn read_with_checksum(&self, dest: &mut [u8], src: u32) -> bool {
        read_bytes_with_checksum::<DefaultChecksum, _>(self, dest, src)
    }
}

/// Byte-wise checksummed write through any [`Eeprom`].
pub fn write_bytes_with_checksum<C, E>(dev: &mut E, dest: u32, src: &[u8])
where
    C: Checksum,
    E: Eeprom + ?Sized,
{
    let checksum = C::checksum(src);
    let mut addr = dest;
    for &byte in src {
        dev.put_byte(addr, byte);
        addr += 1;
    }
    dev.put_byte(addr, checksum);
}

/// Byte-wise checksummed read through any [`Eeprom`].
pub fn read_bytes_with_checksum<C, E>(dev: &E, dest: &mut [u8], src: u32) -> bool
where
    C: Checksum,
    E: Eeprom + ?Sized,
{
    let mut addr = src;
    for byte in dest.iter_mut() {
        *byte = dev.get_byte(addr);
        addr += 1;
    }
    C::checksum(dest) == dev.get_byte(addr)
}

/// Placeholder device for boards without non-volatile storage.
///
/// Lets `Backend<NoDevice>` name a backend that can only ever be
/// [`Backend::Absent`](crate::shadow::Backend::Absent) or shadowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDevice;

impl Eeprom for NoDevice {
    fn get_byte(&self, _addr: u32) -> u8 {
        0
    }

    fn put_byte(&mut self, _addr: u32, _value: u8) {}
}

/// Registry over a bare device: checksummed record I/O, no dirty tracking.
///
/// Used for physical backends without a mirror and for writing defaults
/// straight to the device during installation.
pub struct Direct<'a, E: Eeprom + ?Sized> {
    dev: &'a mut E,
}

impl<'a, E: Eeprom + ?Sized> Direct<'a, E> {
    pub fn new(dev: &'a mut E) -> Self {
        Self { dev }
    }
}

impl<E: Eeprom + ?Sized> core::fmt::Debug for Direct<'_, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Direct").finish_non_exhaustive()
    }
}

impl<E: Eeprom + ?Sized> SettingsRegistry for Direct<'_, E> {
    fn kind(&self) -> EepromKind {
        EepromKind::Physical
    }

    fn read_version(&self) -> Option<u8> {
        Some(self.dev.get_byte(ADDR_VERSION))
    }

    fn write_version(&mut self, version: u8) {
        self.dev.put_byte(ADDR_VERSION, version);
    }

    fn write(&mut self, record: RecordId, data: &[u8]) -> Result<(), ShadowError> {
        let span = checked_span(record, data.len())?;
        self.dev.write_with_checksum(span.addr, data);
        Ok(())
    }

    fn read(&self, record: RecordId, out: &mut [u8]) -> Result<bool, ShadowError> {
        let span = checked_span(record, out.len())?;
        Ok(self.dev.read_with_checksum(out, span.addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::test_support::MockEeprom;

    #[test]
    fn provided_write_appends_checksum() {
        let mut dev = MockEeprom::new();
        dev.write_with_checksum(10, &[1, 2, 3]);

        assert_eq!(dev.get_byte(10), 1);
        assert_eq!(dev.get_byte(12), 3);
        assert_eq!(dev.get_byte(13), 11);
    }

    #[test]
    fn provided_read_detects_corruption() {
        let mut dev = MockEeprom::new();
        dev.write_with_checksum(0, &[0xAA; 6]);

        let mut buf = [0u8; 6];
        assert!(dev.read_with_checksum(&mut buf, 0));
        assert_eq!(buf, [0xAA; 6]);

        dev.put_byte(6, dev.get_byte(6) ^ 0x01);
        assert!(!dev.read_with_checksum(&mut buf, 0));
    }

    #[test]
    fn direct_registry_rejects_wrong_length() {
        let mut dev = MockEeprom::new();
        let mut direct = Direct::new(&mut dev);

        assert_eq!(
            direct.write(RecordId::CoordinateSystem(0), &[0u8; 3]),
            Err(ShadowError::LengthMismatch)
        );
        assert_eq!(
            direct.write(RecordId::StartupLine(9), &[0u8; 3]),
            Err(ShadowError::InvalidRecord)
        );
        assert!(dev.checksummed_writes.is_empty());
    }
}
