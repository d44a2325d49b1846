use alloc::{boxed::Box, vec::Vec};
use core::marker::PhantomData;

use crate::shadow::{Checksum, ShadowError, eeprom::Eeprom, helpers::range_span};

/// In-memory mirror of the whole address space.
///
/// Owns the single heap allocation of the shadow. Byte access outside the
/// buffer reads as zero and drops writes; checksummed access outside the
/// buffer reports a failed checksum.
pub(crate) struct ShadowTable<C: Checksum> {
    bytes: Box<[u8]>,
    _checksum: PhantomData<C>,
}

impl<C: Checksum> ShadowTable<C> {
    pub(crate) fn new(bytes: Box<[u8]>) -> Self {
        Self {
            bytes,
            _checksum: PhantomData,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn with_bytes<F, R>(&self, addr: u32, len: usize, f: F) -> Result<R, ShadowError>
    where
        F: FnOnce(&[u8]) -> R,
    {
        let (offset, end) = range_span(addr, len, self.bytes.len())?;
        Ok(f(&self.bytes[offset..end]))
    }

    pub(crate) fn with_bytes_mut<F, R>(
        &mut self,
        addr: u32,
        len: usize,
        f: F,
    ) -> Result<R, ShadowError>
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let (offset, end) = range_span(addr, len, self.bytes.len())?;
        Ok(f(&mut self.bytes[offset..end]))
    }
}

impl<C: Checksum> Eeprom for ShadowTable<C> {
    #[inline]
    fn get_byte(&self, addr: u32) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0)
    }

    #[inline]
    fn put_byte(&mut self, addr: u32, value: u8) {
        if let Some(byte) = self.bytes.get_mut(addr as usize) {
            *byte = value;
        }
    }

    fn write_with_checksum(&mut self, dest: u32, src: &[u8]) {
        let checksum = C::checksum(src);
        let written = self.with_bytes_mut(dest, src.len() + 1, |buf| {
            let (data, tail) = buf.split_at_mut(src.len());
            data.copy_from_slice(src);
            tail[0] = checksum;
        });
        if let Err(err) = written {
            log::error!("mirror write at {dest} rejected: {err}");
        }
    }

    fn read_with_checksum(&self, dest: &mut [u8], src: u32) -> bool {
        self.with_bytes(src, dest.len() + 1, |buf| {
            let (data, tail) = buf.split_at(dest.len());
            let checksum = C::checksum(data);
            dest.copy_from_slice(data);
            checksum == tail[0]
        })
        .unwrap_or(false)
    }
}

/// Tries to obtain a zeroed mirror buffer of `len` bytes from the heap.
///
/// Returns `None` instead of aborting when the allocator is exhausted.
pub(crate) fn allocate_mirror(len: usize) -> Option<Box<[u8]>> {
    let mut bytes = Vec::new();
    bytes.try_reserve_exact(len).ok()?;
    bytes.resize(len, 0);
    Some(bytes.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::{RotateAdd, test_support::zeroed};

    type TestTable = ShadowTable<RotateAdd>;

    #[test]
    fn checksummed_record_in_small_space() {
        // 64-byte space, one 8-byte record at offset 0
        let mut table = TestTable::new(zeroed(64));
        let record = [1, 2, 3, 4, 5, 6, 7, 8];

        table.write_with_checksum(0, &record);
        assert_eq!(table.get_byte(8), RotateAdd::checksum(&record));

        let mut out = [0u8; 8];
        assert!(table.read_with_checksum(&mut out, 0));
        assert_eq!(out, record);

        table.put_byte(3, 99);
        assert!(!table.read_with_checksum(&mut out, 0));
    }

    #[test]
    fn flipping_any_bit_of_record_fails_read() {
        let mut table = TestTable::new(zeroed(32));
        table.write_with_checksum(4, &[0x10, 0x20, 0x30, 0x40]);

        let mut out = [0u8; 4];
        // Data bytes 4..8 plus the checksum byte at 8
        for addr in 4..=8 {
            for bit in 0..8 {
                let original = table.get_byte(addr);
                table.put_byte(addr, original ^ (1 << bit));
                assert!(!table.read_with_checksum(&mut out, 4));
                table.put_byte(addr, original);
            }
        }
        assert!(table.read_with_checksum(&mut out, 4));
    }

    #[test]
    fn out_of_range_access_is_harmless() {
        let mut table = TestTable::new(zeroed(16));

        table.put_byte(16, 0xFF);
        assert_eq!(table.get_byte(16), 0);

        // Checksum byte would land past the end
        table.write_with_checksum(12, &[1, 2, 3, 4]);
        assert_eq!(table.get_byte(12), 0);

        let mut out = [0u8; 4];
        assert!(!table.read_with_checksum(&mut out, 12));
    }

    #[test]
    fn with_bytes_errors() {
        let mut table = TestTable::new(zeroed(16));

        assert_eq!(table.with_bytes(0, 0, |_| ()), Err(ShadowError::ZeroLength));
        assert_eq!(
            table.with_bytes_mut(14, 4, |_| ()),
            Err(ShadowError::OutOfBounds)
        );
    }

    #[test]
    fn allocate_mirror_is_zeroed() {
        let mirror = allocate_mirror(128).unwrap();
        assert_eq!(mirror.len(), 128);
        assert!(mirror.iter().all(|&b| b == 0));
    }
}
