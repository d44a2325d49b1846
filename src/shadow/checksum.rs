//! One-byte record checksums.

/// Deterministic one-byte digest over a byte range.
///
/// Appended after every record on write and compared on read. Only needs to
/// be sensitive to the byte sequence; it is not a cryptographic hash.
pub trait Checksum {
    fn checksum(data: &[u8]) -> u8;
}

/// Rotate-left-then-add checksum used by the classic settings format.
///
/// Each step is a bijection on the running sum, so changing any single byte
/// always changes the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct RotateAdd;

impl Checksum for RotateAdd {
    #[inline]
    fn checksum(data: &[u8]) -> u8 {
        data.iter()
            .fold(0u8, |sum, &byte| sum.rotate_left(1).wrapping_add(byte))
    }
}

/// Checksum used by the provided [`Eeprom`](crate::shadow::Eeprom) methods
/// and by the mirror unless another one is chosen.
pub type DefaultChecksum = RotateAdd;
