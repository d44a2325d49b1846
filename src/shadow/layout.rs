//! Fixed address map of the settings storage.
//!
//! | Record              | Offset                                  | Length                |
//! |---------------------|-----------------------------------------|-----------------------|
//! | version byte        | 0                                       | 1 (no checksum)       |
//! | global settings     | [`ADDR_GLOBAL`]                         | [`GLOBAL_SETTINGS_LEN`] |
//! | coordinate slot `i` | [`ADDR_PARAMETERS`] + i * (N_AXIS*4 + 1)  | N_AXIS * 4            |
//! | startup line `i`    | [`ADDR_STARTUP_BLOCK`] + i * (MAX + 1)  | [`MAX_STORED_LINE_LENGTH`] |
//! | build info          | [`ADDR_BUILD_INFO`]                     | [`MAX_STORED_LINE_LENGTH`] |
//!
//! Every record is followed by one checksum byte.

use crate::shadow::ShadowError;

/// Size of the whole non-volatile footprint in bytes.
pub const EEPROM_SIZE: usize = 1024;

/// Expected value of the version byte. A mismatch re-initializes storage.
pub const SETTINGS_VERSION: u8 = 12;

pub const ADDR_VERSION: u32 = 0;
pub const ADDR_GLOBAL: u32 = 1;
pub const ADDR_PARAMETERS: u32 = 512;
pub const ADDR_STARTUP_BLOCK: u32 = 768;
pub const ADDR_BUILD_INFO: u32 = 942;

/// Number of machine axes.
pub const N_AXIS: usize = 3;
/// Number of stored startup lines.
pub const N_STARTUP_LINE: usize = 2;
/// Payload length of startup lines and build info, terminator included.
pub const MAX_STORED_LINE_LENGTH: usize = 80;
/// Work coordinate systems G54..G59.
pub const N_COORDINATE_SYSTEM: usize = 6;
/// Slot of the G28 predefined position.
pub const COORD_INDEX_G28: usize = N_COORDINATE_SYSTEM;
/// Slot of the G30 predefined position.
pub const COORD_INDEX_G30: usize = N_COORDINATE_SYSTEM + 1;
/// Stored coordinate slots: work systems plus G28/G30.
pub const N_COORD_SLOTS: usize = N_COORDINATE_SYSTEM + 2;
/// Payload length of one coordinate slot (`N_AXIS` little-endian `f32`).
pub const COORD_DATA_LEN: usize = N_AXIS * 4;
/// Payload length of the encoded global settings block.
pub const GLOBAL_SETTINGS_LEN: usize = 86;

/// Number of records tracked by the dirty flags.
pub const RECORD_COUNT: usize = 2 + N_STARTUP_LINE + N_COORD_SLOTS;

const STARTUP_STRIDE: usize = MAX_STORED_LINE_LENGTH + 1;
const COORD_STRIDE: usize = COORD_DATA_LEN + 1;

const _: () = {
    assert!(ADDR_GLOBAL as usize > ADDR_VERSION as usize);
    assert!(ADDR_GLOBAL as usize + GLOBAL_SETTINGS_LEN + 1 <= ADDR_PARAMETERS as usize);
    assert!(ADDR_PARAMETERS as usize + N_COORD_SLOTS * COORD_STRIDE <= ADDR_STARTUP_BLOCK as usize);
    assert!(
        ADDR_STARTUP_BLOCK as usize + N_STARTUP_LINE * STARTUP_STRIDE <= ADDR_BUILD_INFO as usize
    );
    assert!(ADDR_BUILD_INFO as usize + STARTUP_STRIDE <= EEPROM_SIZE);
};

/// Identity of a logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordId {
    GlobalSettings,
    BuildInfo,
    /// Startup line `0..N_STARTUP_LINE`.
    StartupLine(usize),
    /// Coordinate slot `0..N_COORD_SLOTS` (G54..G59, G28, G30).
    CoordinateSystem(usize),
}

/// Resolved placement of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub id: RecordId,
    /// Index into the dirty flags.
    pub slot: usize,
    /// First payload byte.
    pub addr: u32,
    /// Payload length, checksum excluded.
    pub len: usize,
}

impl RecordSpan {
    /// Address of the trailing checksum byte.
    #[inline]
    pub fn checksum_addr(&self) -> u32 {
        self.addr + self.len as u32
    }

    /// Exclusive end address, checksum byte included.
    #[inline]
    pub fn end(&self) -> u32 {
        self.checksum_addr() + 1
    }
}

impl RecordId {
    /// Looks up where this record lives.
    ///
    /// # Errors
    /// * [`ShadowError::InvalidRecord`] - if a line or coordinate index is out of range
    pub fn span(self) -> Result<RecordSpan, ShadowError> {
        let (slot, addr, len) = match self {
            RecordId::GlobalSettings => (0, ADDR_GLOBAL as usize, GLOBAL_SETTINGS_LEN),
            RecordId::BuildInfo => (1, ADDR_BUILD_INFO as usize, MAX_STORED_LINE_LENGTH),
            RecordId::StartupLine(n) if n < N_STARTUP_LINE => (
                2 + n,
                ADDR_STARTUP_BLOCK as usize + n * STARTUP_STRIDE,
                MAX_STORED_LINE_LENGTH,
            ),
            RecordId::CoordinateSystem(n) if n < N_COORD_SLOTS => (
                2 + N_STARTUP_LINE + n,
                ADDR_PARAMETERS as usize + n * COORD_STRIDE,
                COORD_DATA_LEN,
            ),
            _ => return Err(ShadowError::InvalidRecord),
        };

        Ok(RecordSpan {
            id: self,
            slot,
            addr: addr as u32,
            len,
        })
    }

    /// Every record in the layout, in ascending slot order.
    pub fn all() -> impl Iterator<Item = RecordSpan> {
        [RecordId::GlobalSettings, RecordId::BuildInfo]
            .into_iter()
            .chain((0..N_STARTUP_LINE).map(RecordId::StartupLine))
            .chain((0..N_COORD_SLOTS).map(RecordId::CoordinateSystem))
            .filter_map(|id| id.span().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_yields_every_slot_once() {
        let mut seen = [false; RECORD_COUNT];
        let mut count = 0;
        for span in RecordId::all() {
            assert!(!seen[span.slot]);
            seen[span.slot] = true;
            count += 1;
        }
        assert_eq!(count, RECORD_COUNT);
    }

    #[test]
    fn records_never_overlap() {
        for a in RecordId::all() {
            assert!(a.addr > ADDR_VERSION);
            assert!(a.end() as usize <= EEPROM_SIZE);
            for b in RecordId::all().filter(|b| b.slot != a.slot) {
                assert!(a.end() <= b.addr || b.end() <= a.addr, "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn slot_addresses_follow_stride() {
        let line = RecordId::StartupLine(1).span().unwrap();
        assert_eq!(line.addr, ADDR_STARTUP_BLOCK + 81);
        assert_eq!(line.checksum_addr(), ADDR_STARTUP_BLOCK + 161);

        let coord = RecordId::CoordinateSystem(2).span().unwrap();
        assert_eq!(coord.addr, ADDR_PARAMETERS + 26);
        assert_eq!(coord.len, 12);
    }

    #[test]
    fn out_of_range_indices_rejected() {
        assert_eq!(
            RecordId::StartupLine(N_STARTUP_LINE).span(),
            Err(ShadowError::InvalidRecord)
        );
        assert_eq!(
            RecordId::CoordinateSystem(N_COORD_SLOTS).span(),
            Err(ShadowError::InvalidRecord)
        );
    }
}
