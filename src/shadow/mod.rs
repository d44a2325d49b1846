pub mod backend;
pub mod checksum;
pub mod dirty;
pub mod eeprom;
pub mod error;
pub mod helpers;
pub mod layout;
pub mod registry;
pub mod slice;
pub mod store;
pub(crate) mod table;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::Backend;
pub use checksum::{Checksum, DefaultChecksum, RotateAdd};
pub use dirty::DirtyFlags;
pub use eeprom::{Direct, Eeprom, EepromKind, NoDevice};
pub use error::ShadowError;
pub use layout::{RecordId, RecordSpan};
pub use registry::{Defaults, SettingsRegistry};
pub use slice::{ROSlice, WOSlice};
pub use store::ShadowStore;

pub mod prelude {
    pub use super::{
        Backend, Checksum, Defaults, DefaultChecksum, Direct, DirtyFlags, Eeprom, EepromKind,
        NoDevice, ROSlice, RecordId, RecordSpan, RotateAdd, SettingsRegistry, ShadowError,
        ShadowStore, WOSlice,
    };
}
