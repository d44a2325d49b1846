//! Typed settings records on top of the registry.
//!
//! Every function here takes the registry as `&mut dyn SettingsRegistry`, so
//! the same code runs against an absent device, a physical device, or the
//! installed shadow.

mod global;

pub use global::{
    AXIS_N_SETTINGS, AXIS_SETTINGS_BASE, AXIS_SETTINGS_INCREMENT, MIN_STEP_PULSE_MICROSECONDS,
    SettingError, SettingFlags, Settings,
};

use bitflags::bitflags;

use crate::shadow::{
    ROSlice, ShadowError, WOSlice,
    layout::{
        COORD_DATA_LEN, GLOBAL_SETTINGS_LEN, MAX_STORED_LINE_LENGTH, N_AXIS, N_COORD_SLOTS,
        N_STARTUP_LINE, RecordId, SETTINGS_VERSION,
    },
    registry::{Defaults, SettingsRegistry},
};

/// Text of a startup line or the build info.
pub type StoredLine = heapless::String<MAX_STORED_LINE_LENGTH>;

/// Stored offsets of one coordinate slot, one value per axis.
pub type CoordData = [f32; N_AXIS];

bitflags! {
    /// Which record groups [`restore`] resets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RestoreFlags: u8 {
        /// Global settings block (and the version byte).
        const DEFAULTS = 1 << 0;
        /// Every coordinate slot.
        const PARAMETERS = 1 << 1;
        const STARTUP_LINES = 1 << 2;
        const BUILD_INFO = 1 << 3;
        const ALL = 0xFF;
    }
}

/// Writes the version byte and the global settings record.
pub fn store_global(
    registry: &mut dyn SettingsRegistry,
    settings: &Settings,
) -> Result<(), ShadowError> {
    registry.write_version(SETTINGS_VERSION);
    registry.write(RecordId::GlobalSettings, &settings.encode())
}

/// Loads the global settings.
///
/// Returns `None` when the version byte is wrong, the checksum fails, or
/// there is no storage.
pub fn load_global(registry: &dyn SettingsRegistry) -> Option<Settings> {
    if registry.read_version() != Some(SETTINGS_VERSION) {
        return None;
    }

    let mut bytes = [0u8; GLOBAL_SETTINGS_LEN];
    match registry.read(RecordId::GlobalSettings, &mut bytes) {
        Ok(true) => Some(Settings::decode(&bytes)),
        _ => None,
    }
}

/// Loads the global settings, or restores every record to factory defaults
/// and returns the default settings when they cannot be loaded.
pub fn init(registry: &mut dyn SettingsRegistry) -> Result<Settings, ShadowError> {
    if let Some(settings) = load_global(registry) {
        return Ok(settings);
    }

    log::warn!("settings read failed, restoring defaults");
    restore(registry, RestoreFlags::ALL)?;
    Ok(Settings::default())
}

/// Applies `$parameter=value` to `settings` and persists the block.
///
/// Nothing is written when validation fails.
pub fn store_global_setting(
    registry: &mut dyn SettingsRegistry,
    settings: &mut Settings,
    parameter: u8,
    value: f32,
) -> Result<(), SettingError> {
    settings.apply(parameter, value)?;
    store_global(registry, settings)?;
    Ok(())
}

/// Resets the selected record groups to their factory content.
///
/// Startup lines and build info become empty lines; coordinate slots become
/// the zero vector.
pub fn restore(registry: &mut dyn SettingsRegistry, flags: RestoreFlags) -> Result<(), ShadowError> {
    if flags.contains(RestoreFlags::DEFAULTS) {
        store_global(registry, &Settings::default())?;
    }

    if flags.contains(RestoreFlags::PARAMETERS) {
        for slot in 0..N_COORD_SLOTS {
            store_coord_data(registry, slot, &[0.0; N_AXIS])?;
        }
    }

    if flags.contains(RestoreFlags::STARTUP_LINES) {
        for n in 0..N_STARTUP_LINE {
            store_startup_line(registry, n, "")?;
        }
    }

    if flags.contains(RestoreFlags::BUILD_INFO) {
        store_build_info(registry, "")?;
    }

    Ok(())
}

/// Stores startup line `n`.
///
/// # Errors
/// * [`ShadowError::LineTooLong`] - if `line` leaves no room for the terminator
/// * [`ShadowError::InvalidRecord`] - if `n` is not below [`N_STARTUP_LINE`]
pub fn store_startup_line(
    registry: &mut dyn SettingsRegistry,
    n: usize,
    line: &str,
) -> Result<(), ShadowError> {
    registry.write(RecordId::StartupLine(n), &encode_line(line)?)
}

/// Reads startup line `n`.
///
/// On a failed read the slot is reset to an empty line and `None` returned.
pub fn read_startup_line(
    registry: &mut dyn SettingsRegistry,
    n: usize,
) -> Result<Option<StoredLine>, ShadowError> {
    read_line(registry, RecordId::StartupLine(n))
}

/// Stores the user build-info string.
pub fn store_build_info(registry: &mut dyn SettingsRegistry, line: &str) -> Result<(), ShadowError> {
    registry.write(RecordId::BuildInfo, &encode_line(line)?)
}

/// Reads the build-info string, resetting it to empty on a failed read.
pub fn read_build_info(registry: &mut dyn SettingsRegistry) -> Result<Option<StoredLine>, ShadowError> {
    read_line(registry, RecordId::BuildInfo)
}

/// Stores the offsets of coordinate slot `slot` (G54..G59, then G28, G30).
pub fn store_coord_data(
    registry: &mut dyn SettingsRegistry,
    slot: usize,
    coords: &CoordData,
) -> Result<(), ShadowError> {
    let mut bytes = [0u8; COORD_DATA_LEN];
    let mut out = WOSlice::new(&mut bytes);
    for (axis, value) in coords.iter().enumerate() {
        out.write_f32_le_at(axis * 4, *value);
    }
    registry.write(RecordId::CoordinateSystem(slot), &bytes)
}

/// Reads coordinate slot `slot`.
///
/// On a failed read the slot is reset to the zero vector and `None` returned.
pub fn read_coord_data(
    registry: &mut dyn SettingsRegistry,
    slot: usize,
) -> Result<Option<CoordData>, ShadowError> {
    let record = RecordId::CoordinateSystem(slot);
    let mut bytes = [0u8; COORD_DATA_LEN];
    if registry.read(record, &mut bytes)? {
        let src = ROSlice::new(&bytes);
        return Ok(Some(core::array::from_fn(|axis| src.read_f32_le_at(axis * 4))));
    }

    log::warn!("{record:?} failed checksum, resetting to zero");
    store_coord_data(registry, slot, &[0.0; N_AXIS])?;
    Ok(None)
}

/// Factory defaults for every record, used when installing the shadow.
#[derive(Debug, Default, Clone, Copy)]
pub struct FactoryDefaults;

impl Defaults for FactoryDefaults {
    fn restore_all(&mut self, registry: &mut dyn SettingsRegistry) {
        if let Err(err) = restore(registry, RestoreFlags::ALL) {
            log::error!("restoring defaults failed: {err}");
        }
    }
}

fn encode_line(line: &str) -> Result<[u8; MAX_STORED_LINE_LENGTH], ShadowError> {
    if line.len() >= MAX_STORED_LINE_LENGTH {
        return Err(ShadowError::LineTooLong);
    }

    let mut bytes = [0u8; MAX_STORED_LINE_LENGTH];
    bytes[..line.len()].copy_from_slice(line.as_bytes());
    Ok(bytes)
}

fn decode_line(bytes: &[u8]) -> Option<StoredLine> {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let text = core::str::from_utf8(&bytes[..end]).ok()?;
    let mut line = StoredLine::new();
    line.push_str(text).ok()?;
    Some(line)
}

fn read_line(
    registry: &mut dyn SettingsRegistry,
    record: RecordId,
) -> Result<Option<StoredLine>, ShadowError> {
    let mut bytes = [0u8; MAX_STORED_LINE_LENGTH];
    if registry.read(record, &mut bytes)? {
        if let Some(line) = decode_line(&bytes) {
            return Ok(Some(line));
        }
    }

    log::warn!("{record:?} unreadable, resetting to empty line");
    registry.write(record, &[0u8; MAX_STORED_LINE_LENGTH])?;
    Ok(None)
}
