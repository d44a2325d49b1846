use bitflags::bitflags;

use crate::shadow::{
    ROSlice, ShadowError, WOSlice,
    layout::{GLOBAL_SETTINGS_LEN, N_AXIS},
};

/// First parameter number of the per-axis settings.
pub const AXIS_SETTINGS_BASE: u8 = 100;
/// Distance between consecutive per-axis setting groups.
pub const AXIS_SETTINGS_INCREMENT: u8 = 10;
/// Number of per-axis setting groups.
pub const AXIS_N_SETTINGS: u8 = 4;
/// Smallest accepted step pulse length in microseconds.
pub const MIN_STEP_PULSE_MICROSECONDS: u8 = 3;

bitflags! {
    /// Boolean machine options stored in the global settings block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SettingFlags: u16 {
        const REPORT_INCHES = 1 << 0;
        const LASER_MODE = 1 << 1;
        const INVERT_ST_ENABLE = 1 << 2;
        const HARD_LIMIT_ENABLE = 1 << 3;
        const HOMING_ENABLE = 1 << 4;
        const SOFT_LIMIT_ENABLE = 1 << 5;
        const INVERT_PROBE_PIN = 1 << 6;
        const SPINDLE_DISABLE_WITH_ZERO_SPEED = 1 << 7;
        const DISABLE_PROBE_PULLUP = 1 << 8;
        const DISABLE_M7 = 1 << 9;
        const INVERT_LIMIT_PINS = 1 << 10;
    }
}

/// Rejected `$n=value` update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SettingError {
    #[error("setting value must not be negative")]
    NegativeValue,
    #[error("step pulse must be at least 3 microseconds")]
    StepPulseMin,
    #[error("unknown setting number")]
    InvalidSetting,
    #[error("soft limits require homing to be enabled")]
    SoftLimitRequiresHoming,
    #[error("storage error: {0}")]
    Storage(#[from] ShadowError),
}

/// Global machine settings, persisted as one checksummed record.
///
/// Acceleration is kept in mm/min² and max travel as a negative distance,
/// the units the motion planner consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub steps_per_mm: [f32; N_AXIS],
    pub max_rate: [f32; N_AXIS],
    pub acceleration: [f32; N_AXIS],
    pub max_travel: [f32; N_AXIS],
    pub junction_deviation: f32,
    pub arc_tolerance: f32,
    pub homing_feed_rate: f32,
    pub homing_seek_rate: f32,
    pub homing_pulloff: f32,
    pub rpm_max: f32,
    pub rpm_min: f32,
    /// Milliseconds before steppers are disabled; 255 keeps them enabled.
    pub stepper_idle_lock_time: u8,
    pub step_invert_mask: u8,
    pub dir_invert_mask: u8,
    pub homing_dir_mask: u8,
    pub homing_debounce_delay: u16,
    pub pulse_microseconds: u8,
    pub status_report_mask: u8,
    pub flags: SettingFlags,
}

// Byte offsets of the encoded block
const OFF_STEPS_PER_MM: usize = 0;
const OFF_MAX_RATE: usize = OFF_STEPS_PER_MM + N_AXIS * 4;
const OFF_ACCELERATION: usize = OFF_MAX_RATE + N_AXIS * 4;
const OFF_MAX_TRAVEL: usize = OFF_ACCELERATION + N_AXIS * 4;
const OFF_JUNCTION_DEVIATION: usize = OFF_MAX_TRAVEL + N_AXIS * 4;
const OFF_ARC_TOLERANCE: usize = OFF_JUNCTION_DEVIATION + 4;
const OFF_HOMING_FEED_RATE: usize = OFF_ARC_TOLERANCE + 4;
const OFF_HOMING_SEEK_RATE: usize = OFF_HOMING_FEED_RATE + 4;
const OFF_HOMING_PULLOFF: usize = OFF_HOMING_SEEK_RATE + 4;
const OFF_RPM_MAX: usize = OFF_HOMING_PULLOFF + 4;
const OFF_RPM_MIN: usize = OFF_RPM_MAX + 4;
const OFF_IDLE_LOCK_TIME: usize = OFF_RPM_MIN + 4;
const OFF_STEP_INVERT: usize = OFF_IDLE_LOCK_TIME + 1;
const OFF_DIR_INVERT: usize = OFF_STEP_INVERT + 1;
const OFF_HOMING_DIR: usize = OFF_DIR_INVERT + 1;
const OFF_HOMING_DEBOUNCE: usize = OFF_HOMING_DIR + 1;
const OFF_PULSE_MICROSECONDS: usize = OFF_HOMING_DEBOUNCE + 2;
const OFF_STATUS_REPORT: usize = OFF_PULSE_MICROSECONDS + 1;
const OFF_FLAGS: usize = OFF_STATUS_REPORT + 1;

const _: () = assert!(OFF_FLAGS + 2 == GLOBAL_SETTINGS_LEN);

impl Default for Settings {
    /// Factory defaults.
    fn default() -> Self {
        Self {
            steps_per_mm: [250.0; N_AXIS],
            max_rate: [500.0; N_AXIS],
            acceleration: [10.0 * 60.0 * 60.0; N_AXIS],
            max_travel: [-200.0; N_AXIS],
            junction_deviation: 0.01,
            arc_tolerance: 0.002,
            homing_feed_rate: 25.0,
            homing_seek_rate: 500.0,
            homing_pulloff: 1.0,
            rpm_max: 1000.0,
            rpm_min: 0.0,
            stepper_idle_lock_time: 25,
            step_invert_mask: 0,
            dir_invert_mask: 0,
            homing_dir_mask: 0,
            homing_debounce_delay: 250,
            pulse_microseconds: 10,
            status_report_mask: 1,
            flags: SettingFlags::empty(),
        }
    }
}

impl Settings {
    /// Encodes the block in its stored little-endian form.
    pub fn encode(&self) -> [u8; GLOBAL_SETTINGS_LEN] {
        let mut bytes = [0u8; GLOBAL_SETTINGS_LEN];
        let mut out = WOSlice::new(&mut bytes);

        for axis in 0..N_AXIS {
            out.write_f32_le_at(OFF_STEPS_PER_MM + axis * 4, self.steps_per_mm[axis]);
            out.write_f32_le_at(OFF_MAX_RATE + axis * 4, self.max_rate[axis]);
            out.write_f32_le_at(OFF_ACCELERATION + axis * 4, self.acceleration[axis]);
            out.write_f32_le_at(OFF_MAX_TRAVEL + axis * 4, self.max_travel[axis]);
        }
        out.write_f32_le_at(OFF_JUNCTION_DEVIATION, self.junction_deviation);
        out.write_f32_le_at(OFF_ARC_TOLERANCE, self.arc_tolerance);
        out.write_f32_le_at(OFF_HOMING_FEED_RATE, self.homing_feed_rate);
        out.write_f32_le_at(OFF_HOMING_SEEK_RATE, self.homing_seek_rate);
        out.write_f32_le_at(OFF_HOMING_PULLOFF, self.homing_pulloff);
        out.write_f32_le_at(OFF_RPM_MAX, self.rpm_max);
        out.write_f32_le_at(OFF_RPM_MIN, self.rpm_min);
        out.write_u8_at(OFF_IDLE_LOCK_TIME, self.stepper_idle_lock_time);
        out.write_u8_at(OFF_STEP_INVERT, self.step_invert_mask);
        out.write_u8_at(OFF_DIR_INVERT, self.dir_invert_mask);
        out.write_u8_at(OFF_HOMING_DIR, self.homing_dir_mask);
        out.write_u16_le_at(OFF_HOMING_DEBOUNCE, self.homing_debounce_delay);
        out.write_u8_at(OFF_PULSE_MICROSECONDS, self.pulse_microseconds);
        out.write_u8_at(OFF_STATUS_REPORT, self.status_report_mask);
        out.write_u16_le_at(OFF_FLAGS, self.flags.bits());

        bytes
    }

    /// Decodes a stored block. Unknown flag bits are dropped.
    pub fn decode(bytes: &[u8; GLOBAL_SETTINGS_LEN]) -> Self {
        let src = ROSlice::new(bytes);
        let axes = |base: usize| -> [f32; N_AXIS] {
            core::array::from_fn(|axis| src.read_f32_le_at(base + axis * 4))
        };

        Self {
            steps_per_mm: axes(OFF_STEPS_PER_MM),
            max_rate: axes(OFF_MAX_RATE),
            acceleration: axes(OFF_ACCELERATION),
            max_travel: axes(OFF_MAX_TRAVEL),
            junction_deviation: src.read_f32_le_at(OFF_JUNCTION_DEVIATION),
            arc_tolerance: src.read_f32_le_at(OFF_ARC_TOLERANCE),
            homing_feed_rate: src.read_f32_le_at(OFF_HOMING_FEED_RATE),
            homing_seek_rate: src.read_f32_le_at(OFF_HOMING_SEEK_RATE),
            homing_pulloff: src.read_f32_le_at(OFF_HOMING_PULLOFF),
            rpm_max: src.read_f32_le_at(OFF_RPM_MAX),
            rpm_min: src.read_f32_le_at(OFF_RPM_MIN),
            stepper_idle_lock_time: src.read_u8_at(OFF_IDLE_LOCK_TIME),
            step_invert_mask: src.read_u8_at(OFF_STEP_INVERT),
            dir_invert_mask: src.read_u8_at(OFF_DIR_INVERT),
            homing_dir_mask: src.read_u8_at(OFF_HOMING_DIR),
            homing_debounce_delay: src.read_u16_le_at(OFF_HOMING_DEBOUNCE),
            pulse_microseconds: src.read_u8_at(OFF_PULSE_MICROSECONDS),
            status_report_mask: src.read_u8_at(OFF_STATUS_REPORT),
            flags: SettingFlags::from_bits_truncate(src.read_u16_le_at(OFF_FLAGS)),
        }
    }

    /// Applies a `$parameter=value` update in memory.
    ///
    /// Parameters below [`AXIS_SETTINGS_BASE`] are machine-wide; from there on
    /// each group of [`AXIS_SETTINGS_INCREMENT`] numbers addresses one axis
    /// setting (steps/mm, max rate, acceleration in mm/s², max travel).
    /// Integer settings take the truncated value. Nothing changes on error.
    ///
    /// # Errors
    /// * [`SettingError::NegativeValue`] - if `value` is negative
    /// * [`SettingError::StepPulseMin`] - if `$0` is below [`MIN_STEP_PULSE_MICROSECONDS`]
    /// * [`SettingError::SoftLimitRequiresHoming`] - if enabling `$20` while homing is off
    /// * [`SettingError::InvalidSetting`] - if `parameter` names no setting
    pub fn apply(&mut self, parameter: u8, value: f32) -> Result<(), SettingError> {
        if value < 0.0 {
            return Err(SettingError::NegativeValue);
        }

        if parameter >= AXIS_SETTINGS_BASE {
            return self.apply_axis(parameter - AXIS_SETTINGS_BASE, value);
        }

        let int_value = value as u8;
        let enabled = int_value != 0;
        match parameter {
            0 => {
                if int_value < MIN_STEP_PULSE_MICROSECONDS {
                    return Err(SettingError::StepPulseMin);
                }
                self.pulse_microseconds = int_value;
            }
            1 => self.stepper_idle_lock_time = int_value,
            2 => self.step_invert_mask = int_value,
            3 => self.dir_invert_mask = int_value,
            4 => self.flags.set(SettingFlags::INVERT_ST_ENABLE, enabled),
            5 => self.flags.set(SettingFlags::INVERT_LIMIT_PINS, enabled),
            6 => self.flags.set(SettingFlags::INVERT_PROBE_PIN, enabled),
            10 => self.status_report_mask = int_value,
            11 => self.junction_deviation = value,
            12 => self.arc_tolerance = value,
            13 => self.flags.set(SettingFlags::REPORT_INCHES, enabled),
            20 => {
                if enabled && !self.flags.contains(SettingFlags::HOMING_ENABLE) {
                    return Err(SettingError::SoftLimitRequiresHoming);
                }
                self.flags.set(SettingFlags::SOFT_LIMIT_ENABLE, enabled);
            }
            21 => self.flags.set(SettingFlags::HARD_LIMIT_ENABLE, enabled),
            22 => {
                self.flags.set(SettingFlags::HOMING_ENABLE, enabled);
                if !enabled {
                    self.flags.remove(SettingFlags::SOFT_LIMIT_ENABLE);
                }
            }
            23 => self.homing_dir_mask = int_value,
            24 => self.homing_feed_rate = value,
            25 => self.homing_seek_rate = value,
            26 => self.homing_debounce_delay = value as u16,
            27 => self.homing_pulloff = value,
            30 => self.rpm_max = value,
            31 => self.rpm_min = value,
            32 => self.flags.set(SettingFlags::LASER_MODE, enabled),
            _ => return Err(SettingError::InvalidSetting),
        }

        Ok(())
    }

    fn apply_axis(&mut self, mut offset: u8, value: f32) -> Result<(), SettingError> {
        for group in 0..AXIS_N_SETTINGS {
            let axis = offset as usize;
            if axis < N_AXIS {
                match group {
                    0 => self.steps_per_mm[axis] = value,
                    1 => self.max_rate[axis] = value,
                    2 => self.acceleration[axis] = value * 60.0 * 60.0,
                    _ => self.max_travel[axis] = -value,
                }
                return Ok(());
            }
            if offset < AXIS_SETTINGS_INCREMENT {
                break;
            }
            offset -= AXIS_SETTINGS_INCREMENT;
        }

        Err(SettingError::InvalidSetting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_block_decodes_to_same_settings() {
        let mut settings = Settings::default();
        settings.steps_per_mm = [80.0, 80.5, 400.0];
        settings.homing_debounce_delay = 0x1234;
        settings.flags = SettingFlags::HOMING_ENABLE | SettingFlags::INVERT_LIMIT_PINS;

        let bytes = settings.encode();
        assert_eq!(Settings::decode(&bytes), settings);
    }

    #[test]
    fn encoding_is_little_endian_at_fixed_offsets() {
        let mut settings = Settings::default();
        settings.steps_per_mm[0] = 1.0;
        settings.flags = SettingFlags::REPORT_INCHES | SettingFlags::INVERT_LIMIT_PINS;

        let bytes = settings.encode();
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(bytes[OFF_PULSE_MICROSECONDS], 10);
        assert_eq!(&bytes[84..86], &[0x01, 0x04]);
    }

    #[test]
    fn decode_drops_unknown_flag_bits() {
        let mut bytes = Settings::default().encode();
        bytes[85] = 0xF0;
        assert!(Settings::decode(&bytes).flags.is_empty());
    }

    #[test]
    fn negative_values_rejected() {
        let mut settings = Settings::default();
        assert_eq!(settings.apply(11, -0.5), Err(SettingError::NegativeValue));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn step_pulse_has_minimum() {
        let mut settings = Settings::default();
        assert_eq!(settings.apply(0, 2.9), Err(SettingError::StepPulseMin));
        settings.apply(0, 3.7).unwrap();
        assert_eq!(settings.pulse_microseconds, 3);
    }

    #[test]
    fn soft_limits_need_homing() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.apply(20, 1.0),
            Err(SettingError::SoftLimitRequiresHoming)
        );

        settings.apply(22, 1.0).unwrap();
        settings.apply(20, 1.0).unwrap();
        assert!(settings.flags.contains(SettingFlags::SOFT_LIMIT_ENABLE));

        // Turning homing off takes soft limits with it
        settings.apply(22, 0.0).unwrap();
        assert!(!settings.flags.contains(SettingFlags::SOFT_LIMIT_ENABLE));
        assert!(!settings.flags.contains(SettingFlags::HOMING_ENABLE));
    }

    #[test]
    fn axis_settings_are_numbered_by_group() {
        let mut settings = Settings::default();

        settings.apply(100, 80.0).unwrap();
        settings.apply(111, 1500.0).unwrap();
        settings.apply(122, 50.0).unwrap();
        settings.apply(130, 300.0).unwrap();

        assert_eq!(settings.steps_per_mm[0], 80.0);
        assert_eq!(settings.max_rate[1], 1500.0);
        assert_eq!(settings.acceleration[2], 50.0 * 3600.0);
        assert_eq!(settings.max_travel[0], -300.0);
    }

    #[test]
    fn axis_settings_out_of_range_rejected() {
        let mut settings = Settings::default();

        // Axis index past N_AXIS within a group
        assert_eq!(settings.apply(103, 1.0), Err(SettingError::InvalidSetting));
        // Past the last group
        assert_eq!(settings.apply(140, 1.0), Err(SettingError::InvalidSetting));
        assert_eq!(settings.apply(255, 1.0), Err(SettingError::InvalidSetting));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn unknown_machine_setting_rejected() {
        let mut settings = Settings::default();
        assert_eq!(settings.apply(7, 1.0), Err(SettingError::InvalidSetting));
        assert_eq!(settings.apply(99, 1.0), Err(SettingError::InvalidSetting));
    }

    #[test]
    fn flag_settings_toggle() {
        let mut settings = Settings::default();
        settings.apply(5, 1.0).unwrap();
        settings.apply(32, 1.0).unwrap();
        assert!(settings.flags.contains(SettingFlags::INVERT_LIMIT_PINS | SettingFlags::LASER_MODE));

        settings.apply(5, 0.0).unwrap();
        assert!(!settings.flags.contains(SettingFlags::INVERT_LIMIT_PINS));
    }
}
