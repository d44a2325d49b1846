//! Basic example: settings on a board without non-volatile storage
//!
//! This example demonstrates:
//! - Installing the RAM shadow over an absent device
//! - Loading (and defaulting) the global settings
//! - Storing and reading back a startup line and a `$` setting
//! - Sync on a RAM-only store drops the dirty flags without writing anywhere

use eeprom_shadow::prelude::*;

pub fn main() {
    // No EEPROM on this board, so the mirror is the only copy
    let mut backend: Backend<NoDevice> = Backend::Absent;
    assert_eq!(backend.kind(), EepromKind::None);

    backend.install_shadow(&mut FactoryDefaults).unwrap();
    assert_eq!(backend.kind(), EepromKind::Emulated);

    // Defaults were restored into the mirror during installation
    let mut global = settings::init(&mut backend).unwrap();
    assert_eq!(global, Settings::default());

    settings::store_startup_line(&mut backend, 0, "G21 G90 G54").unwrap();
    let line = settings::read_startup_line(&mut backend, 0).unwrap().unwrap();
    assert_eq!(line.as_str(), "G21 G90 G54");

    // $110: X max rate
    settings::store_global_setting(&mut backend, &mut global, 110, 2000.0).unwrap();
    assert_eq!(settings::load_global(&backend), Some(global));

    // Overlong lines are rejected and leave the slot untouched
    let long = "G0".repeat(60);
    assert_eq!(
        settings::store_startup_line(&mut backend, 0, &long),
        Err(ShadowError::LineTooLong)
    );
    let line = settings::read_startup_line(&mut backend, 0).unwrap().unwrap();
    assert_eq!(line.as_str(), "G21 G90 G54");

    assert!(backend.is_dirty());
    backend.sync();
    assert!(!backend.is_dirty());

    println!("startup line 0: {line}");
    println!("{backend:?}");
}
