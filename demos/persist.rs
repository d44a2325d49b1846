//! Persistence example: deferring EEPROM writes until the machine is idle
//!
//! This example demonstrates:
//! - A board EEPROM driver implementing [`Eeprom`]
//! - Installing the shadow over it, with factory defaults on a blank part
//! - Settings writes during a cycle landing in RAM only
//! - The main loop flushing dirty records once the cycle stops

use eeprom_shadow::prelude::*;
use eeprom_shadow::shadow::eeprom::write_bytes_with_checksum;

const SIZE: usize = 1024;

/// Board EEPROM that counts the records written to it.
struct BoardEeprom {
    cells: [u8; SIZE],
    record_writes: usize,
}

impl BoardEeprom {
    /// A freshly erased part.
    fn erased() -> Self {
        Self {
            cells: [0xFF; SIZE],
            record_writes: 0,
        }
    }
}

impl Eeprom for BoardEeprom {
    fn get_byte(&self, addr: u32) -> u8 {
        self.cells[addr as usize]
    }

    fn put_byte(&mut self, addr: u32, value: u8) {
        // eeprom_driver.write_byte(addr, value);
        self.cells[addr as usize] = value;
    }

    fn write_with_checksum(&mut self, dest: u32, src: &[u8]) {
        self.record_writes += 1;
        write_bytes_with_checksum::<DefaultChecksum, _>(self, dest, src);
    }
}

static RT: RealtimeExecutor = RealtimeExecutor::new();

fn record_writes(backend: &Backend<BoardEeprom>) -> usize {
    backend.physical().map_or(0, |dev| dev.record_writes)
}

pub fn main() {
    let mut backend = Backend::Physical(BoardEeprom::erased());

    // The erased part has no valid version byte, so defaults go to the
    // device before it is mirrored
    backend.install_shadow(&mut FactoryDefaults).unwrap();
    let at_install = record_writes(&backend);
    assert!(at_install > 0);
    assert!(!backend.is_dirty());

    let mut global = settings::init(&mut backend).unwrap();
    let mut protocol = Protocol::new();

    // Start a cycle with motion queued
    protocol.set_motion_queued(true);
    RT.request(ExecRequest::CYCLE_START);
    assert!(protocol.execute_realtime(&RT, &mut backend));
    assert_eq!(RT.state(), MachineState::CYCLE);

    // G10 L2 P1 and a $ setting arrive while moving: RAM only
    settings::store_coord_data(&mut backend, 0, &[10.0, -5.0, 0.5]).unwrap();
    settings::store_global_setting(&mut backend, &mut global, 120, 50.0).unwrap();
    assert!(backend.is_dirty());

    for _ in 0..3 {
        assert!(protocol.execute_realtime(&RT, &mut backend));
    }
    assert_eq!(record_writes(&backend), at_install);

    // The mirror already serves the new values
    let offsets = settings::read_coord_data(&mut backend, 0).unwrap();
    assert_eq!(offsets, Some([10.0, -5.0, 0.5]));
    let store = backend.store().unwrap();
    assert_eq!(store.get_byte(0), 12);

    // Step generator reports the end of motion: the loop goes idle and syncs
    protocol.set_motion_queued(false);
    RT.request(ExecRequest::CYCLE_STOP);
    assert!(protocol.execute_realtime(&RT, &mut backend));
    assert_eq!(RT.state(), MachineState::IDLE);
    assert!(!backend.is_dirty());

    // One write per dirty record: the coordinate slot and the global block
    assert_eq!(record_writes(&backend), at_install + 2);

    // Nothing left to do on later passes
    assert!(protocol.execute_realtime(&RT, &mut backend));
    assert_eq!(record_writes(&backend), at_install + 2);

    println!(
        "flushed {} records after the cycle, {:?}",
        record_writes(&backend) - at_install,
        backend
    );
}
