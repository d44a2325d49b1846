//! A `no_std` RAM-shadowed settings store for motion-control firmware.
//!
//! This crate keeps machine settings, startup lines and coordinate-system
//! offsets in a fixed EEPROM-style address space. Every record carries a
//! trailing checksum byte. When a mirror buffer can be allocated, all record
//! traffic goes through RAM and is written back to the physical device only
//! when the machine is idle, so writes never stall the motion path.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐         ┌──────────────────────────┐
//! │  Settings layer  │         │   Main loop (idle only)  │
//! │                  │         │                          │
//! │  registry.write()│────────▶│  Protocol::              │
//! │  (marks dirty)   │  dirty  │    execute_realtime()    │
//! │                  │  flags  │                          │
//! │  registry.read() │◀────────│  backend.sync()          │
//! │  (checksum ok?)  │  clear  │  (flush dirty records)   │
//! └──────────────────┘         └──────────────────────────┘
//!            ▲                             ▲
//!            │ ISR-safe atomics            │
//!       ┌────┴─────────────────────────────┴────┐
//!       │          RealtimeExecutor             │
//!       │  machine state / requests / alarm     │
//!       └───────────────────────────────────────┘
//! ```
//!
//! - **Registry writes** update the mirror synchronously and mark the record dirty
//! - **Sync** copies dirty records back to the physical device, one record per write
//! - **The realtime executor** decides when sync is safe (machine state idle)
//!
//! # Example
//!
//! ```rust,no_run
//! use eeprom_shadow::prelude::*;
//!
//! // No physical EEPROM on this board: settings live in RAM only.
//! let mut backend: Backend<NoDevice> = Backend::Absent;
//! backend.install_shadow(&mut FactoryDefaults).unwrap();
//!
//! let settings = settings::init(&mut backend).unwrap();
//! settings::store_startup_line(&mut backend, 0, "G21 G90").unwrap();
//!
//! static RT: RealtimeExecutor = RealtimeExecutor::new();
//! let mut protocol = Protocol::new();
//! protocol.execute_realtime(&RT, &mut backend);
//! # let _ = settings;
//! ```

#![deny(unsafe_code)]
#![no_std]

extern crate alloc;

pub mod realtime;
pub mod settings;
pub mod shadow;

pub mod prelude {
    pub use crate::realtime::prelude::*;
    pub use crate::settings::{self, FactoryDefaults, RestoreFlags, SettingError, Settings};
    pub use crate::shadow::prelude::*;
}
