//! Interrupt-to-main-loop flag protocol and the idle gate for settings sync.

mod executor;
mod flags;
mod protocol;

pub use executor::{Alarm, ControlSignals, ExecRequest, MachineState, RealtimeExecutor};
pub use flags::AtomicFlags;
pub use protocol::{Protocol, Suspend};

pub mod prelude {
    pub use super::{
        Alarm, AtomicFlags, ControlSignals, ExecRequest, MachineState, Protocol,
        RealtimeExecutor, Suspend,
    };
}
