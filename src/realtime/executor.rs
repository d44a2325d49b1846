use core::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

use super::flags::AtomicFlags;

bitflags! {
    /// Machine state. At most one bit is set; no bits means idle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MachineState: u8 {
        /// Locks out g-code processing; settings stay accessible.
        const ALARM = 1 << 0;
        const CHECK_MODE = 1 << 1;
        const HOMING = 1 << 2;
        const CYCLE = 1 << 3;
        const HOLD = 1 << 4;
        const JOG = 1 << 5;
        const SAFETY_DOOR = 1 << 6;
        const SLEEP = 1 << 7;
    }
}

impl MachineState {
    pub const IDLE: Self = Self::empty();

    #[inline]
    pub fn is_idle(self) -> bool {
        self.is_empty()
    }
}

bitflags! {
    /// Pending realtime requests, raised from interrupt context.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecRequest: u8 {
        const STATUS_REPORT = 1 << 0;
        const CYCLE_START = 1 << 1;
        /// Raised by the step generator when a cycle or hold finishes.
        const CYCLE_STOP = 1 << 2;
        const FEED_HOLD = 1 << 3;
        const RESET = 1 << 4;
        const SAFETY_DOOR = 1 << 5;
        const MOTION_CANCEL = 1 << 6;
        const SLEEP = 1 << 7;
    }
}

bitflags! {
    /// Control input pins, as reported by the pin-change interrupt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlSignals: u8 {
        const RESET = 1 << 0;
        const FEED_HOLD = 1 << 1;
        const CYCLE_START = 1 << 2;
        const SAFETY_DOOR = 1 << 3;
    }
}

/// Alarm raised from interrupt context. Zero is reserved for "no alarm".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Alarm {
    HardLimit = 1,
    SoftLimit = 2,
    AbortCycle = 3,
    ProbeFailInitial = 4,
    ProbeFailContact = 5,
    HomingFailReset = 6,
    HomingFailDoor = 7,
    FailPulloff = 8,
    HomingFailApproach = 9,
}

impl Alarm {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Alarm::HardLimit,
            2 => Alarm::SoftLimit,
            3 => Alarm::AbortCycle,
            4 => Alarm::ProbeFailInitial,
            5 => Alarm::ProbeFailContact,
            6 => Alarm::HomingFailReset,
            7 => Alarm::HomingFailDoor,
            8 => Alarm::FailPulloff,
            9 => Alarm::HomingFailApproach,
            _ => return None,
        })
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Limit alarms lock the machine until reset.
    pub fn is_critical(self) -> bool {
        matches!(self, Alarm::HardLimit | Alarm::SoftLimit)
    }
}

/// State shared between interrupt handlers and the main loop.
///
/// Lives in a `static`; every access is lock-free or a short critical
/// section. Interrupt handlers raise requests and alarms, the main loop
/// consumes them through [`Protocol`](super::Protocol) and owns the machine
/// state transitions.
pub struct RealtimeExecutor {
    state: AtomicFlags<MachineState>,
    requests: AtomicFlags<ExecRequest>,
    alarm: AtomicU8,
}

impl RealtimeExecutor {
    pub const fn new() -> Self {
        Self {
            state: AtomicFlags::empty(),
            requests: AtomicFlags::empty(),
            alarm: AtomicU8::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> MachineState {
        self.state.get()
    }

    #[inline]
    pub fn set_state(&self, state: MachineState) {
        self.state.assign(state);
    }

    /// Raises `request`. Safe from interrupt context.
    pub fn request(&self, request: ExecRequest) {
        log::trace!("realtime request {request:?}");
        self.requests.set(request);
    }

    pub fn clear_request(&self, request: ExecRequest) {
        self.requests.clear(request);
    }

    /// Pending requests, without consuming them.
    pub fn pending(&self) -> ExecRequest {
        self.requests.get()
    }

    /// Consumes every pending request.
    pub fn take_requests(&self) -> ExecRequest {
        self.requests.take()
    }

    /// Records `alarm`, replacing any alarm not yet taken.
    pub fn raise_alarm(&self, alarm: Alarm) {
        critical_section::with(|_| self.alarm.store(alarm.code(), Ordering::Release));
    }

    /// Consumes the pending alarm.
    pub fn take_alarm(&self) -> Option<Alarm> {
        if self.alarm.load(Ordering::Acquire) == 0 {
            return None;
        }
        let code = critical_section::with(|_| {
            let code = self.alarm.load(Ordering::Acquire);
            self.alarm.store(0, Ordering::Release);
            code
        });
        Alarm::from_code(code)
    }

    pub fn clear_alarm(&self) {
        critical_section::with(|_| self.alarm.store(0, Ordering::Release));
    }

    /// Translates a control pin change into one request.
    ///
    /// Reset wins over cycle start, which wins over feed hold, then safety
    /// door. No signal raises nothing.
    pub fn control_interrupt(&self, signals: ControlSignals) {
        let request = if signals.contains(ControlSignals::RESET) {
            ExecRequest::RESET
        } else if signals.contains(ControlSignals::CYCLE_START) {
            ExecRequest::CYCLE_START
        } else if signals.contains(ControlSignals::FEED_HOLD) {
            ExecRequest::FEED_HOLD
        } else if signals.contains(ControlSignals::SAFETY_DOOR) {
            ExecRequest::SAFETY_DOOR
        } else {
            return;
        };
        self.request(request);
    }

    /// Returns true if the machine is idle, the only state in which writing
    /// back to the physical device is allowed.
    #[inline]
    pub fn sync_permitted(&self) -> bool {
        self.state().is_idle()
    }
}

impl Default for RealtimeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for RealtimeExecutor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RealtimeExecutor")
            .field("state", &self.state())
            .field("requests", &self.pending())
            .field("alarm", &self.alarm.load(Ordering::Relaxed))
            .finish()
    }
}
