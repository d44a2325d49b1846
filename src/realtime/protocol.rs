use bitflags::bitflags;

use super::executor::{Alarm, ExecRequest, MachineState, RealtimeExecutor};
use crate::shadow::{Backend, Checksum, Eeprom};

bitflags! {
    /// Suspend bookkeeping for holds and the safety door.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Suspend: u8 {
        /// Initial feed hold has finished decelerating.
        const HOLD_COMPLETE = 1 << 0;
        /// Door reopened during a restore; retract again.
        const RESTART_RETRACT = 1 << 1;
        const RETRACT_COMPLETE = 1 << 2;
        /// Cycle start asked to resume after the door closed.
        const INITIATE_RESTORE = 1 << 3;
        const RESTORE_COMPLETE = 1 << 4;
        /// Door opened at some point of this suspend; only cleared by resuming.
        const SAFETY_DOOR_AJAR = 1 << 5;
        const MOTION_CANCEL = 1 << 6;
        /// Jog being cancelled; buffers are flushed once motion stops.
        const JOG_CANCEL = 1 << 7;
    }
}

const HOLD_REQUESTS: ExecRequest = ExecRequest::MOTION_CANCEL
    .union(ExecRequest::FEED_HOLD)
    .union(ExecRequest::SAFETY_DOOR)
    .union(ExecRequest::SLEEP);

/// Main-loop side of the realtime protocol.
///
/// Consumes requests and alarms from the [`RealtimeExecutor`], drives the
/// machine state and, when the machine is idle, writes dirty settings back
/// to the physical device.
#[derive(Debug, Default)]
pub struct Protocol {
    abort: bool,
    suspend: Suspend,
    execute_hold: bool,
    motion_queued: bool,
    status_report: bool,
    critical_lock: bool,
    alarm: Option<Alarm>,
}

impl Protocol {
    pub const fn new() -> Self {
        Self {
            abort: false,
            suspend: Suspend::empty(),
            execute_hold: false,
            motion_queued: false,
            status_report: false,
            critical_lock: false,
            alarm: None,
        }
    }

    /// Services pending realtime work, then syncs dirty settings if the
    /// machine is idle.
    ///
    /// Returns false once a reset has been requested.
    pub fn execute_realtime<P: Eeprom, C: Checksum>(
        &mut self,
        rt: &RealtimeExecutor,
        backend: &mut Backend<P, C>,
    ) -> bool {
        self.execute_system(rt);

        if rt.sync_permitted() && backend.is_dirty() {
            backend.sync();
        }

        !self.abort
    }

    /// Services pending alarms and requests, without touching storage.
    pub fn execute_system(&mut self, rt: &RealtimeExecutor) {
        if let Some(alarm) = rt.take_alarm() {
            rt.set_state(MachineState::ALARM);
            self.alarm = Some(alarm);
            log::warn!("alarm {} ({alarm:?})", alarm.code());
            if alarm.is_critical() {
                // Only a fresh reset releases the lock
                rt.clear_request(ExecRequest::RESET);
                self.critical_lock = true;
            }
        }

        let mut requests = rt.take_requests();
        if self.critical_lock {
            requests &= ExecRequest::RESET | ExecRequest::STATUS_REPORT;
        }
        if requests.is_empty() {
            return;
        }

        if requests.contains(ExecRequest::RESET) {
            log::info!("reset requested, aborting");
            self.abort = true;
            return;
        }

        if requests.contains(ExecRequest::STATUS_REPORT) {
            self.status_report = true;
        }

        if requests.intersects(HOLD_REQUESTS) {
            self.hold(rt, requests);
        }

        if requests.contains(ExecRequest::CYCLE_START)
            && !requests.intersects(
                ExecRequest::FEED_HOLD | ExecRequest::MOTION_CANCEL | ExecRequest::SAFETY_DOOR,
            )
        {
            self.cycle_start(rt);
        }

        if requests.contains(ExecRequest::CYCLE_STOP) {
            self.cycle_stop(rt);
        }
    }

    fn hold(&mut self, rt: &RealtimeExecutor, requests: ExecRequest) {
        let mut state = rt.state();

        if !state.intersects(MachineState::ALARM | MachineState::CHECK_MODE) {
            if state.intersects(MachineState::CYCLE | MachineState::JOG)
                && !self
                    .suspend
                    .intersects(Suspend::MOTION_CANCEL | Suspend::JOG_CANCEL)
            {
                self.execute_hold = true;
                if state == MachineState::JOG && !requests.contains(ExecRequest::SLEEP) {
                    self.suspend.insert(Suspend::JOG_CANCEL);
                }
            }

            if state.is_idle() {
                self.suspend = Suspend::HOLD_COMPLETE;
            }

            if requests.contains(ExecRequest::MOTION_CANCEL)
                && !state.is_idle()
                && !state.contains(MachineState::JOG)
            {
                self.suspend.insert(Suspend::MOTION_CANCEL);
            }

            if requests.contains(ExecRequest::FEED_HOLD)
                && !state.intersects(
                    MachineState::SAFETY_DOOR | MachineState::JOG | MachineState::SLEEP,
                )
            {
                state = MachineState::HOLD;
            }

            if requests.contains(ExecRequest::SAFETY_DOOR) {
                if !self.suspend.contains(Suspend::JOG_CANCEL) {
                    if state == MachineState::SAFETY_DOOR
                        && self.suspend.contains(Suspend::INITIATE_RESTORE)
                    {
                        self.suspend.remove(
                            Suspend::RETRACT_COMPLETE
                                | Suspend::INITIATE_RESTORE
                                | Suspend::RESTORE_COMPLETE,
                        );
                        self.suspend.insert(Suspend::RESTART_RETRACT);
                    }
                    if state != MachineState::SLEEP {
                        state = MachineState::SAFETY_DOOR;
                    }
                }
                self.suspend.insert(Suspend::SAFETY_DOOR_AJAR);
            }
        }

        if requests.contains(ExecRequest::SLEEP) {
            if state == MachineState::ALARM {
                self.suspend
                    .insert(Suspend::RETRACT_COMPLETE | Suspend::HOLD_COMPLETE);
            }
            state = MachineState::SLEEP;
        }

        rt.set_state(state);
    }

    fn cycle_start(&mut self, rt: &RealtimeExecutor) {
        let mut state = rt.state();

        if state == MachineState::SAFETY_DOOR && !self.suspend.contains(Suspend::SAFETY_DOOR_AJAR) {
            if self.suspend.contains(Suspend::RESTORE_COMPLETE) {
                state = MachineState::IDLE;
            } else if self.suspend.contains(Suspend::RETRACT_COMPLETE) {
                self.suspend.insert(Suspend::INITIATE_RESTORE);
            }
        }

        let hold_done =
            state.contains(MachineState::HOLD) && self.suspend.contains(Suspend::HOLD_COMPLETE);
        if state.is_idle() || hold_done {
            let cancelled = self.suspend.contains(Suspend::MOTION_CANCEL);
            self.execute_hold = false;
            self.suspend = Suspend::empty();
            state = if self.motion_queued && !cancelled {
                MachineState::CYCLE
            } else {
                MachineState::IDLE
            };
        }

        rt.set_state(state);
    }

    fn cycle_stop(&mut self, rt: &RealtimeExecutor) {
        let mut state = rt.state();

        if state.intersects(MachineState::HOLD | MachineState::SAFETY_DOOR | MachineState::SLEEP)
            && !self.suspend.contains(Suspend::JOG_CANCEL)
        {
            // Hold finished decelerating; stay suspended until resumed
            if self.execute_hold {
                self.suspend.insert(Suspend::HOLD_COMPLETE);
                self.execute_hold = false;
            }
        } else {
            if self.suspend.contains(Suspend::JOG_CANCEL) {
                self.execute_hold = false;
                self.motion_queued = false;
            }
            if self.suspend.contains(Suspend::SAFETY_DOOR_AJAR) {
                self.suspend.remove(Suspend::JOG_CANCEL);
                self.suspend.insert(Suspend::HOLD_COMPLETE);
                state = MachineState::SAFETY_DOOR;
            } else {
                self.suspend = Suspend::empty();
                state = MachineState::IDLE;
            }
        }

        rt.set_state(state);
    }

    /// Returns true once a reset has been requested.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.abort
    }

    /// Returns true while a critical alarm blocks everything but reset.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.critical_lock
    }

    #[inline]
    pub fn suspend(&self) -> Suspend {
        self.suspend
    }

    /// Marks suspend progress reported by the parking/restore routine.
    pub fn set_suspend(&mut self, flags: Suspend) {
        self.suspend.insert(flags);
    }

    /// Clears suspend flags, e.g. [`Suspend::SAFETY_DOOR_AJAR`] once the
    /// door switch closes again.
    pub fn clear_suspend(&mut self, flags: Suspend) {
        self.suspend.remove(flags);
    }

    /// The most recent alarm.
    #[inline]
    pub fn alarm(&self) -> Option<Alarm> {
        self.alarm
    }

    /// Tells the protocol whether the planner holds motion to execute.
    pub fn set_motion_queued(&mut self, queued: bool) {
        self.motion_queued = queued;
    }

    /// Consumes a pending status report request.
    pub fn take_status_report(&mut self) -> bool {
        core::mem::take(&mut self.status_report)
    }

    /// Clears protocol state after the main loop has handled an abort.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ControlSignals;
    use crate::shadow::{
        RecordId, SettingsRegistry,
        layout::SETTINGS_VERSION,
        test_support::{MarkerDefaults, MockEeprom, TestBackend},
    };

    fn shadowed() -> TestBackend {
        let mut backend = TestBackend::Physical(MockEeprom::with_version(SETTINGS_VERSION));
        backend.install_shadow(&mut MarkerDefaults::default()).unwrap();
        backend
    }

    fn writes(backend: &TestBackend) -> usize {
        backend.physical().unwrap().checksummed_writes.len()
    }

    #[test]
    fn sync_waits_for_idle() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        let mut backend = shadowed();
        backend.write(RecordId::CoordinateSystem(1), &[4; 12]).unwrap();

        for state in [
            MachineState::CYCLE,
            MachineState::HOMING,
            MachineState::JOG,
            MachineState::HOLD,
        ] {
            rt.set_state(state);
            assert!(protocol.execute_realtime(&rt, &mut backend));
            assert!(backend.is_dirty());
            assert_eq!(writes(&backend), 0);
        }

        rt.set_state(MachineState::IDLE);
        assert!(protocol.execute_realtime(&rt, &mut backend));
        assert!(!backend.is_dirty());
        assert_eq!(writes(&backend), 1);

        // Nothing dirty, nothing written
        assert!(protocol.execute_realtime(&rt, &mut backend));
        assert_eq!(writes(&backend), 1);
    }

    #[test]
    fn reset_aborts() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        let mut backend = shadowed();

        rt.control_interrupt(ControlSignals::RESET);
        assert!(!protocol.execute_realtime(&rt, &mut backend));
        assert!(protocol.is_aborted());

        protocol.reset();
        assert!(protocol.execute_realtime(&rt, &mut backend));
    }

    #[test]
    fn feed_hold_then_resume() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);

        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::CYCLE);

        rt.request(ExecRequest::FEED_HOLD);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::HOLD);
        assert!(!protocol.suspend().contains(Suspend::HOLD_COMPLETE));

        // Resume refused until the hold has finished
        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::HOLD);

        rt.request(ExecRequest::CYCLE_STOP);
        protocol.execute_system(&rt);
        assert!(protocol.suspend().contains(Suspend::HOLD_COMPLETE));

        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::CYCLE);
        assert!(protocol.suspend().is_empty());
    }

    #[test]
    fn hold_from_idle_completes_immediately() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();

        rt.request(ExecRequest::FEED_HOLD);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::HOLD);
        assert_eq!(protocol.suspend(), Suspend::HOLD_COMPLETE);

        // Nothing queued: resume lands in idle
        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::IDLE);
    }

    #[test]
    fn cycle_start_ignored_alongside_hold() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);

        rt.request(ExecRequest::CYCLE_START | ExecRequest::FEED_HOLD);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::HOLD);
    }

    #[test]
    fn safety_door_blocks_resume_while_ajar() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);
        rt.set_state(MachineState::CYCLE);

        rt.request(ExecRequest::SAFETY_DOOR);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::SAFETY_DOOR);
        assert!(protocol.suspend().contains(Suspend::SAFETY_DOOR_AJAR));

        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::SAFETY_DOOR);
        assert!(!protocol.suspend().contains(Suspend::INITIATE_RESTORE));
    }

    #[test]
    fn safety_door_resume_sequence() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);
        rt.set_state(MachineState::CYCLE);
        rt.request(ExecRequest::SAFETY_DOOR);
        protocol.execute_system(&rt);

        protocol.clear_suspend(Suspend::SAFETY_DOOR_AJAR);
        protocol.set_suspend(Suspend::RETRACT_COMPLETE);
        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::SAFETY_DOOR);
        assert!(protocol.suspend().contains(Suspend::INITIATE_RESTORE));

        // Door reopens mid-restore
        rt.request(ExecRequest::SAFETY_DOOR);
        protocol.execute_system(&rt);
        assert!(protocol.suspend().contains(Suspend::RESTART_RETRACT));
        assert!(!protocol.suspend().contains(Suspend::INITIATE_RESTORE));

        protocol.clear_suspend(Suspend::SAFETY_DOOR_AJAR);
        protocol.set_suspend(Suspend::RESTORE_COMPLETE);
        rt.request(ExecRequest::CYCLE_START);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::CYCLE);
        assert!(protocol.suspend().is_empty());
    }

    #[test]
    fn motion_cancel_returns_to_idle() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);
        rt.set_state(MachineState::CYCLE);

        rt.request(ExecRequest::MOTION_CANCEL);
        protocol.execute_system(&rt);
        assert!(protocol.suspend().contains(Suspend::MOTION_CANCEL));
        assert_eq!(rt.state(), MachineState::CYCLE);

        rt.request(ExecRequest::CYCLE_STOP);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::IDLE);
        assert!(protocol.suspend().is_empty());
    }

    #[test]
    fn jog_hold_cancels_jog() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        protocol.set_motion_queued(true);
        rt.set_state(MachineState::JOG);

        rt.request(ExecRequest::FEED_HOLD);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::JOG);
        assert!(protocol.suspend().contains(Suspend::JOG_CANCEL));

        rt.request(ExecRequest::CYCLE_STOP);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::IDLE);
    }

    #[test]
    fn critical_alarm_locks_until_reset() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();
        let mut backend = shadowed();
        backend.write(RecordId::BuildInfo, &[b'i'; 80]).unwrap();
        rt.set_state(MachineState::CYCLE);

        rt.request(ExecRequest::RESET);
        rt.raise_alarm(Alarm::HardLimit);
        assert!(protocol.execute_realtime(&rt, &mut backend));
        assert_eq!(rt.state(), MachineState::ALARM);
        assert_eq!(protocol.alarm(), Some(Alarm::HardLimit));
        assert!(protocol.is_locked());
        // Alarm is not idle
        assert!(backend.is_dirty());

        rt.request(ExecRequest::CYCLE_START | ExecRequest::STATUS_REPORT);
        assert!(protocol.execute_realtime(&rt, &mut backend));
        assert_eq!(rt.state(), MachineState::ALARM);
        assert!(protocol.take_status_report());
        assert!(!protocol.take_status_report());

        rt.request(ExecRequest::RESET);
        assert!(!protocol.execute_realtime(&rt, &mut backend));
    }

    #[test]
    fn alarm_blocks_hold_but_allows_sleep() {
        let rt = RealtimeExecutor::new();
        let mut protocol = Protocol::new();

        rt.raise_alarm(Alarm::ProbeFailInitial);
        rt.request(ExecRequest::FEED_HOLD);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::ALARM);
        assert!(!protocol.is_locked());

        rt.request(ExecRequest::SLEEP);
        protocol.execute_system(&rt);
        assert_eq!(rt.state(), MachineState::SLEEP);
        assert!(
            protocol
                .suspend()
                .contains(Suspend::RETRACT_COMPLETE | Suspend::HOLD_COMPLETE)
        );
    }
}
