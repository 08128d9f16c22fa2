//! Test doubles for the collaborators of the motion controller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::actuator::ActuatorOutput;
use crate::error::AttributeError;
use crate::models::{Axis, InstalledLimits, OperationalStatus, Percent100ths};
use crate::store::AttributeStore;
use crate::timer::TickTimer;

#[derive(Debug, Default)]
pub struct ManualTimerState {
    pub armed: bool,
    pub arm_count: usize,
    pub last_interval: Option<Duration>,
}

/// Timer that never fires on its own; tests drive ticks by hand.
#[derive(Clone, Default)]
pub struct ManualTimer {
    state: Arc<Mutex<ManualTimerState>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn armed(&self) -> bool {
        self.state.lock().unwrap().armed
    }

    pub fn arm_count(&self) -> usize {
        self.state.lock().unwrap().arm_count
    }

    pub fn last_interval(&self) -> Option<Duration> {
        self.state.lock().unwrap().last_interval
    }

    /// Simulates expiry. Returns whether the timer was armed.
    pub fn fire(&self) -> bool {
        std::mem::replace(&mut self.state.lock().unwrap().armed, false)
    }
}

impl TickTimer for ManualTimer {
    fn arm(&mut self, after: Duration) {
        let mut state = self.state.lock().unwrap();
        state.armed = true;
        state.arm_count += 1;
        state.last_interval = Some(after);
    }

    fn cancel(&mut self) {
        self.state.lock().unwrap().armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed()
    }
}

/// Output that records every level it receives.
#[derive(Clone)]
pub struct RecordingOutput {
    min_level: u8,
    max_level: u8,
    levels: Arc<Mutex<Vec<u8>>>,
}

impl RecordingOutput {
    pub fn new(min_level: u8, max_level: u8) -> Self {
        Self {
            min_level,
            max_level,
            levels: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn levels(&self) -> Vec<u8> {
        self.levels.lock().unwrap().clone()
    }

    pub fn last_level(&self) -> Option<u8> {
        self.levels.lock().unwrap().last().copied()
    }
}

impl ActuatorOutput for RecordingOutput {
    fn set_level(&mut self, level: u8) {
        self.levels.lock().unwrap().push(level);
    }

    fn min_level(&self) -> u8 {
        self.min_level
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }
}

/// Store wrapper whose position reads can be made to fail.
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_reads: bool,
    /// Sets `fail_reads` once a current position has been written.
    pub fail_reads_after_write: bool,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: false,
            fail_reads_after_write: false,
        }
    }

    fn check(&self) -> Result<(), AttributeError> {
        if self.fail_reads {
            Err(AttributeError::Unavailable("position"))
        } else {
            Ok(())
        }
    }
}

impl<S: AttributeStore> AttributeStore for FlakyStore<S> {
    fn current_position(&self, axis: Axis) -> Result<Option<Percent100ths>, AttributeError> {
        self.check()?;
        self.inner.current_position(axis)
    }

    fn target_position(&self, axis: Axis) -> Result<Option<Percent100ths>, AttributeError> {
        self.check()?;
        self.inner.target_position(axis)
    }

    fn set_current_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError> {
        self.inner.set_current_position(axis, position)?;
        self.fail_reads |= self.fail_reads_after_write;
        Ok(())
    }

    fn set_target_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError> {
        self.inner.set_target_position(axis, position)
    }

    fn operational_status(&self) -> Result<OperationalStatus, AttributeError> {
        self.inner.operational_status()
    }

    fn set_operational_status(&mut self, status: OperationalStatus) -> Result<(), AttributeError> {
        self.inner.set_operational_status(status)
    }

    fn installed_limits(&self, axis: Axis) -> Result<Option<InstalledLimits>, AttributeError> {
        self.inner.installed_limits(axis)
    }
}
