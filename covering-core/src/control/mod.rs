mod axis;
mod covering;

pub use axis::*;
pub use covering::*;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::{Axis, InstalledLimits, OperationalState, OperationalStatus, Percent100ths};
use crate::range::map_range;
use crate::store::AttributeStore;

const FULL_SCALE: i32 = Percent100ths::FULLY_CLOSED.value() as i32;

/// How a move on one axis affects the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisPolicy {
    /// Only one axis moves at a time; moving one stops and stalls the other.
    #[default]
    Exclusive,
    /// Lift and tilt move independently.
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfig {
    pub tick_interval: Duration,
    pub step_delta: u16,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            step_delta: 100,
        }
    }
}

/// One bounded step from `current` in the direction given by `state`.
pub fn compute_step(state: OperationalState, current: Percent100ths, delta: u16) -> Percent100ths {
    match state {
        OperationalState::MovingDownOrClose => current.saturating_add(delta),
        OperationalState::MovingUpOrOpen => current.saturating_sub(delta),
        OperationalState::Stall | OperationalState::Reserved => current,
    }
}

pub fn target_completed(
    state: OperationalState,
    current: Percent100ths,
    target: Percent100ths,
) -> bool {
    match state {
        OperationalState::MovingDownOrClose => current >= target,
        OperationalState::MovingUpOrOpen => current <= target,
        OperationalState::Stall | OperationalState::Reserved => true,
    }
}

/// Position expressed in installed-limit units.
pub fn absolute_position(position: Percent100ths, limits: InstalledLimits) -> Option<u16> {
    let absolute = map_range(
        i32::from(position.value()),
        0..=FULL_SCALE,
        i32::from(limits.open)..=i32::from(limits.closed),
    )?;
    u16::try_from(absolute).ok()
}

/// Actuator level for a position, going through the installed limits.
pub fn position_to_level(
    position: Percent100ths,
    limits: InstalledLimits,
    min_level: u8,
    max_level: u8,
) -> Option<u8> {
    if !limits.is_valid() {
        return None;
    }

    let absolute = absolute_position(position, limits)?;
    let level = map_range(
        i32::from(absolute),
        i32::from(limits.open)..=i32::from(limits.closed),
        i32::from(min_level)..=i32::from(max_level),
    )?;
    u8::try_from(level).ok()
}

/// Writes `state` for `axis` and recomputes the global state.
pub(crate) fn write_axis_state<S: AttributeStore + ?Sized>(
    store: &mut S,
    axis: Axis,
    state: OperationalState,
    stall_other: bool,
) {
    let mut status = store.operational_status().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to read operational status, rebuilding it");
        OperationalStatus::STALLED
    });

    status.set_axis(axis, state);
    if stall_other {
        status.set_axis(axis.other(), OperationalState::Stall);
    }

    if let Err(e) = store.set_operational_status(status.with_global_update()) {
        tracing::warn!(%axis, error = %e, "Failed to write operational status");
    }
}
