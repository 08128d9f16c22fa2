use crate::actuator::ActuatorOutput;
use crate::error::{AttributeError, Error, Result};
use crate::models::{Axis, Direction, InstalledLimits, OperationalState, Percent100ths};
use crate::store::AttributeStore;
use crate::timer::TickTimer;

use super::{MotionConfig, compute_step, position_to_level, target_completed, write_axis_state};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick arrived after the move was stopped.
    Stale,
    /// Positions could not be read; the timer was re-armed.
    Skipped,
    Stepped(Percent100ths),
    Completed(Percent100ths),
}

/// Steps one axis from its current position toward its target, one bounded
/// increment per timer tick.
pub struct MotionAxis {
    axis: Axis,
    config: MotionConfig,
    state: OperationalState,
    in_motion: bool,
    timer: Box<dyn TickTimer>,
    output: Box<dyn ActuatorOutput>,
}

impl MotionAxis {
    pub fn new(
        axis: Axis,
        config: MotionConfig,
        timer: Box<dyn TickTimer>,
        output: Box<dyn ActuatorOutput>,
    ) -> Self {
        Self {
            axis,
            config,
            state: OperationalState::Stall,
            in_motion: false,
            timer,
            output,
        }
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn state(&self) -> OperationalState {
        self.state
    }

    pub fn is_in_motion(&self) -> bool {
        self.in_motion
    }

    pub fn step_delta(&self) -> u16 {
        self.config.step_delta
    }

    /// Arms the first tick of a move. Returns `false` when a move is already
    /// running, in which case nothing changes.
    pub fn start_continuous_move(&mut self, direction: Direction) -> bool {
        if self.in_motion {
            tracing::debug!(axis = %self.axis, "Move already in progress, request dropped");
            return false;
        }

        self.state = direction.into();
        self.in_motion = true;
        self.timer.arm(self.config.tick_interval);

        tracing::info!(axis = %self.axis, state = %self.state, "Starting continuous move");
        true
    }

    pub fn stop_move(&mut self) {
        self.timer.cancel();

        if self.in_motion {
            tracing::info!(axis = %self.axis, "Stopping move");
        }
        self.in_motion = false;
        self.state = OperationalState::Stall;
    }

    pub fn on_tick<S: AttributeStore + ?Sized>(&mut self, store: &mut S) -> TickOutcome {
        if !self.in_motion {
            tracing::debug!(axis = %self.axis, "Stale tick dropped");
            return TickOutcome::Stale;
        }

        let (current, target) = match (
            store.current_position(self.axis),
            store.target_position(self.axis),
        ) {
            (Ok(Some(current)), Ok(Some(target))) => (current, target),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(axis = %self.axis, error = %e, "Failed to read position, skipping tick");
                return self.skip_tick();
            }
            _ => {
                tracing::warn!(axis = %self.axis, "Position unknown, skipping tick");
                return self.skip_tick();
            }
        };

        let position = compute_step(self.state, current, self.config.step_delta);
        if let Err(e) = store.set_current_position(self.axis, position) {
            tracing::warn!(axis = %self.axis, error = %e, "Failed to write position, skipping tick");
            return self.skip_tick();
        }
        if let Err(e) = self.update_actuator(store) {
            tracing::warn!(axis = %self.axis, error = %e, "Actuator update skipped");
        }

        self.in_motion = false;

        let completed = match store.current_position(self.axis) {
            Ok(Some(current)) => target_completed(self.state, current, target),
            _ => false,
        };

        if completed {
            tracing::info!(axis = %self.axis, %position, "Target reached");
            self.state = OperationalState::Stall;
            write_axis_state(store, self.axis, OperationalState::Stall, false);
            TickOutcome::Completed(position)
        } else {
            tracing::debug!(axis = %self.axis, %position, %target, "Stepped");
            self.in_motion = true;
            self.timer.arm(self.config.tick_interval);
            TickOutcome::Stepped(position)
        }
    }

    /// Pushes the level for the stored current position to the output.
    pub fn update_actuator<S: AttributeStore + ?Sized>(&mut self, store: &S) -> Result<u8> {
        let position = store
            .current_position(self.axis)?
            .ok_or(AttributeError::Unavailable("current position"))?;
        let limits = store
            .installed_limits(self.axis)?
            .filter(InstalledLimits::is_valid)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!("{} installed limits unavailable", self.axis))
            })?;

        let level = position_to_level(
            position,
            limits,
            self.output.min_level(),
            self.output.max_level(),
        )
        .ok_or_else(|| {
            Error::InvalidConfiguration(format!("{} actuator range cannot be mapped", self.axis))
        })?;

        self.output.set_level(level);
        Ok(level)
    }

    fn skip_tick(&mut self) -> TickOutcome {
        self.timer.arm(self.config.tick_interval);
        TickOutcome::Skipped
    }
}
