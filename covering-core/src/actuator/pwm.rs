use crate::error::{Error, Result};

use super::ActuatorOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmAction {
    On,
    Off,
    Level(u8),
}

/// Simulated PWM channel with a bounded level range.
///
/// The last requested level survives an `Off` action so that `On` restores it.
#[derive(Debug)]
pub struct PwmDevice {
    channel: u32,
    min_level: u8,
    max_level: u8,
    level: u8,
    state: PwmState,
}

impl PwmDevice {
    pub fn new(channel: u32, min_level: u8, max_level: u8) -> Result<Self> {
        if min_level > max_level {
            return Err(Error::InvalidConfiguration(format!(
                "PWM channel {channel}: min level {min_level} exceeds max level {max_level}"
            )));
        }

        Ok(Self {
            channel,
            min_level,
            max_level,
            level: min_level,
            state: PwmState::Off,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_turned_on(&self) -> bool {
        self.state == PwmState::On
    }

    /// Duty value currently applied to the pin.
    pub fn duty(&self) -> u8 {
        match self.state {
            PwmState::On => self.level,
            PwmState::Off => 0,
        }
    }

    /// Applies an action and returns whether the output changed.
    pub fn initiate_action(&mut self, action: PwmAction) -> bool {
        let previous = (self.state, self.level);

        match action {
            PwmAction::On => self.state = PwmState::On,
            PwmAction::Off => self.state = PwmState::Off,
            PwmAction::Level(level) => {
                self.level = level.clamp(self.min_level, self.max_level);
                self.state = PwmState::On;
            }
        }

        let changed = previous != (self.state, self.level);
        if changed {
            tracing::debug!(
                channel = self.channel,
                duty = self.duty(),
                "PWM output updated"
            );
        }
        changed
    }
}

impl ActuatorOutput for PwmDevice {
    fn set_level(&mut self, level: u8) {
        self.initiate_action(PwmAction::Level(level));
    }

    fn min_level(&self) -> u8 {
        self.min_level
    }

    fn max_level(&self) -> u8 {
        self.max_level
    }
}
