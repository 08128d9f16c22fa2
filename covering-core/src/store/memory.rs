use std::fmt;

use tokio::sync::broadcast;

use crate::error::{self, AttributeError};
use crate::models::{Axis, InstalledLimits, OperationalStatus, Percent100ths};
use crate::settings::{AxisSettings, Settings};

use super::AttributeStore;

const CHANGE_CHANNEL_CAPACITY: usize = 100;

/// A write that went through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeChange {
    CurrentPosition { axis: Axis, position: Percent100ths },
    TargetPosition { axis: Axis, position: Percent100ths },
    OperationalStatus(OperationalStatus),
}

impl fmt::Display for AttributeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeChange::CurrentPosition { axis, position } => {
                write!(f, "{axis} current position = {position}")
            }
            AttributeChange::TargetPosition { axis, position } => {
                write!(f, "{axis} target position = {position}")
            }
            AttributeChange::OperationalStatus(status) => {
                write!(f, "operational status: {status}")
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct AxisAttributes {
    current: Option<Percent100ths>,
    target: Option<Percent100ths>,
    limits: Option<InstalledLimits>,
}

impl AxisAttributes {
    fn from_settings(settings: &AxisSettings) -> error::Result<Self> {
        let position = |value: Option<u16>| -> error::Result<Option<Percent100ths>> {
            Ok(value.map(Percent100ths::try_from).transpose()?)
        };

        Ok(Self {
            current: position(settings.current_position)?,
            target: position(settings.target_position)?,
            limits: Some(settings.installed_limits()),
        })
    }
}

/// In-memory attribute store that republishes every write on a broadcast feed.
pub struct MemoryAttributeStore {
    lift: AxisAttributes,
    tilt: Option<AxisAttributes>,
    status: OperationalStatus,
    changes: broadcast::Sender<AttributeChange>,
}

impl MemoryAttributeStore {
    /// Creates a lift-only store with unknown positions.
    pub fn new(lift_limits: Option<InstalledLimits>) -> Self {
        Self {
            lift: AxisAttributes {
                limits: lift_limits,
                ..Default::default()
            },
            tilt: None,
            status: OperationalStatus::STALLED,
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        }
    }

    /// Adds a tilt axis with unknown positions.
    pub fn with_tilt(mut self, tilt_limits: Option<InstalledLimits>) -> Self {
        self.tilt = Some(AxisAttributes {
            limits: tilt_limits,
            ..Default::default()
        });
        self
    }

    pub fn from_settings(settings: &Settings) -> error::Result<Self> {
        let tilt = settings
            .tilt
            .as_ref()
            .map(AxisAttributes::from_settings)
            .transpose()?;

        Ok(Self {
            lift: AxisAttributes::from_settings(&settings.lift)?,
            tilt,
            status: OperationalStatus::STALLED,
            changes: broadcast::channel(CHANGE_CHANNEL_CAPACITY).0,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttributeChange> {
        self.changes.subscribe()
    }

    pub fn set_installed_limits(
        &mut self,
        axis: Axis,
        limits: Option<InstalledLimits>,
    ) -> Result<(), AttributeError> {
        self.attributes_mut(axis)?.limits = limits;
        Ok(())
    }

    fn attributes(&self, axis: Axis) -> Result<&AxisAttributes, AttributeError> {
        match axis {
            Axis::Lift => Ok(&self.lift),
            Axis::Tilt => self.tilt.as_ref().ok_or(AttributeError::UnsupportedAxis(axis)),
        }
    }

    fn attributes_mut(
        &mut self,
        axis: Axis,
    ) -> Result<&mut AxisAttributes, AttributeError> {
        match axis {
            Axis::Lift => Ok(&mut self.lift),
            Axis::Tilt => self.tilt.as_mut().ok_or(AttributeError::UnsupportedAxis(axis)),
        }
    }

    fn publish(&self, change: AttributeChange) {
        // No subscribers is not an error for the writer.
        let _ = self.changes.send(change);
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn current_position(
        &self,
        axis: Axis,
    ) -> Result<Option<Percent100ths>, AttributeError> {
        Ok(self.attributes(axis)?.current)
    }

    fn target_position(
        &self,
        axis: Axis,
    ) -> Result<Option<Percent100ths>, AttributeError> {
        Ok(self.attributes(axis)?.target)
    }

    fn set_current_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError> {
        self.attributes_mut(axis)?.current = Some(position);
        self.publish(AttributeChange::CurrentPosition { axis, position });
        Ok(())
    }

    fn set_target_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError> {
        self.attributes_mut(axis)?.target = Some(position);
        self.publish(AttributeChange::TargetPosition { axis, position });
        Ok(())
    }

    fn operational_status(&self) -> Result<OperationalStatus, AttributeError> {
        Ok(self.status)
    }

    fn set_operational_status(
        &mut self,
        status: OperationalStatus,
    ) -> Result<(), AttributeError> {
        self.status = status;
        self.publish(AttributeChange::OperationalStatus(status));
        Ok(())
    }

    fn installed_limits(
        &self,
        axis: Axis,
    ) -> Result<Option<InstalledLimits>, AttributeError> {
        Ok(self.attributes(axis)?.limits)
    }
}
