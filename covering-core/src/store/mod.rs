mod memory;

pub use memory::*;

use crate::error::AttributeError;
use crate::models::{Axis, InstalledLimits, OperationalStatus, Percent100ths};

/// Attribute storage shared between the controller and the protocol layer.
///
/// Only the worker task touches a store, so implementations need no locking.
pub trait AttributeStore: Send {
    fn current_position(&self, axis: Axis) -> Result<Option<Percent100ths>, AttributeError>;

    fn target_position(&self, axis: Axis) -> Result<Option<Percent100ths>, AttributeError>;

    fn set_current_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError>;

    fn set_target_position(
        &mut self,
        axis: Axis,
        position: Percent100ths,
    ) -> Result<(), AttributeError>;

    fn operational_status(&self) -> Result<OperationalStatus, AttributeError>;

    fn set_operational_status(&mut self, status: OperationalStatus) -> Result<(), AttributeError>;

    fn installed_limits(&self, axis: Axis) -> Result<Option<InstalledLimits>, AttributeError>;
}
