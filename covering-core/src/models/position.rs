use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AttributeError;

/// Position in hundredths of a percent of full travel.
///
/// `0` is fully open, `10000` fully closed. Unknown positions are carried as
/// `Option<Percent100ths>` so arithmetic never touches an uninitialized value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Percent100ths(u16);

impl Percent100ths {
    pub const FULLY_OPEN: Self = Self(0);
    pub const FULLY_CLOSED: Self = Self(10000);

    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::FULLY_CLOSED.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// Moves toward fully closed, stopping at the boundary.
    pub fn saturating_add(self, delta: u16) -> Self {
        Self(self.0.saturating_add(delta).min(Self::FULLY_CLOSED.0))
    }

    /// Moves toward fully open, stopping at the boundary.
    pub fn saturating_sub(self, delta: u16) -> Self {
        Self(self.0.saturating_sub(delta))
    }
}

impl TryFrom<u16> for Percent100ths {
    type Error = AttributeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(AttributeError::OutOfRange(value))
    }
}

impl From<Percent100ths> for u16 {
    fn from(position: Percent100ths) -> Self {
        position.0
    }
}

impl fmt::Display for Percent100ths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// Installed travel limits of an axis in device units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledLimits {
    pub open: u16,
    pub closed: u16,
}

impl InstalledLimits {
    pub const fn new(open: u16, closed: u16) -> Self {
        Self { open, closed }
    }

    /// A zero-length travel cannot be mapped onto anything.
    pub const fn is_valid(&self) -> bool {
        self.open != self.closed
    }
}
