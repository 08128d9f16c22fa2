use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Lift,
    Tilt,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::Lift, Axis::Tilt];

    pub const fn other(self) -> Self {
        match self {
            Axis::Lift => Axis::Tilt,
            Axis::Tilt => Axis::Lift,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Lift => write!(f, "lift"),
            Axis::Tilt => write!(f, "tilt"),
        }
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lift" => Ok(Axis::Lift),
            "tilt" => Ok(Axis::Tilt),
            other => Err(format!("unknown axis '{other}'")),
        }
    }
}

/// Requested direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    UpOrOpen,
    DownOrClose,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" | "open" => Ok(Direction::UpOrOpen),
            "down" | "close" => Ok(Direction::DownOrClose),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// Direction of motion as reported in the operational status attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationalState {
    #[default]
    Stall = 0,
    MovingUpOrOpen = 1,
    MovingDownOrClose = 2,
    Reserved = 3,
}

impl OperationalState {
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decodes the low two bits; higher bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => OperationalState::Stall,
            1 => OperationalState::MovingUpOrOpen,
            2 => OperationalState::MovingDownOrClose,
            _ => OperationalState::Reserved,
        }
    }

    pub const fn is_moving(self) -> bool {
        matches!(
            self,
            OperationalState::MovingUpOrOpen | OperationalState::MovingDownOrClose
        )
    }
}

impl From<Direction> for OperationalState {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::UpOrOpen => OperationalState::MovingUpOrOpen,
            Direction::DownOrClose => OperationalState::MovingDownOrClose,
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationalState::Stall => "stall",
            OperationalState::MovingUpOrOpen => "moving up",
            OperationalState::MovingDownOrClose => "moving down",
            OperationalState::Reserved => "reserved",
        };
        f.write_str(name)
    }
}

/// Combined motion status, packed as `global | lift << 2 | tilt << 4`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationalStatus {
    pub global: OperationalState,
    pub lift: OperationalState,
    pub tilt: OperationalState,
}

impl OperationalStatus {
    pub const STALLED: Self = Self::new(
        OperationalState::Stall,
        OperationalState::Stall,
        OperationalState::Stall,
    );

    pub const fn new(
        global: OperationalState,
        lift: OperationalState,
        tilt: OperationalState,
    ) -> Self {
        Self { global, lift, tilt }
    }

    pub const fn pack(self) -> u8 {
        (self.global.bits() & 0b11)
            | (self.lift.bits() & 0b11) << 2
            | (self.tilt.bits() & 0b11) << 4
    }

    pub const fn unpack(byte: u8) -> Self {
        Self {
            global: OperationalState::from_bits(byte),
            lift: OperationalState::from_bits(byte >> 2),
            tilt: OperationalState::from_bits(byte >> 4),
        }
    }

    pub fn set_axis(&mut self, axis: Axis, state: OperationalState) {
        match axis {
            Axis::Lift => self.lift = state,
            Axis::Tilt => self.tilt = state,
        }
    }

    /// Global follows lift while lift moves, otherwise it falls back to tilt.
    pub fn with_global_update(mut self) -> Self {
        self.global = if self.lift != OperationalState::Stall {
            self.lift
        } else {
            self.tilt
        };
        self
    }
}

impl From<u8> for OperationalStatus {
    fn from(byte: u8) -> Self {
        Self::unpack(byte)
    }
}

impl From<OperationalStatus> for u8 {
    fn from(status: OperationalStatus) -> Self {
        status.pack()
    }
}

impl fmt::Display for OperationalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "global={}, lift={}, tilt={} (0x{:02x})",
            self.global,
            self.lift,
            self.tilt,
            self.pack()
        )
    }
}
