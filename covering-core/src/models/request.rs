use serde::{Deserialize, Serialize};

use super::{Axis, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    SingleStep(Direction),
    ContinuousMove(Direction),
}

/// A move command bound to the axis that was active when it was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub axis: Axis,
    pub kind: MoveKind,
}

impl MoveRequest {
    pub const fn single_step(axis: Axis, direction: Direction) -> Self {
        Self {
            axis,
            kind: MoveKind::SingleStep(direction),
        }
    }

    pub const fn continuous(axis: Axis, direction: Direction) -> Self {
        Self {
            axis,
            kind: MoveKind::ContinuousMove(direction),
        }
    }
}
