use std::cmp::Ordering;

use crate::error::{AttributeError, Result};
use crate::models::{
    Axis, Direction, MoveKind, MoveRequest, OperationalState, OperationalStatus, Percent100ths,
};
use crate::store::AttributeStore;
use crate::worker::Command;

use super::{AxisPolicy, MotionAxis, TickOutcome, absolute_position, compute_step, write_axis_state};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSnapshot {
    pub axis: Axis,
    pub current: Option<Percent100ths>,
    pub target: Option<Percent100ths>,
    pub absolute: Option<u16>,
    pub state: OperationalState,
    pub in_motion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub active_axis: Axis,
    pub status: OperationalStatus,
    pub lift: AxisSnapshot,
    pub tilt: Option<AxisSnapshot>,
}

/// Routes move commands to the lift and tilt axes and keeps the combined
/// operational status in the attribute store.
pub struct WindowCovering<S> {
    store: S,
    lift: MotionAxis,
    tilt: Option<MotionAxis>,
    active: Axis,
    policy: AxisPolicy,
}

impl<S: AttributeStore> WindowCovering<S> {
    pub fn new(store: S, lift: MotionAxis, tilt: Option<MotionAxis>, policy: AxisPolicy) -> Self {
        Self {
            store,
            lift,
            tilt,
            active: Axis::Lift,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn active_axis(&self) -> Axis {
        self.active
    }

    pub fn motion(&self, axis: Axis) -> Option<&MotionAxis> {
        match axis {
            Axis::Lift => Some(&self.lift),
            Axis::Tilt => self.tilt.as_ref(),
        }
    }

    pub fn dispatch(&mut self, command: Command) {
        tracing::debug!(?command, "Dispatching command");

        match command {
            Command::SelectAxis(axis) => {
                self.set_active_axis(axis);
            }
            Command::SingleStep(direction) => {
                self.dispatch_move(MoveRequest::single_step(self.active, direction))
            }
            Command::ContinuousMove(direction) => {
                self.dispatch_move(MoveRequest::continuous(self.active, direction))
            }
            Command::Stop => self.request_stop(),
            Command::GoToPosition { axis, position } => self.go_to_position(axis, position),
        }
    }

    pub fn dispatch_move(&mut self, request: MoveRequest) {
        if self.motion(request.axis).is_none() {
            tracing::warn!(axis = %request.axis, "Move requested on an axis this covering lacks");
            return;
        }

        match request.kind {
            MoveKind::SingleStep(direction) => self.single_step(request.axis, direction),
            MoveKind::ContinuousMove(direction) => self.continuous_move(request.axis, direction),
        }
    }

    /// Selects the axis later step and move commands apply to.
    pub fn set_active_axis(&mut self, axis: Axis) -> bool {
        if self.motion(axis).is_none() {
            tracing::warn!(%axis, "Cannot select an axis this covering lacks");
            return false;
        }

        self.active = axis;
        tracing::info!(%axis, "Active axis selected");
        true
    }

    pub fn request_single_step(&mut self, direction: Direction) {
        self.dispatch_move(MoveRequest::single_step(self.active, direction));
    }

    pub fn request_continuous_move(&mut self, direction: Direction) {
        self.dispatch_move(MoveRequest::continuous(self.active, direction));
    }

    /// Stops every axis in motion and abandons its target at the current
    /// position. With nothing in motion every axis is reported Stall.
    pub fn request_stop(&mut self) {
        let mut halted = false;

        for axis in Axis::ALL {
            if self.motion(axis).is_some_and(MotionAxis::is_in_motion) {
                self.halt(axis);
                write_axis_state(&mut self.store, axis, OperationalState::Stall, false);
                halted = true;
            }
        }

        if !halted {
            for axis in Axis::ALL {
                if self.motion(axis).is_some() {
                    write_axis_state(&mut self.store, axis, OperationalState::Stall, false);
                }
            }
        }
    }

    /// Persists a new target and drives the axis toward it. With the current
    /// position unknown the target is kept but no move starts.
    pub fn go_to_position(&mut self, axis: Axis, target: Percent100ths) {
        let Some((_, store)) = self.split(axis) else {
            tracing::warn!(%axis, "Target requested on an axis this covering lacks");
            return;
        };
        if let Err(e) = store.set_target_position(axis, target) {
            tracing::warn!(%axis, error = %e, "Failed to write target position");
            return;
        }

        let Some(current) = self.read_current(axis) else {
            return;
        };

        let direction = match target.cmp(&current) {
            Ordering::Greater => Some(Direction::DownOrClose),
            Ordering::Less => Some(Direction::UpOrOpen),
            Ordering::Equal => None,
        };
        let state = direction.map_or(OperationalState::Stall, OperationalState::from);

        let Some((motion, store)) = self.split(axis) else {
            return;
        };
        if motion.is_in_motion() && motion.state() != state {
            motion.stop_move();
        }

        let Some(direction) = direction else {
            write_axis_state(store, axis, OperationalState::Stall, false);
            return;
        };

        self.apply_state(axis, state);
        if let Some((motion, _)) = self.split(axis) {
            if motion.is_in_motion() {
                tracing::debug!(%axis, %target, "Running move picks up new target");
            } else {
                motion.start_continuous_move(direction);
            }
        }
    }

    pub fn on_tick(&mut self, axis: Axis) -> TickOutcome {
        match self.split(axis) {
            Some((motion, store)) => motion.on_tick(store),
            None => {
                tracing::warn!(%axis, "Tick for an axis this covering lacks");
                TickOutcome::Stale
            }
        }
    }

    /// Re-derives the actuator level of `axis` from its stored position.
    pub fn update_actuator(&mut self, axis: Axis) -> Result<u8> {
        let (motion, store) = self
            .split(axis)
            .ok_or(AttributeError::UnsupportedAxis(axis))?;
        motion.update_actuator(store)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            active_axis: self.active,
            status: self.store.operational_status().unwrap_or_default(),
            lift: self.axis_snapshot(&self.lift),
            tilt: self.tilt.as_ref().map(|tilt| self.axis_snapshot(tilt)),
        }
    }

    fn axis_snapshot(&self, motion: &MotionAxis) -> AxisSnapshot {
        let axis = motion.axis();
        let current = self.store.current_position(axis).ok().flatten();
        let limits = self.store.installed_limits(axis).ok().flatten();

        AxisSnapshot {
            axis,
            current,
            target: self.store.target_position(axis).ok().flatten(),
            absolute: current
                .zip(limits)
                .and_then(|(current, limits)| absolute_position(current, limits)),
            state: motion.state(),
            in_motion: motion.is_in_motion(),
        }
    }

    fn single_step(&mut self, axis: Axis, direction: Direction) {
        let Some(current) = self.read_current(axis) else {
            return;
        };
        let Some(delta) = self.motion(axis).map(MotionAxis::step_delta) else {
            return;
        };

        // A step replaces any running move on the same axis.
        if let Some((motion, _)) = self.split(axis) {
            if motion.is_in_motion() {
                motion.stop_move();
            }
        }

        let target = compute_step(direction.into(), current, delta);
        self.apply_state(axis, direction.into());

        match self.store.set_target_position(axis, target) {
            Ok(()) => tracing::debug!(%axis, %current, %target, "Single step requested"),
            Err(e) => tracing::warn!(%axis, error = %e, "Failed to write target position"),
        }
    }

    fn continuous_move(&mut self, axis: Axis, direction: Direction) {
        if self.motion(axis).is_some_and(MotionAxis::is_in_motion) {
            tracing::debug!(%axis, "Move already in progress, request dropped");
            return;
        }

        self.apply_state(axis, direction.into());
        if let Some((motion, _)) = self.split(axis) {
            motion.start_continuous_move(direction);
        }
    }

    /// Records `state` for `axis`, applying the axis policy to the other one.
    fn apply_state(&mut self, axis: Axis, state: OperationalState) {
        let exclusive = self.policy == AxisPolicy::Exclusive && state.is_moving();

        if exclusive && self.motion(axis.other()).is_some_and(MotionAxis::is_in_motion) {
            self.halt(axis.other());
        }

        write_axis_state(&mut self.store, axis, state, exclusive);
    }

    fn halt(&mut self, axis: Axis) {
        let Some((motion, store)) = self.split(axis) else {
            return;
        };
        motion.stop_move();

        match store.current_position(axis) {
            Ok(Some(current)) => {
                if let Err(e) = store.set_target_position(axis, current) {
                    tracing::warn!(%axis, error = %e, "Failed to abandon target");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%axis, error = %e, "Failed to read position on stop"),
        }
    }

    fn read_current(&self, axis: Axis) -> Option<Percent100ths> {
        match self.store.current_position(axis) {
            Ok(Some(current)) => Some(current),
            Ok(None) => {
                tracing::warn!(%axis, "Current position unknown, request ignored");
                None
            }
            Err(e) => {
                tracing::warn!(%axis, error = %e, "Failed to read position, request ignored");
                None
            }
        }
    }

    fn split(&mut self, axis: Axis) -> Option<(&mut MotionAxis, &mut S)> {
        let motion = match axis {
            Axis::Lift => &mut self.lift,
            Axis::Tilt => self.tilt.as_mut()?,
        };
        Some((motion, &mut self.store))
    }
}

#[cfg(test)]
mod tests {
    use crate::control::MotionConfig;
    use crate::mock::{FlakyStore, ManualTimer, RecordingOutput};
    use crate::models::InstalledLimits;
    use crate::store::MemoryAttributeStore;

    use super::*;

    fn pos(value: u16) -> Percent100ths {
        Percent100ths::new(value).unwrap()
    }

    struct Rig<S = MemoryAttributeStore> {
        covering: WindowCovering<S>,
        lift_timer: ManualTimer,
        tilt_timer: ManualTimer,
    }

    fn store(with_tilt: bool) -> MemoryAttributeStore {
        let mut store = MemoryAttributeStore::new(Some(InstalledLimits::new(0, 10000)));
        if with_tilt {
            store = store.with_tilt(Some(InstalledLimits::new(0, 90)));
        }
        for axis in Axis::ALL.into_iter().take(if with_tilt { 2 } else { 1 }) {
            store.set_current_position(axis, pos(0)).unwrap();
            store.set_target_position(axis, pos(0)).unwrap();
        }
        store
    }

    fn rig(policy: AxisPolicy, with_tilt: bool) -> Rig {
        rig_with(store(with_tilt), policy, with_tilt)
    }

    fn rig_with<S: AttributeStore>(store: S, policy: AxisPolicy, with_tilt: bool) -> Rig<S> {
        let config = MotionConfig {
            step_delta: 500,
            ..Default::default()
        };
        let lift_timer = ManualTimer::new();
        let tilt_timer = ManualTimer::new();

        let lift = MotionAxis::new(
            Axis::Lift,
            config,
            Box::new(lift_timer.clone()),
            Box::new(RecordingOutput::new(0, 255)),
        );
        let tilt = with_tilt.then(|| {
            MotionAxis::new(
                Axis::Tilt,
                config,
                Box::new(tilt_timer.clone()),
                Box::new(RecordingOutput::new(0, 255)),
            )
        });

        Rig {
            covering: WindowCovering::new(store, lift, tilt, policy),
            lift_timer,
            tilt_timer,
        }
    }

    fn status<S: AttributeStore>(covering: &WindowCovering<S>) -> OperationalStatus {
        covering.store().operational_status().unwrap()
    }

    #[test]
    fn test_single_step_sets_clamped_target_without_timer() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_current_position(Axis::Lift, pos(9800))
            .unwrap();

        covering.dispatch(Command::SingleStep(Direction::DownOrClose));

        let store = covering.store();
        assert_eq!(store.target_position(Axis::Lift).unwrap(), Some(pos(10000)));
        assert_eq!(store.current_position(Axis::Lift).unwrap(), Some(pos(9800)));
        assert_eq!(status(covering).lift, OperationalState::MovingDownOrClose);
        assert_eq!(status(covering).global, OperationalState::MovingDownOrClose);
        assert!(!rig.lift_timer.armed());
    }

    #[test]
    fn test_continuous_move_reaches_target_then_stalls() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_target_position(Axis::Lift, pos(1500))
            .unwrap();

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        assert!(rig.lift_timer.armed());

        let mut outcomes = Vec::new();
        while rig.lift_timer.fire() {
            outcomes.push(covering.on_tick(Axis::Lift));
        }

        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Stepped(pos(500)),
                TickOutcome::Stepped(pos(1000)),
                TickOutcome::Completed(pos(1500)),
            ]
        );
        assert_eq!(status(covering), OperationalStatus::STALLED);
    }

    #[test]
    fn test_second_continuous_move_is_dropped() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_target_position(Axis::Lift, pos(10000))
            .unwrap();

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        covering.dispatch(Command::ContinuousMove(Direction::UpOrOpen));

        assert_eq!(rig.lift_timer.arm_count(), 1);
        assert_eq!(
            covering.motion(Axis::Lift).unwrap().state(),
            OperationalState::MovingDownOrClose
        );
        assert_eq!(status(covering).lift, OperationalState::MovingDownOrClose);
    }

    #[test]
    fn test_stop_abandons_target_at_current_position() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_target_position(Axis::Lift, pos(10000))
            .unwrap();

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        for _ in 0..3 {
            assert!(rig.lift_timer.fire());
            covering.on_tick(Axis::Lift);
        }
        covering.dispatch(Command::Stop);

        assert!(!rig.lift_timer.armed());
        assert_eq!(covering.on_tick(Axis::Lift), TickOutcome::Stale);

        let store = covering.store();
        assert_eq!(store.current_position(Axis::Lift).unwrap(), Some(pos(1500)));
        assert_eq!(store.target_position(Axis::Lift).unwrap(), Some(pos(1500)));
        assert_eq!(status(covering), OperationalStatus::STALLED);
    }

    #[test]
    fn test_stop_when_idle_stalls_every_axis() {
        let mut rig = rig(AxisPolicy::Independent, true);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_operational_status(OperationalStatus::new(
                OperationalState::MovingDownOrClose,
                OperationalState::MovingDownOrClose,
                OperationalState::MovingUpOrOpen,
            ))
            .unwrap();

        covering.dispatch(Command::Stop);

        assert_eq!(status(covering), OperationalStatus::STALLED);
    }

    #[test]
    fn test_exclusive_move_halts_other_axis() {
        let mut rig = rig(AxisPolicy::Exclusive, true);
        let covering = &mut rig.covering;
        for axis in Axis::ALL {
            covering
                .store_mut()
                .set_target_position(axis, pos(10000))
                .unwrap();
        }

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        assert!(rig.lift_timer.fire());
        covering.on_tick(Axis::Lift);

        covering.dispatch(Command::SelectAxis(Axis::Tilt));
        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));

        assert!(!covering.motion(Axis::Lift).unwrap().is_in_motion());
        assert!(!rig.lift_timer.armed());
        assert!(rig.tilt_timer.armed());
        assert_eq!(
            covering.store().target_position(Axis::Lift).unwrap(),
            Some(pos(500))
        );

        let status = status(covering);
        assert_eq!(status.lift, OperationalState::Stall);
        assert_eq!(status.tilt, OperationalState::MovingDownOrClose);
        assert_eq!(status.global, OperationalState::MovingDownOrClose);
    }

    #[test]
    fn test_independent_axes_move_together() {
        let mut rig = rig(AxisPolicy::Independent, true);
        let covering = &mut rig.covering;
        for axis in Axis::ALL {
            covering
                .store_mut()
                .set_target_position(axis, pos(10000))
                .unwrap();
        }

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        covering.dispatch(Command::SelectAxis(Axis::Tilt));
        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));

        assert!(rig.lift_timer.armed());
        assert!(rig.tilt_timer.armed());

        let status = status(covering);
        assert_eq!(status.lift, OperationalState::MovingDownOrClose);
        assert_eq!(status.tilt, OperationalState::MovingDownOrClose);

        covering.dispatch(Command::Stop);
        assert!(!rig.lift_timer.armed());
        assert!(!rig.tilt_timer.armed());
    }

    #[test]
    fn test_go_to_position_drives_toward_target() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;

        covering.go_to_position(Axis::Lift, pos(1000));
        assert_eq!(status(covering).lift, OperationalState::MovingDownOrClose);

        while rig.lift_timer.fire() {
            covering.on_tick(Axis::Lift);
        }
        assert_eq!(
            covering.store().current_position(Axis::Lift).unwrap(),
            Some(pos(1000))
        );

        covering.go_to_position(Axis::Lift, pos(1000));
        assert!(!rig.lift_timer.armed());
        assert_eq!(status(covering), OperationalStatus::STALLED);
    }

    #[test]
    fn test_go_to_position_reverses_running_move() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;

        covering.go_to_position(Axis::Lift, pos(5000));
        for _ in 0..4 {
            assert!(rig.lift_timer.fire());
            covering.on_tick(Axis::Lift);
        }

        covering.go_to_position(Axis::Lift, pos(1000));
        assert_eq!(
            covering.motion(Axis::Lift).unwrap().state(),
            OperationalState::MovingUpOrOpen
        );

        let mut last = TickOutcome::Stale;
        while rig.lift_timer.fire() {
            last = covering.on_tick(Axis::Lift);
        }
        assert_eq!(last, TickOutcome::Completed(pos(1000)));
    }

    #[test]
    fn test_lift_only_rejects_tilt() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;

        assert!(!covering.set_active_axis(Axis::Tilt));
        assert_eq!(covering.active_axis(), Axis::Lift);

        covering.dispatch_move(MoveRequest::continuous(Axis::Tilt, Direction::DownOrClose));
        assert_eq!(covering.on_tick(Axis::Tilt), TickOutcome::Stale);
        assert!(matches!(
            covering.update_actuator(Axis::Tilt),
            Err(crate::error::Error::Attribute(AttributeError::UnsupportedAxis(Axis::Tilt)))
        ));
        assert!(covering.snapshot().tilt.is_none());
    }

    #[test]
    fn test_snapshot_reports_absolute_position() {
        let mut rig = rig(AxisPolicy::Exclusive, true);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_current_position(Axis::Tilt, pos(5000))
            .unwrap();

        let snapshot = covering.snapshot();
        let tilt = snapshot.tilt.unwrap();

        assert_eq!(snapshot.active_axis, Axis::Lift);
        assert_eq!(tilt.current, Some(pos(5000)));
        assert_eq!(tilt.absolute, Some(45));
        assert!(!tilt.in_motion);
    }

    #[test]
    fn test_single_step_replaces_running_move() {
        let mut rig = rig(AxisPolicy::Exclusive, false);
        let covering = &mut rig.covering;
        let store = covering.store_mut();
        store.set_current_position(Axis::Lift, pos(5000)).unwrap();
        store.set_target_position(Axis::Lift, pos(10000)).unwrap();

        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        covering.dispatch(Command::SingleStep(Direction::UpOrOpen));

        let motion = covering.motion(Axis::Lift).unwrap();
        assert!(!motion.is_in_motion());
        assert!(!rig.lift_timer.armed());
        assert_eq!(status(covering).lift, OperationalState::MovingUpOrOpen);
        assert_eq!(
            covering.store().target_position(Axis::Lift).unwrap(),
            Some(pos(4500))
        );

        assert_eq!(covering.on_tick(Axis::Lift), TickOutcome::Stale);
        assert_eq!(
            covering.store().current_position(Axis::Lift).unwrap(),
            Some(pos(5000))
        );
    }

    #[test]
    fn test_single_step_with_unknown_position_persists_nothing() {
        let mut store = MemoryAttributeStore::new(Some(InstalledLimits::new(0, 10000)));
        let mut changes = store.subscribe();
        store.set_target_position(Axis::Lift, pos(700)).unwrap();
        let _ = changes.try_recv();

        let mut rig = rig_with(store, AxisPolicy::Exclusive, false);
        rig.covering.dispatch(Command::SingleStep(Direction::DownOrClose));

        assert!(changes.try_recv().is_err());
        assert_eq!(
            rig.covering.store().target_position(Axis::Lift).unwrap(),
            Some(pos(700))
        );
        assert_eq!(status(&rig.covering), OperationalStatus::STALLED);
    }

    #[test]
    fn test_single_step_with_failed_read_persists_nothing() {
        let mut store = FlakyStore::new(store(false));
        store.fail_reads = true;

        let mut rig = rig_with(store, AxisPolicy::Exclusive, false);
        rig.covering.dispatch(Command::SingleStep(Direction::DownOrClose));

        let inner = &rig.covering.store().inner;
        assert_eq!(inner.target_position(Axis::Lift).unwrap(), Some(pos(0)));
        assert_eq!(inner.operational_status().unwrap(), OperationalStatus::STALLED);
    }

    #[test]
    fn test_exclusive_single_step_halts_other_axis() {
        let mut rig = rig(AxisPolicy::Exclusive, true);
        let covering = &mut rig.covering;
        covering
            .store_mut()
            .set_target_position(Axis::Tilt, pos(10000))
            .unwrap();

        covering.dispatch(Command::SelectAxis(Axis::Tilt));
        covering.dispatch(Command::ContinuousMove(Direction::DownOrClose));
        assert!(rig.tilt_timer.fire());
        covering.on_tick(Axis::Tilt);

        covering.dispatch(Command::SelectAxis(Axis::Lift));
        covering.dispatch(Command::SingleStep(Direction::DownOrClose));

        assert!(!covering.motion(Axis::Tilt).unwrap().is_in_motion());
        assert!(!rig.tilt_timer.armed());
        assert_eq!(
            covering.store().target_position(Axis::Tilt).unwrap(),
            Some(pos(500))
        );

        let status = status(covering);
        assert_eq!(status.tilt, OperationalState::Stall);
        assert_eq!(status.lift, OperationalState::MovingDownOrClose);
        assert_eq!(status.global, OperationalState::MovingDownOrClose);
    }

    #[test]
    fn test_go_to_position_keeps_target_when_position_unknown() {
        let store = MemoryAttributeStore::new(Some(InstalledLimits::new(0, 10000)));
        let mut rig = rig_with(store, AxisPolicy::Exclusive, false);

        rig.covering.go_to_position(Axis::Lift, pos(2000));

        let store = rig.covering.store();
        assert_eq!(store.target_position(Axis::Lift).unwrap(), Some(pos(2000)));
        assert_eq!(store.current_position(Axis::Lift).unwrap(), None);
        assert!(!rig.lift_timer.armed());
        assert_eq!(status(&rig.covering), OperationalStatus::STALLED);
    }
}
