use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use covering_core::mock::RecordingOutput;
use covering_core::settings::{AxisSettings, Logger, Motion};
use covering_core::{
    ActuatorOutput, AttributeChange, AxisPolicy, CoveringHandle, MemoryAttributeStore, Settings,
    WindowCovering, spawn,
};

pub struct MockCovering {
    pub handle: CoveringHandle,
    pub worker: JoinHandle<WindowCovering<MemoryAttributeStore>>,
    pub changes: broadcast::Receiver<AttributeChange>,
    pub lift_output: RecordingOutput,
    pub tilt_output: RecordingOutput,
}

impl MockCovering {
    pub fn new(settings: Settings) -> Self {
        let store = MemoryAttributeStore::from_settings(&settings).unwrap();
        let changes = store.subscribe();

        let lift_output = RecordingOutput::new(0, 255);
        let tilt_output = RecordingOutput::new(0, 255);
        let tilt = settings
            .tilt
            .as_ref()
            .map(|_| Box::new(tilt_output.clone()) as Box<dyn ActuatorOutput>);

        let (handle, worker) =
            spawn(&settings, store, Box::new(lift_output.clone()), tilt).unwrap();

        Self {
            handle,
            worker,
            changes,
            lift_output,
            tilt_output,
        }
    }

    /// Drops the handle and waits for the worker to hand back its controller.
    pub async fn shutdown(self) -> WindowCovering<MemoryAttributeStore> {
        drop(self.handle);
        self.worker.await.unwrap()
    }

    pub fn drain_changes(&mut self) -> Vec<AttributeChange> {
        let mut changes = Vec::new();
        while let Ok(change) = self.changes.try_recv() {
            changes.push(change);
        }
        changes
    }
}

fn axis(closed_limit: u16, current: u16, target: u16) -> AxisSettings {
    AxisSettings {
        installed_open_limit: 0,
        installed_closed_limit: closed_limit,
        actuator_min: 0,
        actuator_max: 255,
        current_position: Some(current),
        target_position: Some(target),
    }
}

/// Lift-only covering stepping 500 every 100ms from `current` with `target` preset.
pub fn lift_settings(current: u16, target: u16) -> Settings {
    Settings {
        logger: Logger {
            level: "debug".into(),
        },
        motion: Motion {
            tick_interval_ms: 100,
            step_delta: 500,
            axis_policy: AxisPolicy::Exclusive,
            queue_capacity: 10,
        },
        lift: axis(10000, current, target),
        tilt: None,
    }
}

pub fn tilt_settings(policy: AxisPolicy) -> Settings {
    let mut settings = lift_settings(0, 10000);
    settings.motion.axis_policy = policy;
    settings.tilt = Some(axis(90, 0, 10000));
    settings
}
