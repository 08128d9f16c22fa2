use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actuator::ActuatorOutput;
use crate::control::{MotionAxis, Snapshot, WindowCovering};
use crate::error::{Error, Result};
use crate::models::{Axis, Direction, Percent100ths};
use crate::settings::Settings;
use crate::store::AttributeStore;
use crate::timer::QueueTimer;

/// Commands accepted from the UI and protocol layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectAxis(Axis),
    SingleStep(Direction),
    ContinuousMove(Direction),
    Stop,
    GoToPosition { axis: Axis, position: Percent100ths },
}

/// Everything the worker consumes. Producers never touch controller state.
#[derive(Debug)]
pub enum Event {
    Command(Command),
    Tick(Axis),
    Snapshot(oneshot::Sender<Snapshot>),
}

/// Cloneable producer side of the work queue.
#[derive(Debug, Clone)]
pub struct CoveringHandle {
    queue: mpsc::Sender<Event>,
}

impl CoveringHandle {
    /// Posts without waiting. A full or closed queue abandons the command.
    pub fn post(&self, command: Command) -> Result<()> {
        self.queue
            .try_send(Event::Command(command))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::warn!(?command, "Failed to post command, work queue is full");
                    Error::QueueFull
                }
                mpsc::error::TrySendError::Closed(_) => Error::QueueClosed,
            })
    }

    /// Posts, waiting for queue capacity.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.queue
            .send(Event::Command(command))
            .await
            .map_err(|_| Error::QueueClosed)
    }

    /// Reads positions and status on the worker, ordered after earlier commands.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, response) = oneshot::channel();
        self.queue
            .send(Event::Snapshot(reply))
            .await
            .map_err(|_| Error::QueueClosed)?;
        response.await.map_err(|_| Error::QueueClosed)
    }
}

/// The bounded queue before its consumer starts.
pub struct WorkQueue {
    sender: mpsc::Sender<Event>,
    receiver: mpsc::Receiver<Event>,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self { sender, receiver }
    }

    pub fn handle(&self) -> CoveringHandle {
        CoveringHandle {
            queue: self.sender.clone(),
        }
    }

    pub fn timer(&self, axis: Axis) -> QueueTimer {
        QueueTimer::new(axis, self.sender.downgrade())
    }

    /// Hands the receiving side to a worker. The queue stays open while any
    /// `CoveringHandle` is alive.
    pub fn into_worker<S: AttributeStore>(self, covering: WindowCovering<S>) -> Worker<S> {
        Worker {
            covering,
            events: self.receiver,
        }
    }
}

/// Single consumer of the work queue; owns the controller and its store.
pub struct Worker<S> {
    covering: WindowCovering<S>,
    events: mpsc::Receiver<Event>,
}

impl<S: AttributeStore> Worker<S> {
    /// Runs until every handle is dropped, then returns the controller.
    pub async fn run(mut self) -> WindowCovering<S> {
        tracing::info!("Window covering worker started");

        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }

        self.covering.request_stop();
        tracing::info!("Window covering worker stopped");
        self.covering
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Command(command) => self.covering.dispatch(command),
            Event::Tick(axis) => {
                self.covering.on_tick(axis);
            }
            Event::Snapshot(reply) => {
                let _ = reply.send(self.covering.snapshot());
            }
        }
    }
}

/// Builds the controller described by `settings` and spawns its worker.
///
/// `tilt_output` must be present exactly when the settings configure a tilt axis.
pub fn spawn<S>(
    settings: &Settings,
    store: S,
    lift_output: Box<dyn ActuatorOutput>,
    tilt_output: Option<Box<dyn ActuatorOutput>>,
) -> Result<(CoveringHandle, JoinHandle<WindowCovering<S>>)>
where
    S: AttributeStore + 'static,
{
    settings.validate()?;

    let queue = WorkQueue::new(settings.motion.queue_capacity);
    let config = settings.motion_config();

    let lift = MotionAxis::new(
        Axis::Lift,
        config,
        Box::new(queue.timer(Axis::Lift)),
        lift_output,
    );
    let tilt = match (&settings.tilt, tilt_output) {
        (Some(_), Some(output)) => Some(MotionAxis::new(
            Axis::Tilt,
            config,
            Box::new(queue.timer(Axis::Tilt)),
            output,
        )),
        (None, None) => None,
        (Some(_), None) => {
            return Err(Error::InvalidConfiguration(
                "tilt axis configured without an actuator output".into(),
            ));
        }
        (None, Some(_)) => {
            return Err(Error::InvalidConfiguration(
                "tilt actuator output given but no tilt axis configured".into(),
            ));
        }
    };

    let mut covering = WindowCovering::new(store, lift, tilt, settings.motion.axis_policy);
    for axis in Axis::ALL {
        if covering.motion(axis).is_some() {
            if let Err(e) = covering.update_actuator(axis) {
                tracing::debug!(%axis, error = %e, "Initial actuator level not applied");
            }
        }
    }

    let handle = queue.handle();
    let worker = queue.into_worker(covering);

    Ok((handle, tokio::spawn(worker.run())))
}

#[cfg(test)]
mod tests {
    use crate::mock::RecordingOutput;
    use crate::store::MemoryAttributeStore;

    use super::*;

    fn output() -> Box<dyn ActuatorOutput> {
        Box::new(RecordingOutput::new(0, 255))
    }

    #[test]
    fn test_post_on_full_queue_is_abandoned() {
        let queue = WorkQueue::new(1);
        let handle = queue.handle();

        assert!(handle.post(Command::Stop).is_ok());
        assert!(matches!(
            handle.post(Command::SingleStep(Direction::UpOrOpen)),
            Err(Error::QueueFull)
        ));
    }

    #[test]
    fn test_post_after_worker_gone() {
        let queue = WorkQueue::new(4);
        let handle = queue.handle();
        drop(queue);

        assert!(matches!(handle.post(Command::Stop), Err(Error::QueueClosed)));
    }

    #[tokio::test]
    async fn test_spawn_requires_tilt_output_to_match_settings() {
        let settings = Settings::default();
        let store = MemoryAttributeStore::from_settings(&settings).unwrap();

        let result = spawn(&settings, store, output(), None);
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));

        let mut settings = Settings::default();
        settings.tilt = None;
        let store = MemoryAttributeStore::from_settings(&settings).unwrap();

        let result = spawn(&settings, store, output(), Some(output()));
        assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_worker_returns_covering_when_handles_drop() {
        let settings = Settings::default();
        let store = MemoryAttributeStore::from_settings(&settings).unwrap();
        let (handle, worker) = spawn(&settings, store, output(), Some(output())).unwrap();

        handle.send(Command::SelectAxis(Axis::Tilt)).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.active_axis, Axis::Tilt);

        drop(handle);
        let covering = worker.await.unwrap();
        assert_eq!(covering.active_axis(), Axis::Tilt);
    }
}
