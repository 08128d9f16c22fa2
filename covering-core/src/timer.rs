use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::Axis;
use crate::worker::Event;

/// Single-shot timer owned by one motion axis.
pub trait TickTimer: Send {
    /// Arms the timer, replacing any pending expiry.
    fn arm(&mut self, after: Duration);

    fn cancel(&mut self);

    fn is_armed(&self) -> bool;
}

/// Timer whose expiry posts `Event::Tick` back onto the worker queue.
///
/// Holds only a weak sender, so a pending timer never keeps the queue open
/// once every handle is gone.
pub struct QueueTimer {
    axis: Axis,
    queue: mpsc::WeakSender<Event>,
    pending: Option<JoinHandle<()>>,
}

impl QueueTimer {
    pub fn new(axis: Axis, queue: mpsc::WeakSender<Event>) -> Self {
        Self {
            axis,
            queue,
            pending: None,
        }
    }
}

impl TickTimer for QueueTimer {
    fn arm(&mut self, after: Duration) {
        self.cancel();

        let axis = self.axis;
        let queue = self.queue.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;

            let Some(queue) = queue.upgrade() else {
                tracing::debug!(%axis, "Tick dropped, work queue is gone");
                return;
            };
            if queue.send(Event::Tick(axis)).await.is_err() {
                tracing::debug!(%axis, "Tick dropped, work queue is closed");
            }
        }));
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for QueueTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_posts_tick() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = QueueTimer::new(Axis::Tilt, tx.downgrade());

        timer.arm(Duration::from_millis(100));
        assert!(timer.is_armed());

        assert!(matches!(rx.recv().await, Some(Event::Tick(Axis::Tilt))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_tick() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = QueueTimer::new(Axis::Lift, tx.downgrade());

        timer.arm(Duration::from_millis(100));
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_pending_expiry() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut timer = QueueTimer::new(Axis::Lift, tx.downgrade());

        timer.arm(Duration::from_millis(100));
        timer.arm(Duration::from_millis(300));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(matches!(rx.try_recv(), Ok(Event::Tick(Axis::Lift))));
        assert!(rx.try_recv().is_err());
    }
}
