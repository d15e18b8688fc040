use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::animation::{PositionInterpolator, RenderedVehicle, now};

/// Renders the shared interpolator on a fixed frame clock.
///
/// Frames are published on a `watch` channel and only when they differ from
/// the last one, so an idle map costs nothing downstream. The frame task is
/// aborted when the driver is dropped.
pub struct AnimationDriver {
    task: JoinHandle<()>,
    frames: watch::Receiver<Vec<RenderedVehicle>>,
}

impl AnimationDriver {
    pub fn spawn(interpolator: Arc<Mutex<PositionInterpolator>>, frame_interval: Duration) -> Self {
        let (tx, frames) = watch::channel(Vec::new());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let frame = interpolator
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .frame(now());

                let changed = tx.send_if_modified(|current| {
                    if *current == frame {
                        return false;
                    }
                    *current = frame;
                    true
                });
                if changed {
                    trace!("published animation frame");
                }
            }
        });

        Self { task, frames }
    }

    /// A receiver that observes every published frame.
    pub fn frames(&self) -> watch::Receiver<Vec<RenderedVehicle>> {
        self.frames.clone()
    }

    /// The most recently published frame.
    pub fn latest(&self) -> Vec<RenderedVehicle> {
        self.frames.borrow().clone()
    }
}

impl Drop for AnimationDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
