use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::debug;

/// The background work a session runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum CycleKind {
    Stops,
    Vehicles,
    RoutePaths,
    Trip,
}

/// Set when a cycle is superseded; results observed after that are dropped.
///
/// Only ever set and checked while holding the session state lock, so a
/// result is either applied before the stop or not at all.
#[derive(Clone, Debug, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A running cycle. Dropping it cancels the flag and aborts the task.
pub(crate) struct Cycle {
    kind: CycleKind,
    flag: CancelFlag,
    task: JoinHandle<()>,
}

impl Cycle {
    pub fn spawn<F, Fut>(kind: CycleKind, run: F) -> Self
    where
        F: FnOnce(CancelFlag) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let flag = CancelFlag::default();
        let task = tokio::spawn(run(flag.clone()));
        debug!("started {kind} cycle");

        Self { kind, flag, task }
    }

    pub fn kind(&self) -> CycleKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Cycle {
    fn drop(&mut self) {
        self.flag.cancel();
        self.task.abort();
        debug!("stopped {} cycle", self.kind);
    }
}

/// Every cycle a session may have running, at most one of each kind.
#[derive(Default)]
pub(crate) struct Cycles {
    pub stops: Option<Cycle>,
    pub vehicles: Option<Cycle>,
    pub route_paths: Option<Cycle>,
    pub trip: Option<Cycle>,
}

impl Cycles {
    pub fn running(&self) -> Vec<CycleKind> {
        [&self.stops, &self.vehicles, &self.route_paths, &self.trip]
            .into_iter()
            .flatten()
            .filter(|cycle| !cycle.is_finished())
            .map(Cycle::kind)
            .collect()
    }
}
