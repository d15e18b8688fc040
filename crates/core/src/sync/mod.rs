//! Live data synchronization.
//!
//! A [`LiveSession`] runs independent cycles against the service: a one-shot
//! stops fetch per system, a vehicle poll, an optional route shape fetch and
//! a trip cycle that plans and then refreshes while the trip tracks a live
//! vehicle. Each cycle can be stopped at any time; its late responses are
//! discarded.

mod cycle;
mod events;
mod freshness;
mod session;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::CycleKind;
pub use events::{LiveEvent, RefreshStop};
pub use freshness::relative_label;
pub use session::LiveSession;
