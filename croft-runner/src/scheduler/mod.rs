//! Scheduler layer for the runner
//!
//! This layer claims pending jobs from the shared store on a fixed interval,
//! dispatches them by type, and writes their terminal state.

pub mod dispatch;
pub mod poller;

pub use dispatch::{Dispatcher, Handled};
pub use poller::JobPoller;
