//! Shared wake-event (GPE) dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Event controller │ fires (domain, number)
//! └────────┬─────────┘
//!          │ handle()            dispatch context: no blocking, no alloc
//!          ▼
//! ┌──────────────────┐  snapshot  ┌───────────────┐
//! │ WakeEventHandler │ ─────────> │ EventRegistry │ one entry per device
//! └────────┬─────────┘            └───────────────┘
//!          │ schedule(task)
//!          ▼
//! ┌──────────────────┐
//! │ WorkScheduler    │ e.g. WorkQueue, drained by a worker
//! └────────┬─────────┘
//!          │ run()
//!          ▼
//! ┌──────────────────┐
//! │ WakeTask         │ PME status, runtime resume, wakeup event,
//! └──────────────────┘ propagation below bridges
//! ```
//!
//! Several devices can share one event key. The key's handler is installed
//! with the first registry entry and removed with the last one; the bind
//! controller makes that decision under its registration lock.

mod handler;
mod queue;
mod registry;
mod task;

pub use handler::{InterruptStatus, WakeEventHandler};
pub use queue::{WORK_QUEUE_CAPACITY, WorkQueue};
pub use registry::{EventRegistry, RegistrySnapshot, WakeEntry};
pub use task::WakeTask;

#[cfg(test)]
pub(crate) mod testing;
