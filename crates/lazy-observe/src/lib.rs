//! Lazy Observe - pooled visibility monitors
//!
//! Many lazy elements watch for visibility against a handful of distinct
//! (root, margin, threshold) combinations. Creating a visibility primitive
//! per element is wasteful, so monitors are pooled:
//!
//! - [`ReadinessGate`] - one-time async signal that the primitive can be used
//! - [`MonitorPool`] - `root -> config key -> monitor` registry with
//!   reference counting and teardown at zero
//! - [`SharedMonitor`] - one primitive instance fanned out to its watchers
//! - [`IntersectionHost`] - geometry-driven primitive fed by layout snapshots
//!
//! # Example
//! ```rust,ignore
//! let host = IntersectionHost::new();
//! let pool = MonitorPool::new(Arc::new(ReadinessGate::ready()), Arc::new(host.clone()));
//! let handle = pool
//!     .acquire(RootContext::Document, &MonitorConfig::default(), node, || println!("visible"))
//!     .await?;
//! host.update(&layout);
//! ```

mod config;
mod gate;
pub mod intersection;
mod monitor;
mod pool;
mod primitive;

pub use config::{ConfigKey, MarginLength, MonitorConfig, RootContext, RootMargin};
pub use gate::{GateOpener, ReadinessGate};
pub use intersection::{IntersectionHost, IntersectionObserver, LayoutSnapshot};
pub use monitor::{SharedMonitor, VisibleCallback, WatchId};
pub use pool::{MonitorHandle, MonitorPool, PoolStats};
pub use primitive::{EntryCallback, PrimitiveFactory, VisibilityEntry, VisibilityPrimitive};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Observation error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObserveError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Visibility primitive unavailable: {0}")]
    PrimitiveUnavailable(String),
}

/// Lock a mutex, recovering the data if a holder panicked.
///
/// Registry state stays consistent across a panicking callback because
/// callbacks never run while a lock is held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
