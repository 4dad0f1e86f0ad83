//! Monitor pool
//!
//! Two-level registry `root -> config key -> monitor`. A monitor is
//! created on the first acquire for its key and torn down when its last
//! watcher releases; a root entry disappears with its last monitor.
//!
//! One mutex covers the whole registry. Attach happens under it in
//! `acquire` and detach happens under it in `release`, so a monitor can
//! never be destroyed while another caller is attaching to it, and two
//! callers can never both create a monitor for the same key.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use lazy_dom::NodeId;

use crate::monitor::{SharedMonitor, WatchId};
use crate::primitive::PrimitiveFactory;
use crate::{ConfigKey, MonitorConfig, ObserveError, ReadinessGate, RootContext, lock};

type Monitors = HashMap<ConfigKey, Arc<SharedMonitor>>;

/// Registry occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Roots with at least one live monitor
    pub roots: usize,
    /// Live monitors
    pub monitors: usize,
    /// Attached watchers across all monitors
    pub watchers: usize,
}

struct PoolShared {
    gate: Arc<ReadinessGate>,
    factory: Arc<dyn PrimitiveFactory>,
    roots: Mutex<HashMap<RootContext, Monitors>>,
    next_watch: AtomicU64,
    next_monitor: AtomicU64,
}

impl PoolShared {
    fn release(&self, monitor: &Arc<SharedMonitor>, watch: WatchId) {
        {
            let mut roots = lock(&self.roots);
            let Some(remaining) = monitor.detach(watch) else {
                return;
            };
            if remaining > 0 {
                return;
            }

            let root = monitor.root();
            if let Some(monitors) = roots.get_mut(&root) {
                // Only remove the entry if it still is this monitor
                if monitors.get(monitor.key()).is_some_and(|m| Arc::ptr_eq(m, monitor)) {
                    monitors.remove(monitor.key());
                }
                if monitors.is_empty() {
                    roots.remove(&root);
                }
            }
        }

        if monitor.disconnect() {
            tracing::debug!("monitor {} ({} [{}]) destroyed", monitor.id(), monitor.root(), monitor.key());
        }
    }
}

/// Pool of shared visibility monitors
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct MonitorPool {
    shared: Arc<PoolShared>,
}

impl fmt::Debug for MonitorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorPool")
            .field("gate", &self.shared.gate)
            .field("stats", &self.stats())
            .finish()
    }
}

impl MonitorPool {
    /// Create an empty pool
    pub fn new(gate: Arc<ReadinessGate>, factory: Arc<dyn PrimitiveFactory>) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                gate,
                factory,
                roots: Mutex::new(HashMap::new()),
                next_watch: AtomicU64::new(1),
                next_monitor: AtomicU64::new(1),
            }),
        }
    }

    /// Readiness gate consulted before any monitor is created
    pub fn gate(&self) -> &Arc<ReadinessGate> {
        &self.shared.gate
    }

    /// Attach `target` to the shared monitor for `(root, config)`
    ///
    /// Fails with [`ObserveError::InvalidConfiguration`] on the first poll,
    /// before the gate is consulted, if `config` is malformed. Fails with
    /// [`ObserveError::PrimitiveUnavailable`] if the gate rejects.
    /// `on_visible` runs at most once, when the monitor reports `target`
    /// as visible; the handle stays attached until released or dropped.
    pub async fn acquire<F>(
        &self,
        root: RootContext,
        config: &MonitorConfig,
        target: NodeId,
        on_visible: F,
    ) -> Result<MonitorHandle, ObserveError>
    where
        F: FnOnce() + Send + 'static,
    {
        let key = config.key()?;
        let margin = config.validate()?;

        self.shared.gate.wait().await?;

        let watch = WatchId(self.shared.next_watch.fetch_add(1, Ordering::Relaxed));
        let monitor = {
            let mut roots = lock(&self.shared.roots);
            let monitors = roots.entry(root).or_default();
            let monitor = monitors
                .entry(key)
                .or_insert_with_key(|key| {
                    let id = self.shared.next_monitor.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("creating monitor {} for {} [{}]", id, root, key);
                    SharedMonitor::new(
                        id,
                        root,
                        config.clone(),
                        key.clone(),
                        margin,
                        self.shared.factory.as_ref(),
                    )
                })
                .clone();
            let count = monitor.attach(watch, target, Box::new(on_visible));
            tracing::trace!("target {} attached to monitor {} (refs: {})", target, monitor.id(), count);
            monitor
        };

        Ok(MonitorHandle {
            pool: Arc::downgrade(&self.shared),
            monitor,
            watch,
            target,
            released: false,
        })
    }

    /// Detach a handle; the last release destroys the monitor
    pub fn release(&self, handle: MonitorHandle) {
        handle.release();
    }

    /// Forget a root and disconnect all of its monitors
    ///
    /// Call when the root element leaves the document. Handles still held
    /// for those monitors become inert: releasing them is a no-op.
    /// Returns the number of monitors disconnected.
    pub fn retire_root(&self, root: RootContext) -> usize {
        let Some(monitors) = lock(&self.shared.roots).remove(&root) else {
            return 0;
        };
        let count = monitors.len();
        for monitor in monitors.into_values() {
            monitor.disconnect();
        }
        tracing::debug!("retired {}: {} monitor(s) disconnected", root, count);
        count
    }

    /// Live monitor for `(root, config)`, if any
    pub fn monitor(&self, root: RootContext, config: &MonitorConfig) -> Option<Arc<SharedMonitor>> {
        let key = config.key().ok()?;
        lock(&self.shared.roots).get(&root)?.get(&key).cloned()
    }

    /// Registry occupancy
    pub fn stats(&self) -> PoolStats {
        let roots = lock(&self.shared.roots);
        roots.values().fold(
            PoolStats { roots: roots.len(), ..Default::default() },
            |mut stats, monitors| {
                stats.monitors += monitors.len();
                stats.watchers += monitors.values().map(|m| m.ref_count()).sum::<usize>();
                stats
            },
        )
    }
}

/// A watcher's attachment to a shared monitor
///
/// Releases on drop.
#[must_use = "dropping a handle releases it immediately"]
pub struct MonitorHandle {
    pool: Weak<PoolShared>,
    monitor: Arc<SharedMonitor>,
    watch: WatchId,
    target: NodeId,
    released: bool,
}

impl fmt::Debug for MonitorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorHandle")
            .field("monitor", &self.monitor.id())
            .field("watch", &self.watch)
            .field("target", &self.target)
            .finish()
    }
}

impl MonitorHandle {
    pub fn monitor(&self) -> &Arc<SharedMonitor> {
        &self.monitor
    }

    pub fn watch_id(&self) -> WatchId {
        self.watch
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Detach from the monitor
    pub fn release(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        match self.pool.upgrade() {
            Some(pool) => pool.release(&self.monitor, self.watch),
            // Pool is gone; nothing left to deregister from
            None => {
                if self.monitor.detach(self.watch) == Some(0) {
                    self.monitor.disconnect();
                }
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
