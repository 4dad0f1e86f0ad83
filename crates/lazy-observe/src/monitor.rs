//! Shared monitor
//!
//! One primitive instance shared by every watcher with the same root and
//! config. The watcher count is the monitor's reference count.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use lazy_dom::NodeId;

use crate::primitive::{EntryCallback, PrimitiveFactory, VisibilityEntry, VisibilityPrimitive};
use crate::{ConfigKey, MonitorConfig, RootContext, RootMargin, lock};

/// "Became visible" notification; fires at most once per attachment
pub type VisibleCallback = Box<dyn FnOnce() + Send>;

/// Identifier of one attachment to a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub(crate) u64);

struct Watch {
    target: NodeId,
    on_visible: Option<VisibleCallback>,
}

/// Pooled wrapper around one configured primitive
pub struct SharedMonitor {
    id: u64,
    root: RootContext,
    config: MonitorConfig,
    key: ConfigKey,
    /// `None` once disconnected
    primitive: Mutex<Option<Box<dyn VisibilityPrimitive>>>,
    watches: Mutex<HashMap<WatchId, Watch>>,
}

impl fmt::Debug for SharedMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMonitor")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("key", &self.key)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

impl SharedMonitor {
    pub(crate) fn new(
        id: u64,
        root: RootContext,
        config: MonitorConfig,
        key: ConfigKey,
        margin: RootMargin,
        factory: &dyn PrimitiveFactory,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<SharedMonitor>| {
            let weak = weak.clone();
            let callback: EntryCallback = Arc::new(move |entries: &[VisibilityEntry]| {
                if let Some(monitor) = weak.upgrade() {
                    monitor.dispatch(entries);
                }
            });
            let primitive = factory.create(root, margin, config.threshold, callback);
            Self {
                id,
                root,
                config,
                key,
                primitive: Mutex::new(Some(primitive)),
                watches: Mutex::new(HashMap::new()),
            }
        })
    }

    /// Pool-unique id of this monitor
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn root(&self) -> RootContext {
        self.root
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// Number of attached watchers
    pub fn ref_count(&self) -> usize {
        lock(&self.watches).len()
    }

    /// False once the primitive has been disconnected
    pub fn is_connected(&self) -> bool {
        lock(&self.primitive).is_some()
    }

    /// Targets currently attached, sorted
    pub fn targets(&self) -> Vec<NodeId> {
        let mut targets: Vec<_> = lock(&self.watches).values().map(|w| w.target).collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// Register a watcher; returns the new reference count
    pub(crate) fn attach(&self, watch: WatchId, target: NodeId, on_visible: VisibleCallback) -> usize {
        let (count, first_for_target) = {
            let mut watches = lock(&self.watches);
            let first = !watches.values().any(|w| w.target == target);
            watches.insert(watch, Watch { target, on_visible: Some(on_visible) });
            (watches.len(), first)
        };
        if first_for_target {
            if let Some(primitive) = lock(&self.primitive).as_mut() {
                primitive.observe(target);
            }
        }
        count
    }

    /// Remove a watcher; returns the remaining count, or `None` if the
    /// watcher was not attached (already released or monitor torn down)
    pub(crate) fn detach(&self, watch: WatchId) -> Option<usize> {
        let (remaining, orphaned) = {
            let mut watches = lock(&self.watches);
            let removed = watches.remove(&watch)?;
            let orphaned = !watches.values().any(|w| w.target == removed.target);
            (watches.len(), orphaned.then_some(removed.target))
        };
        if let Some(target) = orphaned {
            if let Some(primitive) = lock(&self.primitive).as_mut() {
                primitive.unobserve(target);
            }
        }
        Some(remaining)
    }

    /// Disconnect the primitive and drop every watcher
    ///
    /// Returns false if already disconnected.
    pub(crate) fn disconnect(&self) -> bool {
        let primitive = lock(&self.primitive).take();
        lock(&self.watches).clear();
        match primitive {
            Some(mut primitive) => {
                primitive.disconnect();
                true
            }
            None => false,
        }
    }

    /// Fan a report batch out to the watchers of satisfied targets
    ///
    /// Each attachment fires at most once. Callbacks run after the watcher
    /// lock is dropped so they may release their handle. Returns the number
    /// of callbacks fired.
    pub(crate) fn dispatch(&self, entries: &[VisibilityEntry]) -> usize {
        let mut fired = Vec::new();
        {
            let mut watches = lock(&self.watches);
            for entry in entries.iter().filter(|e| e.is_intersecting) {
                for watch in watches.values_mut().filter(|w| w.target == entry.target) {
                    if let Some(on_visible) = watch.on_visible.take() {
                        fired.push(on_visible);
                    }
                }
            }
        }

        let count = fired.len();
        if count > 0 {
            tracing::debug!("monitor {} ({}): {} watcher(s) became visible", self.id, self.key, count);
        }
        for on_visible in fired {
            on_visible();
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counts {
        observed: AtomicUsize,
        unobserved: AtomicUsize,
        disconnected: AtomicUsize,
    }

    struct CountingPrimitive(Arc<Counts>);

    impl VisibilityPrimitive for CountingPrimitive {
        fn observe(&mut self, _target: NodeId) {
            self.0.observed.fetch_add(1, Ordering::SeqCst);
        }
        fn unobserve(&mut self, _target: NodeId) {
            self.0.unobserved.fetch_add(1, Ordering::SeqCst);
        }
        fn disconnect(&mut self) {
            self.0.disconnected.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingFactory(Arc<Counts>);

    impl PrimitiveFactory for CountingFactory {
        fn create(&self, _: RootContext, _: RootMargin, _: f64, _: EntryCallback) -> Box<dyn VisibilityPrimitive> {
            Box::new(CountingPrimitive(self.0.clone()))
        }
    }

    fn monitor() -> (Arc<SharedMonitor>, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let config = MonitorConfig::default();
        let key = config.key().unwrap();
        let monitor = SharedMonitor::new(
            1,
            RootContext::Document,
            config,
            key,
            RootMargin::default(),
            &CountingFactory(counts.clone()),
        );
        (monitor, counts)
    }

    fn entry(target: NodeId, is_intersecting: bool) -> VisibilityEntry {
        VisibilityEntry { target, is_intersecting, intersection_ratio: if is_intersecting { 1.0 } else { 0.0 } }
    }

    fn counter() -> (Arc<AtomicUsize>, VisibleCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, Box::new(move || {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_attach_detach_counts() {
        let (monitor, counts) = monitor();
        let node = NodeId::from_raw(3);
        assert_eq!(monitor.attach(WatchId(1), node, Box::new(|| {})), 1);
        assert_eq!(monitor.attach(WatchId(2), node, Box::new(|| {})), 2);
        // Same target observed once
        assert_eq!(counts.observed.load(Ordering::SeqCst), 1);

        assert_eq!(monitor.detach(WatchId(1)), Some(1));
        assert_eq!(counts.unobserved.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.detach(WatchId(2)), Some(0));
        assert_eq!(counts.unobserved.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.detach(WatchId(2)), None);
    }

    #[test]
    fn test_dispatch_fires_once() {
        let (monitor, _) = monitor();
        let node = NodeId::from_raw(3);
        let (hits, cb) = counter();
        monitor.attach(WatchId(1), node, cb);

        assert_eq!(monitor.dispatch(&[entry(node, true)]), 1);
        assert_eq!(monitor.dispatch(&[entry(node, true)]), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        // Still attached until released
        assert_eq!(monitor.ref_count(), 1);
    }

    #[test]
    fn test_dispatch_only_satisfied_targets() {
        let (monitor, _) = monitor();
        let a = NodeId::from_raw(3);
        let b = NodeId::from_raw(4);
        let (hits_a, cb_a) = counter();
        let (hits_b, cb_b) = counter();
        monitor.attach(WatchId(1), a, cb_a);
        monitor.attach(WatchId(2), b, cb_b);

        monitor.dispatch(&[entry(a, true), entry(b, false)]);
        assert_eq!(hits_a.load(Ordering::SeqCst), 1);
        assert_eq!(hits_b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_once() {
        let (monitor, counts) = monitor();
        monitor.attach(WatchId(1), NodeId::from_raw(3), Box::new(|| {}));
        assert!(monitor.disconnect());
        assert!(!monitor.disconnect());
        assert_eq!(counts.disconnected.load(Ordering::SeqCst), 1);
        assert_eq!(monitor.ref_count(), 0);
        assert!(!monitor.is_connected());
    }
}
