//! Intersection Observer
//!
//! Geometry-driven visibility primitive. Observers compare each target's
//! layout rect against their root (the viewport or a root element), grown
//! by the root margin, and report when a target crosses the threshold.
//! Reports are produced by [`IntersectionHost::update`], which the frame
//! loop calls with a fresh [`LayoutSnapshot`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use lazy_dom::{DOMRect, NodeId};

use crate::primitive::{EntryCallback, PrimitiveFactory, VisibilityEntry, VisibilityPrimitive};
use crate::{RootContext, RootMargin, lock};

/// Element geometry for one frame
#[derive(Debug, Clone, Default)]
pub struct LayoutSnapshot {
    /// Document viewport, the bounds of [`RootContext::Document`]
    pub viewport: DOMRect,
    rects: HashMap<NodeId, DOMRect>,
}

impl LayoutSnapshot {
    pub fn new(viewport: DOMRect) -> Self {
        Self {
            viewport,
            rects: HashMap::new(),
        }
    }

    /// Record a node's border box
    pub fn set_rect(&mut self, node: NodeId, rect: DOMRect) {
        self.rects.insert(node, rect);
    }

    /// Builder form of [`set_rect`](Self::set_rect)
    pub fn with_rect(mut self, node: NodeId, rect: DOMRect) -> Self {
        self.set_rect(node, rect);
        self
    }

    pub fn rect(&self, node: NodeId) -> Option<DOMRect> {
        self.rects.get(&node).copied()
    }

    /// Same layout with every node shifted, as after scrolling by (dx, dy)
    pub fn scrolled(&self, dx: f32, dy: f32) -> Self {
        Self {
            viewport: self.viewport,
            rects: self
                .rects
                .iter()
                .map(|(&node, rect)| (node, rect.translate(-dx, -dy)))
                .collect(),
        }
    }
}

struct ObserverState {
    id: u64,
    root: RootContext,
    margin: RootMargin,
    threshold: f64,
    /// Last reported state per target (`None` until first report)
    targets: Mutex<HashMap<NodeId, Option<bool>>>,
    callback: EntryCallback,
    connected: AtomicBool,
}

impl ObserverState {
    /// Compute entries for targets whose state changed
    fn check(&self, layout: &LayoutSnapshot) -> Vec<VisibilityEntry> {
        let root = match self.root {
            RootContext::Document => layout.viewport,
            RootContext::Element(node) => match layout.rect(node) {
                Some(rect) => rect,
                // Root not laid out; nothing can intersect it
                None => return Vec::new(),
            },
        };
        let bounds = self.margin.apply(&root);

        let mut entries = Vec::new();
        let mut targets = lock(&self.targets);
        for (&target, last) in targets.iter_mut() {
            let Some(rect) = layout.rect(target) else {
                continue;
            };
            let intersection = rect.intersect(&bounds);
            let ratio = match intersection {
                Some(i) if rect.area() > 0.0 => f64::from(i.area() / rect.area()),
                Some(_) => 1.0,
                None => 0.0,
            };
            let is_intersecting = intersection.is_some() && ratio >= self.threshold;

            if *last != Some(is_intersecting) {
                *last = Some(is_intersecting);
                entries.push(VisibilityEntry {
                    target,
                    is_intersecting,
                    intersection_ratio: ratio,
                });
            }
        }
        entries
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Intersection observer
pub struct IntersectionObserver {
    state: Arc<ObserverState>,
}

impl fmt::Debug for IntersectionObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectionObserver")
            .field("id", &self.state.id)
            .field("root", &self.state.root)
            .field("margin", &self.state.margin)
            .field("threshold", &self.state.threshold)
            .finish()
    }
}

impl IntersectionObserver {
    pub fn id(&self) -> u64 {
        self.state.id
    }
}

impl VisibilityPrimitive for IntersectionObserver {
    fn observe(&mut self, target: NodeId) {
        lock(&self.state.targets).entry(target).or_insert(None);
    }

    fn unobserve(&mut self, target: NodeId) {
        lock(&self.state.targets).remove(&target);
    }

    fn disconnect(&mut self) {
        self.state.connected.store(false, Ordering::Release);
        lock(&self.state.targets).clear();
    }
}

/// Factory and frame driver for [`IntersectionObserver`]s
#[derive(Clone, Default)]
pub struct IntersectionHost {
    observers: Arc<Mutex<Vec<Weak<ObserverState>>>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for IntersectionHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntersectionHost")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl IntersectionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connected observers
    pub fn observer_count(&self) -> usize {
        lock(&self.observers)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|o| o.is_connected())
            .count()
    }

    /// Check every connected observer against `layout` and deliver reports
    ///
    /// Callbacks run after the host lock is released. Returns the number of
    /// entries delivered.
    pub fn update(&self, layout: &LayoutSnapshot) -> usize {
        let live: Vec<Arc<ObserverState>> = {
            let mut observers = lock(&self.observers);
            observers.retain(|w| w.upgrade().is_some_and(|o| o.is_connected()));
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        let mut delivered = 0;
        for observer in live {
            let entries = observer.check(layout);
            // Disconnected while checking: drop the stale batch
            if entries.is_empty() || !observer.is_connected() {
                continue;
            }
            tracing::trace!("observer {}: {} entries", observer.id, entries.len());
            delivered += entries.len();
            (observer.callback)(&entries);
        }
        delivered
    }
}

impl PrimitiveFactory for IntersectionHost {
    fn create(
        &self,
        root: RootContext,
        margin: RootMargin,
        threshold: f64,
        callback: EntryCallback,
    ) -> Box<dyn VisibilityPrimitive> {
        let state = Arc::new(ObserverState {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            root,
            margin,
            threshold,
            targets: Mutex::new(HashMap::new()),
            callback,
            connected: AtomicBool::new(true),
        });
        lock(&self.observers).push(Arc::downgrade(&state));
        Box::new(IntersectionObserver { state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Arc<Mutex<Vec<VisibilityEntry>>>, EntryCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: EntryCallback = Arc::new(move |entries: &[VisibilityEntry]| {
            sink.lock().unwrap().extend_from_slice(entries);
        });
        (seen, callback)
    }

    fn viewport() -> DOMRect {
        DOMRect::new(0.0, 0.0, 800.0, 600.0)
    }

    #[test]
    fn test_intersection_observer() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let mut observer = host.create(RootContext::Document, RootMargin::default(), 0.0, callback);
        let node = NodeId::from_raw(1);
        observer.observe(node);

        let layout = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(100.0, 100.0, 200.0, 200.0));
        assert_eq!(host.update(&layout), 1);

        let entries = seen.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_intersecting);
        assert_eq!(entries[0].intersection_ratio, 1.0);
    }

    #[test]
    fn test_reports_only_changes() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let mut observer = host.create(RootContext::Document, RootMargin::default(), 0.0, callback);
        let node = NodeId::from_raw(1);
        observer.observe(node);

        let below = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(0.0, 1000.0, 100.0, 100.0));
        assert_eq!(host.update(&below), 1);
        assert_eq!(host.update(&below), 0);

        let scrolled = below.scrolled(0.0, 500.0);
        assert_eq!(host.update(&scrolled), 1);

        let entries = seen.lock().unwrap();
        assert!(!entries[0].is_intersecting);
        assert!(entries[1].is_intersecting);
    }

    #[test]
    fn test_root_margin_extends_root() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let margin = RootMargin::parse("0px 0px 200px 0px").unwrap();
        let mut observer = host.create(RootContext::Document, margin, 0.0, callback);
        let node = NodeId::from_raw(1);
        observer.observe(node);

        // 100px below the fold, inside the 200px bottom margin
        let layout = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(0.0, 700.0, 100.0, 50.0));
        host.update(&layout);
        assert!(seen.lock().unwrap()[0].is_intersecting);
    }

    #[test]
    fn test_threshold() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let mut observer = host.create(RootContext::Document, RootMargin::default(), 0.5, callback);
        let node = NodeId::from_raw(1);
        observer.observe(node);

        // A quarter of the target is visible
        let layout = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(0.0, 550.0, 100.0, 200.0));
        host.update(&layout);
        {
            let entries = seen.lock().unwrap();
            assert!(!entries[0].is_intersecting);
            assert!((entries[0].intersection_ratio - 0.25).abs() < 1e-6);
        }

        host.update(&layout.scrolled(0.0, 100.0));
        assert!(seen.lock().unwrap()[1].is_intersecting);
    }

    #[test]
    fn test_element_root() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let scroller = NodeId::from_raw(1);
        let node = NodeId::from_raw(2);
        let mut observer = host.create(RootContext::Element(scroller), RootMargin::default(), 0.0, callback);
        observer.observe(node);

        // Inside the viewport but outside the scroller
        let layout = LayoutSnapshot::new(viewport())
            .with_rect(scroller, DOMRect::new(0.0, 0.0, 300.0, 300.0))
            .with_rect(node, DOMRect::new(400.0, 0.0, 100.0, 100.0));
        host.update(&layout);
        assert!(!seen.lock().unwrap()[0].is_intersecting);

        // Root missing from layout: no report
        let without_root = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(host.update(&without_root), 0);
    }

    #[test]
    fn test_disconnect_and_drop() {
        let host = IntersectionHost::new();
        let (_, callback) = recording();
        let mut a = host.create(RootContext::Document, RootMargin::default(), 0.0, callback.clone());
        let b = host.create(RootContext::Document, RootMargin::default(), 0.0, callback);
        assert_eq!(host.observer_count(), 2);

        a.disconnect();
        assert_eq!(host.observer_count(), 1);
        drop(b);
        assert_eq!(host.observer_count(), 0);
    }

    #[test]
    fn test_unobserve() {
        let host = IntersectionHost::new();
        let (seen, callback) = recording();
        let mut observer = host.create(RootContext::Document, RootMargin::default(), 0.0, callback);
        let node = NodeId::from_raw(1);
        observer.observe(node);
        observer.unobserve(node);

        let layout = LayoutSnapshot::new(viewport()).with_rect(node, DOMRect::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(host.update(&layout), 0);
        assert!(seen.lock().unwrap().is_empty());
    }
}
