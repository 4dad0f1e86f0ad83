//! Visibility primitive contract
//!
//! The pool never computes visibility itself. It asks a [`PrimitiveFactory`]
//! for one primitive per (root, margin, threshold) and receives batches of
//! [`VisibilityEntry`] through the callback handed over at construction.

use std::sync::Arc;

use lazy_dom::NodeId;

use crate::{RootContext, RootMargin};

/// One target's state in a report batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityEntry {
    pub target: NodeId,
    /// Whether the target meets the primitive's threshold
    pub is_intersecting: bool,
    pub intersection_ratio: f64,
}

/// Report sink; may be invoked from any thread, at any time after creation
pub type EntryCallback = Arc<dyn Fn(&[VisibilityEntry]) + Send + Sync>;

/// A configured visibility-detection instance
pub trait VisibilityPrimitive: Send {
    /// Start reporting on a target
    fn observe(&mut self, target: NodeId);

    /// Stop reporting on a target
    fn unobserve(&mut self, target: NodeId);

    /// Stop all reporting; the instance is not reused afterwards
    fn disconnect(&mut self);
}

/// Constructor for primitives
///
/// Implementations must not invoke `callback` synchronously from `create`,
/// `observe` or `unobserve`: those run under the pool lock.
pub trait PrimitiveFactory: Send + Sync {
    fn create(
        &self,
        root: RootContext,
        margin: RootMargin,
        threshold: f64,
        callback: EntryCallback,
    ) -> Box<dyn VisibilityPrimitive>;
}
