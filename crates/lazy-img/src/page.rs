//! Page context
//!
//! Everything a lazy element needs from its document: the tree (for the
//! root ancestor lookup), the base URL, the monitor pool, the frame
//! scheduler, the image loader and an executor for background work.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use lazy_dom::{DomTree, NodeId};
use lazy_observe::{MonitorConfig, MonitorPool, RootContext};
use smol::Executor;
use url::Url;

use crate::{FrameScheduler, ImageLoader};

/// Shared per-document services
pub struct PageContext {
    base_url: Url,
    tree: Arc<DomTree>,
    pool: MonitorPool,
    frames: FrameScheduler,
    loader: Arc<dyn ImageLoader>,
    executor: Arc<Executor<'static>>,
    defaults: MonitorConfig,
}

impl fmt::Debug for PageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContext")
            .field("base_url", &self.base_url.as_str())
            .field("pool", &self.pool)
            .field("frames", &self.frames)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl PageContext {
    pub fn new(
        base_url: Url,
        tree: Arc<DomTree>,
        pool: MonitorPool,
        loader: Arc<dyn ImageLoader>,
        executor: Arc<Executor<'static>>,
    ) -> Self {
        Self {
            base_url,
            tree,
            pool,
            frames: FrameScheduler::new(),
            loader,
            executor,
            defaults: MonitorConfig::default(),
        }
    }

    /// Margin and threshold given to new elements
    pub fn with_defaults(mut self, defaults: MonitorConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn pool(&self) -> &MonitorPool {
        &self.pool
    }

    pub fn frames(&self) -> &FrameScheduler {
        &self.frames
    }

    pub fn loader(&self) -> &dyn ImageLoader {
        self.loader.as_ref()
    }

    pub fn defaults(&self) -> &MonitorConfig {
        &self.defaults
    }

    /// Root for an element: the closest inclusive ancestor matching
    /// `observe`, or the document when unset or unmatched
    pub fn root_for(&self, node: NodeId, observe: Option<&str>) -> RootContext {
        observe
            .filter(|selector| !selector.trim().is_empty())
            .and_then(|selector| self.tree.closest(node, selector))
            .map(RootContext::Element)
            .unwrap_or(RootContext::Document)
    }

    pub(crate) fn spawn(&self, future: impl Future<Output = ()> + Send + 'static) {
        self.executor.spawn(future).detach();
    }
}
