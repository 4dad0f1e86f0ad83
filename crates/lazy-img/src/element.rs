//! `<lazy-img>` element
//!
//! Per-element state machine:
//!
//! ```text
//!   Idle --src set--> Observing --visible--> Loaded
//!     ^                   |                    |
//!     +---- detached -----+-------<------------+
//! ```
//!
//! Entering `Observing` blanks the image, drops any held monitor and waits
//! one frame before acquiring a monitor, so that an element which is
//! still being positioned does not report itself visible immediately.
//! Every restart bumps a generation counter; work and notifications from
//! an older generation are discarded.

use std::fmt;
use std::sync::{Arc, Mutex};

use lazy_dom::NodeId;
use lazy_observe::{MonitorConfig, MonitorHandle};

use crate::{PageContext, lock, resolve_src};

/// 1x1 transparent GIF shown until the real image loads
pub const BLANK_SRC: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Observing,
    Loaded,
}

/// Element attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    /// Image source, relative to the document base
    pub src: String,
    pub alt: String,
    /// Selector of the ancestor to observe against
    pub observe: Option<String>,
    /// Root margin, px or %
    pub margin: String,
    /// Fraction of the image that must be visible (0.0 to 1.0)
    pub threshold: f64,
}

impl Attributes {
    fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(self.margin.clone(), self.threshold)
    }
}

/// What the inner `<img>` currently renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImgView {
    pub src: String,
    pub alt: String,
    /// Set once the real image finished loading (`loaded` class)
    pub loaded: bool,
}

struct ElementState {
    attrs: Attributes,
    state: LoadState,
    generation: u64,
    handle: Option<MonitorHandle>,
    view: ImgView,
}

struct Inner {
    node: NodeId,
    page: Arc<PageContext>,
    state: Mutex<ElementState>,
}

/// Lazy loading image element
///
/// Clones refer to the same element.
#[derive(Clone)]
pub struct LazyImg {
    inner: Arc<Inner>,
}

impl fmt::Debug for LazyImg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = lock(&self.inner.state);
        f.debug_struct("LazyImg")
            .field("node", &self.inner.node)
            .field("state", &st.state)
            .field("src", &st.attrs.src)
            .finish()
    }
}

impl LazyImg {
    /// Create an element for `node`, taking margin and threshold from the
    /// page defaults
    pub fn new(page: Arc<PageContext>, node: NodeId) -> Self {
        let defaults = page.defaults().clone();
        Self {
            inner: Arc::new(Inner {
                node,
                page,
                state: Mutex::new(ElementState {
                    attrs: Attributes {
                        src: String::new(),
                        alt: String::new(),
                        observe: None,
                        margin: defaults.margin,
                        threshold: defaults.threshold,
                    },
                    state: LoadState::Idle,
                    generation: 0,
                    handle: None,
                    view: ImgView::default(),
                }),
            }),
        }
    }

    pub fn node(&self) -> NodeId {
        self.inner.node
    }

    pub fn state(&self) -> LoadState {
        lock(&self.inner.state).state
    }

    pub fn view(&self) -> ImgView {
        lock(&self.inner.state).view.clone()
    }

    pub fn attributes(&self) -> Attributes {
        lock(&self.inner.state).attrs.clone()
    }

    /// Whether the element currently holds a monitor
    pub fn is_attached(&self) -> bool {
        lock(&self.inner.state).handle.is_some()
    }

    pub fn set_src(&self, src: &str) {
        lock(&self.inner.state).attrs.src = src.to_string();
        self.attribute_changed("src");
    }

    pub fn set_alt(&self, alt: &str) {
        lock(&self.inner.state).attrs.alt = alt.to_string();
        self.attribute_changed("alt");
    }

    pub fn set_observe(&self, selector: Option<&str>) {
        lock(&self.inner.state).attrs.observe = selector.map(str::to_string);
        self.attribute_changed("observe");
    }

    pub fn set_margin(&self, margin: &str) {
        lock(&self.inner.state).attrs.margin = margin.to_string();
        self.attribute_changed("margin");
    }

    pub fn set_threshold(&self, threshold: f64) {
        lock(&self.inner.state).attrs.threshold = threshold;
        self.attribute_changed("threshold");
    }

    /// Set an attribute from its string form
    ///
    /// Unknown attributes and unparsable thresholds are ignored.
    pub fn set_attribute(&self, name: &str, value: &str) {
        match name {
            "src" => self.set_src(value),
            "alt" => self.set_alt(value),
            "observe" => self.set_observe(Some(value)),
            "margin" => self.set_margin(value),
            "threshold" => match value.trim().parse::<f64>() {
                Ok(threshold) => self.set_threshold(threshold),
                Err(_) => tracing::warn!("lazy-img {}: ignoring threshold {:?}", self.inner.node, value),
            },
            _ => {}
        }
    }

    /// Remove an attribute; only `observe` can be unset
    pub fn remove_attribute(&self, name: &str) {
        if name == "observe" {
            self.set_observe(None);
        }
    }

    /// Attribute-changed hook
    ///
    /// A new `src` always restarts the cycle. Observation settings restart
    /// it only while still waiting for visibility.
    pub fn attribute_changed(&self, name: &str) {
        match name {
            "src" => self.inner.restart(),
            "alt" => {
                let mut st = lock(&self.inner.state);
                st.view.alt = st.attrs.alt.clone();
            }
            "observe" | "margin" | "threshold" => {
                if self.state() == LoadState::Observing {
                    self.inner.restart();
                }
            }
            _ => {}
        }
    }

    /// Element removed from the document
    pub fn detached(&self) {
        self.inner.reset();
    }
}

impl Inner {
    /// Enter `Observing` (or `Idle` for an empty src) with a fresh generation
    fn restart(self: &Arc<Self>) {
        let (stale, generation, observing) = {
            let mut st = lock(&self.state);
            st.generation += 1;
            st.view.src = BLANK_SRC.to_string();
            st.view.loaded = false;
            st.state = if st.attrs.src.trim().is_empty() {
                LoadState::Idle
            } else {
                LoadState::Observing
            };
            (st.handle.take(), st.generation, st.state == LoadState::Observing)
        };
        drop(stale);

        if !observing {
            return;
        }

        let frame = self.page.frames().next_frame();
        let inner = Arc::clone(self);
        self.page.spawn(async move {
            frame.await;
            inner.start_observing(generation).await;
        });
    }

    async fn start_observing(self: Arc<Self>, generation: u64) {
        let (root, config) = {
            let st = lock(&self.state);
            if st.generation != generation {
                return;
            }
            (
                self.page.root_for(self.node, st.attrs.observe.as_deref()),
                st.attrs.monitor_config(),
            )
        };

        let weak = Arc::downgrade(&self);
        let acquired = self
            .page
            .pool()
            .acquire(root, &config, self.node, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.became_visible(generation);
                }
            })
            .await;

        match acquired {
            Ok(handle) => {
                let stale = {
                    let mut st = lock(&self.state);
                    if st.generation == generation && st.state == LoadState::Observing {
                        st.handle = Some(handle);
                        None
                    } else {
                        Some(handle)
                    }
                };
                drop(stale);
            }
            // No retry: the element stays Observing without a monitor
            Err(err) => tracing::warn!("lazy-img {}: cannot observe against {}: {}", self.node, root, err),
        }
    }

    fn became_visible(self: &Arc<Self>, generation: u64) {
        let (handle, url) = {
            let mut st = lock(&self.state);
            if st.generation != generation || st.state != LoadState::Observing {
                return;
            }
            st.state = LoadState::Loaded;
            let url = match resolve_src(&st.attrs.src, self.page.base_url()) {
                Ok(url) => {
                    st.view.src = url.to_string();
                    Some(url)
                }
                Err(err) => {
                    tracing::warn!("lazy-img {}: cannot resolve {:?}: {}", self.node, st.attrs.src, err);
                    None
                }
            };
            (st.handle.take(), url)
        };
        drop(handle);

        let Some(url) = url else {
            return;
        };
        tracing::debug!("lazy-img {}: loading {}", self.node, url);
        let load = self.page.loader().load(&url);
        let inner = Arc::clone(self);
        self.page.spawn(async move {
            match load.await {
                Ok(()) => {
                    let mut st = lock(&inner.state);
                    if st.generation == generation {
                        st.view.loaded = true;
                    }
                }
                Err(err) => tracing::warn!("lazy-img {}: failed to load {}: {}", inner.node, url, err),
            }
        });
    }

    /// Back to `Idle`, releasing any held monitor
    fn reset(&self) {
        let stale = {
            let mut st = lock(&self.state);
            st.generation += 1;
            st.state = LoadState::Idle;
            st.handle.take()
        };
        drop(stale);
    }
}
