//! Lazy Img - deferred image loading
//!
//! A `<lazy-img>` element shows a blank placeholder until it comes near
//! the viewport (or a chosen scrolling ancestor), then swaps in the real
//! image. Visibility comes from the pooled monitors in `lazy-observe`, so
//! hundreds of images with the same settings share a single observer.
//!
//! # Example
//! ```rust,ignore
//! let page = Arc::new(PageContext::new(base_url, tree, pool, loader, executor));
//! let img = LazyImg::new(page.clone(), node);
//! img.set_src("photos/cat.jpg");
//! page.frames().tick();
//! ```

mod config;
mod element;
mod frame;
mod loader;
mod page;
mod resolve;

pub use config::Config;
pub use element::{Attributes, BLANK_SRC, ImgView, LazyImg, LoadState};
pub use frame::{FrameFuture, FrameScheduler};
pub use loader::{DryRunLoader, HttpImageLoader, ImageLoader, LoadError, LoadFuture};
pub use page::PageContext;
pub use resolve::resolve_src;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
