//! Frame scheduling
//!
//! "Next render opportunity" for deferred work. Elements register for the
//! next frame synchronously and the page's render loop calls
//! [`FrameScheduler::tick`] once per frame, releasing every waiter.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use smol::channel::{self, Sender};

use crate::lock;

/// Future that resolves on the next frame
pub type FrameFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Default)]
struct FrameState {
    waiters: Mutex<Vec<Sender<()>>>,
    frame: AtomicU64,
}

/// Render-tick source shared by a page's elements
#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    state: Arc<FrameState>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the frame after the current one
    ///
    /// The wait is registered when this is called, not when the future is
    /// first polled. The future also resolves if the scheduler is dropped.
    pub fn next_frame(&self) -> FrameFuture {
        let (tx, rx) = channel::bounded(1);
        lock(&self.state.waiters).push(tx);
        Box::pin(async move {
            let _ = rx.recv().await;
        })
    }

    /// Finish a frame; returns the number of waiters released
    pub fn tick(&self) -> usize {
        let waiters = std::mem::take(&mut *lock(&self.state.waiters));
        let frame = self.state.frame.fetch_add(1, Ordering::Relaxed) + 1;
        for tx in &waiters {
            let _ = tx.try_send(());
        }
        if !waiters.is_empty() {
            tracing::trace!("frame {}: released {} waiter(s)", frame, waiters.len());
        }
        waiters.len()
    }

    /// Waiters registered for the next frame
    pub fn pending(&self) -> usize {
        lock(&self.state.waiters).len()
    }

    /// Frames completed so far
    pub fn frame(&self) -> u64 {
        self.state.frame.load(Ordering::Relaxed)
    }
}
