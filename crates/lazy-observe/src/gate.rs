//! Readiness gate
//!
//! The visibility primitive may need a compatibility shim installed before
//! first use. The gate runs that setup once and broadcasts the outcome to
//! every waiter; later waits resolve immediately from the cached result.

use std::future::Future;
use std::pin::Pin;

use smol::channel::{self, Sender};
use smol::lock::OnceCell;

use crate::ObserveError;

type SetupFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;
type Setup = Box<dyn Fn() -> SetupFuture + Send + Sync>;

/// One-time asynchronous readiness signal
pub struct ReadinessGate {
    setup: Setup,
    outcome: OnceCell<Result<(), String>>,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("outcome", &self.outcome.get())
            .finish_non_exhaustive()
    }
}

impl ReadinessGate {
    /// Gate whose setup is the given async closure
    ///
    /// The closure runs on the first wait. It only runs again if that first
    /// wait is dropped before setup completes.
    pub fn new<F, Fut>(setup: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        Self {
            setup: Box::new(move || Box::pin(setup())),
            outcome: OnceCell::new(),
        }
    }

    /// Gate that is already open
    pub fn ready() -> Self {
        Self {
            setup: Box::new(|| Box::pin(async { Ok(()) })),
            outcome: OnceCell::from(Ok(())),
        }
    }

    /// Gate opened (or failed) from the outside through a [`GateOpener`]
    pub fn manual() -> (Self, GateOpener) {
        let (tx, rx) = channel::bounded::<()>(1);
        let gate = Self::new(move || {
            let rx = rx.clone();
            async move {
                rx.recv()
                    .await
                    .map_err(|_| "readiness source went away before signalling".to_string())
            }
        });
        (gate, GateOpener { tx })
    }

    /// Wait until the primitive is usable
    pub async fn wait(&self) -> Result<(), ObserveError> {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                tracing::debug!("running visibility primitive setup");
                let result = (self.setup)().await;
                match &result {
                    Ok(()) => tracing::debug!("visibility primitive ready"),
                    Err(reason) => tracing::warn!("visibility primitive setup failed: {}", reason),
                }
                result
            })
            .await;
        outcome.clone().map_err(ObserveError::PrimitiveUnavailable)
    }

    /// True once setup has completed successfully
    pub fn is_ready(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }
}

/// Handle that resolves a [`ReadinessGate::manual`] gate
#[derive(Debug)]
pub struct GateOpener {
    tx: Sender<()>,
}

impl GateOpener {
    /// Signal readiness
    pub fn open(self) {
        let _ = self.tx.try_send(());
    }

    /// Signal that the primitive will never become available
    pub fn fail(self) {
        self.tx.close();
    }
}
