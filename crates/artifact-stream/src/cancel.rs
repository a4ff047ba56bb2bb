//! External cancellation signal
//!
//! A [`CancelTrigger`] / [`CancelSignal`] pair wraps a tokio `watch` channel.
//! The trigger is held by whoever may abort the producer (a request handler,
//! a supervisor); signals are cloned into every watched session.

use std::sync::Arc;
use tokio::sync::watch;

/// Sending half: fires the cancellation once
#[derive(Debug, Clone)]
pub struct CancelTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelTrigger {
    /// Fire the signal; later calls are no-ops
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has fired
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// New receiving half
    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half: observed by watched sessions
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Whether the signal has fired
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires
    ///
    /// Never resolves if every trigger is dropped without firing.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked trigger and signal
#[must_use]
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx: Arc::new(tx) }, CancelSignal { rx })
}
