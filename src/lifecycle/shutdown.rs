//! Termination fan-out to async tasks.

use std::sync::Arc;

use tokio::sync::watch;

/// Broadcasts the termination reason to every subscribed task.
///
/// Backed by a watch channel, so tasks that subscribe after the trigger still
/// observe it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<Option<Arc<str>>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Subscribe to the termination notice.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Publish the termination reason. Only the first call has an effect.
    pub fn trigger(&self, reason: &str) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(Arc::from(reason));
            true
        })
    }

}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side handed to async tasks.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<Arc<str>>>,
}

impl ShutdownSignal {
    /// Wait for the termination notice and return its reason.
    ///
    /// Resolves immediately when termination was already triggered. If the
    /// coordinator is dropped without triggering, resolves with "coordinator dropped".
    pub async fn recv(&mut self) -> Arc<str> {
        match self.rx.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => reason.clone().unwrap_or_else(|| Arc::from("coordinator dropped")),
            Err(_) => Arc::from("coordinator dropped"),
        }
    }
}
