//! Config reload listener registry.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome reported by a reload listener.
pub type ListenerResult = Result<(), BoxError>;

/// A registered reload callback.
pub type Listener = Arc<dyn Fn() -> ListenerResult + Send + Sync>;

/// Why a single listener invocation failed.
#[derive(Debug, Error)]
pub enum ListenerFailure {
    #[error("listener returned an error: {0}")]
    Returned(BoxError),

    #[error("listener panicked: {0}")]
    Panicked(String),
}

/// Ordered, append-only collection of reload listeners.
///
/// Cloning yields another handle to the same registry, which lets a running
/// listener register further listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener. Visible to every snapshot taken afterwards.
    pub fn register<F>(&self, listener: F)
    where
        F: Fn() -> ListenerResult + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        listeners.push(Arc::new(listener));
        tracing::debug!(listeners = listeners.len(), "Config reload listener registered");
    }

    /// Independent ordered copy of the current listeners.
    pub fn snapshot(&self) -> Vec<Listener> {
        self.listeners.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Run one listener, converting both error returns and panics into a failure.
pub fn invoke(listener: &Listener) -> Result<(), ListenerFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| listener())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ListenerFailure::Returned(e)),
        Err(payload) => Err(ListenerFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Invoke every listener in `snapshot` in order. Failures are logged and do
/// not stop the remaining listeners. Returns the number of failures.
pub fn run_snapshot(snapshot: &[Listener]) -> usize {
    let mut failures = 0;
    for (index, listener) in snapshot.iter().enumerate() {
        if let Err(e) = invoke(listener) {
            failures += 1;
            tracing::error!(listener = index, error = %e, "Config reload listener failed");
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = log.clone();
            registry.register(move || {
                log.lock().push(i);
                Ok(())
            });
        }

        assert_eq!(run_snapshot(&registry.snapshot()), 0);
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let registry = ListenerRegistry::new();
        registry.register(|| Ok(()));
        let snapshot = registry.snapshot();

        registry.register(|| Ok(()));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_failures_are_isolated() {
        let registry = ListenerRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register(|| Err("boom".into()));
        registry.register(|| panic!("listener exploded"));
        let c = counter.clone();
        registry.register(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(run_snapshot(&registry.snapshot()), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invoke_reports_panic_message() {
        let listener: Listener = Arc::new(|| -> ListenerResult { panic!("bad state") });
        match invoke(&listener) {
            Err(ListenerFailure::Panicked(msg)) => assert_eq!(msg, "bad state"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_register_from_inside_listener() {
        let registry = ListenerRegistry::new();
        let inner = registry.clone();
        registry.register(move || {
            inner.register(|| Ok(()));
            Ok(())
        });

        run_snapshot(&registry.snapshot());
        assert_eq!(registry.len(), 2);
    }
}
