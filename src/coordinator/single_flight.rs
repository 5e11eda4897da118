//! Single-flight execution
//!
//! At most one run is in flight per `SingleFlight`. Callers arriving while it
//! runs join it and receive a clone of the same outcome. Once closed, no new
//! run starts.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::AbortHandle;

struct Flight<T> {
    rx: watch::Receiver<Option<T>>,
    abort: AbortHandle,
}

struct Slot<T> {
    flight: Option<Flight<T>>,
    closed: bool,
}

pub struct SingleFlight<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

fn lock<T>(slot: &Mutex<Slot<T>>) -> MutexGuard<'_, Slot<T>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                flight: None,
                closed: false,
            })),
        }
    }

    /// Join the running flight, or start one from `make`
    ///
    /// Returns `None` if the flight was aborted before producing a value, or
    /// if the flight is closed. `make` is not called in the latter case.
    pub async fn run<F, Fut>(&self, make: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut rx = {
            let mut slot = lock(&self.slot);
            if slot.closed {
                return None;
            }
            match slot.flight.as_ref() {
                Some(flight) if !flight.abort.is_finished() => flight.rx.clone(),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    let fut = make();
                    let owner = Arc::clone(&self.slot);
                    let handle = tokio::spawn(async move {
                        let outcome = fut.await;
                        // Clear and publish under the lock so no caller joins a finished flight
                        let mut slot = lock(&owner);
                        slot.flight = None;
                        let _ = tx.send(Some(outcome));
                    });
                    slot.flight = Some(Flight {
                        rx: rx.clone(),
                        abort: handle.abort_handle(),
                    });
                    rx
                }
            }
        };

        loop {
            if let Some(value) = rx.borrow_and_update().clone() {
                return Some(value);
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Abort the running flight; joined callers receive `None`
    pub fn abort(&self) -> bool {
        Self::abort_locked(&mut lock(&self.slot))
    }

    /// Abort the running flight and refuse every later `run`
    ///
    /// Returns whether a flight was aborted.
    pub fn close(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.closed = true;
        Self::abort_locked(&mut slot)
    }

    fn abort_locked(slot: &mut Slot<T>) -> bool {
        match slot.flight.take() {
            Some(flight) => {
                flight.abort.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.slot).closed
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.slot)
            .flight
            .as_ref()
            .is_some_and(|flight| !flight.abort.is_finished())
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
