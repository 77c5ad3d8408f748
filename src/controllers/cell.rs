//! Observable holder for one asynchronous operation's state.

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::ApiError;
use crate::resource::Resource;

/// Proof that a caller started the current operation.
///
/// Only the most recent ticket may settle a cell; older ones belong to
/// requests whose results must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Ticket(u64);

/// One `Resource<T>` published through a watch channel.
///
/// `None` until the first operation begins. Every operation goes
/// `begin()` (publishes `Loading`) then `settle()` (publishes exactly one
/// terminal state).
pub struct ResourceCell<T> {
    state: watch::Sender<Option<Resource<T>>>,
    generation: Mutex<u64>,
}

impl<T: Clone> ResourceCell<T> {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            generation: Mutex::new(0),
        }
    }

    pub fn begin(&self) -> Ticket {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.state.send_replace(Some(Resource::Loading));
        Ticket(*generation)
    }

    /// Publish the outcome for `ticket`. Returns false, publishing
    /// nothing, when a newer operation has begun since.
    pub fn settle(&self, ticket: Ticket, result: Result<T, ApiError>) -> bool {
        let generation = self.generation.lock();
        if *generation != ticket.0 {
            tracing::debug!(
                ticket = ticket.0,
                current = *generation,
                "Discarding superseded result"
            );
            return false;
        }
        self.state.send_replace(Some(result.into()));
        true
    }

    /// `begin`, await `operation`, `settle`; returns what was published.
    pub async fn run<F>(&self, operation: F) -> Resource<T>
    where
        F: std::future::Future<Output = Result<T, ApiError>>,
    {
        let ticket = self.begin();
        let result = operation.await;
        let resource = Resource::from(result.clone());
        self.settle(ticket, result);
        resource
    }

    /// Apply a local change to the current success value.
    ///
    /// `f` returns whether it changed anything; subscribers are woken only
    /// then. Ignored unless the cell holds `Success`.
    pub fn patch(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.state.send_if_modified(|state| match state {
            Some(Resource::Success(data)) => f(data),
            _ => false,
        })
    }

    /// Drop whatever is held and invalidate any outstanding ticket.
    pub fn reset(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.state.send_replace(None);
    }

    pub fn get(&self) -> Option<Resource<T>> {
        self.state.borrow().clone()
    }

    /// Current success value, if any.
    pub fn data(&self) -> Option<T> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|resource| resource.data().cloned())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Resource<T>>> {
        self.state.subscribe()
    }
}

impl<T: Clone> Default for ResourceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
