//! Single-flight coordination of token refreshes.
//!
//! A [`RequestQueue`] owns one optional in-flight refresh. The first caller
//! that needs new credentials installs the slot and spawns the refresh;
//! everyone arriving while the slot is occupied joins it instead of starting
//! another. Requests that hit a 401 while a refresh is running are parked in a
//! FIFO queue and released, with the new token attached, when it settles.
//!
//! The slot lives behind a mutex that is never held across an await, so
//! "check for a refresh" and "install a refresh" are one atomic step even on
//! the multi-threaded runtime. The refresh itself runs in its own task: a
//! caller that gives up waiting never strands the others.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tollgate_domain::{CredentialPair, RequestDescriptor};
use tracing::{debug, info};

use crate::error::RefreshFailed;

/// Outcome shared by every waiter of one refresh.
pub type RefreshOutcome = Result<CredentialPair, RefreshFailed>;

type ReplayOutcome = Result<RequestDescriptor, RefreshFailed>;

/// A request parked until the in-flight refresh settles.
struct QueuedRequest {
    descriptor: RequestDescriptor,
    responder: oneshot::Sender<ReplayOutcome>,
}

/// The in-flight refresh and everything waiting on it.
struct InFlight {
    generation: u64,
    joiners: Vec<oneshot::Sender<RefreshOutcome>>,
    queued: VecDeque<QueuedRequest>,
}

#[derive(Default)]
struct QueueState {
    in_flight: Option<InFlight>,
    next_generation: u64,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    settled: AtomicU64,
}

/// Single-flight refresh coordinator and replay queue.
///
/// Cloning yields another handle to the same coordinator. Each client owns
/// its own instance; nothing is process-wide.
#[derive(Clone, Default)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl RequestQueue {
    /// Creates an idle coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `call` as the refresh unless one is already in flight, in which
    /// case `call` is dropped unpolled and the caller joins the running one.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn refresh<F>(&self, call: F) -> RefreshOutcome
    where
        F: Future<Output = RefreshOutcome> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let started = {
            let mut state = self.lock();
            if let Some(in_flight) = state.in_flight.as_mut() {
                in_flight.joiners.push(tx);
                None
            } else {
                state.next_generation += 1;
                let generation = state.next_generation;
                state.in_flight = Some(InFlight {
                    generation,
                    joiners: vec![tx],
                    queued: VecDeque::new(),
                });
                Some(generation)
            }
        };

        match started {
            Some(generation) => {
                debug!(generation, "starting token refresh");
                let settlement = Settlement {
                    queue: self.clone(),
                    generation,
                    done: false,
                };
                tokio::spawn(async move {
                    let outcome = call.await;
                    settlement.complete(outcome);
                });
            }
            None => debug!("joining in-flight token refresh"),
        }

        rx.await.unwrap_or_else(|_| Err(RefreshFailed::abandoned()))
    }

    /// Parks `descriptor` behind the in-flight refresh.
    ///
    /// Returns the descriptor back when no refresh is running; the caller
    /// should then start one itself.
    pub fn enqueue(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<PendingReplay, RequestDescriptor> {
        let mut state = self.lock();
        let Some(in_flight) = state.in_flight.as_mut() else {
            return Err(descriptor);
        };

        let (responder, receiver) = oneshot::channel();
        in_flight.queued.push_back(QueuedRequest {
            descriptor,
            responder,
        });
        debug!(
            generation = in_flight.generation,
            position = in_flight.queued.len(),
            "request queued behind token refresh"
        );
        Ok(PendingReplay { receiver })
    }

    /// Returns true while a refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Number of requests parked behind the in-flight refresh.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.lock()
            .in_flight
            .as_ref()
            .map_or(0, |in_flight| in_flight.queued.len())
    }

    /// Number of refreshes that have settled so far.
    #[must_use]
    pub fn settled_count(&self) -> u64 {
        self.shared.settled.load(Ordering::Acquire)
    }

    /// Clears the slot, then releases every waiter exactly once: joiners
    /// first, queued requests in arrival order.
    fn settle(&self, generation: u64, outcome: &RefreshOutcome) {
        let Some(in_flight) = self
            .lock()
            .in_flight
            .take_if(|in_flight| in_flight.generation == generation)
        else {
            return;
        };
        self.shared.settled.fetch_add(1, Ordering::AcqRel);

        let InFlight {
            joiners, queued, ..
        } = in_flight;
        info!(
            generation,
            success = outcome.is_ok(),
            joiners = joiners.len(),
            queued = queued.len(),
            "token refresh settled"
        );

        for joiner in joiners {
            let _ = joiner.send(outcome.clone());
        }
        for request in queued {
            let replay = match outcome {
                Ok(pair) => Ok(request.descriptor.replayed_with(&pair.access_token)),
                Err(failure) => Err(failure.clone()),
            };
            if request.responder.send(replay).is_err() {
                debug!(generation, "queued request abandoned before release");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Settles the slot even if the refresh task is cancelled or panics.
struct Settlement {
    queue: RequestQueue,
    generation: u64,
    done: bool,
}

impl Settlement {
    fn complete(mut self, outcome: RefreshOutcome) {
        self.done = true;
        self.queue.settle(self.generation, &outcome);
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        if !self.done {
            self.queue
                .settle(self.generation, &Err(RefreshFailed::abandoned()));
        }
    }
}

/// A request waiting for the in-flight refresh to settle.
#[must_use = "a pending replay resolves only when awaited"]
pub struct PendingReplay {
    receiver: oneshot::Receiver<ReplayOutcome>,
}

impl PendingReplay {
    /// Waits for the refresh; yields the descriptor to replay, carrying the
    /// new token, or the shared refresh failure.
    pub async fn wait(self) -> ReplayOutcome {
        self.receiver
            .await
            .unwrap_or_else(|_| Err(RefreshFailed::abandoned()))
    }
}
