//! Single-flight credential renewal.
//!
//! The first request that needs a renewal installs a shared future in the
//! coordinator's slot; every request failing while it is pending awaits a
//! clone of the same future. The renewal runs on its own task so it always
//! reaches the store even if the request that started it is dropped, and the
//! task clears the slot on every exit path (completion, panic, abort).

use crate::auth::CredentialStore;
use crate::error::RenewalError;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Renewal outcome shared by every waiter: the new access token
pub(crate) type SharedRenewal = Shared<BoxFuture<'static, Result<String, RenewalError>>>;

/// How a request should proceed after a credential rejection
pub(crate) enum Ticket {
    /// This request started the renewal
    Owner(SharedRenewal),
    /// A renewal was already running; wait for it
    Joined(SharedRenewal),
    /// The credential was replaced after this request was sent; retry with it
    Current(String),
}

struct InFlight {
    generation: u64,
    outcome: SharedRenewal,
}

type Slot = Arc<Mutex<Option<InFlight>>>;

#[derive(Default)]
pub(crate) struct RenewalCoordinator {
    slot: Slot,
    generation: AtomicU64,
}

impl RenewalCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The pending renewal, if one is running
    pub(crate) fn in_flight(&self) -> Option<SharedRenewal> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|in_flight| in_flight.outcome.clone())
    }

    /// Join the pending renewal, reuse a newer credential, or start a renewal
    ///
    /// `sent_token` is the access token the rejected request carried. The
    /// decision is taken under the slot lock so two rejected requests can
    /// never both become owners.
    pub(crate) fn join_or_start<F>(
        &self,
        store: &CredentialStore,
        sent_token: Option<&str>,
        start: F,
    ) -> Ticket
    where
        F: FnOnce() -> BoxFuture<'static, Result<String, RenewalError>>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(in_flight) = slot.as_ref() {
            return Ticket::Joined(in_flight.outcome.clone());
        }

        // An empty store never short-circuits: after an ended session every
        // later rejection starts a renewal that finds no refresh token and
        // reports the expiry again, without calling the refresh endpoint
        if let Some(current) = store.access_token()
            && sent_token != Some(current.as_str())
        {
            debug!("credential already replaced since request was sent");
            return Ticket::Current(current);
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let guard = SlotGuard {
            slot: Arc::clone(&self.slot),
            generation,
        };
        let work = start();
        let task = tokio::spawn(async move {
            let _guard = guard;
            work.await
        });

        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                Err(RenewalError::new(format!(
                    "credential renewal task failed: {e}"
                )))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlight {
            generation,
            outcome: outcome.clone(),
        });
        debug!(generation, "credential renewal started");

        Ticket::Owner(outcome)
    }
}

// Clears the slot when the renewal task finishes, panics, or is aborted
struct SlotGuard {
    slot: Slot,
    generation: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == self.generation)
        {
            *slot = None;
        }
    }
}
