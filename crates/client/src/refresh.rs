//! Single-flight access token refresh.
//!
//! Every request that comes back 401 asks the coordinator for a refresh.
//! The first caller starts the refresh and parks a [`Shared`] handle to it;
//! callers arriving while it runs await that same handle. A caller whose
//! request was sent before the last successful refresh skips straight to its
//! retry, since its 401 was for the token that has already been replaced.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::RefreshFailure;

type RefreshFuture = Shared<BoxFuture<'static, Result<(), RefreshFailure>>>;

#[derive(Default)]
struct Slot {
    /// Count of successful refreshes.
    generation: u64,
    in_flight: Option<RefreshFuture>,
}

/// Coordinates access token refreshes so concurrent 401s cost one request.
#[derive(Default)]
pub struct RefreshCoordinator {
    slot: Mutex<Slot>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of successful refreshes so far.
    ///
    /// Read this before sending a request and pass it to [`refresh`](Self::refresh)
    /// if the request fails with 401.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Whether a refresh is currently running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Refresh the access token, or join the refresh already in flight.
    ///
    /// `observed` is the generation read before the rejected request was
    /// sent. `start` is only invoked when no refresh is running and none has
    /// succeeded since `observed`.
    ///
    /// # Errors
    ///
    /// Returns the [`RefreshFailure`] of the shared refresh attempt.
    pub async fn refresh<F, Fut>(&self, observed: u64, start: F) -> Result<(), RefreshFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), RefreshFailure>> + Send + 'static,
    {
        let attempt = {
            let mut slot = self.lock();
            if slot.generation != observed {
                tracing::debug!(
                    observed,
                    current = slot.generation,
                    "Token already refreshed, retrying"
                );
                return Ok(());
            }
            match &slot.in_flight {
                Some(attempt) => {
                    tracing::debug!("Joining in-flight token refresh");
                    attempt.clone()
                }
                None => {
                    tracing::debug!("Starting token refresh");
                    let attempt = start().boxed().shared();
                    slot.in_flight = Some(attempt.clone());
                    attempt
                }
            }
        };

        let outcome = attempt.clone().await;

        let mut slot = self.lock();
        if slot
            .in_flight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&attempt))
        {
            slot.in_flight = None;
            match &outcome {
                Ok(()) => slot.generation += 1,
                Err(e) => tracing::warn!(error = %e, "Token refresh failed"),
            }
        }

        outcome
    }
}
