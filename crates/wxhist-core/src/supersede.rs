//! Latest-request-wins bookkeeping for async lookups.
//!
//! A [`RequestSlot`] hands out monotonically increasing tickets. Starting a new
//! request cancels the previous one, and only the holder of the newest ticket may
//! commit its result, whatever order the responses arrive in.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct RequestSlot {
    latest: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
}

/// Proof of having started a request. Compare against the slot before committing.
#[derive(Debug, Clone)]
pub struct Ticket {
    seq: u64,
    cancel: CancellationToken,
}

impl RequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding (and cancelling) the previous one.
    pub fn begin(&self) -> Ticket {
        let cancel = CancellationToken::new();
        let mut in_flight = self.in_flight.lock();
        if let Some(previous) = in_flight.replace(cancel.clone()) {
            previous.cancel();
        }
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { seq, cancel }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.seq
    }

    /// Invalidate and cancel whatever is in flight without starting anything new.
    pub fn invalidate(&self) {
        let mut in_flight = self.in_flight.lock();
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = in_flight.take() {
            token.cancel();
        }
    }
}

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it completes or the ticket is cancelled.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}
