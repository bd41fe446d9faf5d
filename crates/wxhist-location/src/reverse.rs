//! Coordinates to place name.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use wxhist_core::{AlertChannel, CoordinateKey, Coordinates, ErrorCode, RequestSlot, Ticket};
use wxhist_services::{with_retry, RetryConfig, WeatherBackend};

use crate::cache::TtlCache;

/// Settles to the looked-up name, or `Some(None)` when the lookup failed or was
/// superseded.
type Outcome = watch::Receiver<Option<Option<String>>>;

/// The lookup currently on the wire.
struct InFlight {
    key: CoordinateKey,
    seq: u64,
    done: Outcome,
}

struct Shared<B> {
    backend: Arc<B>,
    alerts: AlertChannel,
    cache: TtlCache<CoordinateKey, String>,
    slot: RequestSlot,
    in_flight: Mutex<Option<InFlight>>,
}

/// Reverse geocoder that asks about each coordinate pair at most once per session.
///
/// Lookups run on their own task: callers that join a lookup for the same pair
/// all see its result, and a caller giving up does not abort it for the others.
pub struct ReverseGeocodeResolver<B> {
    shared: Arc<Shared<B>>,
    retry: RetryConfig,
}

impl<B: WeatherBackend> ReverseGeocodeResolver<B> {
    pub fn new(backend: Arc<B>, alerts: AlertChannel, retries: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                alerts,
                cache: TtlCache::unbounded(),
                slot: RequestSlot::new(),
                in_flight: Mutex::new(None),
            }),
            retry: RetryConfig::with_retries(retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve raw coordinates. Out-of-range or non-finite input is ignored
    /// without a call or an alert.
    pub async fn resolve_raw(&self, lat: f64, lon: f64) -> Option<String> {
        let at = Coordinates::new(lat, lon)?;
        self.resolve(at).await
    }

    /// Resolve `at` to a place name.
    ///
    /// A request for the pair already on the wire waits for that lookup instead of
    /// starting another. Returns `None` on failure (alerted) or when a newer lookup
    /// superseded this one. Must be called from within a tokio runtime.
    pub async fn resolve(&self, at: Coordinates) -> Option<String> {
        if let Some(name) = self.shared.cache.get(&at.key()) {
            tracing::debug!("Reverse geocode cache hit for ({}, {})", at.lat(), at.lon());
            self.cancel();
            return Some(name);
        }

        let mut done = self.claim(at);
        let settled = done.wait_for(Option::is_some).await.map(|r| (*r).clone());
        settled.ok().flatten().flatten()
    }

    /// Join the lookup already running for `at`, or start one.
    fn claim(&self, at: Coordinates) -> Outcome {
        let key = at.key();
        let mut in_flight = self.shared.in_flight.lock();
        if let Some(flight) = in_flight.as_ref() {
            if flight.key == key && flight.done.has_changed().is_ok() {
                tracing::debug!("Joining reverse lookup for ({}, {})", at.lat(), at.lon());
                return flight.done.clone();
            }
        }

        let ticket = self.shared.slot.begin();
        let (tx, done) = watch::channel(None);
        *in_flight = Some(InFlight {
            key,
            seq: ticket.seq(),
            done: done.clone(),
        });

        let shared = Arc::clone(&self.shared);
        let retry = self.retry.clone();
        tokio::spawn(async move {
            let name = shared.lookup(at, &ticket, &retry).await;
            shared.release(&ticket);
            tx.send_replace(Some(name));
        });
        done
    }
}

impl<B> ReverseGeocodeResolver<B> {
    /// Abandon the in-flight lookup, if any.
    pub fn cancel(&self) {
        self.shared.slot.invalidate();
        self.shared.in_flight.lock().take();
    }
}

impl<B: WeatherBackend> Shared<B> {
    async fn lookup(&self, at: Coordinates, ticket: &Ticket, retry: &RetryConfig) -> Option<String> {
        let result = ticket
            .run(with_retry(retry, || self.backend.reverse_geocode(at)))
            .await?;

        if let Ok(name) = &result {
            self.cache.insert(at.key(), name.clone());
        }
        if !self.slot.is_current(ticket) {
            tracing::debug!("Discarding stale place name for ({}, {})", at.lat(), at.lon());
            return None;
        }

        match result {
            Ok(name) => {
                tracing::info!("Reverse geocoded to: {}", name);
                Some(name)
            }
            Err(e) => {
                tracing::warn!("Reverse geocode failed: {}", e);
                let code = if e.is_timeout() {
                    ErrorCode::ReverseTimeout
                } else {
                    ErrorCode::ReverseFailed
                };
                self.alerts.error(code.message());
                None
            }
        }
    }

    fn release(&self, ticket: &Ticket) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|f| f.seq == ticket.seq()) {
            *in_flight = None;
        }
    }
}
