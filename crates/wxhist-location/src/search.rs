//! Place search driven by debounced text input.
//!
//! Each distinct query is issued once, cached for the configured window and
//! superseded by the next one. Results of a superseded query are dropped even if
//! they arrive after the newer query's results.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use wxhist_core::{AlertChannel, ErrorCode, RequestSlot, SearchConfig, Ticket};
use wxhist_services::{with_retry, PlaceCandidate, RetryConfig, WeatherBackend};

use crate::cache::TtlCache;

const SEARCHING_HINT: &str = "Searching locations...";
const NO_RESULTS_HINT: &str = "No locations found";

/// Geocoder front end with a published candidate list and loading flag.
pub struct GeocodeSearch<B> {
    backend: Arc<B>,
    alerts: AlertChannel,
    cache: TtlCache<String, Vec<PlaceCandidate>>,
    slot: RequestSlot,
    retry: RetryConfig,
    min_length: usize,
    candidates: watch::Sender<Vec<PlaceCandidate>>,
    loading: watch::Sender<bool>,
}

/// Clears the loading flag when the latest query settles, however it settles.
struct LoadingGuard<'a> {
    loading: &'a watch::Sender<bool>,
    slot: &'a RequestSlot,
    ticket: &'a Ticket,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.slot.is_current(self.ticket) {
            self.loading.send_if_modified(|l| std::mem::replace(l, false));
        }
    }
}

/// Keeps a search bound to its input. Dropping it stops the driver and cancels
/// any query still in flight.
#[derive(Debug)]
pub struct SearchBinding {
    _guard: DropGuard,
}

impl<B: WeatherBackend> GeocodeSearch<B> {
    pub fn new(backend: Arc<B>, alerts: AlertChannel, config: &SearchConfig) -> Self {
        let (candidates, _) = watch::channel(Vec::new());
        let (loading, _) = watch::channel(false);
        Self {
            backend,
            alerts,
            cache: TtlCache::new(config.stale_after()),
            slot: RequestSlot::new(),
            retry: RetryConfig::with_retries(config.retries),
            min_length: config.min_length,
            candidates,
            loading,
        }
    }

    /// Override the backoff between attempts.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn is_searchable(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_length
    }

    /// Search for `text` and publish the result.
    ///
    /// Returns `None` when a newer search superseded this one; the published list
    /// is then left to the newer search. Failures are alerted and publish an empty
    /// list.
    pub async fn search(&self, text: &str) -> Option<Vec<PlaceCandidate>> {
        let query = text.trim();
        if !self.is_searchable(query) {
            self.settle(Vec::new());
            return Some(Vec::new());
        }

        if let Some(places) = self.cache.get(&query.to_string()) {
            tracing::debug!("Geocode cache hit for {:?}", query);
            self.settle(places.clone());
            return Some(places);
        }

        let ticket = self.slot.begin();
        self.loading.send_if_modified(|l| !std::mem::replace(l, true));
        let _loading = LoadingGuard {
            loading: &self.loading,
            slot: &self.slot,
            ticket: &ticket,
        };

        tracing::debug!("Searching locations for {:?}", query);
        let Some(result) = ticket
            .run(with_retry(&self.retry, || self.backend.geocode(query)))
            .await
        else {
            tracing::debug!("Search for {:?} was superseded", query);
            return None;
        };

        if let Ok(places) = &result {
            self.cache.insert(query.to_string(), places.clone());
        }
        if !self.slot.is_current(&ticket) {
            tracing::debug!("Discarding stale results for {:?}", query);
            return None;
        }

        let places = match result {
            Ok(places) => {
                tracing::debug!("Found {} locations for {:?}", places.len(), query);
                places
            }
            Err(e) => {
                tracing::warn!("Location search for {:?} failed: {}", query, e);
                let code = if e.is_timeout() {
                    ErrorCode::SearchTimeout
                } else {
                    ErrorCode::SearchFailed
                };
                self.alerts.error(code.message());
                Vec::new()
            }
        };

        self.candidates.send_replace(places.clone());
        Some(places)
    }

    /// Abandon any in-flight query.
    pub fn cancel(&self) {
        self.slot.invalidate();
        self.loading.send_if_modified(|l| std::mem::replace(l, false));
    }

    fn settle(&self, places: Vec<PlaceCandidate>) {
        self.cancel();
        self.candidates.send_replace(places);
    }

    /// Text shown when the candidate list is empty.
    pub fn hint(&self, input: &str) -> String {
        if self.is_loading() {
            SEARCHING_HINT.to_string()
        } else if !self.is_searchable(input) {
            format!("Type at least {} characters", self.min_length)
        } else {
            NO_RESULTS_HINT.to_string()
        }
    }

    pub fn candidates(&self) -> Vec<PlaceCandidate> {
        self.candidates.borrow().clone()
    }

    pub fn subscribe_candidates(&self) -> watch::Receiver<Vec<PlaceCandidate>> {
        self.candidates.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Search every value `input` settles on until the binding is dropped.
    pub fn bind(self: &Arc<Self>, mut input: watch::Receiver<String>) -> SearchBinding {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let search = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    changed = input.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let text = input.borrow_and_update().clone();
                        let search = Arc::clone(&search);
                        let stop = cancelled.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                biased;
                                _ = stop.cancelled() => {}
                                _ = search.search(&text) => {}
                            }
                        });
                    }
                }
            }
            search.cancel();
        });

        SearchBinding {
            _guard: token.drop_guard(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use parking_lot::Mutex;
    use wxhist_core::{AlertKind, Coordinates, NetworkError};
    use wxhist_services::{BackendResult, DownloadedFile, ReportArtifacts, ReportRequest, WeatherInfo};

    #[derive(Default)]
    struct FakeGeocoder {
        calls: Mutex<Vec<String>>,
        delays: HashMap<String, Duration>,
        failure: Option<NetworkError>,
    }

    impl FakeGeocoder {
        fn slow(query: &str, delay: Duration) -> Self {
            let mut delays = HashMap::new();
            delays.insert(query.to_string(), delay);
            Self {
                delays,
                ..Self::default()
            }
        }

        fn failing(err: NetworkError) -> Self {
            Self {
                failure: Some(err),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    fn place(name: &str) -> PlaceCandidate {
        PlaceCandidate {
            display_name: name.to_string(),
            lat: "51.5073".to_string(),
            lon: "-0.1276".to_string(),
        }
    }

    impl WeatherBackend for FakeGeocoder {
        async fn geocode(&self, query: &str) -> BackendResult<Vec<PlaceCandidate>> {
            self.calls.lock().push(query.to_string());
            if let Some(delay) = self.delays.get(query) {
                tokio::time::sleep(*delay).await;
            }
            match &self.failure {
                Some(err) => Err(err.clone()),
                None => Ok(vec![place(&format!("{} result", query))]),
            }
        }

        async fn reverse_geocode(&self, _at: Coordinates) -> BackendResult<String> {
            Err(NetworkError::NoResponse("unused".into()))
        }

        async fn current_weather(&self, _at: Coordinates) -> BackendResult<WeatherInfo> {
            Err(NetworkError::NoResponse("unused".into()))
        }

        async fn generate_report(&self, _request: &ReportRequest) -> BackendResult<ReportArtifacts> {
            Err(NetworkError::NoResponse("unused".into()))
        }

        async fn download(&self, _filename: &str) -> BackendResult<DownloadedFile> {
            Err(NetworkError::NoResponse("unused".into()))
        }
    }

    type Harness = (
        Arc<GeocodeSearch<FakeGeocoder>>,
        Arc<FakeGeocoder>,
        AlertChannel,
    );

    fn search_with(backend: FakeGeocoder) -> Harness {
        let backend = Arc::new(backend);
        let alerts = AlertChannel::new();
        let search = GeocodeSearch::new(
            Arc::clone(&backend),
            alerts.clone(),
            &SearchConfig::default(),
        );
        (Arc::new(search), backend, alerts)
    }

    #[tokio::test]
    async fn test_short_input_makes_no_call() {
        let (search, backend, _) = search_with(FakeGeocoder::default());

        for text in ["", "L", "Lo", "  Lo  "] {
            assert_eq!(search.search(text).await, Some(Vec::new()));
        }
        assert!(backend.calls().is_empty());
        assert!(search.candidates().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_query_is_cached() {
        let (search, backend, _) = search_with(FakeGeocoder::default());

        let first = search.search("Paris").await.unwrap();
        let second = search.search("Paris").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.calls(), vec!["Paris"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_goes_stale() {
        let (search, backend, _) = search_with(FakeGeocoder::default());

        search.search("Paris").await;
        tokio::time::advance(Duration::from_secs(61)).await;
        search.search("Paris").await;

        assert_eq!(backend.calls(), vec!["Paris", "Paris"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_alerts_after_retries() {
        let (search, backend, alerts) = search_with(FakeGeocoder::failing(NetworkError::Timeout));

        let places = search.search("Atlantis").await;

        assert_eq!(places, Some(Vec::new()));
        assert_eq!(backend.calls().len(), 3);
        let alert = alerts.current().unwrap();
        assert_eq!(alert.kind, AlertKind::Error);
        assert_eq!(alert.message, ErrorCode::SearchTimeout.message());
        assert_eq!(alerts.shown_count(), 1);
        assert!(!search.is_loading());
    }

    #[tokio::test]
    async fn test_client_error_alerts_search_failed() {
        let (search, backend, alerts) = search_with(FakeGeocoder::failing(NetworkError::Server {
            status: 400,
            message: None,
        }));

        search.search("Atlantis").await;

        assert_eq!(backend.calls().len(), 1);
        assert_eq!(alerts.current().unwrap().message, ErrorCode::SearchFailed.message());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_superseded_query_never_overwrites() {
        let (search, _backend, _) =
            search_with(FakeGeocoder::slow("Lond", Duration::from_millis(500)));

        let (lond, london) = tokio::join!(search.search("Lond"), async {
            tokio::task::yield_now().await;
            search.search("London").await
        });

        assert_eq!(lond, None);
        assert_eq!(london, Some(vec![place("London result")]));
        assert_eq!(search.candidates(), vec![place("London result")]);
        assert!(!search.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_spans_latest_query() {
        let (search, _backend, _) =
            search_with(FakeGeocoder::slow("Berlin", Duration::from_millis(200)));

        let task = tokio::spawn({
            let search = Arc::clone(&search);
            async move { search.search("Berlin").await }
        });
        tokio::task::yield_now().await;
        assert!(search.is_loading());
        assert_eq!(search.hint("Berlin"), "Searching locations...");

        task.await.unwrap();
        assert!(!search.is_loading());
        assert_eq!(search.hint("Be"), "Type at least 3 characters");
        assert_eq!(search.hint("Berlin"), "No locations found");
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_input_ends_loading() {
        let (search, backend, _) =
            search_with(FakeGeocoder::slow("Berlin", Duration::from_millis(200)));

        let (berlin, cleared) = tokio::join!(search.search("Berlin"), async {
            tokio::task::yield_now().await;
            search.search("B").await
        });

        assert_eq!(berlin, None);
        assert_eq!(cleared, Some(Vec::new()));
        assert!(!search.is_loading());
        assert!(search.candidates().is_empty());
        assert_eq!(backend.calls(), vec!["Berlin"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bound_input_searches_settled_values() {
        let (search, backend, _) = search_with(FakeGeocoder::default());
        let (tx, rx) = watch::channel(String::new());
        let binding = search.bind(rx);

        tx.send_replace("Lo".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace("London".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(backend.calls(), vec!["London"]);
        assert_eq!(search.candidates(), vec![place("London result")]);

        drop(binding);
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace("Madrid".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.calls(), vec!["London"]);
    }
}
