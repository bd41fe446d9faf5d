//! Owner of the single active location selection.
//!
//! Wires the debounced input to place search, device geolocation to reverse
//! geocoding, and the selected coordinates to current weather. Every replacement
//! of the selection invalidates lookups started for the previous one.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use wxhist_core::{AlertChannel, Config, Coordinates, Debouncer, PermissionError, RequestSlot};
use wxhist_services::{PlaceCandidate, WeatherBackend, WeatherInfo};

use crate::location::{DeviceLocator, GeolocationResolver};
use crate::reverse::ReverseGeocodeResolver;
use crate::search::{GeocodeSearch, SearchBinding};
use crate::types::{LocationSelection, PermissionState};
use crate::weather::CurrentWeatherResolver;

struct SessionInner<B, L> {
    input: Debouncer<String>,
    search: Arc<GeocodeSearch<B>>,
    geolocation: GeolocationResolver<L>,
    reverse: ReverseGeocodeResolver<B>,
    weather: Arc<CurrentWeatherResolver<B>>,
    selection: watch::Sender<Option<LocationSelection>>,
    selection_slot: RequestSlot,
}

pub struct LocationSession<B, L> {
    inner: Arc<SessionInner<B, L>>,
    shutdown: CancellationToken,
    _search: SearchBinding,
}

impl<B: WeatherBackend, L: DeviceLocator> LocationSession<B, L> {
    /// Build a session. Must be called from within a tokio runtime.
    pub fn new(backend: Arc<B>, locator: Arc<L>, alerts: AlertChannel, config: &Config) -> Self {
        let input = Debouncer::new(String::new(), config.search.debounce());
        let search = Arc::new(GeocodeSearch::new(
            Arc::clone(&backend),
            alerts.clone(),
            &config.search,
        ));
        let geolocation = GeolocationResolver::from_config(locator, alerts.clone(), config);
        let reverse =
            ReverseGeocodeResolver::new(Arc::clone(&backend), alerts, config.reverse.retries);
        let weather = Arc::new(CurrentWeatherResolver::new(backend, &config.weather));
        let (selection, _) = watch::channel(None);

        let binding = search.bind(input.subscribe());
        let inner = Arc::new(SessionInner {
            input,
            search,
            geolocation,
            reverse,
            weather,
            selection,
            selection_slot: RequestSlot::new(),
        });

        let shutdown = CancellationToken::new();
        spawn_weather_driver(&inner, shutdown.clone());

        Self {
            inner,
            shutdown,
            _search: binding,
        }
    }

    /// Kick off the initial silent locate in the background.
    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        let stop = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {}
                _ = inner.auto_locate() => {}
            }
        });
    }

    /// Feed raw text from the location input. Searches run once it settles.
    pub fn set_input(&self, text: impl Into<String>) {
        self.inner.input.push(text.into());
    }

    /// The settled (debounced) input.
    pub fn input(&self) -> String {
        self.inner.input.current()
    }

    pub fn search(&self) -> &GeocodeSearch<B> {
        &self.inner.search
    }

    pub fn candidates(&self) -> Vec<PlaceCandidate> {
        self.inner.search.candidates()
    }

    pub fn subscribe_candidates(&self) -> watch::Receiver<Vec<PlaceCandidate>> {
        self.inner.search.subscribe_candidates()
    }

    pub fn is_searching(&self) -> bool {
        self.inner.search.is_loading()
    }

    pub fn select_candidate(&self, candidate: &PlaceCandidate) {
        let selection = LocationSelection::from_candidate(candidate);
        self.inner.replace_selection(Some(selection));
    }

    pub fn set_free_text(&self, text: impl Into<String>) {
        self.inner.replace_selection(Some(LocationSelection::free_text(text)));
    }

    pub fn clear_selection(&self) {
        self.inner.replace_selection(None);
    }

    pub fn selection(&self) -> Option<LocationSelection> {
        self.inner.selection.borrow().clone()
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<LocationSelection>> {
        self.inner.selection.subscribe()
    }

    /// Text handed to report generation; empty when nothing is selected.
    pub fn location_text(&self) -> String {
        self.selection().map(|s| s.name).unwrap_or_default()
    }

    /// Silent attempt: only runs with granted permission, never alerts.
    pub async fn auto_locate(&self) -> Option<LocationSelection> {
        self.inner.auto_locate().await
    }

    /// User-triggered attempt. Geolocation errors are alerted and returned; a
    /// failed reverse lookup is alerted and leaves the selection as it was.
    pub async fn use_my_location(&self) -> Result<Option<LocationSelection>, PermissionError> {
        let at = self.inner.geolocation.explicit_attempt().await?;
        Ok(self.inner.resolve_device(at).await)
    }

    pub fn geolocation(&self) -> &GeolocationResolver<L> {
        &self.inner.geolocation
    }

    pub fn permission(&self) -> PermissionState {
        self.inner.geolocation.permission()
    }

    pub fn current_weather(&self) -> Option<WeatherInfo> {
        self.inner.weather.current()
    }

    pub fn subscribe_weather(&self) -> watch::Receiver<Option<WeatherInfo>> {
        self.inner.weather.subscribe()
    }
}

impl<B, L> Drop for LocationSession<B, L> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.inner.input.cancel();
        self.inner.selection_slot.invalidate();
        self.inner.reverse.cancel();
    }
}

impl<B: WeatherBackend, L: DeviceLocator> SessionInner<B, L> {
    fn replace_selection(&self, selection: Option<LocationSelection>) {
        self.selection_slot.invalidate();
        self.selection.send_replace(selection);
    }

    async fn auto_locate(&self) -> Option<LocationSelection> {
        let at = self.geolocation.auto_attempt().await?;
        self.resolve_device(at).await
    }

    /// Name the device position and make it the selection, unless the selection
    /// was replaced while the lookup ran.
    async fn resolve_device(&self, at: Coordinates) -> Option<LocationSelection> {
        let ticket = self.selection_slot.begin();
        let name = ticket.run(self.reverse.resolve(at)).await.flatten()?;

        if !self.selection_slot.is_current(&ticket) {
            tracing::debug!("Selection changed during reverse lookup, dropping {:?}", name);
            return None;
        }

        let selection = LocationSelection::from_device(name, at);
        self.selection.send_replace(Some(selection.clone()));
        Some(selection)
    }
}

/// Keep current weather in step with the selected coordinates.
fn spawn_weather_driver<B: WeatherBackend, L>(
    inner: &Arc<SessionInner<B, L>>,
    stop: CancellationToken,
) {
    let weather = Arc::clone(&inner.weather);
    let mut selection = inner.selection.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                changed = selection.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let coordinates = selection
                        .borrow_and_update()
                        .as_ref()
                        .and_then(|s| s.coordinates);
                    match coordinates {
                        Some(at) => {
                            let weather = Arc::clone(&weather);
                            let stop = stop.clone();
                            tokio::spawn(async move {
                                tokio::select! {
                                    biased;
                                    _ = stop.cancelled() => {}
                                    _ = weather.resolve(at) => {}
                                }
                            });
                        }
                        None => weather.clear(),
                    }
                }
            }
        }
        weather.clear();
    });
}
