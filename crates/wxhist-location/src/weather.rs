//! Current conditions for the selected coordinates.

use std::sync::Arc;

use tokio::sync::watch;
use wxhist_core::{CoordinateKey, Coordinates, RequestSlot, WeatherConfig};
use wxhist_services::{with_retry, RetryConfig, WeatherBackend, WeatherInfo};

use crate::cache::TtlCache;

/// Fetches and publishes current weather. Failures leave the panel empty and
/// are only logged.
pub struct CurrentWeatherResolver<B> {
    backend: Arc<B>,
    cache: TtlCache<CoordinateKey, WeatherInfo>,
    slot: RequestSlot,
    retry: RetryConfig,
    current: watch::Sender<Option<WeatherInfo>>,
}

impl<B: WeatherBackend> CurrentWeatherResolver<B> {
    pub fn new(backend: Arc<B>, config: &WeatherConfig) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            backend,
            cache: TtlCache::new(config.stale_after()),
            slot: RequestSlot::new(),
            retry: RetryConfig::with_retries(config.retries),
            current,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn resolve(&self, at: Coordinates) -> Option<WeatherInfo> {
        let info = match self.cache.get(&at.key()) {
            Some(info) => {
                self.slot.invalidate();
                info
            }
            None => {
                let ticket = self.slot.begin();
                let result = ticket
                    .run(with_retry(&self.retry, || self.backend.current_weather(at)))
                    .await?;

                if let Ok(info) = &result {
                    self.cache.insert(at.key(), info.clone());
                }
                if !self.slot.is_current(&ticket) {
                    return None;
                }
                match result {
                    Ok(info) => info,
                    Err(e) => {
                        tracing::warn!("Current weather unavailable: {}", e);
                        self.current.send_replace(None);
                        return None;
                    }
                }
            }
        };

        tracing::debug!(
            "Current weather at ({}, {}): {}°C, {}",
            at.lat(),
            at.lon(),
            info.temp,
            info.band().description()
        );
        self.current.send_replace(Some(info.clone()));
        Some(info)
    }

    /// Drop the displayed conditions and any in-flight fetch.
    pub fn clear(&self) {
        self.slot.invalidate();
        self.current.send_replace(None);
    }

    pub fn current(&self) -> Option<WeatherInfo> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WeatherInfo>> {
        self.current.subscribe()
    }
}
