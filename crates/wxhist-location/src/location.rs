//! Device geolocation.
//!
//! [`DeviceLocator`] is the platform seam. [`GeolocationResolver`] layers permission
//! tracking, the position timeout and error reporting on top of it, and publishes
//! resolved coordinates for dependent lookups.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use wxhist_core::{AlertChannel, Config, Coordinates, PermissionError};

use crate::types::{GeolocationPhase, PermissionState};

const DEFAULT_POSITION_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_CACHED_AGE: Duration = Duration::from_secs(300);

/// Raw position reported by the device, not yet validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// Options for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// Oldest cached fix the device may return instead of taking a new one
    pub maximum_age: Duration,
}

/// Platform access to location permission and position.
pub trait DeviceLocator: Send + Sync + 'static {
    /// Whether the platform offers geolocation at all.
    fn is_supported(&self) -> bool;

    /// Current permission as reported by the platform.
    fn permission(&self) -> impl Future<Output = PermissionState> + Send;

    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Position, PermissionError>> + Send;
}

/// Locator for hosts without a location service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocator;

impl DeviceLocator for SystemLocator {
    fn is_supported(&self) -> bool {
        false
    }

    async fn permission(&self) -> PermissionState {
        PermissionState::Unknown
    }

    async fn current_position(&self, _options: PositionOptions) -> Result<Position, PermissionError> {
        Err(PermissionError::NotSupported)
    }
}

/// Why a position request produced no coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionFailure {
    Device(PermissionError),
    /// The device answered with non-finite or out-of-range values.
    Invalid,
}

pub struct GeolocationResolver<L> {
    locator: Arc<L>,
    alerts: AlertChannel,
    permission: watch::Sender<PermissionState>,
    phase: watch::Sender<GeolocationPhase>,
    coordinates: watch::Sender<Option<Coordinates>>,
    position_timeout: Duration,
    max_cached_age: Duration,
}

impl<L: DeviceLocator> GeolocationResolver<L> {
    pub fn new(locator: Arc<L>, alerts: AlertChannel) -> Self {
        let (permission, _) = watch::channel(PermissionState::Unknown);
        let (phase, _) = watch::channel(GeolocationPhase::Idle);
        let (coordinates, _) = watch::channel(None);
        Self {
            locator,
            alerts,
            permission,
            phase,
            coordinates,
            position_timeout: DEFAULT_POSITION_TIMEOUT,
            max_cached_age: DEFAULT_MAX_CACHED_AGE,
        }
    }

    pub fn from_config(locator: Arc<L>, alerts: AlertChannel, config: &Config) -> Self {
        Self::new(locator, alerts)
            .with_position_timeout(config.timeouts.position())
            .with_max_cached_age(config.geolocation.max_cached_age())
    }

    pub fn with_position_timeout(mut self, timeout: Duration) -> Self {
        self.position_timeout = timeout;
        self
    }

    pub fn with_max_cached_age(mut self, age: Duration) -> Self {
        self.max_cached_age = age;
        self
    }

    /// Query the platform permission. A denial sticks until an explicit attempt.
    pub async fn refresh_permission(&self) -> PermissionState {
        let reported = if self.locator.is_supported() {
            self.locator.permission().await
        } else {
            PermissionState::Unknown
        };

        self.permission.send_if_modified(|current| {
            let next = match (*current, reported) {
                (PermissionState::Denied, _) => PermissionState::Denied,
                (_, reported) => reported,
            };
            std::mem::replace(current, next) != next
        });
        self.permission()
    }

    /// Try to locate the device without bothering the user.
    ///
    /// Only runs when permission is already granted. Failures are logged, never
    /// alerted.
    pub async fn auto_attempt(&self) -> Option<Coordinates> {
        self.phase.send_replace(GeolocationPhase::CheckingPermission);

        if !self.locator.is_supported() {
            tracing::debug!("Geolocation not supported, skipping silent attempt");
            self.phase.send_replace(GeolocationPhase::Blocked);
            return None;
        }

        let permission = self.refresh_permission().await;
        if permission != PermissionState::Granted {
            tracing::debug!("Location permission is {:?}, skipping silent attempt", permission);
            self.phase.send_replace(GeolocationPhase::Blocked);
            return None;
        }

        match self.request_position(self.max_cached_age).await {
            Ok(at) => {
                self.publish(at).await;
                Some(at)
            }
            Err(PositionFailure::Device(e)) => {
                tracing::warn!("Silent geolocation failed: {}", e);
                None
            }
            Err(PositionFailure::Invalid) => None,
        }
    }

    /// Locate the device because the user asked to. Device errors are alerted; an
    /// out-of-range fix is logged and returned as `Unavailable` without an alert.
    pub async fn explicit_attempt(&self) -> Result<Coordinates, PermissionError> {
        self.phase.send_replace(GeolocationPhase::CheckingPermission);

        let result = if self.locator.is_supported() {
            self.request_position(Duration::ZERO).await
        } else {
            self.fail(PermissionError::NotSupported);
            Err(PositionFailure::Device(PermissionError::NotSupported))
        };

        match result {
            Ok(at) => {
                self.permission.send_replace(PermissionState::Granted);
                self.publish(at).await;
                Ok(at)
            }
            Err(PositionFailure::Device(e)) => {
                tracing::warn!("Geolocation failed: {}", e);
                self.alerts.error(e.code().message());
                Err(e)
            }
            Err(PositionFailure::Invalid) => Err(PermissionError::Unavailable),
        }
    }

    async fn request_position(&self, maximum_age: Duration) -> Result<Coordinates, PositionFailure> {
        self.phase.send_replace(GeolocationPhase::AwaitingPosition);
        let options = PositionOptions {
            timeout: self.position_timeout,
            maximum_age,
        };

        let position = tokio::time::timeout(
            self.position_timeout,
            self.locator.current_position(options),
        )
        .await
        .unwrap_or(Err(PermissionError::Timeout));

        let position = match position {
            Ok(position) => position,
            Err(e) => {
                self.fail(e);
                return Err(PositionFailure::Device(e));
            }
        };

        match Coordinates::new(position.lat, position.lon) {
            Some(at) => Ok(at),
            None => {
                tracing::warn!(
                    "Discarding invalid device position ({}, {})",
                    position.lat,
                    position.lon
                );
                self.fail(PermissionError::Unavailable);
                Err(PositionFailure::Invalid)
            }
        }
    }

    fn fail(&self, err: PermissionError) {
        if err == PermissionError::Denied {
            self.permission.send_replace(PermissionState::Denied);
        }
        self.phase.send_replace(GeolocationPhase::Failed(err));
    }

    /// Clear, then set on a fresh tick, so dependents re-run even for identical
    /// coordinates.
    async fn publish(&self, at: Coordinates) {
        tracing::info!("Device located at ({}, {})", at.lat(), at.lon());
        self.coordinates.send_replace(None);
        tokio::task::yield_now().await;
        self.coordinates.send_replace(Some(at));
        self.phase.send_replace(GeolocationPhase::Resolved(at));
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.borrow()
    }

    pub fn subscribe_permission(&self) -> watch::Receiver<PermissionState> {
        self.permission.subscribe()
    }

    pub fn phase(&self) -> GeolocationPhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<GeolocationPhase> {
        self.phase.subscribe()
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        *self.coordinates.borrow()
    }

    pub fn subscribe_coordinates(&self) -> watch::Receiver<Option<Coordinates>> {
        self.coordinates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use wxhist_core::ErrorCode;

    struct FakeLocator {
        supported: bool,
        permission: PermissionState,
        result: Result<Position, PermissionError>,
        delay: Duration,
        requests: Mutex<Vec<PositionOptions>>,
    }

    impl FakeLocator {
        fn at(lat: f64, lon: f64, permission: PermissionState) -> Self {
            Self {
                supported: true,
                permission,
                result: Ok(Position { lat, lon }),
                delay: Duration::ZERO,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: PermissionError, permission: PermissionState) -> Self {
            Self {
                result: Err(err),
                ..Self::at(0.0, 0.0, permission)
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    impl DeviceLocator for FakeLocator {
        fn is_supported(&self) -> bool {
            self.supported
        }

        async fn permission(&self) -> PermissionState {
            self.permission
        }

        async fn current_position(
            &self,
            options: PositionOptions,
        ) -> Result<Position, PermissionError> {
            self.requests.lock().push(options);
            tokio::time::sleep(self.delay).await;
            self.result
        }
    }

    type Harness = (GeolocationResolver<FakeLocator>, Arc<FakeLocator>, AlertChannel);

    fn resolver(locator: FakeLocator) -> Harness {
        let locator = Arc::new(locator);
        let alerts = AlertChannel::new();
        (
            GeolocationResolver::new(Arc::clone(&locator), alerts.clone()),
            locator,
            alerts,
        )
    }

    #[tokio::test]
    async fn test_auto_attempt_when_granted() {
        let (geo, locator, alerts) =
            resolver(FakeLocator::at(51.5, -0.12, PermissionState::Granted));

        let at = geo.auto_attempt().await.unwrap();

        assert_eq!((at.lat(), at.lon()), (51.5, -0.12));
        assert_eq!(geo.coordinates(), Some(at));
        assert_eq!(geo.phase(), GeolocationPhase::Resolved(at));
        assert_eq!(
            locator.requests.lock()[0].maximum_age,
            Duration::from_secs(300)
        );
        assert!(alerts.current().is_none());
    }

    #[tokio::test]
    async fn test_auto_attempt_is_noop_without_grant() {
        for permission in [
            PermissionState::Prompt,
            PermissionState::Denied,
            PermissionState::Unknown,
        ] {
            let (geo, locator, alerts) = resolver(FakeLocator::at(51.5, -0.12, permission));

            assert_eq!(geo.auto_attempt().await, None);
            assert_eq!(locator.request_count(), 0);
            assert_eq!(geo.phase(), GeolocationPhase::Blocked);
            assert!(alerts.current().is_none());
        }
    }

    #[tokio::test]
    async fn test_auto_attempt_failure_is_silent() {
        let (geo, _locator, alerts) = resolver(FakeLocator::failing(
            PermissionError::Unavailable,
            PermissionState::Granted,
        ));

        assert_eq!(geo.auto_attempt().await, None);
        assert_eq!(geo.phase(), GeolocationPhase::Failed(PermissionError::Unavailable));
        assert_eq!(alerts.shown_count(), 0);
        assert_eq!(geo.coordinates(), None);
    }

    #[tokio::test]
    async fn test_explicit_attempt_grants_permission() {
        let (geo, locator, alerts) =
            resolver(FakeLocator::at(48.85, 2.35, PermissionState::Prompt));

        let at = geo.explicit_attempt().await.unwrap();

        assert_eq!(at.lat(), 48.85);
        assert_eq!(geo.permission(), PermissionState::Granted);
        assert_eq!(locator.requests.lock()[0].maximum_age, Duration::ZERO);
        assert!(alerts.current().is_none());
    }

    #[tokio::test]
    async fn test_denied_is_alerted_and_sticky() {
        let (geo, _locator, alerts) = resolver(FakeLocator::failing(
            PermissionError::Denied,
            PermissionState::Prompt,
        ));

        assert_eq!(geo.explicit_attempt().await, Err(PermissionError::Denied));
        assert_eq!(geo.permission(), PermissionState::Denied);
        assert_eq!(
            alerts.current().unwrap().message,
            ErrorCode::PermissionDenied.message()
        );

        // The platform reporting "prompt" again does not lift the denial.
        assert_eq!(geo.refresh_permission().await, PermissionState::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_request_times_out() {
        let mut locator = FakeLocator::at(1.0, 1.0, PermissionState::Granted);
        locator.delay = Duration::from_secs(30);
        let (geo, _locator, alerts) = resolver(locator);

        assert_eq!(geo.explicit_attempt().await, Err(PermissionError::Timeout));
        assert_eq!(alerts.current().unwrap().message, ErrorCode::Timeout.message());
        assert_eq!(geo.phase(), GeolocationPhase::Failed(PermissionError::Timeout));
    }

    #[tokio::test]
    async fn test_invalid_device_position_is_discarded() {
        let (geo, _locator, alerts) =
            resolver(FakeLocator::at(120.0, 0.0, PermissionState::Granted));

        assert_eq!(geo.auto_attempt().await, None);
        assert_eq!(geo.coordinates(), None);
        assert_eq!(alerts.shown_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_position_on_explicit_attempt_is_not_alerted() {
        let (geo, _locator, alerts) =
            resolver(FakeLocator::at(120.0, 0.0, PermissionState::Prompt));

        assert_eq!(geo.explicit_attempt().await, Err(PermissionError::Unavailable));
        assert_eq!(geo.coordinates(), None);
        assert_eq!(geo.phase(), GeolocationPhase::Failed(PermissionError::Unavailable));
        assert_eq!(geo.permission(), PermissionState::Prompt);
        assert!(alerts.current().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_platform() {
        let alerts = AlertChannel::new();
        let geo = GeolocationResolver::new(Arc::new(SystemLocator), alerts.clone());

        assert_eq!(geo.auto_attempt().await, None);
        assert!(alerts.current().is_none());

        assert_eq!(geo.explicit_attempt().await, Err(PermissionError::NotSupported));
        assert_eq!(
            alerts.current().unwrap().message,
            ErrorCode::NotSupported.message()
        );
    }

    #[tokio::test]
    async fn test_identical_coordinates_notify_again() {
        let (geo, _locator, _alerts) =
            resolver(FakeLocator::at(51.5, -0.12, PermissionState::Granted));
        let mut rx = geo.subscribe_coordinates();

        geo.auto_attempt().await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        geo.auto_attempt().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_some());
    }
}
