//! Where is the user?
//!
//! A [`LocationProvider`] answers one position request at a time.
//! [`Geolocation`] tracks the last known fix and the last error, and runs at
//! most one request concurrently so that the dashboard loop can keep serving
//! other events while a lookup is in flight.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::QuakeError;
use crate::models::Coordinates;

/// Default endpoint for IP based lookups.
pub const DEFAULT_IP_LOCATOR_URL: &str = "http://ip-api.com/json";

/// Knobs passed to the location source on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Accept a cached fix up to this old
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

/// Anything that can answer "where am I?".
pub trait LocationProvider: Send + Sync + 'static {
    fn current_position(
        &self,
        options: PositionOptions,
    ) -> impl Future<Output = Result<Coordinates, QuakeError>> + Send;
}

/// Location sources selectable from the command line.
#[derive(Debug)]
pub enum LocationSource {
    /// A fixed point given by the user
    Fixed(Coordinates),
    /// Coarse lookup based on the public IP address
    Ip(IpLocator),
    /// Location disabled
    Unsupported,
}

impl LocationProvider for LocationSource {
    async fn current_position(&self, options: PositionOptions) -> Result<Coordinates, QuakeError> {
        match self {
            Self::Fixed(coords) => Ok(*coords),
            Self::Ip(locator) => locator.current_position(options).await,
            Self::Unsupported => Err(QuakeError::Geolocation(
                "Geolocation is not supported".into(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

/// IP geolocation over HTTP, expecting an `ip-api.com` style JSON body.
#[derive(Debug)]
pub struct IpLocator {
    client: Client,
    url: String,
    cached: Mutex<Option<(Instant, Coordinates)>>,
}

impl IpLocator {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(url: impl Into<String>) -> Result<Self, QuakeError> {
        let client = Client::builder()
            .user_agent(concat!("quakewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            cached: Mutex::new(None),
        })
    }

    fn cached_fix(&self, maximum_age: Duration) -> Option<Coordinates> {
        let cached = self.cached.lock().ok()?;
        cached
            .filter(|(at, _)| at.elapsed() <= maximum_age)
            .map(|(_, coords)| coords)
    }

    fn remember(&self, coords: Coordinates) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some((Instant::now(), coords));
        }
    }

    async fn current_position(&self, options: PositionOptions) -> Result<Coordinates, QuakeError> {
        if let Some(coords) = self.cached_fix(options.maximum_age) {
            debug!("using cached position");
            return Ok(coords);
        }
        if options.high_accuracy {
            debug!("high accuracy requested; IP lookup is city-level at best");
        }

        let response = self
            .client
            .get(&self.url)
            .timeout(options.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuakeError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let lookup: IpLookup = response.json().await?;
        let coords = parse_lookup(lookup)?;
        self.remember(coords);
        Ok(coords)
    }
}

fn parse_lookup(lookup: IpLookup) -> Result<Coordinates, QuakeError> {
    if lookup.status.as_deref().is_some_and(|s| s != "success") {
        return Err(QuakeError::Geolocation(
            lookup.message.unwrap_or_else(|| "lookup failed".into()),
        ));
    }
    match (lookup.lat, lookup.lon) {
        (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
        _ => Err(QuakeError::Geolocation("response had no coordinates".into())),
    }
}

/// Last known position plus the request currently in flight, if any.
#[derive(Debug)]
pub struct Geolocation<P> {
    provider: Arc<P>,
    options: PositionOptions,
    location: Option<Coordinates>,
    error: Option<String>,
    in_flight: Option<JoinHandle<Result<Coordinates, QuakeError>>>,
}

impl<P: LocationProvider> Geolocation<P> {
    #[must_use]
    pub fn new(provider: P, options: PositionOptions) -> Self {
        Self {
            provider: Arc::new(provider),
            options,
            location: None,
            error: None,
            in_flight: None,
        }
    }

    #[must_use]
    pub fn location(&self) -> Option<Coordinates> {
        self.location
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a position request unless one is already running.
    pub fn request_location(&mut self) {
        if self.in_flight.is_some() {
            debug!("location request already in flight");
            return;
        }

        self.error = None;
        let provider = Arc::clone(&self.provider);
        let options = self.options;
        self.in_flight = Some(tokio::spawn(async move {
            provider.current_position(options).await
        }));
    }

    /// Wait for the in-flight request and record its outcome.
    ///
    /// Never resolves while nothing is in flight, which makes it suitable as
    /// a `select!` branch. Returns `true` when the location changed.
    pub async fn settle(&mut self) -> bool {
        let Some(handle) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let joined = handle.await;
        self.in_flight = None;

        let result = joined.unwrap_or_else(|e| Err(QuakeError::Geolocation(e.to_string())));
        self.apply(result)
    }

    /// Request and wait in one go.
    pub async fn locate(&mut self) -> Option<Coordinates> {
        self.request_location();
        self.settle().await;
        self.location
    }

    fn apply(&mut self, result: Result<Coordinates, QuakeError>) -> bool {
        match result {
            Ok(coords) => {
                info!(lat = coords.latitude, lon = coords.longitude, "location acquired");
                let changed = self.location != Some(coords);
                self.location = Some(coords);
                self.error = None;
                changed
            }
            Err(e) => {
                let message = format!("Unable to retrieve your location: {e}");
                warn!("{message}");
                self.error = Some(message);
                false
            }
        }
    }
}

impl<P> Drop for Geolocation<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedProvider {
        answers: Mutex<VecDeque<Result<Coordinates, QuakeError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<Coordinates, QuakeError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LocationProvider for ScriptedProvider {
        async fn current_position(&self, _options: PositionOptions) -> Result<Coordinates, QuakeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(QuakeError::Geolocation("exhausted".into())))
        }
    }

    #[tokio::test]
    async fn test_fixed_location() {
        let here = Coordinates::new(13.75, 100.5);
        let mut geo = Geolocation::new(LocationSource::Fixed(here), PositionOptions::default());

        assert_eq!(geo.locate().await, Some(here));
        assert!(geo.error().is_none());
        assert!(!geo.is_loading());
    }

    #[tokio::test]
    async fn test_unsupported_reports_error() {
        let mut geo = Geolocation::new(LocationSource::Unsupported, PositionOptions::default());

        assert_eq!(geo.locate().await, None);
        assert_eq!(
            geo.error(),
            Some("Unable to retrieve your location: Geolocation is not supported")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_fix() {
        let here = Coordinates::new(1.0, 2.0);
        let provider = ScriptedProvider::new(vec![
            Ok(here),
            Err(QuakeError::Geolocation("User denied Geolocation".into())),
        ]);
        let mut geo = Geolocation::new(provider, PositionOptions::default());

        assert_eq!(geo.locate().await, Some(here));
        assert_eq!(geo.locate().await, Some(here));
        assert_eq!(
            geo.error(),
            Some("Unable to retrieve your location: User denied Geolocation")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_request_in_flight() {
        let provider = ScriptedProvider::new(vec![Ok(Coordinates::new(0.0, 0.0))]);
        let mut geo = Geolocation::new(provider, PositionOptions::default());

        geo.request_location();
        geo.request_location();
        assert!(geo.is_loading());
        assert!(geo.settle().await);

        assert_eq!(geo.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_lookup() {
        let ok: IpLookup = serde_json::from_str(r#"{"status":"success","lat":13.7,"lon":100.5}"#).unwrap();
        assert_eq!(parse_lookup(ok).unwrap(), Coordinates::new(13.7, 100.5));

        let failed: IpLookup =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert_eq!(parse_lookup(failed).unwrap_err().to_string(), "private range");
    }

    #[test]
    fn test_default_options() {
        let options = PositionOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.maximum_age, Duration::from_secs(60));
    }
}
