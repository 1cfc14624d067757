//! USGS earthquake feed client.
//!
//! Provides async HTTP access to USGS summary feeds.
//! Uses reqwest with rustls for TLS.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use crate::errors::QuakeError;

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakewatch/", env!("CARGO_PKG_VERSION"));

/// USGS base URL for earthquake feeds.
const USGS_BASE_URL: &str = "https://earthquake.usgs.gov";

/// Available feed types for summary feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedType {
    AllHour,
    AllDay,
    AllWeek,
    AllMonth,
    Mag1Hour,
    Mag1Day,
    Mag1Week,
    Mag1Month,
    Mag25Hour,
    Mag25Day,
    Mag25Week,
    Mag25Month,
    Mag45Hour,
    Mag45Day,
    Mag45Week,
    Mag45Month,
    SignificantHour,
    SignificantDay,
    SignificantWeek,
    SignificantMonth,
}

impl FeedType {
    /// Get the URL path segment for this feed type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AllHour => "all_hour",
            Self::AllDay => "all_day",
            Self::AllWeek => "all_week",
            Self::AllMonth => "all_month",
            Self::Mag1Hour => "1.0_hour",
            Self::Mag1Day => "1.0_day",
            Self::Mag1Week => "1.0_week",
            Self::Mag1Month => "1.0_month",
            Self::Mag25Hour => "2.5_hour",
            Self::Mag25Day => "2.5_day",
            Self::Mag25Week => "2.5_week",
            Self::Mag25Month => "2.5_month",
            Self::Mag45Hour => "4.5_hour",
            Self::Mag45Day => "4.5_day",
            Self::Mag45Week => "4.5_week",
            Self::Mag45Month => "4.5_month",
            Self::SignificantHour => "significant_hour",
            Self::SignificantDay => "significant_day",
            Self::SignificantWeek => "significant_week",
            Self::SignificantMonth => "significant_month",
        }
    }

    /// Full GeoJSON URL for this feed on the given host.
    #[must_use]
    pub fn url(self, base_url: &str) -> String {
        format!(
            "{}/earthquakes/feed/v1.0/summary/{}.geojson",
            base_url.trim_end_matches('/'),
            self.as_str()
        )
    }
}

impl std::str::FromStr for FeedType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all_hour" => Ok(Self::AllHour),
            "all_day" => Ok(Self::AllDay),
            "all_week" => Ok(Self::AllWeek),
            "all_month" => Ok(Self::AllMonth),
            "1.0_hour" => Ok(Self::Mag1Hour),
            "1.0_day" => Ok(Self::Mag1Day),
            "1.0_week" => Ok(Self::Mag1Week),
            "1.0_month" => Ok(Self::Mag1Month),
            "2.5_hour" => Ok(Self::Mag25Hour),
            "2.5_day" => Ok(Self::Mag25Day),
            "2.5_week" => Ok(Self::Mag25Week),
            "2.5_month" => Ok(Self::Mag25Month),
            "4.5_hour" => Ok(Self::Mag45Hour),
            "4.5_day" => Ok(Self::Mag45Day),
            "4.5_week" => Ok(Self::Mag45Week),
            "4.5_month" => Ok(Self::Mag45Month),
            "significant_hour" => Ok(Self::SignificantHour),
            "significant_day" => Ok(Self::SignificantDay),
            "significant_week" => Ok(Self::SignificantWeek),
            "significant_month" => Ok(Self::SignificantMonth),
            _ => Err(format!("unknown feed type: {s}")),
        }
    }
}

/// Anything that can produce one raw JSON payload per call.
///
/// The poller is generic over this so that tests can drive it without a
/// network.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<serde_json::Value, QuakeError>> + Send;
}

/// HTTP client for a single JSON feed URL.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    /// Create a client for one of the USGS summary feeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn for_feed(feed_type: FeedType) -> Result<Self, QuakeError> {
        Self::new(feed_type.url(USGS_BASE_URL))
    }

    /// Create a client for an arbitrary feed URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(url: impl Into<String>) -> Result<Self, QuakeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the feed once and parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the status is not a success,
    /// or the body is not JSON.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn fetch_json(&self) -> Result<serde_json::Value, QuakeError> {
        debug!("fetching feed");

        let response = self.client.get(&self.url).send().await?;

        // Check status before parsing
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuakeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let bytes = response.bytes().await?;
        let payload: serde_json::Value = serde_json::from_slice(&bytes)?;

        debug!(bytes = bytes.len(), "fetched feed");
        Ok(payload)
    }
}

impl FeedSource for FeedClient {
    async fn fetch(&self) -> Result<serde_json::Value, QuakeError> {
        self.fetch_json().await
    }
}
