//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::client::FeedType;
use crate::dashboard::ViewSettings;
use crate::errors::QuakeError;
use crate::filters::{DateRange, FilterOptions, MagnitudeRange, SortOption};
use crate::geolocation::{DEFAULT_IP_LOCATOR_URL, IpLocator, LocationSource};
use crate::models::{Coordinates, ImpactLevel};
use crate::output::Format;
use crate::polling::DEFAULT_POLL_INTERVAL;

/// Lower bound for the poll interval in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Earthquake dashboard: live USGS feed, local history, map and list views.
#[derive(Parser, Debug)]
#[command(name = "quakewatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Directory holding the local earthquake history
    #[arg(long, global = true, env = "QUAKEWATCH_DATA_DIR", default_value = ".quakewatch")]
    pub data_dir: PathBuf,

    /// Keep history in memory only
    #[arg(long, global = true)]
    pub no_cache: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch once, merge into the local history and print the list
    List(ListArgs),

    /// Follow the feed in the terminal
    Watch(WatchArgs),

    /// Start the web dashboard
    Ui(UiArgs),
}

/// Where to fetch from.
#[derive(Args, Debug, Clone)]
pub struct FeedArgs {
    /// Feed type to fetch
    #[arg(long, default_value = "all_day", value_parser = parse_feed_type)]
    pub feed: FeedType,

    /// Full feed URL, overriding --feed
    #[arg(long)]
    pub url: Option<String>,
}

/// Filter and sort options shared by every view.
#[derive(Args, Debug, Clone)]
pub struct ViewArgs {
    /// Minimum magnitude to show
    #[arg(long)]
    pub min_magnitude: Option<f64>,

    /// Maximum magnitude to show
    #[arg(long)]
    pub max_magnitude: Option<f64>,

    /// Impact level to show (repeatable: minor, moderate, major, severe)
    #[arg(long = "impact", value_parser = parse_impact)]
    pub impact: Vec<ImpactLevel>,

    /// Minimum distance from your location in km
    #[arg(long)]
    pub min_distance: Option<f64>,

    /// Earliest date to show (YYYY-MM-DD, UTC)
    #[arg(long)]
    pub since: Option<NaiveDate>,

    /// Latest date to show (YYYY-MM-DD, UTC, inclusive)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Sort order: time-desc, time-asc, mag-desc, mag-asc, distance-asc
    #[arg(long, default_value = "time-desc", value_parser = parse_sort)]
    pub sort: SortOption,
}

impl ViewArgs {
    #[must_use]
    pub fn settings(&self) -> ViewSettings {
        let defaults = MagnitudeRange::default();
        let filters = FilterOptions {
            date_range: DateRange {
                start: self.since.and_then(start_of_day),
                end: self.until.and_then(end_of_day),
            },
            impact_levels: self.impact.iter().copied().collect(),
            min_distance: self.min_distance,
            magnitude_range: MagnitudeRange::new(
                self.min_magnitude.unwrap_or(defaults.min),
                self.max_magnitude.unwrap_or(defaults.max),
            ),
        };

        ViewSettings {
            filters,
            sort: self.sort,
        }
    }
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|t| t.and_utc())
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_milli_opt(23, 59, 59, 999).map(|t| t.and_utc())
}

/// How the user's position is found.
#[derive(Args, Debug, Clone)]
pub struct LocationArgs {
    /// Use a fixed position: lat,lon
    #[arg(long, value_parser = parse_coordinates, conflicts_with = "no_location")]
    pub location: Option<Coordinates>,

    /// Do not look up your position
    #[arg(long)]
    pub no_location: bool,

    /// IP geolocation endpoint used when --location is not given
    #[arg(long, default_value = DEFAULT_IP_LOCATOR_URL)]
    pub locator_url: String,
}

impl LocationArgs {
    /// # Errors
    ///
    /// Returns an error if the IP locator's HTTP client cannot be built.
    pub fn source(&self) -> Result<LocationSource, QuakeError> {
        if self.no_location {
            return Ok(LocationSource::Unsupported);
        }
        match self.location {
            Some(coords) => Ok(LocationSource::Fixed(coords)),
            None => Ok(LocationSource::Ip(IpLocator::new(self.locator_url.clone())?)),
        }
    }
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub view: ViewArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Maximum number of events to show
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `watch` command.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub view: ViewArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Poll interval in seconds (minimum 30)
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,

    /// How many already-known events to print on startup
    #[arg(long, default_value = "20")]
    pub backlog: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub view: ViewArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Poll interval in seconds (minimum 30)
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Parse a feed type from string.
fn parse_feed_type(s: &str) -> Result<FeedType, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

fn parse_sort(s: &str) -> Result<SortOption, String> {
    s.parse()
}

fn parse_impact(s: &str) -> Result<ImpactLevel, String> {
    s.parse()
}

fn parse_coordinates(s: &str) -> Result<Coordinates, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_defaults() {
        let cli = Cli::try_parse_from(["quakewatch", "list"]).unwrap();
        assert!(!cli.no_cache);

        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.feed.feed, FeedType::AllDay);
        assert_eq!(args.view.sort, SortOption::TimeDesc);
        assert_eq!(args.limit, 50);

        let settings = args.view.settings();
        assert_eq!(settings.filters, FilterOptions::default());
    }

    #[test]
    fn test_view_settings_from_flags() {
        let cli = Cli::try_parse_from([
            "quakewatch",
            "watch",
            "--impact",
            "major",
            "--impact",
            "severe",
            "--min-magnitude",
            "7",
            "--max-magnitude",
            "6",
            "--since",
            "2024-03-01",
            "--until",
            "2024-03-02",
            "--sort",
            "magnitude-desc",
        ])
        .unwrap();

        let Command::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.poll_interval, 360);

        let settings = args.view.settings();
        assert_eq!(settings.sort, SortOption::MagnitudeDesc);
        assert_eq!(settings.filters.impact_levels.len(), 2);
        assert!((settings.filters.magnitude_range.min - 6.0).abs() < f64::EPSILON);

        let range = settings.filters.date_range;
        assert_eq!(range.start.unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(range.end.unwrap().timestamp_millis() - range.start.unwrap().timestamp_millis(), 2 * 86_400_000 - 1);
    }

    #[test]
    fn test_location_flags() {
        let cli = Cli::try_parse_from(["quakewatch", "ui", "--location", "13.75,100.5"]).unwrap();
        let Command::Ui(args) = cli.command else {
            panic!("expected ui");
        };
        assert!(matches!(
            args.location.source().unwrap(),
            LocationSource::Fixed(c) if c == Coordinates::new(13.75, 100.5)
        ));

        let cli = Cli::try_parse_from(["quakewatch", "list", "--no-location"]).unwrap();
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert!(matches!(args.location.source().unwrap(), LocationSource::Unsupported));

        assert!(Cli::try_parse_from(["quakewatch", "list", "--location", "1,2", "--no-location"]).is_err());
        assert!(Cli::try_parse_from(["quakewatch", "list", "--impact", "catastrophic"]).is_err());
    }
}
