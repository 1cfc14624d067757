//! quakewatch - Earthquake dashboard for the USGS live feed.
//!
//! Polls a GeoJSON feed, keeps a year of history on disk, and shows it as a
//! terminal list or a browser map with filters.

use std::collections::HashSet;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod cli;
mod client;
mod dashboard;
mod debounce;
mod errors;
mod filters;
mod geo;
mod geolocation;
mod map;
mod models;
mod output;
mod pipeline;
mod polling;
mod server;
mod store;

use cli::{Cli, Command, FeedArgs, MIN_POLL_INTERVAL_SECS};
use client::FeedClient;
use dashboard::{Dashboard, DashboardHandle, DashboardSnapshot, ViewSettings};
use geolocation::{Geolocation, LocationSource, PositionOptions};
use pipeline::EventPipeline;
use polling::Poller;
use store::{FileStore, KeyValueStore, MemoryStore};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let store = open_store(&cli)?;

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async move {
            match cli.command {
                Command::List(args) => cmd_list(args, store).await,
                Command::Watch(args) => cmd_watch(args, store).await,
                Command::Ui(args) => cmd_ui(args, store).await,
            }
        })
}

/// Initialize tracing subscriber.
///
/// `--quiet` and `--verbose` win over `RUST_LOG`.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn open_store(cli: &Cli) -> Result<Arc<dyn KeyValueStore>> {
    if cli.no_cache {
        info!("history kept in memory only");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = FileStore::open(&cli.data_dir)
        .with_context(|| format!("failed to open data directory {}", cli.data_dir.display()))?;
    Ok(Arc::new(store))
}

fn feed_client(args: &FeedArgs) -> Result<FeedClient> {
    let client = match &args.url {
        Some(url) => FeedClient::new(url.clone()),
        None => FeedClient::for_feed(args.feed),
    };
    client.context("failed to create feed client")
}

fn poll_interval(secs: u64) -> Duration {
    let clamped = secs.max(MIN_POLL_INTERVAL_SECS);
    if clamped != secs {
        warn!("poll interval clamped to minimum of {MIN_POLL_INTERVAL_SECS} seconds");
    }
    Duration::from_secs(clamped)
}

/// Flips to `true` on the first Ctrl+C. Every subscriber observes it, and
/// callers may flip it themselves to stop early.
fn shutdown_signal() -> Arc<watch::Sender<bool>> {
    let tx = Arc::new(watch::Sender::new(false));
    let signal = Arc::clone(&tx);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("shutdown requested");
        signal.send_replace(true);
    });
    tx
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Build a dashboard and its poller, with the dashboard loop running until
/// `shutdown` fires.
fn start_dashboard(
    store: Arc<dyn KeyValueStore>,
    client: FeedClient,
    location: LocationSource,
    settings: ViewSettings,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> (DashboardHandle, Poller, tokio::task::JoinHandle<()>) {
    let pipeline = EventPipeline::restore(store);
    let geolocation = Geolocation::new(location, PositionOptions::default());
    let (dashboard, handle) = Dashboard::new(pipeline, geolocation, settings);

    info!(url = client.url(), interval_secs = interval.as_secs(), "starting poller");
    let poller = Poller::start(Arc::new(client), interval);
    let task = tokio::spawn(dashboard.run(poller.subscribe(), wait_for_shutdown(shutdown)));

    (handle, poller, task)
}

/// Execute the `list` command - one fetch, merged into the local history.
async fn cmd_list(args: cli::ListArgs, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let client = feed_client(&args.feed)?;
    let settings = args.view.settings();

    let mut pipeline = EventPipeline::restore(store);
    if let Some(removed) = pipeline.prune_if_due(Utc::now()).await {
        info!(removed, "pruned events older than a year");
    }

    let user_location = if args.location.no_location {
        None
    } else {
        let source = args.location.source().context("failed to set up geolocation")?;
        Geolocation::new(source, PositionOptions::default()).locate().await
    };

    let fetched = client.fetch_json().await;
    let error = match &fetched {
        Ok(payload) => {
            let added = pipeline.ingest(payload, user_location);
            info!(added, total = pipeline.len(), "merged feed");
            None
        }
        Err(e) if pipeline.is_empty() => {
            warn!("fetch failed and no stored history: {e}");
            Some(e.to_string())
        }
        Err(e) => {
            warn!("fetch failed, showing stored history: {e}");
            Some(e.to_string())
        }
    };

    let mut events = pipeline.display(&settings.filters, settings.sort);
    events.truncate(args.limit);

    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if args.format == output::Format::Human {
            output::write_header(&mut handle, error.is_none(), error.as_deref())?;
        }
        output::write_events(&mut handle, &events, args.format)?;
    }

    pipeline.shutdown().await;
    Ok(())
}

/// Execute the `watch` command - live terminal view.
async fn cmd_watch(args: cli::WatchArgs, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let client = feed_client(&args.feed)?;
    let location = args.location.source().context("failed to set up geolocation")?;
    let interval = poll_interval(args.poll_interval);

    // Print startup banner
    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "\x1b[1m🌍 quakewatch\x1b[0m")?;
        writeln!(
            handle,
            "\x1b[2mFeed: {} | Poll: {}s | Press Ctrl+C to stop\x1b[0m",
            client.url(),
            interval.as_secs()
        )?;
    }

    let shutdown = shutdown_signal();
    let (handle, poller, task) = start_dashboard(
        store,
        client,
        location,
        args.view.settings(),
        interval,
        shutdown.subscribe(),
    );

    let mut snapshots = handle.subscribe();
    let mut printer = ListPrinter::new(args.format, args.backlog);

    // Ends once the dashboard loop exits and drops its sender.
    while snapshots.changed().await.is_ok() {
        let snapshot = Arc::clone(&snapshots.borrow_and_update());
        if let Err(e) = printer.print(&snapshot) {
            warn!("failed to write events: {e}");
        }
    }

    poller.stop();
    task.await.context("dashboard task failed")?;
    Ok(())
}

/// Tracks what has already been printed by `watch`.
struct ListPrinter {
    format: output::Format,
    backlog: usize,
    printed: HashSet<String>,
    connection: Option<(bool, Option<String>)>,
    primed: bool,
}

impl ListPrinter {
    fn new(format: output::Format, backlog: usize) -> Self {
        Self {
            format,
            backlog,
            printed: HashSet::new(),
            connection: None,
            primed: false,
        }
    }

    fn print(&mut self, snapshot: &DashboardSnapshot) -> io::Result<()> {
        if snapshot.is_loading {
            return Ok(());
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();

        let connection = (snapshot.is_connected, snapshot.error.clone());
        if self.format == output::Format::Human && self.connection.as_ref() != Some(&connection) {
            output::write_header(&mut out, connection.0, connection.1.as_deref())?;
            self.connection = Some(connection);
        }

        let mut fresh: Vec<_> = snapshot
            .events
            .iter()
            .filter(|e| !self.printed.contains(&e.id))
            .cloned()
            .collect();
        fresh.sort_by_key(|e| e.time);

        if !self.primed {
            self.primed = true;
            // Everything in the first frame counts as printed, shown or not.
            self.printed.extend(fresh.iter().map(|e| e.id.clone()));
            let skip = fresh.len().saturating_sub(self.backlog);
            fresh.drain(..skip);
            if fresh.is_empty() && self.format == output::Format::Human {
                output::write_human(&mut out, &fresh)?;
            }
        } else {
            self.printed.extend(fresh.iter().map(|e| e.id.clone()));
        }

        if !fresh.is_empty() {
            output::write_events(&mut out, &fresh, self.format)?;
        }
        out.flush()
    }
}

/// Execute the `ui` command - start the web dashboard.
async fn cmd_ui(args: cli::UiArgs, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let client = feed_client(&args.feed)?;
    let location = args.location.source().context("failed to set up geolocation")?;
    let interval = poll_interval(args.poll_interval);
    let settings = args.view.settings();
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
    };

    // Print startup message
    let url = format!("http://{}", config.addr());
    println!("\x1b[1m🌍 quakewatch Web UI\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!("  Feed:    {}", client.url());
    println!("  Poll:    {}s", interval.as_secs());
    println!("  Sort:    {}", settings.sort.as_str());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    let shutdown = shutdown_signal();
    let (handle, poller, task) = start_dashboard(
        store,
        client,
        location,
        settings,
        interval,
        shutdown.subscribe(),
    );

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    let served = server::run_server(config, handle, wait_for_shutdown(shutdown.subscribe())).await;

    // The server may have failed to bind; stop the dashboard either way.
    shutdown.send_replace(true);
    poller.stop();
    task.await.context("dashboard task failed")?;
    served
}
