//! The dashboard loop.
//!
//! [`Dashboard`] is the only owner of the event pipeline, the user location
//! and the view settings. Everything else talks to it through a
//! [`DashboardHandle`]: commands go in over an mpsc channel, and every state
//! change is published as a fresh [`DashboardSnapshot`] on a watch channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::errors::QuakeError;
use crate::filters::{FilterOptions, SortOption};
use crate::geolocation::{Geolocation, LocationProvider};
use crate::map::{MapCamera, MarkerDescriptor, markers};
use crate::models::{Coordinates, EarthquakeEvent};
use crate::pipeline::EventPipeline;
use crate::polling::PollStatus;

/// How often the loop checks whether a retention prune is due.
pub const PRUNE_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

const COMMAND_BUFFER: usize = 32;

/// User actions forwarded from the views.
#[derive(Debug, Clone)]
pub enum Command {
    SetFilters(FilterOptions),
    SetSort(SortOption),
    /// Select an event by id, or clear the selection
    Select(Option<String>),
    RequestLocation,
}

/// Filter and sort state the dashboard starts with.
#[derive(Debug, Clone, Default)]
pub struct ViewSettings {
    pub filters: FilterOptions,
    pub sort: SortOption,
}

/// Everything a view needs to render one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Increases on every publish
    pub revision: u64,
    pub is_loading: bool,
    pub is_connected: bool,
    pub error: Option<String>,
    pub user_location: Option<Coordinates>,
    pub location_error: Option<String>,
    pub locating: bool,
    pub filters: FilterOptions,
    pub sort: SortOption,
    pub selected: Option<String>,
    /// Size of the accumulated set
    pub total: usize,
    /// The display set
    pub events: Vec<EarthquakeEvent>,
    pub markers: Vec<MarkerDescriptor>,
    pub camera: MapCamera,
}

/// Cheap, cloneable access to a running dashboard.
#[derive(Debug, Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl DashboardHandle {
    /// Forward a command to the loop.
    ///
    /// # Errors
    ///
    /// Returns [`QuakeError::DashboardClosed`] if the loop has exited.
    pub async fn send(&self, command: Command) -> Result<(), QuakeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| QuakeError::DashboardClosed)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshots.clone()
    }
}

pub struct Dashboard<P> {
    pipeline: EventPipeline,
    geolocation: Geolocation<P>,
    filters: FilterOptions,
    sort: SortOption,
    selected: Option<String>,
    camera: MapCamera,
    poll: PollStatus,
    display: Vec<EarthquakeEvent>,
    display_source: Option<Arc<Vec<EarthquakeEvent>>>,
    display_stale: bool,
    revision: u64,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Arc<DashboardSnapshot>>,
}

impl<P: LocationProvider> Dashboard<P> {
    pub fn new(
        pipeline: EventPipeline,
        geolocation: Geolocation<P>,
        settings: ViewSettings,
    ) -> (Self, DashboardHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let camera = MapCamera::initial(geolocation.location());

        let mut dashboard = Self {
            pipeline,
            geolocation,
            filters: settings.filters,
            sort: settings.sort,
            selected: None,
            camera,
            poll: PollStatus::default(),
            display: Vec::new(),
            display_source: None,
            display_stale: true,
            revision: 0,
            commands: command_rx,
            snapshots: watch::Sender::new(Arc::new(empty_snapshot(camera))),
        };
        dashboard.publish();

        let handle = DashboardHandle {
            commands: command_tx,
            snapshots: dashboard.snapshots.subscribe(),
        };
        (dashboard, handle)
    }

    /// Run until `shutdown` resolves, then flush and return.
    ///
    /// Requests the user location and runs a prune check before entering
    /// the loop.
    pub async fn run(
        mut self,
        mut poll: watch::Receiver<PollStatus>,
        shutdown: impl Future<Output = ()>,
    ) {
        self.geolocation.request_location();
        if let Some(removed) = self.pipeline.prune_if_due(Utc::now()).await {
            info!(removed, "pruned events older than a year");
        }
        self.publish();

        let mut prune_check = tokio::time::interval_at(
            tokio::time::Instant::now() + PRUNE_CHECK_INTERVAL,
            PRUNE_CHECK_INTERVAL,
        );
        prune_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut poll_open = true;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                changed = poll.changed(), if poll_open => {
                    if changed.is_err() {
                        warn!("poller stopped; no further updates");
                        poll_open = false;
                        continue;
                    }
                    let status = poll.borrow_and_update().clone();
                    self.on_poll(status);
                }
                _ = self.geolocation.settle() => {
                    debug!(location = ?self.geolocation.location(), "location request settled");
                }
                Some(command) = self.commands.recv() => self.apply(command),
                _ = prune_check.tick() => {
                    debug!(last_prune_ms = self.pipeline.last_prune_ms(), "retention check");
                    if let Some(removed) = self.pipeline.prune_if_due(Utc::now()).await {
                        info!(removed, "pruned events older than a year");
                    }
                }
            }
            self.publish();
        }

        info!(
            pending_write = self.pipeline.has_pending_write(),
            "dashboard shutting down"
        );
        self.pipeline.shutdown().await;
    }

    fn on_poll(&mut self, status: PollStatus) {
        let fresh_payload = status.received > self.poll.received;
        if fresh_payload {
            if let Some(payload) = status.data.as_deref() {
                let added = self.pipeline.ingest(payload, self.geolocation.location());
                if added > 0 {
                    info!(added, total = self.pipeline.len(), "new earthquakes");
                }
            }
        }
        self.poll = status;
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "applying command");
        match command {
            Command::SetFilters(filters) => {
                self.filters = filters;
                self.display_stale = true;
            }
            Command::SetSort(sort) => {
                self.sort = sort;
                self.display_stale = true;
            }
            Command::Select(id) => self.select(id),
            Command::RequestLocation => self.geolocation.request_location(),
        }
    }

    fn select(&mut self, id: Option<String>) {
        let target = id.as_deref().and_then(|id| {
            self.pipeline
                .events()
                .iter()
                .find(|e| e.id == id)
                .map(|e| e.coordinates)
        });

        match (id, target) {
            (Some(id), Some(coords)) => {
                self.camera = MapCamera::fly_to(coords);
                self.selected = Some(id);
            }
            (Some(id), None) => warn!(%id, "cannot select unknown event"),
            (None, _) => self.selected = None,
        }
    }

    fn refresh_display(&mut self) {
        let source = self.pipeline.events();
        let unchanged = self
            .display_source
            .as_ref()
            .is_some_and(|prev| Arc::ptr_eq(prev, source));

        if unchanged && !self.display_stale {
            return;
        }

        self.display = self.pipeline.display(&self.filters, self.sort);
        self.display_source = Some(Arc::clone(source));
        self.display_stale = false;
    }

    fn publish(&mut self) {
        self.refresh_display();
        self.revision += 1;

        // With nothing selected the camera follows the user.
        if self.selected.is_none() {
            self.camera = MapCamera::initial(self.geolocation.location());
        }

        let snapshot = DashboardSnapshot {
            revision: self.revision,
            is_loading: self.poll.received == 0 && self.poll.error.is_none(),
            is_connected: self.poll.is_connected,
            error: self.poll.error.clone(),
            user_location: self.geolocation.location(),
            location_error: self.geolocation.error().map(str::to_string),
            locating: self.geolocation.is_loading(),
            filters: self.filters.clone(),
            sort: self.sort,
            selected: self.selected.clone(),
            total: self.pipeline.len(),
            events: self.display.clone(),
            markers: markers(&self.display, self.selected.as_deref()),
            camera: self.camera,
        };
        self.snapshots.send_replace(Arc::new(snapshot));
    }
}

fn empty_snapshot(camera: MapCamera) -> DashboardSnapshot {
    DashboardSnapshot {
        revision: 0,
        is_loading: true,
        is_connected: false,
        error: None,
        user_location: None,
        location_error: None,
        locating: false,
        filters: FilterOptions::default(),
        sort: SortOption::default(),
        selected: None,
        total: 0,
        events: Vec::new(),
        markers: Vec::new(),
        camera,
    }
}
