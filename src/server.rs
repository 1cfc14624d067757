//! Web server for the quakewatch dashboard.
//!
//! Provides the browser view of a running [`Dashboard`](crate::dashboard::Dashboard):
//! - Axum for HTTP
//! - a small JSON API that forwards user actions as dashboard commands
//! - SSE (Server-Sent Events) pushing every new snapshot
//! - Leaflet for the map, plain JavaScript for the list and filter panel

use std::future::Future;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post, put},
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{info, warn};

use crate::dashboard::{Command, DashboardHandle, DashboardSnapshot};
use crate::filters::{FilterOptions, MagnitudeRange, SortOption};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl ServerConfig {
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    dashboard: DashboardHandle,
}

impl AppState {
    #[must_use]
    pub fn new(dashboard: DashboardHandle) -> Self {
        Self { dashboard }
    }
}

#[derive(Debug, Deserialize)]
struct SortRequest {
    sort: SortOption,
}

#[derive(Debug, Deserialize)]
struct SelectRequest {
    id: Option<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/snapshot", get(snapshot_handler))
        .route("/api/filters", put(filters_handler))
        .route("/api/sort", put(sort_handler))
        .route("/api/select", post(select_handler))
        .route("/api/location", post(location_handler))
        .route("/stream", get(sse_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serve the dashboard until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn run_server(
    config: ServerConfig,
    dashboard: DashboardHandle,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(AppState::new(dashboard));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌍 quakewatch UI listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML UI.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn snapshot_handler(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(DashboardSnapshot::clone(&state.dashboard.snapshot()))
}

async fn filters_handler(
    State(state): State<AppState>,
    Json(mut filters): Json<FilterOptions>,
) -> StatusCode {
    let range = filters.magnitude_range;
    filters.magnitude_range = MagnitudeRange::new(range.min, range.max);
    dispatch(&state, Command::SetFilters(filters)).await
}

async fn sort_handler(State(state): State<AppState>, Json(request): Json<SortRequest>) -> StatusCode {
    dispatch(&state, Command::SetSort(request.sort)).await
}

async fn select_handler(State(state): State<AppState>, Json(request): Json<SelectRequest>) -> StatusCode {
    dispatch(&state, Command::Select(request.id)).await
}

async fn location_handler(State(state): State<AppState>) -> StatusCode {
    dispatch(&state, Command::RequestLocation).await
}

async fn dispatch(state: &AppState, command: Command) -> StatusCode {
    match state.dashboard.send(command).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            warn!("rejecting request: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// SSE stream handler, one "snapshot" event per published revision.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.dashboard.subscribe())
        .map(|snapshot| Event::default().event("snapshot").json_data(&*snapshot));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Earthquake Alert System</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>
        :root {
            --bg: #0f1117;
            --panel: #181b24;
            --border: #2a2f3d;
            --text: #e5e7eb;
            --muted: #9ca3af;
            --accent: #818cf8;
            --ok: #10b981;
            --bad: #ef4444;
            --radius: 10px;
        }

        * { box-sizing: border-box; margin: 0; padding: 0; }

        body {
            font-family: system-ui, -apple-system, sans-serif;
            background: var(--bg);
            color: var(--text);
            height: 100vh;
            display: flex;
            flex-direction: column;
        }

        /* ===== HEADER ===== */
        .header {
            display: flex;
            align-items: center;
            justify-content: space-between;
            padding: 0.75rem 1.5rem;
            border-bottom: 1px solid var(--border);
            background: var(--panel);
        }

        .logo { font-weight: 600; font-size: 1.1rem; }

        .status-pill {
            display: flex;
            align-items: center;
            gap: 0.5rem;
            font-size: 0.85rem;
            padding: 0.25rem 0.75rem;
            border-radius: 999px;
            border: 1px solid var(--border);
        }

        .status-dot { width: 8px; height: 8px; border-radius: 50%; background: var(--bad); }
        .status-pill.live .status-dot { background: var(--ok); }
        .status-error { color: var(--muted); font-size: 0.8rem; }

        /* ===== LAYOUT ===== */
        .layout {
            flex: 1;
            display: grid;
            grid-template-columns: 260px 1fr 380px;
            min-height: 0;
        }

        .panel {
            padding: 1rem;
            border-right: 1px solid var(--border);
            overflow-y: auto;
        }

        .panel h2 {
            font-size: 0.8rem;
            text-transform: uppercase;
            letter-spacing: 0.05em;
            color: var(--muted);
            margin: 1rem 0 0.5rem;
        }

        .panel label { display: block; font-size: 0.85rem; margin: 0.25rem 0; }

        .panel input, .panel select {
            width: 100%;
            background: var(--bg);
            color: var(--text);
            border: 1px solid var(--border);
            border-radius: 6px;
            padding: 0.35rem 0.5rem;
        }

        .panel input[type=checkbox] { width: auto; margin-right: 0.4rem; }

        .btn {
            margin-top: 0.5rem;
            width: 100%;
            padding: 0.45rem;
            border-radius: 6px;
            border: 1px solid var(--accent);
            background: transparent;
            color: var(--accent);
            cursor: pointer;
        }

        .hint { font-size: 0.75rem; color: var(--muted); margin-top: 0.25rem; }

        #map { height: 100%; }

        /* ===== LIST ===== */
        .list { overflow-y: auto; border-left: 1px solid var(--border); }

        .list-header {
            padding: 0.75rem 1rem;
            font-size: 0.85rem;
            color: var(--muted);
            border-bottom: 1px solid var(--border);
        }

        .event-card {
            padding: 0.75rem 1rem;
            border-bottom: 1px solid var(--border);
            cursor: pointer;
            border-left: 4px solid transparent;
        }

        .event-card:hover { background: var(--panel); }
        .event-card.selected { background: var(--panel); border-left-color: var(--accent); }
        .event-card.minor { border-left-color: rgb(0, 128, 0); }
        .event-card.moderate { border-left-color: rgb(255, 255, 0); }
        .event-card.major { border-left-color: rgb(255, 165, 0); }
        .event-card.severe { border-left-color: rgb(255, 0, 0); }

        .event-title { display: flex; justify-content: space-between; font-weight: 500; }
        .event-mag { font-variant-numeric: tabular-nums; }
        .event-meta { font-size: 0.8rem; color: var(--muted); margin-top: 0.25rem; }
        .badge-tsunami { color: var(--bad); font-size: 0.8rem; margin-top: 0.25rem; }

        .empty-state { padding: 3rem 1rem; text-align: center; color: var(--muted); }
    </style>
</head>
<body>
    <header class="header">
        <span class="logo">🌍 Earthquake Alert System</span>
        <div class="status-pill" id="status">
            <span class="status-dot"></span>
            <span id="status-text">Connecting</span>
            <span class="status-error" id="status-error"></span>
        </div>
    </header>

    <div class="layout">
        <aside class="panel">
            <h2>Sort</h2>
            <select id="sort">
                <option value="time-desc">Newest first</option>
                <option value="time-asc">Oldest first</option>
                <option value="mag-desc">Magnitude (high to low)</option>
                <option value="mag-asc">Magnitude (low to high)</option>
                <option value="distance-asc" id="sort-distance" hidden>Distance (nearest first)</option>
            </select>

            <h2>Date range</h2>
            <label>From <input type="date" id="date-start"></label>
            <label>To <input type="date" id="date-end"></label>

            <h2>Impact level</h2>
            <label><input type="checkbox" class="impact" value="minor">Minor</label>
            <label><input type="checkbox" class="impact" value="moderate">Moderate</label>
            <label><input type="checkbox" class="impact" value="major">Major</label>
            <label><input type="checkbox" class="impact" value="severe">Severe</label>

            <h2>Distance</h2>
            <div id="distance-known" hidden>
                <label>Minimum km <input type="number" id="min-distance" min="0" step="10"></label>
            </div>
            <div id="distance-unknown">
                <button class="btn" id="locate">Use my location</button>
                <p class="hint" id="location-error"></p>
            </div>

            <h2>Magnitude</h2>
            <label>Min <input type="number" id="mag-min" min="0" max="10" step="0.1" value="0"></label>
            <label>Max <input type="number" id="mag-max" min="0" max="10" step="0.1" value="10"></label>
        </aside>

        <main id="map"></main>

        <section class="list">
            <div class="list-header" id="list-header">Loading seismic data...</div>
            <div id="events"></div>
        </section>
    </div>

    <script>
        const IMPACT_LEVELS = ['minor', 'moderate', 'major', 'severe'];
        let map = null;
        let markerLayer = null;
        let userMarker = null;
        let lastCamera = null;

        try {
            map = L.map('map');
            L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
                attribution: '&copy; OpenStreetMap contributors'
            }).addTo(map);
            markerLayer = L.layerGroup().addTo(map);
        } catch (e) {
            console.error('Map initialization failed', e);
        }

        function pad(n) { return String(n).padStart(2, '0'); }

        function formatTime(ms) {
            const d = new Date(ms);
            return `${pad(d.getUTCDate())}/${pad(d.getUTCMonth() + 1)}/${d.getUTCFullYear()}, ` +
                `${pad(d.getUTCHours())}:${pad(d.getUTCMinutes())}:${pad(d.getUTCSeconds())}`;
        }

        function formatDistance(km) {
            if (km === null || km === undefined) return 'Unknown';
            if (km < 1) return `${Math.round(km * 1000)}m`;
            return `${Math.round(km)}km`;
        }

        function send(method, url, body) {
            const init = { method, headers: {} };
            if (body !== undefined) {
                init.headers['Content-Type'] = 'application/json';
                init.body = JSON.stringify(body);
            }
            return fetch(url, init).catch(e => console.error(url, e));
        }

        function renderHeader(s) {
            const pill = document.getElementById('status');
            pill.classList.toggle('live', s.isConnected);
            document.getElementById('status-text').textContent =
                s.isConnected ? '● Live Feed' : '○ Disconnected';
            document.getElementById('status-error').textContent = s.error || '';
        }

        function renderMap(s) {
            if (!map) return;
            try {
                markerLayer.clearLayers();
                for (const m of s.markers) {
                    L.circleMarker([m.latitude, m.longitude], {
                        radius: m.sizePx / 2,
                        fillColor: m.color,
                        fillOpacity: 1,
                        color: m.selected ? '#ffffff' : m.color,
                        weight: m.selected ? 3 : 1
                    })
                        .bindPopup(`<strong></strong><br><span></span>`)
                        .on('popupopen', e => {
                            const el = e.popup.getElement();
                            el.querySelector('strong').textContent = m.title;
                            el.querySelector('span').innerText = m.popup;
                        })
                        .on('click', () => send('POST', '/api/select', { id: m.id }))
                        .addTo(markerLayer);
                }

                if (userMarker) { userMarker.remove(); userMarker = null; }
                if (s.userLocation) {
                    userMarker = L.circleMarker([s.userLocation.latitude, s.userLocation.longitude], {
                        radius: 8, fillColor: '#0080ff', fillOpacity: 0.9, color: '#ffffff', weight: 2
                    }).bindPopup('You are here').addTo(map);
                }

                const camera = JSON.stringify(s.camera);
                if (camera !== lastCamera) {
                    const c = s.camera;
                    const center = [c.center.latitude, c.center.longitude];
                    if (lastCamera !== null && c.durationMs > 0) {
                        map.flyTo(center, c.zoom, { duration: c.durationMs / 1000 });
                    } else {
                        map.setView(center, c.zoom);
                    }
                    lastCamera = camera;
                }
            } catch (e) {
                console.error('Map update failed', e);
            }
        }

        function renderList(s) {
            const header = document.getElementById('list-header');
            header.textContent = s.isLoading
                ? 'Loading seismic data...'
                : `Showing ${s.events.length} of ${s.total} earthquakes`;

            const container = document.getElementById('events');
            container.replaceChildren();
            if (!s.isLoading && s.events.length === 0) {
                const empty = document.createElement('div');
                empty.className = 'empty-state';
                empty.textContent = 'No earthquakes found matching your criteria';
                container.appendChild(empty);
                return;
            }

            for (const e of s.events) {
                const card = document.createElement('div');
                card.className = `event-card ${e.impactLevel}` + (e.id === s.selected ? ' selected' : '');
                card.onclick = () => send('POST', '/api/select', { id: e.id });

                const title = document.createElement('div');
                title.className = 'event-title';
                const place = document.createElement('span');
                place.textContent = e.place || 'Unknown location';
                const mag = document.createElement('span');
                mag.className = 'event-mag';
                mag.textContent = `M${e.magnitude.toFixed(1)}`;
                title.append(place, mag);

                const meta = document.createElement('div');
                meta.className = 'event-meta';
                const felt = e.felt ? ` · ${e.felt} felt reports` : '';
                meta.textContent = `${formatTime(e.time)} · ${formatDistance(e.distanceFromUser)}${felt}`;

                card.append(title, meta);
                if (e.tsunami) {
                    const tsunami = document.createElement('div');
                    tsunami.className = 'badge-tsunami';
                    tsunami.textContent = '🌊 Tsunami alert';
                    card.appendChild(tsunami);
                }
                container.appendChild(card);
            }
        }

        function renderPanel(s) {
            const located = s.userLocation !== null;
            document.getElementById('sort-distance').hidden = !located;
            document.getElementById('distance-known').hidden = !located;
            document.getElementById('distance-unknown').hidden = located;
            document.getElementById('location-error').textContent =
                s.locating ? 'Locating...' : (s.locationError || '');
            document.getElementById('sort').value = s.sort;
        }

        function render(s) {
            renderHeader(s);
            renderPanel(s);
            renderMap(s);
            renderList(s);
        }

        function readFilters() {
            const start = document.getElementById('date-start').value;
            const end = document.getElementById('date-end').value;
            const minDistance = document.getElementById('min-distance').value;
            let min = parseFloat(document.getElementById('mag-min').value) || 0;
            const max = parseFloat(document.getElementById('mag-max').value);
            const upper = isNaN(max) ? 10 : max;
            if (min > upper) {
                min = upper;
                document.getElementById('mag-min').value = min;
            }
            return {
                dateRange: {
                    start: start ? `${start}T00:00:00Z` : null,
                    end: end ? `${end}T23:59:59Z` : null
                },
                impactLevel: IMPACT_LEVELS.filter(level =>
                    document.querySelector(`.impact[value=${level}]`).checked),
                minDistance: minDistance === '' ? null : parseFloat(minDistance),
                magnitudeRange: { min, max: upper }
            };
        }

        document.querySelectorAll('.panel input').forEach(input =>
            input.addEventListener('change', () => send('PUT', '/api/filters', readFilters())));
        document.getElementById('sort').addEventListener('change', e =>
            send('PUT', '/api/sort', { sort: e.target.value }));
        document.getElementById('locate').addEventListener('click', () =>
            send('POST', '/api/location'));

        fetch('/api/snapshot').then(r => r.json()).then(render).catch(e => console.error(e));

        const source = new EventSource('/stream');
        source.addEventListener('snapshot', e => render(JSON.parse(e.data)));
        source.onerror = () => {
            document.getElementById('status').classList.remove('live');
            document.getElementById('status-text').textContent = '○ Disconnected';
        };
    </script>
</body>
</html>
"##;
