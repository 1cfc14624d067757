//! Terminal renderers for the header and the earthquake list.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use chrono::{TimeZone, Utc};

use crate::models::{EarthquakeEvent, ImpactLevel};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Impact-level colors
const RED: &str = "\x1b[91m";
const ORANGE: &str = "\x1b[38;5;208m";
const YELLOW: &str = "\x1b[93m";
const GREEN: &str = "\x1b[92m";

// Icons for visual richness
const ICON_QUAKE: &str = "🌍";
const ICON_TSUNAMI: &str = "🌊";
const ICON_FELT: &str = "👥";

/// Shown when the display set is empty.
pub const EMPTY_LIST_MESSAGE: &str = "No earthquakes found matching your criteria";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Get the color code for an impact level.
fn impact_color(level: ImpactLevel) -> &'static str {
    match level {
        ImpactLevel::Severe => RED,
        ImpactLevel::Major => ORANGE,
        ImpactLevel::Moderate => YELLOW,
        ImpactLevel::Minor => GREEN,
    }
}

/// `dd/mm/yyyy, HH:MM:SS` in UTC.
#[must_use]
pub fn format_datetime(time_ms: i64) -> String {
    Utc.timestamp_millis_opt(time_ms)
        .single()
        .map_or_else(|| "unknown".into(), |t| t.format("%d/%m/%Y, %H:%M:%S").to_string())
}

/// Metres below one kilometre, whole kilometres above.
#[must_use]
pub fn format_distance(distance_km: Option<f64>) -> String {
    match distance_km {
        None => "Unknown".into(),
        Some(d) if d < 1.0 => format!("{:.0}m", (d * 1000.0).round()),
        Some(d) => format!("{:.0}km", d.round()),
    }
}

#[must_use]
pub fn format_magnitude(magnitude: f64) -> String {
    format!("{magnitude:.1}")
}

/// Connectivity line printed above the list.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_header<W: Write>(writer: &mut W, is_connected: bool, error: Option<&str>) -> io::Result<()> {
    if is_connected {
        writeln!(writer, "{BOLD}{ICON_QUAKE} Earthquake Alert System{RESET} {GREEN}● Live Feed{RESET}")
    } else {
        let reason = error.map(|e| format!(" {DIM}({e}){RESET}")).unwrap_or_default();
        writeln!(writer, "{BOLD}{ICON_QUAKE} Earthquake Alert System{RESET} {RED}○ Disconnected{RESET}{reason}")
    }
}

/// Write events in human-readable format with rich colors.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, events: &[EarthquakeEvent]) -> io::Result<()> {
    if events.is_empty() {
        return writeln!(writer, "{DIM}{EMPTY_LIST_MESSAGE}{RESET}");
    }

    for event in events {
        let color = impact_color(event.impact_level);
        let mag = format_magnitude(event.magnitude);
        let label = event.impact_level.as_str().to_uppercase();
        let time = format_datetime(event.time);
        let place = if event.place.is_empty() {
            "Unknown location"
        } else {
            event.place.as_str()
        };

        let distance = event
            .distance_from_user
            .map(|d| format!(" │ {DIM}{}{RESET}", format_distance(Some(d))))
            .unwrap_or_default();

        let felt = match event.felt {
            Some(n) if n > 0 => format!(" {ICON_FELT} {n}"),
            _ => String::new(),
        };

        let tsunami = if event.tsunami {
            format!(" {ICON_TSUNAMI} {RED}Tsunami alert{RESET}")
        } else {
            String::new()
        };

        writeln!(
            writer,
            "{color}{BOLD}M{mag}{RESET} │ \
             {color}{label:8}{RESET} │ \
             {DIM}{depth:>5.0}km{RESET} │ \
             {time} UTC │ \
             {place}{distance}{felt}{tsunami}",
            depth = event.depth,
        )?;
    }
    Ok(())
}

/// Write events as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, events: &[EarthquakeEvent]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(events)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, events: &[EarthquakeEvent]) -> io::Result<()> {
    for event in events {
        let json = serde_json::to_string(event)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_events<W: Write>(writer: &mut W, events: &[EarthquakeEvent], format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, events),
        Format::Json => write_json(writer, events),
        Format::Ndjson => write_ndjson(writer, events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::classify;
    use crate::models::Coordinates;

    fn quake(id: &str, magnitude: f64, distance: Option<f64>) -> EarthquakeEvent {
        EarthquakeEvent {
            id: id.into(),
            title: format!("M {magnitude} - Test"),
            time: 1_700_000_000_000,
            coordinates: Coordinates::new(0.0, 0.0),
            magnitude,
            depth: 12.0,
            impact_level: classify(magnitude),
            place: "Test Ridge".into(),
            url: String::new(),
            felt: Some(3),
            tsunami: true,
            distance_from_user: distance,
        }
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse::<Format>().unwrap(), Format::Human);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("ndjson".parse::<Format>().unwrap(), Format::Ndjson);
        assert!("invalid".parse::<Format>().is_err());
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(None), "Unknown");
        assert_eq!(format_distance(Some(0.4567)), "457m");
        assert_eq!(format_distance(Some(12.6)), "13km");
    }

    #[test]
    fn test_format_datetime() {
        assert_eq!(format_datetime(1_700_000_000_000), "14/11/2023, 22:13:20");
        assert_eq!(format_magnitude(4.26), "4.3");
    }

    #[test]
    fn test_write_human_empty() {
        let mut buf = Vec::new();
        write_human(&mut buf, &[]).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains(EMPTY_LIST_MESSAGE));
    }

    #[test]
    fn test_write_human_line() {
        let mut buf = Vec::new();
        write_human(&mut buf, &[quake("a", 6.1, Some(42.0))]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("M6.1"));
        assert!(text.contains("MAJOR"));
        assert!(text.contains("Test Ridge"));
        assert!(text.contains("42km"));
        assert!(text.contains("Tsunami alert"));
    }

    #[test]
    fn test_write_ndjson_one_line_per_event() {
        let mut buf = Vec::new();
        write_ndjson(&mut buf, &[quake("a", 1.0, None), quake("b", 2.0, None)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["id"], "a");
        assert_eq!(first["impactLevel"], "minor");
    }

    #[test]
    fn test_write_header() {
        let mut buf = Vec::new();
        write_header(&mut buf, false, Some("HTTP error! Status: 503")).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Disconnected"));
        assert!(text.contains("503"));
    }
}
