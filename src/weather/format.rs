//! Update Formatter
//!
//! Renders a [`WeatherSnapshot`] as a set of htmx out-of-band swap fragments.
//! The element ids are what the dashboard page swaps into, so they must not
//! change.

use chrono::{DateTime, TimeZone};
use std::fmt::{self, Write};

use super::snapshot::WeatherSnapshot;

/// Timestamp layout shown on the dashboard, e.g. "January 2, 2006, 3:04 PM"
pub const TIMESTAMP_FORMAT: &str = "%B %-d, %Y, %-I:%M %p";

/// Render the dashboard update for `snapshot` as seen at `now`
pub fn render_update<Tz>(snapshot: &WeatherSnapshot, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let timestamp = now.format(TIMESTAMP_FORMAT).to_string();

    let mut out = String::with_capacity(768);
    out.push_str("\n<div hx-swap-oob=\"innerHTML:#update-timestamp\">\n");
    let _ = writeln!(out, "\t<p>{}</p>", escape_html(&timestamp));
    out.push_str("</div>\n");

    let fields = [
        ("weather-data-name", escape_html(&snapshot.location)),
        ("weather-data-temp", format!("{:.0}°", snapshot.temperature)),
        ("weather-data-weather-main", escape_html(&snapshot.description)),
        ("weather-data-main-temp-max", format!("{:.0}", snapshot.temp_max)),
        ("weather-data-main-temp-min", format!("{:.0}", snapshot.temp_min)),
        ("weather-data-wind", wind_kmh(snapshot.wind_speed)),
        ("weather-data-humidity", humidity_percent(snapshot.humidity)),
        ("weather-data-visibility", visibility_km(snapshot.visibility)),
    ];

    for (id, value) in fields {
        let _ = writeln!(out, "<div hx-swap-oob=\"innerHTML:#{}\">{}</div>", id, value);
    }

    out
}

/// Wind speed in m/s shown as km/h with two decimals
pub fn wind_kmh(meters_per_second: f64) -> String {
    format!("{:.2} km/h", meters_per_second * 3.6)
}

pub fn humidity_percent(humidity: u32) -> String {
    format!("{}%", humidity)
}

/// Visibility in meters shown as whole kilometers (truncated)
pub fn visibility_km(meters: u32) -> String {
    format!("{} km", meters / 1000)
}

/// Minimal escaping for text placed inside element content
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::Coordinates;
    use chrono::Utc;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            location: "Phnom Penh".to_string(),
            coordinates: Coordinates {
                lat: 11.5625,
                lon: 104.916,
            },
            temperature: 31.4,
            temp_min: 30.6,
            temp_max: 32.1,
            humidity: 57,
            wind_speed: 10.0,
            visibility: 10000,
            condition: "Clouds".to_string(),
            description: "broken clouds".to_string(),
            observed_at: Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap(),
        }
    }

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap()
    }

    #[test]
    fn test_conversions() {
        assert_eq!(wind_kmh(10.0), "36.00 km/h");
        assert_eq!(wind_kmh(4.12), "14.83 km/h");
        assert_eq!(visibility_km(10000), "10 km");
        assert_eq!(visibility_km(9999), "9 km");
        assert_eq!(humidity_percent(57), "57%");
    }

    #[test]
    fn test_render_contains_every_field() {
        let html = render_update(&snapshot(), &clock());

        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#update-timestamp\">"));
        assert!(html.contains("<p>January 2, 2006, 3:04 PM</p>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-name\">Phnom Penh</div>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-temp\">31°</div>"));
        assert!(html.contains(
            "<div hx-swap-oob=\"innerHTML:#weather-data-weather-main\">broken clouds</div>"
        ));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-main-temp-max\">32</div>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-main-temp-min\">31</div>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-wind\">36.00 km/h</div>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-humidity\">57%</div>"));
        assert!(html.contains("<div hx-swap-oob=\"innerHTML:#weather-data-visibility\">10 km</div>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let first = render_update(&snapshot(), &clock());
        let second = render_update(&snapshot(), &clock());
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_render_escapes_text() {
        let mut snap = snapshot();
        snap.location = "<script>alert('x')</script>".to_string();

        let html = render_update(&snap, &clock());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
    }

    #[test]
    fn test_afternoon_and_morning_clock() {
        let morning = Utc.with_ymd_and_hms(2024, 11, 15, 9, 30, 0).unwrap();
        let html = render_update(&snapshot(), &morning);
        assert!(html.contains("<p>November 15, 2024, 9:30 AM</p>"));
    }
}
