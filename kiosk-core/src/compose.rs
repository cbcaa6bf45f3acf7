//! Turns a snapshot into finished display content.
//!
//! Composition is a pure function of the snapshot, the credentials, the clock
//! and the icon cache. Missing optional fields become placeholders and missing
//! assets are skipped; nothing here can fail a cycle.

use std::fmt::Display;

use ab_glyph::PxScale;
use chrono::{DateTime, TimeZone};
use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::draw_text_mut;

use crate::{
    config::UnitSystem,
    fonts::{FontSet, FontWeight},
    icons::{IconCache, IconSize},
    model::{Credentials, CurrentConditions, DailyForecast, WeatherAlert, WeatherSnapshot},
    render::{
        Banner, BannerKind, CELL_BOTTOM, CELL_LEFT, CELL_PITCH, CELL_TOP, FORECAST_DAYS,
        ForecastCell, RenderArtifacts, SCREEN_HEIGHT, SCREEN_WIDTH,
    },
};

const PLACEHOLDER: &str = "--";
const FALLBACK_BACKGROUND: &str = "01d";
const ALERT_SEPARATOR: &str = "     ";

const LARGE_ICON_POS: (i64, i64) = (180, 100);
const SMALL_ICON_TOP: i64 = 280;
/// Offset of a forecast icon from its cell's text column.
const SMALL_ICON_INSET: i64 = 45;
const CELL_TEXT_LEFT: i64 = 25;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const HUMIDITY_GREEN: Rgba<u8> = Rgba([0x48, 0xff, 0x00, 255]);
/// Vertical advance between detail lines: 18px text plus 8px spacing.
const DETAIL_LINE_HEIGHT: i32 = 26;

/// One run of text on the composite: position, pixel size, weight and colour.
struct TextRun<'a> {
    text: &'a str,
    at: (i32, i32),
    size: f32,
    weight: FontWeight,
    color: Rgba<u8>,
}

impl<'a> TextRun<'a> {
    fn white(text: &'a str, at: (i32, i32), size: f32, weight: FontWeight) -> Self {
        Self {
            text,
            at,
            size,
            weight,
            color: WHITE,
        }
    }
}

#[derive(Debug)]
pub struct Composer {
    icons: IconCache,
    fonts: FontSet,
    units: UnitSystem,
    glass: RgbaImage,
}

impl Composer {
    pub fn new(icons: IconCache, fonts: FontSet, units: UnitSystem) -> Self {
        Self {
            icons,
            fonts,
            units,
            glass: glass_overlay(),
        }
    }

    pub fn icons(&self) -> &IconCache {
        &self.icons
    }

    pub fn compose<Tz>(
        &mut self,
        snapshot: &WeatherSnapshot,
        credentials: &Credentials,
        now: &DateTime<Tz>,
    ) -> RenderArtifacts
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let tz = now.timezone();
        let current = &snapshot.current;

        let forecast: [ForecastCell; FORECAST_DAYS] = std::array::from_fn(|i| {
            snapshot
                .daily
                .get(i + 1)
                .map(|day| forecast_cell(day, &tz))
                .unwrap_or_else(placeholder_cell)
        });

        let mut artifacts = RenderArtifacts {
            location: location_label(credentials, snapshot.timezone.as_deref()),
            temperature: format_temperature(current.temperature),
            description: capitalize(&current.description),
            date: now.format("%m/%d").to_string(),
            details: self.details(current, &tz),
            background: self.background(&current.icon, &forecast),
            forecast,
            banner: banner(&snapshot.alerts, now),
        };

        self.draw_text(&mut artifacts);
        artifacts
    }

    /// Draw every text slot onto the composite at its fixed position.
    fn draw_text(&self, artifacts: &mut RenderArtifacts) {
        if self.fonts.is_empty() {
            return;
        }

        let mut canvas = std::mem::take(&mut artifacts.background);
        let runs = text_runs(artifacts);
        for run in &runs {
            if let Some(font) = self.fonts.get(run.weight) {
                let (x, y) = run.at;
                let scale = PxScale::from(run.size);
                draw_text_mut(&mut canvas, run.color, x, y, scale, font, run.text);
            }
        }
        drop(runs);
        artifacts.background = canvas;
    }

    fn details<Tz>(&self, current: &CurrentConditions, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let visibility =
            current.visibility_m.unwrap_or(0.0) / self.units.meters_per_distance_unit();

        format!(
            "Feels: {}\n\
             Humid: {}%\n\
             Wind:  {} {}\n\
             UV:    {}\n\
             Vis:   {:.1} {}\n\
             Sunrise: {}\n\
             Sunset:  {}\n\
             Dew Point: {}",
            optional_temperature(current.feels_like),
            current.humidity.map_or_else(|| PLACEHOLDER.to_string(), |h| h.to_string()),
            truncate_degrees(current.wind_speed.unwrap_or(0.0)),
            self.units.speed_label(),
            current.uv_index.unwrap_or(0.0),
            visibility,
            self.units.distance_label(),
            clock_time(current.sunrise, tz),
            clock_time(current.sunset, tz),
            optional_temperature(current.dew_point),
        )
    }

    fn background(&mut self, icon: &str, forecast: &[ForecastCell; FORECAST_DAYS]) -> RgbaImage {
        let base = self
            .icons
            .get_icon(icon, IconSize::Background)
            .or_else(|| self.icons.get_icon(FALLBACK_BACKGROUND, IconSize::Background));

        let mut canvas = match base {
            Some(img) if img.dimensions() == (SCREEN_WIDTH, SCREEN_HEIGHT) => (*img).clone(),
            Some(img) => {
                let filter = imageops::FilterType::Lanczos3;
                imageops::resize(&*img, SCREEN_WIDTH, SCREEN_HEIGHT, filter)
            }
            None => RgbaImage::from_pixel(SCREEN_WIDTH, SCREEN_HEIGHT, Rgba([0, 0, 0, 255])),
        };

        imageops::overlay(&mut canvas, &self.glass, 0, 0);

        if let Some(large) = self.icons.get_icon(icon, IconSize::Large) {
            imageops::overlay(&mut canvas, &*large, LARGE_ICON_POS.0, LARGE_ICON_POS.1);
        }

        for (i, cell) in forecast.iter().enumerate() {
            if let Some(small) = self.icons.get_icon(&cell.icon_code, IconSize::Small) {
                let x = CELL_TEXT_LEFT + i as i64 * i64::from(CELL_PITCH) + SMALL_ICON_INSET;
                imageops::overlay(&mut canvas, &*small, x, SMALL_ICON_TOP);
            }
        }

        canvas
    }
}

/// Layout of the text slots over the panels.
fn text_runs(artifacts: &RenderArtifacts) -> Vec<TextRun<'_>> {
    let mut runs = vec![
        TextRun::white(&artifacts.location, (30, 60), 32.0, FontWeight::Regular),
        TextRun::white(&artifacts.temperature, (25, 95), 100.0, FontWeight::Bold),
        TextRun::white(&artifacts.description, (30, 215), 18.0, FontWeight::Regular),
        TextRun::white(&artifacts.date, (30, 240), 18.0, FontWeight::Bold),
    ];

    for (i, line) in artifacts.details.lines().enumerate() {
        let y = 65 + i as i32 * DETAIL_LINE_HEIGHT;
        runs.push(TextRun::white(line, (545, y), 18.0, FontWeight::Bold));
    }

    for (i, cell) in artifacts.forecast.iter().enumerate() {
        let x = (CELL_TEXT_LEFT + i as i64 * i64::from(CELL_PITCH)) as i32 + 5;
        runs.extend([
            TextRun::white(&cell.header, (x, 312), 12.0, FontWeight::Bold),
            TextRun::white(&cell.temperatures, (x, 360), 14.0, FontWeight::Bold),
            TextRun::white(&cell.range, (x, 375), 10.0, FontWeight::Regular),
            TextRun {
                text: &cell.humidity,
                at: (x, 390),
                size: 10.0,
                weight: FontWeight::Regular,
                color: HUMIDITY_GREEN,
            },
            TextRun::white(&cell.sunrise, (x, 405), 10.0, FontWeight::Regular),
            TextRun::white(&cell.sunset, (x, 420), 10.0, FontWeight::Regular),
        ]);
    }

    runs
}

/// Whole degrees, truncated toward zero: `72.9` is 72 and `-0.4` is 0.
pub fn truncate_degrees(value: f64) -> i64 {
    value.trunc() as i64
}

pub fn format_temperature(value: f64) -> String {
    format!("{}°", truncate_degrees(value))
}

fn optional_temperature(value: Option<f64>) -> String {
    value.map_or_else(|| format!("{PLACEHOLDER}°"), format_temperature)
}

/// Configured "City, ST" wins over the provider's timezone-derived name.
pub fn location_label(credentials: &Credentials, timezone: Option<&str>) -> String {
    if let Some(name) = credentials.location.display_name() {
        return name;
    }

    timezone
        .and_then(|tz| tz.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .map(|s| s.replace('_', " "))
        .unwrap_or_else(|| "Local".to_string())
}

/// Local "HH:MM" for an epoch timestamp.
pub fn clock_time<Tz>(epoch: Option<i64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    epoch
        .and_then(|secs| tz.timestamp_opt(secs, 0).single())
        .map_or_else(|| format!("{PLACEHOLDER}:{PLACEHOLDER}"), |t| t.format("%H:%M").to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn forecast_cell<Tz>(day: &DailyForecast, tz: &Tz) -> ForecastCell
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let t = day.temperature;
    let (header, sunrise, sunset) = match tz.timestamp_opt(day.timestamp, 0).single() {
        Some(when) => (
            format!("{} {}", when.format("%a").to_string().to_uppercase(), when.format("%m/%d")),
            clock_time(day.sunrise, tz),
            clock_time(day.sunset, tz),
        ),
        None => (PLACEHOLDER.to_string(), clock_time(None, tz), clock_time(None, tz)),
    };

    let feels = optional_temperature(day.feels_like_day);
    let description = capitalize(&day.description);

    ForecastCell {
        header,
        temperatures: format!("{}/{}", format_temperature(t.day), feels),
        range: format!("L:{} H:{}", truncate_degrees(t.min), truncate_degrees(t.max)),
        humidity: format!(
            "H:{}%",
            day.humidity.map_or_else(|| PLACEHOLDER.to_string(), |h| h.to_string())
        ),
        sunrise: format!("Sunrise: {sunrise}"),
        sunset: format!("Sunset:  {sunset}"),
        icon_code: day.icon.clone(),
        tooltip: format!(
            "{description}\nDay: {} (Feels: {feels})\nNight: {}\nClouds: {}%",
            format_temperature(t.day),
            format_temperature(t.night),
            day.clouds.unwrap_or(0),
        ),
    }
}

fn placeholder_cell() -> ForecastCell {
    ForecastCell {
        header: PLACEHOLDER.to_string(),
        temperatures: format!("{PLACEHOLDER}°/{PLACEHOLDER}°"),
        range: format!("L:{PLACEHOLDER} H:{PLACEHOLDER}"),
        humidity: format!("H:{PLACEHOLDER}%"),
        sunrise: format!("Sunrise: {PLACEHOLDER}:{PLACEHOLDER}"),
        sunset: format!("Sunset:  {PLACEHOLDER}:{PLACEHOLDER}"),
        icon_code: String::new(),
        tooltip: "No forecast available".to_string(),
    }
}

/// Alerts joined into one scrolling line, or a "Last Sync" status when there are none.
pub fn banner<Tz>(alerts: &[WeatherAlert], now: &DateTime<Tz>) -> Banner
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if alerts.is_empty() {
        return Banner {
            text: format!("Last Sync: {}", now.format("%H:%M")),
            kind: BannerKind::Status,
        };
    }

    let text = alerts
        .iter()
        .map(|a| {
            let description = a.description.replace(['\r', '\n'], " ");
            format!("*** {}: {} ***", a.event.to_uppercase(), description.trim())
        })
        .collect::<Vec<_>>()
        .join(ALERT_SEPARATOR);

    Banner {
        text,
        kind: BannerKind::Alert,
    }
}

/// Translucent panels behind the current block, the detail block and each forecast cell.
fn glass_overlay() -> RgbaImage {
    let mut overlay = RgbaImage::new(SCREEN_WIDTH, SCREEN_HEIGHT);
    let glass = Rgba([0, 0, 0, 60]);

    let rim = Rgba([255, 255, 255, 30]);

    draw_panel(&mut overlay, (10, 45, 485, 290), glass, rim);
    draw_panel(&mut overlay, (520, 45, 790, 275), glass, rim);

    for i in 0..FORECAST_DAYS as i32 {
        let x = (CELL_LEFT + i * CELL_PITCH) as u32;
        let (top, bottom) = (CELL_TOP as u32, CELL_BOTTOM as u32);
        let cell_rim = Rgba([255, 255, 255, 40]);
        draw_panel(&mut overlay, (x, top, x + 152, bottom), glass, cell_rim);
        draw_panel(
            &mut overlay,
            (x + 3, 355, x + 149, 435),
            Rgba([0, 0, 0, 175]),
            Rgba([255, 255, 255, 20]),
        );
    }

    overlay
}

/// Filled rectangle with a one pixel outline; corners are inclusive.
fn draw_panel(img: &mut RgbaImage, rect: (u32, u32, u32, u32), fill: Rgba<u8>, outline: Rgba<u8>) {
    let (x0, y0) = (rect.0, rect.1);
    let x1 = rect.2.min(img.width() - 1);
    let y1 = rect.3.min(img.height() - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let edge = x == x0 || x == x1 || y == y0 || y == y1;
            img.put_pixel(x, y, if edge { outline } else { fill });
        }
    }
}
