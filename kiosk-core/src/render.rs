//! Finished display content and the passive slots it is written into.

use image::RgbaImage;
use thiserror::Error;

pub const SCREEN_WIDTH: u32 = 800;
pub const SCREEN_HEIGHT: u32 = 480;

/// Number of forecast cells on screen.
pub const FORECAST_DAYS: usize = 5;

/// Horizontal pitch of the forecast row.
pub const CELL_PITCH: i32 = 158;
/// Left edge of the first forecast panel.
pub const CELL_LEFT: i32 = 10;
pub const CELL_TOP: i32 = 305;
pub const CELL_BOTTOM: i32 = 442;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ForecastCell {
    /// e.g. "TUE 03/12"
    pub header: String,
    /// Day temperature and day feels-like, e.g. "71°/69°"
    pub temperatures: String,
    /// e.g. "L:52 H:74"
    pub range: String,
    pub humidity: String,
    pub sunrise: String,
    pub sunset: String,
    pub icon_code: String,
    /// Multi-line hover text.
    pub tooltip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BannerKind {
    /// One or more active alerts; rendered with urgent styling.
    Alert,
    /// "Last Sync" status line.
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub text: String,
    pub kind: BannerKind,
}

/// Everything one refresh cycle publishes, built completely before any
/// target is touched.
#[derive(Debug, Clone)]
pub struct RenderArtifacts {
    pub location: String,
    pub temperature: String,
    pub description: String,
    pub date: String,
    pub details: String,
    pub forecast: [ForecastCell; FORECAST_DAYS],
    pub banner: Banner,
    /// Full-screen composite: background, glass panels, icons and text.
    pub background: RgbaImage,
}

#[derive(Debug, Error)]
pub enum TargetError {
    /// The slot was torn down (window closed, output removed).
    #[error("render target no longer exists")]
    Gone,

    #[error("render target error: {0}")]
    Other(String),
}

/// Passive output slots. The core writes to them and never reads back.
pub trait RenderTargets {
    /// Overwrite every content slot from one cycle's artifacts.
    fn publish(&mut self, artifacts: &RenderArtifacts) -> Result<(), TargetError>;

    fn set_banner_offset(&mut self, offset: f32) -> Result<(), TargetError>;

    fn set_cursor_visible(&mut self, visible: bool) -> Result<(), TargetError>;

    fn show_tooltip(&mut self, text: Option<&str>) -> Result<(), TargetError>;
}

/// Forecast cell under a pointer position, if any.
pub fn forecast_cell_at(x: i32, y: i32) -> Option<usize> {
    if !(CELL_TOP..=CELL_BOTTOM).contains(&y) || x < CELL_LEFT {
        return None;
    }

    let idx = ((x - CELL_LEFT) / CELL_PITCH) as usize;
    (idx < FORECAST_DAYS).then_some(idx)
}
