use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    error::KioskResult,
    model::{Credentials, WeatherSnapshot},
};

pub mod openweather;
pub mod zippopotam;

pub use openweather::OneCallProvider;
pub use zippopotam::ZippopotamGeocoder;

/// Why a provider payload could not become a [`WeatherSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("response is not valid JSON for this schema: {0}")]
    InvalidJson(String),

    #[error("response has no `current` section")]
    MissingCurrent,

    #[error("`current.{0}` is missing")]
    MissingField(&'static str),
}

/// Source of current conditions, the daily forecast and active alerts.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, credentials: &Credentials) -> KioskResult<WeatherSnapshot>;
}

/// A postal code resolved to coordinates and a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodedPlace {
    pub lat: String,
    pub lon: String,
    pub city_name: String,
    pub state_abbr: String,
}

/// Setup-time postal code lookup.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn lookup(&self, postal_code: &str) -> KioskResult<GeocodedPlace>;
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
