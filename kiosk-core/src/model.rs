use serde::{Deserialize, Serialize};

/// Where the kiosk is. All values are kept as the strings the settings store holds,
/// so change detection is a plain string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    Coordinates { lat: String, lon: String },
    /// A postal code that has not been geocoded yet. Never runnable on its own.
    ZipCode(String),
    Named {
        lat: String,
        lon: String,
        city_name: String,
        state_abbr: String,
    },
}

impl Location {
    pub fn coordinates(&self) -> Option<(&str, &str)> {
        match self {
            Location::Coordinates { lat, lon } | Location::Named { lat, lon, .. } => {
                Some((lat.as_str(), lon.as_str()))
            }
            Location::ZipCode(_) => None,
        }
    }

    /// "City, ST" when both parts were configured explicitly.
    pub fn display_name(&self) -> Option<String> {
        match self {
            Location::Named { city_name, state_abbr, .. }
                if !city_name.trim().is_empty() && !state_abbr.trim().is_empty() =>
            {
                Some(format!("{city_name}, {state_abbr}"))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub location: Location,
}

impl Credentials {
    /// True when every field the location mode needs is present and non-empty.
    ///
    /// A bare postal code is never complete: it has to be geocoded into a
    /// [`Location::Named`] before a cycle can run.
    pub fn is_complete(&self) -> bool {
        self.missing_field().is_none()
    }

    /// Name of the first required field that is absent, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        let blank = |s: &str| s.trim().is_empty();

        if blank(&self.api_key) {
            return Some("api_key");
        }

        match &self.location {
            Location::Coordinates { lat, .. } | Location::Named { lat, .. } if blank(lat) => {
                Some("lat")
            }
            Location::Coordinates { lon, .. } | Location::Named { lon, .. } if blank(lon) => {
                Some("lon")
            }
            Location::Named { city_name, .. } if blank(city_name) => Some("city_name"),
            Location::Named { state_abbr, .. } if blank(state_abbr) => Some("state_abbr"),
            Location::ZipCode(_) => Some("lat"),
            _ => None,
        }
    }
}

/// Normalized result of one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Provider timezone name, e.g. "America/New_York".
    pub timezone: Option<String>,
    pub current: CurrentConditions,
    /// Daily entries as delivered; index 0 is today.
    pub daily: Vec<DailyForecast>,
    pub alerts: Vec<WeatherAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub timestamp: Option<i64>,
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub wind_speed: Option<f64>,
    pub uv_index: Option<f64>,
    /// Raw meters, as the provider reports it.
    pub visibility_m: Option<f64>,
    pub dew_point: Option<f64>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DailyTemperature {
    pub day: f64,
    pub night: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub timestamp: i64,
    pub temperature: DailyTemperature,
    pub feels_like_day: Option<f64>,
    pub humidity: Option<u8>,
    pub clouds: Option<u8>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub event: String,
    pub description: String,
    pub sender: Option<String>,
}
