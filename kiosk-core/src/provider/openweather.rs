use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{
    config::UnitSystem,
    error::{KioskError, KioskResult},
    model::{
        Credentials, CurrentConditions, DailyForecast, DailyTemperature, WeatherAlert,
        WeatherSnapshot,
    },
};

use super::{ParseError, WeatherProvider, truncate_body};

/// OpenWeather One Call client: current conditions, daily forecast and alerts in one GET.
#[derive(Debug, Clone)]
pub struct OneCallProvider {
    base_url: String,
    units: UnitSystem,
    http: Client,
}

impl OneCallProvider {
    pub fn new(
        base_url: impl Into<String>,
        units: UnitSystem,
        timeout: Duration,
    ) -> KioskResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KioskError::NetworkFailure(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            units,
            http,
        })
    }
}

#[async_trait]
impl WeatherProvider for OneCallProvider {
    async fn fetch(&self, credentials: &Credentials) -> KioskResult<WeatherSnapshot> {
        let (lat, lon) = credentials.location.coordinates().ok_or_else(|| {
            KioskError::ConfigIncomplete("location has no coordinates".to_string())
        })?;

        debug!(lat, lon, units = self.units.as_query(), "requesting one call payload");

        // `without_url` keeps the appid out of logged errors.
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", lat),
                ("lon", lon),
                ("appid", credentials.api_key.as_str()),
                ("units", self.units.as_query()),
            ])
            .send()
            .await
            .map_err(|e| KioskError::NetworkFailure(e.without_url().to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| KioskError::NetworkFailure(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(KioskError::NetworkFailure(format!(
                "One Call request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        Ok(decode(&body)?)
    }
}

/// Typed decode of a One Call body.
///
/// Only `current` and `current.temp` are required; every other field falls
/// back to `None` or an empty value so composition can substitute placeholders.
pub fn decode(body: &str) -> Result<WeatherSnapshot, ParseError> {
    let parsed: OcResponse =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let current = parsed.current.ok_or(ParseError::MissingCurrent)?;
    let temperature = current.temp.ok_or(ParseError::MissingField("temp"))?;
    let (description, icon) = first_condition(current.weather);

    let current = CurrentConditions {
        timestamp: current.dt,
        temperature,
        feels_like: current.feels_like,
        humidity: current.humidity,
        wind_speed: current.wind_speed,
        uv_index: current.uvi,
        visibility_m: current.visibility,
        dew_point: current.dew_point,
        sunrise: current.sunrise,
        sunset: current.sunset,
        description,
        icon,
    };

    let daily = parsed
        .daily
        .into_iter()
        .map(|d| {
            let (description, icon) = first_condition(d.weather);
            DailyForecast {
                timestamp: d.dt,
                temperature: DailyTemperature {
                    day: d.temp.day,
                    night: d.temp.night,
                    min: d.temp.min,
                    max: d.temp.max,
                },
                feels_like_day: d.feels_like.and_then(|f| f.day),
                humidity: d.humidity,
                clouds: d.clouds,
                sunrise: d.sunrise,
                sunset: d.sunset,
                description,
                icon,
            }
        })
        .collect();

    let alerts = parsed
        .alerts
        .into_iter()
        .map(|a| WeatherAlert {
            event: a.event.filter(|e| !e.trim().is_empty()).unwrap_or_else(|| "Alert".to_string()),
            description: a.description,
            sender: a.sender_name,
        })
        .collect();

    Ok(WeatherSnapshot {
        timezone: parsed.timezone,
        current,
        daily,
        alerts,
    })
}

fn first_condition(weather: Vec<OcWeather>) -> (String, String) {
    weather
        .into_iter()
        .next()
        .map(|w| (w.description, w.icon))
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct OcWeather {
    #[serde(default)]
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OcCurrent {
    dt: Option<i64>,
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<u8>,
    wind_speed: Option<f64>,
    uvi: Option<f64>,
    visibility: Option<f64>,
    dew_point: Option<f64>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
    #[serde(default)]
    weather: Vec<OcWeather>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OcDailyTemp {
    day: f64,
    night: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct OcDailyFeelsLike {
    day: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OcDaily {
    #[serde(default)]
    dt: i64,
    #[serde(default)]
    temp: OcDailyTemp,
    feels_like: Option<OcDailyFeelsLike>,
    humidity: Option<u8>,
    clouds: Option<u8>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
    #[serde(default)]
    weather: Vec<OcWeather>,
}

#[derive(Debug, Deserialize)]
struct OcAlert {
    event: Option<String>,
    #[serde(default)]
    description: String,
    sender_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    timezone: Option<String>,
    current: Option<OcCurrent>,
    #[serde(default)]
    daily: Vec<OcDaily>,
    #[serde(default)]
    alerts: Vec<OcAlert>,
}
