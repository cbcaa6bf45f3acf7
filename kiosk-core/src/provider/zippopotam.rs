use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::{error, info};

use crate::error::{KioskError, KioskResult};

use super::{GeocodedPlace, Geocoder};

/// Keyless US postal code lookup (zippopotam.us).
#[derive(Debug, Clone)]
pub struct ZippopotamGeocoder {
    base_url: String,
    http: Client,
}

impl ZippopotamGeocoder {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> KioskResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KioskError::GeocodeFailure(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }
}

#[async_trait]
impl Geocoder for ZippopotamGeocoder {
    async fn lookup(&self, postal_code: &str) -> KioskResult<GeocodedPlace> {
        let url = lookup_url(&self.base_url, postal_code)?;

        let res = self.http.get(url).send().await.map_err(|e| {
            error!("Geocoding error: {e}");
            KioskError::GeocodeFailure("Failed to connect to geocoding service".to_string())
        })?;

        if res.status() != StatusCode::OK {
            return Err(not_found(postal_code));
        }

        let parsed: ZpResponse = res.json().await.map_err(|e| {
            error!("Geocoding response unreadable: {e}");
            not_found(postal_code)
        })?;

        let place = place_from(parsed).ok_or_else(|| not_found(postal_code))?;
        info!(city = %place.city_name, state = %place.state_abbr, "postal code resolved");
        Ok(place)
    }
}

/// `{base}/{zip}` with the zip escaped as a single path segment.
fn lookup_url(base_url: &str, postal_code: &str) -> KioskResult<Url> {
    let invalid = || KioskError::GeocodeFailure(format!("invalid geocoding URL: {base_url}"));

    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    url.path_segments_mut().map_err(|()| invalid())?.pop_if_empty().push(postal_code.trim());
    Ok(url)
}

fn not_found(postal_code: &str) -> KioskError {
    KioskError::GeocodeFailure(format!("Could not find Zip Code: {postal_code}"))
}

fn place_from(parsed: ZpResponse) -> Option<GeocodedPlace> {
    let place = parsed.places.into_iter().next()?;
    Some(GeocodedPlace {
        lat: place.latitude,
        lon: place.longitude,
        city_name: place.place_name,
        state_abbr: place.state_abbreviation,
    })
}

#[derive(Debug, Deserialize)]
struct ZpPlace {
    latitude: String,
    longitude: String,
    #[serde(rename = "place name")]
    place_name: String,
    #[serde(rename = "state abbreviation")]
    state_abbreviation: String,
}

#[derive(Debug, Deserialize)]
struct ZpResponse {
    #[serde(default)]
    places: Vec<ZpPlace>,
}
