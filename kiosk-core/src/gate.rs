//! Decides whether the refresh loop may run or setup must be shown instead.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{KioskError, KioskResult},
    model::{Credentials, Location},
    provider::Geocoder,
    settings::{SettingsStore, keys, load_credentials, save_credentials},
};

/// Values the setup form opens with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupPrefill {
    pub api_key: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Ready(Credentials),
    NeedsSetup(SetupPrefill),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationInput {
    ZipCode(String),
    Coordinates { lat: String, lon: String },
}

/// What the setup form hands back on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupSubmission {
    pub api_key: String,
    pub location: LocationInput,
}

/// A submission after validation and geocoding, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSetup {
    pub credentials: Credentials,
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub credentials: Credentials,
    /// False when the saved values equal the previous ones; no refresh is forced then.
    pub changed: bool,
}

#[derive(Debug)]
pub struct ConfigurationGate {
    geocoder: Arc<dyn Geocoder>,
    current: Option<Credentials>,
}

impl ConfigurationGate {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            geocoder,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Credentials> {
        self.current.as_ref()
    }

    pub fn geocoder(&self) -> Arc<dyn Geocoder> {
        Arc::clone(&self.geocoder)
    }

    /// Load stored credentials and decide whether the loop may start.
    pub fn startup(&mut self, store: &dyn SettingsStore) -> GateDecision {
        let credentials = load_credentials(store);

        if let Some(field) = credentials.missing_field() {
            info!(missing = field, "credentials incomplete; setup required");
            return GateDecision::NeedsSetup(SetupPrefill {
                api_key: credentials.api_key,
                zip_code: store.get(keys::ZIP_CODE).unwrap_or_default(),
            });
        }

        self.current = Some(credentials.clone());
        GateDecision::Ready(credentials)
    }

    /// Persist resolved credentials and report whether they differ from the previous ones.
    pub fn accept(
        &mut self,
        store: &mut dyn SettingsStore,
        resolved: ResolvedSetup,
    ) -> KioskResult<SubmitOutcome> {
        save_credentials(store, &resolved.credentials, resolved.zip_code.as_deref())?;

        let changed = self.current.as_ref() != Some(&resolved.credentials);
        if changed {
            info!("credentials changed");
        } else {
            info!("credentials saved unchanged");
        }

        self.current = Some(resolved.credentials.clone());
        Ok(SubmitOutcome {
            credentials: resolved.credentials,
            changed,
        })
    }

    /// Validate, geocode and persist in one go; used when no event loop is running.
    pub async fn submit(
        &mut self,
        store: &mut dyn SettingsStore,
        submission: SetupSubmission,
    ) -> KioskResult<SubmitOutcome> {
        let resolved = resolve(self.geocoder.as_ref(), submission).await?;
        self.accept(store, resolved)
    }
}

/// Validate a submission and, for postal codes, translate it to coordinates
/// and a display name. Nothing is persisted here.
pub async fn resolve(
    geocoder: &dyn Geocoder,
    submission: SetupSubmission,
) -> KioskResult<ResolvedSetup> {
    let api_key = submission.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(KioskError::ConfigIncomplete("API key is required".to_string()));
    }

    match submission.location {
        LocationInput::ZipCode(zip) => {
            let zip = zip.trim().to_string();
            if zip.is_empty() {
                return Err(KioskError::ConfigIncomplete("Zip Code is required".to_string()));
            }

            let place = geocoder.lookup(&zip).await.inspect_err(|e| warn!("{e}"))?;
            Ok(ResolvedSetup {
                credentials: Credentials {
                    api_key,
                    location: Location::Named {
                        lat: place.lat,
                        lon: place.lon,
                        city_name: place.city_name,
                        state_abbr: place.state_abbr,
                    },
                },
                zip_code: Some(zip),
            })
        }
        LocationInput::Coordinates { lat, lon } => {
            let lat = validate_coordinate("latitude", &lat, 90.0)?;
            let lon = validate_coordinate("longitude", &lon, 180.0)?;
            Ok(ResolvedSetup {
                credentials: Credentials {
                    api_key,
                    location: Location::Coordinates { lat, lon },
                },
                zip_code: None,
            })
        }
    }
}

fn validate_coordinate(name: &str, raw: &str, limit: f64) -> KioskResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(KioskError::ConfigIncomplete(format!("{name} is required")));
    }

    match raw.parse::<f64>() {
        Ok(v) if v.abs() <= limit => Ok(raw.to_string()),
        _ => Err(KioskError::ConfigIncomplete(format!("{name} must be a number within ±{limit}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{provider::GeocodedPlace, settings::MemorySettingsStore};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn lookup(&self, postal_code: &str) -> KioskResult<GeocodedPlace> {
            if postal_code == "10001" {
                Ok(GeocodedPlace {
                    lat: "40.7484".into(),
                    lon: "-73.9967".into(),
                    city_name: "New York City".into(),
                    state_abbr: "NY".into(),
                })
            } else {
                Err(KioskError::GeocodeFailure(format!("Could not find Zip Code: {postal_code}")))
            }
        }
    }

    fn gate() -> ConfigurationGate {
        ConfigurationGate::new(Arc::new(FixedGeocoder))
    }

    fn zip(code: &str) -> SetupSubmission {
        SetupSubmission {
            api_key: "KEY".into(),
            location: LocationInput::ZipCode(code.into()),
        }
    }

    #[test]
    fn first_run_needs_setup() {
        let mut gate = gate();
        let store = MemorySettingsStore::new().with(keys::ZIP_CODE, "10001");

        match gate.startup(&store) {
            GateDecision::NeedsSetup(prefill) => assert_eq!(prefill.zip_code, "10001"),
            other => panic!("expected setup, got {other:?}"),
        }
        assert!(gate.current().is_none());
    }

    #[test]
    fn complete_store_is_ready() {
        let mut gate = gate();
        let store = MemorySettingsStore::new()
            .with(keys::API_KEY, "KEY")
            .with(keys::LAT, "1")
            .with(keys::LON, "2");

        assert!(matches!(gate.startup(&store), GateDecision::Ready(_)));
        assert!(gate.current().is_some());
    }

    #[tokio::test]
    async fn zip_submission_is_geocoded_and_persisted() {
        let mut gate = gate();
        let mut store = MemorySettingsStore::new();

        let outcome = gate.submit(&mut store, zip("10001")).await.expect("known zip");
        assert!(outcome.changed);
        assert_eq!(store.get(keys::CITY_NAME).as_deref(), Some("New York City"));
        assert_eq!(store.get(keys::ZIP_CODE).as_deref(), Some("10001"));
        assert_eq!(store.get(keys::LAT).as_deref(), Some("40.7484"));
    }

    #[tokio::test]
    async fn unknown_zip_persists_nothing() {
        let mut gate = gate();
        let mut store = MemorySettingsStore::new();

        let err = gate.submit(&mut store, zip("00000")).await.unwrap_err();
        assert!(matches!(err, KioskError::GeocodeFailure(_)));
        assert_eq!(store.get(keys::API_KEY), None);
    }

    /// Refuses any write that touches `key`, storing nothing from it.
    struct RejectingStore {
        inner: MemorySettingsStore,
        key: &'static str,
    }

    impl SettingsStore for RejectingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set_all(&mut self, entries: &[(&str, &str)]) -> KioskResult<()> {
            if entries.iter().any(|(k, _)| *k == self.key) {
                return Err(KioskError::Storage(format!("cannot write {}", self.key)));
            }
            self.inner.set_all(entries)
        }
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_credentials_together() {
        let mut gate = gate();
        let mut store = RejectingStore {
            inner: MemorySettingsStore::new()
                .with(keys::API_KEY, "OLD")
                .with(keys::LAT, "1")
                .with(keys::LON, "2"),
            key: keys::LAT,
        };
        assert!(matches!(gate.startup(&store), GateDecision::Ready(_)));

        let submission = SetupSubmission {
            api_key: "NEW".into(),
            ..zip("10001")
        };
        let err = gate.submit(&mut store, submission).await;

        assert!(matches!(err, Err(KioskError::Storage(_))));
        assert_eq!(store.get(keys::API_KEY).as_deref(), Some("OLD"));
        assert_eq!(store.get(keys::LAT).as_deref(), Some("1"));
        assert_eq!(gate.current().map(|c| c.api_key.as_str()), Some("OLD"));
    }

    #[tokio::test]
    async fn resubmitting_same_values_is_unchanged() {
        let mut gate = gate();
        let mut store = MemorySettingsStore::new();

        assert!(gate.submit(&mut store, zip("10001")).await.expect("first save").changed);
        assert!(!gate.submit(&mut store, zip("10001")).await.expect("second save").changed);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let blank_key = SetupSubmission {
            api_key: " ".into(),
            ..zip("10001")
        };
        let err = resolve(&FixedGeocoder, blank_key).await.unwrap_err();
        assert!(matches!(err, KioskError::ConfigIncomplete(_)));

        let err = resolve(&FixedGeocoder, zip("")).await.unwrap_err();
        assert!(matches!(err, KioskError::ConfigIncomplete(_)));
    }

    #[tokio::test]
    async fn coordinates_are_range_checked() {
        let bad = SetupSubmission {
            api_key: "KEY".into(),
            location: LocationInput::Coordinates {
                lat: "95".into(),
                lon: "0".into(),
            },
        };
        assert!(resolve(&FixedGeocoder, bad).await.is_err());

        let good = SetupSubmission {
            api_key: "KEY".into(),
            location: LocationInput::Coordinates {
                lat: " 45.5 ".into(),
                lon: "-122.6".into(),
            },
        };
        let resolved = resolve(&FixedGeocoder, good).await.expect("valid coordinates");
        assert_eq!(
            resolved.credentials.location,
            Location::Coordinates {
                lat: "45.5".into(),
                lon: "-122.6".into()
            }
        );
    }
}
