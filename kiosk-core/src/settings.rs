//! Durable key-value settings: credentials and location.
//!
//! Absence of a key is the expected first-run state, not an error.

use std::{collections::BTreeMap, fs, path::PathBuf};

use tracing::{debug, info};

use crate::{
    error::{KioskError, KioskResult},
    model::{Credentials, Location},
};

pub mod keys {
    pub const API_KEY: &str = "api_key";
    pub const ZIP_CODE: &str = "zip_code";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
    pub const CITY_NAME: &str = "city_name";
    pub const STATE_ABBR: &str = "state_abbr";
}

pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    /// Store every entry or none of them.
    fn set_all(&mut self, entries: &[(&str, &str)]) -> KioskResult<()>;

    fn set(&mut self, key: &str, value: &str) -> KioskResult<()> {
        self.set_all(&[(key, value)])
    }
}

/// Flat string table persisted to a TOML file; every write goes straight to disk.
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl TomlSettingsStore {
    /// Open (or create) the table at `path`. Failure here is the one startup
    /// condition that should stop the process.
    pub fn open(path: PathBuf) -> KioskResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                KioskError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let values = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|e| KioskError::Storage(format!("cannot read {}: {e}", path.display())))?;
            toml::from_str(&contents)
                .map_err(|e| KioskError::Storage(format!("cannot parse {}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), keys = values.len(), "settings store opened");
        Ok(Self { path, values })
    }

    /// Replace the file through a sibling temp file so readers never see half a table.
    fn flush(&self) -> KioskResult<()> {
        let body = toml::to_string_pretty(&self.values)
            .map_err(|e| KioskError::Storage(format!("cannot serialize settings: {e}")))?;

        let staging = self.path.with_extension("toml.tmp");
        fs::write(&staging, body)
            .map_err(|e| KioskError::Storage(format!("cannot write {}: {e}", staging.display())))?;
        fs::rename(&staging, &self.path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            KioskError::Storage(format!("cannot replace {}: {e}", self.path.display()))
        })
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_all(&mut self, entries: &[(&str, &str)]) -> KioskResult<()> {
        let previous = self.values.clone();
        for (key, value) in entries {
            self.values.insert(key.to_string(), value.to_string());
        }

        if let Err(e) = self.flush() {
            self.values = previous;
            return Err(e);
        }

        debug!(keys = entries.len(), "settings saved");
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    values: BTreeMap<String, String>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_all(&mut self, entries: &[(&str, &str)]) -> KioskResult<()> {
        for (key, value) in entries {
            self.values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Non-empty value for `key`, treating blank strings as absent.
fn get_present(store: &dyn SettingsStore, key: &str) -> Option<String> {
    store.get(key).filter(|v| !v.trim().is_empty())
}

/// Rebuild credentials from whatever keys are stored. The result may be
/// incomplete; callers check [`Credentials::is_complete`].
pub fn load_credentials(store: &dyn SettingsStore) -> Credentials {
    let api_key = store.get(keys::API_KEY).unwrap_or_default();

    let coords = get_present(store, keys::LAT).zip(get_present(store, keys::LON));
    let names = get_present(store, keys::CITY_NAME).zip(get_present(store, keys::STATE_ABBR));

    let location = match (coords, names, get_present(store, keys::ZIP_CODE)) {
        (Some((lat, lon)), Some((city_name, state_abbr)), _) => Location::Named {
            lat,
            lon,
            city_name,
            state_abbr,
        },
        (Some((lat, lon)), None, _) => Location::Coordinates { lat, lon },
        (None, _, Some(zip)) => Location::ZipCode(zip),
        (None, _, None) => Location::Coordinates {
            lat: String::new(),
            lon: String::new(),
        },
    };

    Credentials { api_key, location }
}

/// Persist credentials, and the zip code they came from, in one write.
///
/// Switching to plain coordinates blanks the display-name keys so a stale
/// city is not picked up on the next start.
pub fn save_credentials(
    store: &mut dyn SettingsStore,
    credentials: &Credentials,
    zip_code: Option<&str>,
) -> KioskResult<()> {
    let mut entries = vec![(keys::API_KEY, credentials.api_key.as_str())];

    match &credentials.location {
        Location::Coordinates { lat, lon } => entries.extend([
            (keys::LAT, lat.as_str()),
            (keys::LON, lon.as_str()),
            (keys::CITY_NAME, ""),
            (keys::STATE_ABBR, ""),
        ]),
        Location::ZipCode(zip) => entries.push((keys::ZIP_CODE, zip.as_str())),
        Location::Named { lat, lon, city_name, state_abbr } => entries.extend([
            (keys::LAT, lat.as_str()),
            (keys::LON, lon.as_str()),
            (keys::CITY_NAME, city_name.as_str()),
            (keys::STATE_ABBR, state_abbr.as_str()),
        ]),
    }

    if let Some(zip) = zip_code {
        entries.push((keys::ZIP_CODE, zip));
    }

    store.set_all(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_loads_incomplete_credentials() {
        let store = MemorySettingsStore::new();
        let creds = load_credentials(&store);
        assert!(!creds.is_complete());
        assert_eq!(creds.missing_field(), Some("api_key"));
    }

    #[test]
    fn city_and_state_make_a_named_location() {
        let store = MemorySettingsStore::new()
            .with(keys::API_KEY, "KEY")
            .with(keys::LAT, "40.75")
            .with(keys::LON, "-73.99")
            .with(keys::CITY_NAME, "New York")
            .with(keys::STATE_ABBR, "NY");

        let creds = load_credentials(&store);
        assert!(creds.is_complete());
        assert_eq!(creds.location.display_name().as_deref(), Some("New York, NY"));
    }

    #[test]
    fn zip_without_coordinates_loads_as_zip_code() {
        let store = MemorySettingsStore::new()
            .with(keys::API_KEY, "KEY")
            .with(keys::ZIP_CODE, "10001");
        let creds = load_credentials(&store);
        assert_eq!(creds.location, Location::ZipCode("10001".into()));
        assert!(!creds.is_complete());
    }

    #[test]
    fn saving_coordinates_clears_stale_display_name() {
        let mut store = MemorySettingsStore::new()
            .with(keys::CITY_NAME, "Old Town")
            .with(keys::STATE_ABBR, "OT");

        let creds = Credentials {
            api_key: "KEY".into(),
            location: Location::Coordinates {
                lat: "1.5".into(),
                lon: "2.5".into(),
            },
        };
        save_credentials(&mut store, &creds, None).expect("memory store never fails");

        assert_eq!(load_credentials(&store), creds);
    }

    #[test]
    fn toml_store_writes_through_to_disk() {
        let dir = std::env::temp_dir()
            .join(format!("weather-kiosk-settings-{}", std::process::id()));
        let path = dir.join("settings.toml");
        let _ = fs::remove_file(&path);

        let mut store = TomlSettingsStore::open(path.clone()).expect("open should create the dir");
        assert_eq!(store.get(keys::API_KEY), None);
        store.set(keys::API_KEY, "SECRET").expect("set should persist");

        let reopened = TomlSettingsStore::open(path).expect("reopen should succeed");
        assert_eq!(reopened.get(keys::API_KEY).as_deref(), Some("SECRET"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn failed_flush_keeps_previous_values() {
        let dir = std::env::temp_dir()
            .join(format!("weather-kiosk-rollback-{}", std::process::id()));
        let path = dir.join("settings.toml");
        let _ = fs::remove_dir_all(&dir);

        let mut store = TomlSettingsStore::open(path.clone()).expect("open should create the dir");
        store
            .set_all(&[(keys::API_KEY, "OLD"), (keys::LAT, "1")])
            .expect("first save should persist");

        fs::remove_dir_all(&dir).expect("remove settings dir");
        let err = store.set_all(&[(keys::API_KEY, "NEW"), (keys::LAT, "9")]);

        assert!(matches!(err, Err(KioskError::Storage(_))));
        assert_eq!(store.get(keys::API_KEY).as_deref(), Some("OLD"));
        assert_eq!(store.get(keys::LAT).as_deref(), Some("1"));
    }
}
