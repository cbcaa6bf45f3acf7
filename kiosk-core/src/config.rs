use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

/// The single unit system a kiosk run displays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Imperial,
    Metric,
}

impl UnitSystem {
    /// Value of the provider's `units` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "imperial",
            UnitSystem::Metric => "metric",
        }
    }

    /// Meters per displayed distance unit.
    pub fn meters_per_distance_unit(&self) -> f64 {
        match self {
            UnitSystem::Imperial => 1609.34,
            UnitSystem::Metric => 1000.0,
        }
    }

    pub fn distance_label(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "mi",
            UnitSystem::Metric => "km",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            UnitSystem::Imperial => "mph",
            UnitSystem::Metric => "m/s",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    pub interval_ms: u64,
    /// Pixels moved left per tick.
    pub step: f32,
    /// Offset the banner restarts from (right edge of the screen).
    pub start_x: f32,
    /// Once the offset drops below this the text has left the screen.
    pub wrap_at: f32,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 35,
            step: 2.0,
            start_x: 800.0,
            wrap_at: -1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub onecall_url: String,
    pub geocode_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            onecall_url: "https://api.openweathermap.org/data/3.0/onecall".to_string(),
            geocode_url: "https://api.zippopotam.us/us".to_string(),
        }
    }
}

/// Runtime tuning for the kiosk, stored as TOML.
///
/// Example TOML:
/// ```toml
/// units = "metric"
/// asset_dir = "/opt/kiosk/images"
///
/// [ticker]
/// interval_ms = 40
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub refresh_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub units: UnitSystem,
    /// Directory holding `{code}_bg.png`, `{code}_t@2x.png` and `{code}_t@4x.png`.
    pub asset_dir: PathBuf,
    /// Overrides the platform data dir location of `settings.toml`.
    pub settings_path: Option<PathBuf>,
    pub ticker: TickerConfig,
    pub provider: ProviderEndpoints,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 600,
            fetch_timeout_secs: 10,
            idle_timeout_secs: 180,
            units: UnitSystem::default(),
            asset_dir: PathBuf::from("images"),
            settings_path: None,
            ticker: TickerConfig::default(),
            provider: ProviderEndpoints::default(),
        }
    }
}

impl KioskConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn ticker_interval(&self) -> Duration {
        Duration::from_millis(self.ticker.interval_ms)
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: KioskConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Reject values that would stall the loop or keep the banner from wrapping.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("refresh_interval_secs", self.refresh_interval_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("idle_timeout_secs", self.idle_timeout_secs),
            ("ticker.interval_ms", self.ticker.interval_ms),
        ] {
            if value == 0 {
                bail!("`{name}` must be greater than zero");
            }
        }

        let ticker = &self.ticker;
        if ticker.step.is_nan() || ticker.step <= 0.0 {
            bail!("`ticker.step` must be greater than zero, got {}", ticker.step);
        }
        if ticker.wrap_at.is_nan() || ticker.start_x.is_nan() || ticker.wrap_at >= ticker.start_x {
            bail!(
                "`ticker.wrap_at` ({}) must be left of `ticker.start_x` ({})",
                ticker.wrap_at,
                ticker.start_x
            );
        }

        Ok(())
    }

    /// Save config, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("kiosk.toml"))
    }

    /// Where the settings store lives unless `settings_path` overrides it.
    pub fn resolved_settings_path(&self) -> Result<PathBuf> {
        match &self.settings_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("settings.toml")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-kiosk", "weather-kiosk")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_kiosk_cadence() {
        let cfg = KioskConfig::default();

        assert_eq!(cfg.refresh_interval(), Duration::from_secs(600));
        assert_eq!(cfg.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.idle_timeout(), Duration::from_secs(180));
        assert_eq!(cfg.ticker_interval(), Duration::from_millis(35));
        assert_eq!(cfg.units, UnitSystem::Imperial);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg: KioskConfig = toml::from_str(
            r#"
            units = "metric"

            [ticker]
            step = 3.0
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(cfg.units, UnitSystem::Metric);
        assert_eq!(cfg.ticker.step, 3.0);
        assert_eq!(cfg.ticker.start_x, 800.0);
        assert_eq!(cfg.refresh_interval_secs, 600);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("weather-kiosk-does-not-exist/kiosk.toml");
        let cfg = KioskConfig::load_from(&path).expect("missing file is not an error");
        assert_eq!(cfg, KioskConfig::default());
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = std::env::temp_dir().join(format!("weather-kiosk-config-{}", std::process::id()));
        let path = dir.join("kiosk.toml");

        let mut cfg = KioskConfig::default();
        cfg.idle_timeout_secs = 60;
        cfg.save_to(&path).expect("save should succeed");

        let loaded = KioskConfig::load_from(&path).expect("load should succeed");
        assert_eq!(loaded.idle_timeout_secs, 60);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn visibility_constant_follows_unit_system() {
        assert_eq!(UnitSystem::Imperial.meters_per_distance_unit(), 1609.34);
        assert_eq!(UnitSystem::Metric.meters_per_distance_unit(), 1000.0);
        assert_eq!(UnitSystem::Metric.as_query(), "metric");
    }

    #[test]
    fn stalling_values_are_rejected() {
        assert!(KioskConfig::default().validate().is_ok());

        let zero_refresh = KioskConfig {
            refresh_interval_secs: 0,
            ..KioskConfig::default()
        };
        assert!(zero_refresh.validate().is_err());

        let mut cfg = KioskConfig::default();
        cfg.ticker.interval_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = KioskConfig::default();
        cfg.ticker.step = -2.0;
        assert!(cfg.validate().is_err());

        let mut cfg = KioskConfig::default();
        cfg.ticker.wrap_at = 900.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_refuses_negative_ticker_step() {
        let dir = std::env::temp_dir().join(format!("weather-kiosk-badcfg-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create config dir");
        let path = dir.join("kiosk.toml");
        fs::write(&path, "[ticker]\nstep = -1.0\n").expect("write config");

        let err = KioskConfig::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("ticker.step"));

        let _ = fs::remove_dir_all(dir);
    }
}
