//! Core library for the weather kiosk.
//!
//! This crate defines:
//! - The refresh cycle: fetch, decode, compose, publish
//! - Icon/background caching and display composition
//! - The banner ticker and idle-cursor state machines
//! - The configuration gate in front of the settings store
//!
//! Everything runs on one event loop ([`Kiosk`]); rendering and the setup form
//! are supplied by the embedding binary through [`RenderTargets`] and
//! [`SetupCollaborator`].

pub mod compose;
pub mod config;
pub mod error;
pub mod fonts;
pub mod gate;
pub mod icons;
pub mod idle;
pub mod kiosk;
pub mod model;
pub mod provider;
pub mod render;
pub mod scheduler;
pub mod settings;
pub mod ticker;
pub mod timer;

pub use config::{KioskConfig, UnitSystem};
pub use error::{KioskError, KioskResult};
pub use gate::{
    ConfigurationGate, GateDecision, LocationInput, SetupPrefill, SetupSubmission, SubmitOutcome,
};
pub use kiosk::{Kiosk, KioskContext, KioskEvent, SetupCollaborator};
pub use model::{Credentials, Location, WeatherSnapshot};
pub use provider::{Geocoder, WeatherProvider};
pub use render::{RenderArtifacts, RenderTargets, TargetError};
