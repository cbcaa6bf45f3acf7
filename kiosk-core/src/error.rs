//! Error taxonomy for the refresh-and-render pipeline.
//!
//! Nothing in the refresh path is fatal: every variant here is either logged
//! and retried on the next fixed tick, or surfaced to the setup prompt.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::ParseError;

pub type KioskResult<T> = Result<T, KioskError>;

#[derive(Debug, Error)]
pub enum KioskError {
    /// Credentials or location are missing; the display routes to setup.
    #[error("Configuration incomplete: {0}")]
    ConfigIncomplete(String),

    /// Timeout, connection error or non-success status from the provider.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The provider answered, but the payload was unusable.
    #[error("Provider data error: {0}")]
    ProviderDataError(#[from] ParseError),

    /// An icon or background file is absent or could not be decoded.
    #[error("Asset missing: {} ({reason})", path.display())]
    AssetMissing { path: PathBuf, reason: String },

    /// Setup-time postal code lookup failed. The message is shown to the user as-is.
    #[error("{0}")]
    GeocodeFailure(String),

    #[error("Settings store error: {0}")]
    Storage(String),
}

impl KioskError {
    /// Whether the refresh loop should simply try again on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KioskError::NetworkFailure(_) | KioskError::ProviderDataError(_))
    }
}
