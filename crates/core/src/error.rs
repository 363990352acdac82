use thiserror::Error;

/// Failures surfaced to the host.
///
/// Validation and asset problems never show up here: they are absorbed where
/// they happen and only counted in [`crate::session::Diagnostics`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("map engine is not ready")]
    EngineNotReady,
    #[error("map engine failed: {0}")]
    EngineFatal(String),
    #[error("failed to render people on the map: {0}")]
    RenderFailure(String),
    #[error("no records have a valid location")]
    NoValidLocations,
    #[error("map has been disposed")]
    Disposed,
    #[error("cluster cannot be expanded any further")]
    ExpansionUnavailable,
}

impl MapError {
    /// Text suitable for showing to the person looking at the map.
    pub fn user_message(&self) -> &'static str {
        match self {
            MapError::EngineNotReady => {
                "The map is still loading. Please wait a moment and try again."
            }
            MapError::EngineFatal(_) => {
                "The map failed to initialize. Please check your internet connection and retry."
            }
            MapError::RenderFailure(_) => {
                "People could not be drawn on the map. The map was positioned but pins are not visible."
            }
            MapError::NoValidLocations => {
                "No users have valid location data to display on the map."
            }
            MapError::Disposed => "The map has been closed.",
            MapError::ExpansionUnavailable => "These people share the same location.",
        }
    }

    /// Whether the host may offer a retry (full re-initialization or a new render).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MapError::EngineNotReady | MapError::EngineFatal(_) | MapError::RenderFailure(_)
        )
    }
}

/// Why a raw record was dropped by the validator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationIssue {
    #[error("record has no user")]
    MissingUser,
    #[error("record has no location")]
    MissingLocation,
    #[error("location has no {0}")]
    MissingCoordinate(&'static str),
    #[error("{axis} {raw:?} is not a finite number")]
    Unparseable { axis: &'static str, raw: String },
    #[error("coordinate ({lat}, {lng}) is out of range")]
    OutOfRange { lat: f64, lng: f64 },
}

/// Why a photo could not be used for a pin. Always replaced by the default avatar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetFailure {
    #[error("no photo available")]
    Missing,
    #[error("photo fetch failed: {0}")]
    Fetch(String),
    #[error("photo fetch timed out")]
    Timeout,
    #[error("photo could not be decoded: {0}")]
    Decode(String),
}
