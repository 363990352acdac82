//! Clustered people map: validation, spatial clustering, icon synthesis,
//! engine readiness and the single-overlay interaction model.
//!
//! The host supplies raw location records and a photo source; everything
//! between those and the rendered shapes lives here.

pub mod cluster;
pub mod config;
pub mod controller;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod icons;
pub mod interaction;
pub mod models;
pub mod projection;
pub mod readiness;
pub mod scene;
pub mod session;
pub mod svg;
pub mod validate;
pub mod viewport;

pub use config::EngineConfig;
pub use error::MapError;
pub use session::PeopleMap;
