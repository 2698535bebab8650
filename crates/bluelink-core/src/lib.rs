//! bluelink-core - Core types for connected-vehicle sessions
//!
//! This crate holds the pieces that do not touch the network: the closed
//! brand/region/language enums, credential and session models, and the
//! seat climate validator used to sanitize climate commands before they
//! are sent to a vehicle.

pub mod brand;
pub mod climate;
pub mod error;
pub mod models;

pub use brand::{Brand, Language, Region};
pub use climate::{
    normalize_heated_features, seat_heater_vent_info, HeatedFeatures, SeatClimateMapping,
    SeatClimateValidator,
};
pub use error::{ConfigError, ConfigResult};
pub use models::{bare_token, prefix_token_type, Credentials, Session, TokenSet};
