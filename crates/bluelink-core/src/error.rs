//! Construction-time configuration errors

use thiserror::Error;

use crate::brand::{Brand, Region};

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid brand, region or language supplied at construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Brand string not recognized
    #[error("Unknown brand: {0}")]
    UnknownBrand(String),

    /// Region string not recognized
    #[error("Unknown region: {0}")]
    UnknownRegion(String),

    /// Language code outside the allow-list
    #[error("The language code {code} is not managed. Only {allowed} are.")]
    UnsupportedLanguage { code: String, allowed: String },

    /// Brand exists but has no backend in this region
    #[error("Brand {brand} is not available in region {region}")]
    UnsupportedCombination { brand: Brand, region: Region },

    /// A configured URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
