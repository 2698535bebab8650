//! Brand, region and language identifiers
//!
//! All three are closed sets. Parsing from strings is case-insensitive and
//! fails with a [`ConfigError`] rather than falling back to a default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Vehicle manufacturer brand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Hyundai,
    Kia,
    Genesis,
}

impl Brand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Hyundai => "hyundai",
            Brand::Kia => "kia",
            Brand::Genesis => "genesis",
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hyundai" => Ok(Brand::Hyundai),
            "kia" => Ok(Brand::Kia),
            "genesis" => Ok(Brand::Genesis),
            _ => Err(ConfigError::UnknownBrand(s.to_string())),
        }
    }
}

/// Backend region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "EU")]
    Eu,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Us => "US",
            Region::Eu => "EU",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            _ => Err(ConfigError::UnknownRegion(s.to_string())),
        }
    }
}

/// Language codes accepted by the European backends
pub const EU_LANGUAGES: &[&str] = &[
    "cs", "da", "nl", "en", "fi", "fr", "de", "it", "pl", "hu", "no", "sk", "es", "sv",
];

/// Language used when none is configured
pub const DEFAULT_LANGUAGE: &str = "en";

/// A validated language code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Language(&'static str);

impl Language {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Language(DEFAULT_LANGUAGE)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        EU_LANGUAGES
            .iter()
            .find(|code| **code == lower)
            .copied()
            .map(Language)
            .ok_or_else(|| ConfigError::UnsupportedLanguage {
                code: s.to_string(),
                allowed: EU_LANGUAGES.join(", "),
            })
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
