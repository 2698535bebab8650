//! Seat climate validation and climate command normalization
//!
//! Seat heating/ventilation and heated-zone commands are closed integer
//! enums on the wire. [`SeatClimateValidator::validate`] yields the allow-list
//! for a brand/region pair; only Hyundai US has one; every other pair gets
//! an empty mapping, which silently disables seat climate commands.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::brand::{Brand, Region};

/// Seat status codes with their meaning
pub const SEAT_STATUS_LABELS: &[(u8, &str)] = &[
    (0, "Off"),
    (1, "On"),
    (2, "Off"),
    (3, "Low Cool"),
    (4, "Medium Cool"),
    (5, "High Cool"),
    (6, "Low Heat"),
    (7, "Medium Heat"),
    (8, "High Heat"),
];

/// Heated-zone codes (`heating1`) with their meaning
pub const HEAT_ZONE_LABELS: &[(u8, &str)] = &[
    (0, "Off"),
    (1, "Steering Wheel and Rear Window"),
    (2, "Rear Window"),
    (3, "Steering Wheel"),
];

/// Extra heat code accepted in the EU region. Its meaning is undocumented.
pub const EU_UNTRANSLATED_HEAT_CODE: u8 = 4;

/// User-facing seat name -> wire key
const SEAT_WIRE_KEYS: &[(&str, &str)] = &[
    ("driverSeat", "drvSeatHeatState"),
    ("passengerSeat", "astSeatHeatState"),
    ("rearLeftSeat", "rlSeatHeatState"),
    ("rearRightSeat", "rrSeatHeatState"),
];

/// Allow-lists for seat climate commands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeatClimateMapping {
    pub valid_seats: BTreeMap<&'static str, &'static str>,
    pub valid_status: BTreeSet<u8>,
    pub valid_heats: BTreeSet<u8>,
}

impl SeatClimateMapping {
    /// Mapping with every seat, status and heat code valid in `region`
    pub fn for_region(region: Region) -> Self {
        let mut valid_heats: BTreeSet<u8> = HEAT_ZONE_LABELS.iter().map(|(c, _)| *c).collect();
        if region == Region::Eu {
            valid_heats.insert(EU_UNTRANSLATED_HEAT_CODE);
        }
        Self {
            valid_seats: SEAT_WIRE_KEYS.iter().copied().collect(),
            valid_status: SEAT_STATUS_LABELS.iter().map(|(c, _)| *c).collect(),
            valid_heats,
        }
    }

    /// Mapping that accepts nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.valid_seats.is_empty() && self.valid_status.is_empty() && self.valid_heats.is_empty()
    }

    /// Wire key for a user-facing seat name
    pub fn seat_key(&self, seat: &str) -> Option<&'static str> {
        self.valid_seats.get(seat).copied()
    }

    pub fn status(&self, code: i64) -> Option<u8> {
        u8::try_from(code)
            .ok()
            .filter(|c| self.valid_status.contains(c))
    }

    pub fn heat(&self, code: i64) -> Option<u8> {
        u8::try_from(code).ok().filter(|c| self.valid_heats.contains(c))
    }
}

/// Derives the seat climate allow-list for a brand/region pair
pub struct SeatClimateValidator;

impl SeatClimateValidator {
    pub fn validate(brand: Brand, region: Region) -> SeatClimateMapping {
        match (brand, region) {
            (Brand::Hyundai, Region::Us) => SeatClimateMapping::for_region(region),
            _ => SeatClimateMapping::empty(),
        }
    }
}

/// Label for a seat status code
pub fn seat_status_label(code: u8) -> Option<&'static str> {
    SEAT_STATUS_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// Label for a heated-zone code
pub fn heat_zone_label(code: u8) -> Option<&'static str> {
    HEAT_ZONE_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// `heatedFeatures` as supplied by callers
///
/// Older callers pass a boolean; the wire value is an enum code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeatedFeatures {
    Flag(bool),
    Code(i64),
    Other(serde_json::Value),
}

impl Default for HeatedFeatures {
    fn default() -> Self {
        HeatedFeatures::Code(0)
    }
}

/// Resolve `heatedFeatures` to the code sent as `heating1`
///
/// Invalid codes fall back to 0 (off).
pub fn normalize_heated_features(input: &HeatedFeatures, mapping: &SeatClimateMapping) -> u8 {
    match input {
        HeatedFeatures::Flag(flag) => {
            warn!("heatedFeatures was boolean; is actually enum; please update code to use enum values");
            u8::from(*flag)
        }
        HeatedFeatures::Code(code) => match mapping.heat(*code) {
            Some(EU_UNTRANSLATED_HEAT_CODE) => {
                warn!(
                    code = EU_UNTRANSLATED_HEAT_CODE,
                    "heatedFeatures code is accepted in this region but has no documented meaning"
                );
                EU_UNTRANSLATED_HEAT_CODE
            }
            Some(valid) => valid,
            None => {
                warn!(code, "heatedFeatures is not a valid enum, defaulting to 0");
                0
            }
        },
        HeatedFeatures::Other(_) => {
            warn!("heatedFeatures is not a number or boolean, defaulting to 0");
            0
        }
    }
}

/// Build the `seatHeaterVentInfo` payload
///
/// Seats with an unknown name or status are dropped. Returns `None` when no
/// seat survives so the field is left out of the command.
pub fn seat_heater_vent_info(
    requested: &BTreeMap<String, i64>,
    mapping: &SeatClimateMapping,
) -> Option<BTreeMap<&'static str, u8>> {
    if requested.is_empty() {
        debug!("no seatClimateSettings requested");
        return None;
    }

    let mut accepted = BTreeMap::new();
    for (seat, status) in requested {
        match (mapping.seat_key(seat), mapping.status(*status)) {
            (Some(key), Some(code)) => {
                accepted.insert(key, code);
            }
            _ => warn!(seat = %seat, status, "invalid seat / seat climate option"),
        }
    }

    if accepted.is_empty() {
        None
    } else {
        Some(accepted)
    }
}
