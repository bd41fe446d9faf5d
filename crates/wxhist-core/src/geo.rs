//! Geographic and calendar value types shared across crates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Wire format for report dates.
pub const WIRE_DATE_FORMAT: &str = "%d-%m-%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// A validated latitude/longitude pair.
///
/// Construct through [`Coordinates::new`]; values outside the geographic range or
/// non-finite values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    lat: f64,
    lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        if Self::is_valid(lat, lon) {
            Some(Self { lat, lon })
        } else {
            tracing::debug!("Discarding invalid coordinates ({}, {})", lat, lon);
            None
        }
    }

    /// Parses the stringly-typed coordinates geocoders return.
    pub fn parse(lat: &str, lon: &str) -> Option<Self> {
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        Self::new(lat, lon)
    }

    pub fn is_valid(lat: f64, lon: f64) -> bool {
        lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon)
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// Key usable in hash maps; two pairs share a key iff their bit patterns match.
    pub fn key(&self) -> CoordinateKey {
        CoordinateKey(self.lat.to_bits(), self.lon.to_bits())
    }
}

/// Hashable identity of a coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey(u64, u64);

/// Report date range. Both ends are required before a report can be generated;
/// ordering is left to the report service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn wire_start(&self) -> Option<String> {
        self.start.map(format_wire_date)
    }

    pub fn wire_end(&self) -> Option<String> {
        self.end.map(format_wire_date)
    }
}

pub fn format_wire_date(date: NaiveDate) -> String {
    date.format(WIRE_DATE_FORMAT).to_string()
}

/// Accepts `DD-MM-YYYY` or ISO `YYYY-MM-DD`.
pub fn parse_user_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, WIRE_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(input, ISO_DATE_FORMAT))
        .ok()
}
