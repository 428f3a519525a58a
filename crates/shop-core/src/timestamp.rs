//! Serde helpers for `NaiveDateTime` columns.
//!
//! Data files carry SQL-style `YYYY-MM-DD HH:MM:SS` timestamps. The ISO `T`
//! separator is accepted on input as well.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a timestamp in either accepted layout.
pub fn parse(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, FORMAT).or_else(|_| NaiveDateTime::parse_from_str(s, ISO_FORMAT))
}

pub fn format(dt: &NaiveDateTime) -> String {
    dt.format(FORMAT).to_string()
}

pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format(dt))
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(d)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

/// Same as the parent module for nullable columns; empty strings read as null.
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(dt: &Option<NaiveDateTime>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_some(&super::format(dt)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => {
                parse(&raw).map(Some).map_err(serde::de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}
