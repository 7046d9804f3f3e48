//! Address data structures.
//!
//! An address is the ordered triple (city, street, house), each resolved
//! through the site's autocomplete endpoints.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A single autocomplete result (city, street or house).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LookupItem {
    /// Numeric identifier used by the schedule endpoint
    pub id: i64,

    /// Display name
    pub name: String,
}

impl LookupItem {
    /// Build an item from an autocomplete API element.
    ///
    /// The API returns `{"value": "<name>", "label": "<html>"}` where the
    /// label HTML carries `data-id="<digits>"`.
    pub fn from_api(value: &serde_json::Value) -> Option<Self> {
        let name = value.get("value")?.as_str()?.replace("..", ".");
        let label = value.get("label")?.as_str()?;

        let re = Regex::new(r#"data-id="(\d+)""#).ok()?;
        let id: i64 = re.captures(label)?.get(1)?.as_str().parse().ok()?;

        Some(Self { id, name })
    }
}

/// A fully resolved street address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    pub city: LookupItem,
    pub street: LookupItem,
    pub house: LookupItem,
}

impl Address {
    /// Stable string key: `"{city_id}-{street_id}-{house_id}"`.
    pub fn id(&self) -> String {
        format!("{}-{}-{}", self.city.id, self.street.id, self.house.id)
    }

    /// Split an address key back into its id triple.
    pub fn parse_id(addr_id: &str) -> Option<(i64, i64, i64)> {
        let mut parts = addr_id.split('-');
        let city = parts.next()?.parse().ok()?;
        let street = parts.next()?.parse().ok()?;
        let house = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((city, street, house))
    }

    /// Human-readable name used in notification text.
    ///
    /// City names come back as "Місто (Район)"; the parenthesized
    /// qualifier is dropped. Names without one are truncated to 10 chars.
    pub fn display_name(&self) -> String {
        let city = match self.city.name.split(" (").next() {
            Some(base) if base.len() < self.city.name.len() => base.to_string(),
            _ => self.city.name.chars().take(10).collect(),
        };
        format!("{}, {}, {}", city, self.street.name, self.house.name)
    }
}
