//! Domain data structures for municipalities, addresses, and pickup schedules.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Built-in municipalities supported by the application.
pub enum Municipalities {
    /// Ale kommun, Sweden.
    Ale,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a municipality known to sopkoll.
pub struct MunicipalityId(pub String);

impl fmt::Display for Municipalities {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slug = match self {
            Municipalities::Ale => "ale",
        };
        write!(formatter, "{slug}")
    }
}

impl From<Municipalities> for MunicipalityId {
    fn from(municipality: Municipalities) -> Self {
        MunicipalityId(municipality.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a municipality and its human-friendly name.
pub struct MunicipalityMeta {
    /// Unique identifier.
    pub id: MunicipalityId,
    /// Localized display name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a concrete address.
///
/// This is the full address string as returned by the search backend,
/// including any parenthetical disambiguator. The schedule lookup requires
/// this exact string, so it must never be displayed-then-reused in stripped
/// form.
pub struct AddressId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Address returned from a provider search.
pub struct Address {
    /// Unique identifier used by a provider when requesting schedules.
    pub id: AddressId,
    /// Municipality the address belongs to.
    pub municipality: MunicipalityId,
    /// Human-friendly label with the parenthetical disambiguator stripped.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Bin size descriptor attached to a pickup service.
pub struct BinType {
    /// Numeric size, e.g. 190.
    #[serde(rename = "Size")]
    pub size: f64,
    /// Unit the size is measured in, e.g. "L".
    #[serde(rename = "Unit")]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One pickup service entry exactly as the upstream API reports it.
pub struct RawPickupRecord {
    /// Waste type name, e.g. "Restavfall".
    #[serde(rename = "WasteType")]
    pub waste_type: String,
    /// Next pickup instant as an ISO-ish date string.
    #[serde(rename = "NextWastePickup")]
    pub next_pickup: String,
    /// Pickup frequency description, e.g. "Varannan vecka".
    #[serde(rename = "WastePickupFrequency")]
    pub frequency: String,
    /// Bin size descriptor, absent for some services.
    #[serde(rename = "BinType", default)]
    pub bin: Option<BinType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Raw schedule lookup response body.
///
/// This shape is persisted verbatim in [`CachedSchedule`], so it has to
/// round-trip through serde unchanged.
pub struct ScheduleResponse {
    /// Pickup services registered for the address.
    #[serde(rename = "RhServices", default)]
    pub services: Vec<RawPickupRecord>,
}

#[derive(Debug, Clone, PartialEq)]
/// One row of the transformed schedule view.
///
/// `days_remaining` is always recomputed from `next_pickup` and the
/// evaluation instant, never stored independently of its source date.
pub struct WasteScheduleItem {
    /// Waste type name as reported upstream.
    pub waste_type: String,
    /// Parsed pickup instant.
    pub next_pickup: NaiveDateTime,
    /// Signed calendar-day delta relative to "today" at local midnight.
    pub days_remaining: i64,
    /// Frequency description as reported upstream.
    pub frequency: String,
    /// Formatted bin size, empty when the service has no bin descriptor.
    pub bin_size: String,
    /// Category color assigned by classification, as a hex string.
    pub color: &'static str,
    /// Category icon assigned by classification.
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
/// All pickups sharing one calendar date.
pub struct GroupedSchedule {
    /// Calendar date shared by all members.
    pub date: NaiveDate,
    /// ISO `YYYY-MM-DD` key for the date.
    pub date_string: String,
    /// Days-remaining value shared by the members.
    pub days_remaining: i64,
    /// Member items, in the transformer's sort order.
    pub items: Vec<WasteScheduleItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Last successfully fetched schedule, persisted for offline fallback.
///
/// Only reusable when `address` equals the address currently being
/// requested; the cache is never shared across addresses and never expired
/// by age.
pub struct CachedSchedule {
    /// Address the data was fetched for (full string, with disambiguator).
    pub address: String,
    /// Raw upstream response.
    pub data: ScheduleResponse,
    /// Capture instant.
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A completed HTTP exchange as seen by the gateway port.
///
/// Carries the status code instead of failing on non-2xx so that upstream
/// error statuses can be surfaced as-is and the offline cache can decide
/// what to store.
pub struct GatewayResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl GatewayResponse {
    /// Whether the status code is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Strip the parenthetical disambiguator from an address for display.
///
/// The full string stays the lookup key; only the label changes.
/// `"Storgatan 1 (Lgh 1203)"` becomes `"Storgatan 1"`.
#[must_use]
pub fn strip_disambiguator(address: &str) -> String {
    let (Some(open), Some(close)) = (address.find('('), address.rfind(')')) else {
        return address.trim().to_owned();
    };
    if close < open {
        return address.trim().to_owned();
    }
    let before = address.get(..open).unwrap_or_default().trim_end();
    let after = address.get(close + 1..).unwrap_or_default().trim_start();
    if after.is_empty() {
        before.to_owned()
    } else {
        format!("{before} {after}")
    }
}

#[cfg(test)]
mod tests {
    use super::strip_disambiguator;

    #[test]
    fn strips_parenthetical_suffix() {
        assert_eq!(strip_disambiguator("Storgatan 1 (Lgh 1203)"), "Storgatan 1");
        assert_eq!(strip_disambiguator("Storgatan 1"), "Storgatan 1");
        assert_eq!(
            strip_disambiguator("Storgatan 1 (Hus A) Nödinge"),
            "Storgatan 1 Nödinge"
        );
        assert_eq!(strip_disambiguator("  Storgatan 1  "), "Storgatan 1");
    }
}

