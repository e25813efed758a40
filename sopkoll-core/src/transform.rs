//! Pure transformation pipeline: parse, classify, group, and format pickup
//! schedules.
//!
//! Everything in here is deterministic; "today" is always an explicit
//! parameter so the functions stay testable at fixed instants.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

use crate::model::{BinType, GroupedSchedule, RawPickupRecord, WasteScheduleItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Color and icon assigned to a waste category.
pub struct WasteStyle {
    /// Hex color string, e.g. "#16a34a".
    pub color: &'static str,
    /// Emoji icon.
    pub icon: &'static str,
}

/// Classification table, matched top to bottom by case-insensitive substring.
///
/// Order is load-bearing: a key is only reached when no earlier key matched,
/// so specific variants sit above the generic keys they contain ("Glas" must
/// not shadow "Glasförpackningar ofärgade").
const WASTE_TYPE_TABLE: &[(&str, WasteStyle)] = &[
    ("Restavfall", WasteStyle { color: "#1a1a1a", icon: "🗑️" }),
    ("Matavfall", WasteStyle { color: "#16a34a", icon: "🥬" }),
    ("Plast/Papp", WasteStyle { color: "#2563eb", icon: "📦" }),
    ("Plast- och pappersförpackningar", WasteStyle { color: "#2563eb", icon: "📦" }),
    ("Trädgårdsavfall", WasteStyle { color: "#65a30d", icon: "🌿" }),
    ("Tidningar", WasteStyle { color: "#7c3aed", icon: "📰" }),
    ("Glasförpackningar ofärgade", WasteStyle { color: "#06b6d4", icon: "🫙" }),
    ("Glasförpackningar färgade", WasteStyle { color: "#0d9488", icon: "🫙" }),
    ("Glas", WasteStyle { color: "#0891b2", icon: "🫙" }),
    ("Metallförpackningar", WasteStyle { color: "#d97706", icon: "🥫" }),
    ("Metall", WasteStyle { color: "#d97706", icon: "🥫" }),
    ("Elavfall", WasteStyle { color: "#dc2626", icon: "🔌" }),
    ("Textil", WasteStyle { color: "#ec4899", icon: "👕" }),
];

/// Style for waste types that match no table entry.
const DEFAULT_STYLE: WasteStyle = WasteStyle { color: "#6b7280", icon: "♻️" };

#[derive(thiserror::Error, Debug)]
/// Errors produced while transforming raw records.
pub enum TransformError {
    /// A pickup date string could not be parsed in any accepted form.
    #[error("Unparseable pickup date: {raw}")]
    InvalidPickupDate {
        /// The offending date string.
        raw: String,
        /// Parse failure for the last attempted format.
        #[source]
        source: chrono::ParseError,
    },
}

/// Classify a waste type name into its display style.
///
/// Total function: unknown names fall back to a neutral style.
#[must_use]
pub fn classify(waste_type: &str) -> WasteStyle {
    let normalized = waste_type.to_lowercase();
    WASTE_TYPE_TABLE
        .iter()
        .find(|(key, _)| normalized.contains(&key.to_lowercase()))
        .map_or(DEFAULT_STYLE, |(_, style)| *style)
}

/// Signed calendar-day delta between a pickup instant and "now".
///
/// Both sides are truncated to their calendar date first, so the result is
/// independent of the time of day on either side. Negative means past, zero
/// today, positive future.
#[must_use]
pub fn days_remaining(date: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (date.date() - now.date()).num_days()
}

/// Parse a pickup instant from the ISO-ish forms the upstream API emits.
///
/// # Errors
///
/// Returns [`TransformError::InvalidPickupDate`] when no accepted form
/// matches.
pub fn parse_pickup_instant(raw: &str) -> Result<NaiveDateTime, TransformError> {
    if let Ok(instant) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(instant);
    }
    if let Ok(instant) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(instant);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN))
        .map_err(|source| TransformError::InvalidPickupDate {
            raw: raw.to_owned(),
            source,
        })
}

/// Format a bin descriptor for display, empty when absent.
#[must_use]
pub fn format_bin_size(bin: Option<&BinType>) -> String {
    bin.map_or_else(String::new, |bin| format!("{} {}", bin.size, bin.unit))
}

/// Map raw records 1:1 into schedule items, sorted ascending by pickup
/// instant.
///
/// The sort is stable: records with identical pickup instants keep their
/// input order. No record is filtered or deduplicated.
///
/// # Errors
///
/// Fails when any record carries an unparseable pickup date.
pub fn parse_schedule(
    records: &[RawPickupRecord],
    now: NaiveDateTime,
) -> Result<Vec<WasteScheduleItem>, TransformError> {
    let mut items = records
        .iter()
        .map(|record| {
            let style = classify(&record.waste_type);
            let next_pickup = parse_pickup_instant(&record.next_pickup)?;
            Ok(WasteScheduleItem {
                waste_type: record.waste_type.clone(),
                next_pickup,
                days_remaining: days_remaining(next_pickup, now),
                frequency: record.frequency.clone(),
                bin_size: format_bin_size(record.bin.as_ref()),
                color: style.color,
                icon: style.icon,
            })
        })
        .collect::<Result<Vec<_>, TransformError>>()?;

    items.sort_by_key(|item| item.next_pickup);
    Ok(items)
}

/// Partition items by calendar date into groups sorted ascending by date.
///
/// In-group item order is the input order; the group's days-remaining is
/// taken from its first member.
#[must_use]
pub fn group_by_date(items: Vec<WasteScheduleItem>) -> Vec<GroupedSchedule> {
    let mut groups: BTreeMap<NaiveDate, Vec<WasteScheduleItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.next_pickup.date()).or_default().push(item);
    }

    groups
        .into_iter()
        .map(|(date, group_items)| GroupedSchedule {
            date,
            date_string: date.format("%Y-%m-%d").to_string(),
            days_remaining: group_items.first().map_or(0, |item| item.days_remaining),
            items: group_items,
        })
        .collect()
}

/// Long-form Swedish date, e.g. "måndag 5 augusti 2026".
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    format!(
        "{} {} {} {}",
        weekday_long(date.weekday()),
        date.day(),
        month_long(date.month()),
        date.year()
    )
}

/// Short-form Swedish date, e.g. "mån 5 aug.".
#[must_use]
pub fn format_short_date(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        weekday_short(date.weekday()),
        date.day(),
        month_short(date.month())
    )
}

/// Human label for a days-remaining value.
#[must_use]
pub fn days_remaining_text(days: i64) -> String {
    match days {
        days if days < 0 => "Passerad".to_owned(),
        0 => "Idag".to_owned(),
        1 => "Imorgon".to_owned(),
        days => format!("{days} dagar"),
    }
}

fn weekday_long(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "måndag",
        Weekday::Tue => "tisdag",
        Weekday::Wed => "onsdag",
        Weekday::Thu => "torsdag",
        Weekday::Fri => "fredag",
        Weekday::Sat => "lördag",
        Weekday::Sun => "söndag",
    }
}

fn weekday_short(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mån",
        Weekday::Tue => "tis",
        Weekday::Wed => "ons",
        Weekday::Thu => "tors",
        Weekday::Fri => "fre",
        Weekday::Sat => "lör",
        Weekday::Sun => "sön",
    }
}

fn month_long(month: u32) -> &'static str {
    match month {
        1 => "januari",
        2 => "februari",
        3 => "mars",
        4 => "april",
        5 => "maj",
        6 => "juni",
        7 => "juli",
        8 => "augusti",
        9 => "september",
        10 => "oktober",
        11 => "november",
        12 => "december",
        _ => "",
    }
}

fn month_short(month: u32) -> &'static str {
    match month {
        1 => "jan.",
        2 => "feb.",
        3 => "mars",
        4 => "apr.",
        5 => "maj",
        6 => "juni",
        7 => "juli",
        8 => "aug.",
        9 => "sep.",
        10 => "okt.",
        11 => "nov.",
        12 => "dec.",
        _ => "",
    }
}
