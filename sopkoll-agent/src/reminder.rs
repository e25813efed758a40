//! Recurring reminder check with per-slot dedup.
//!
//! The check runs hourly once armed, but only the 06 and 18 local-hour
//! slots ever produce anything: 18:00 reminds about tomorrow's collection,
//! 06:00 about today's. The cached schedule is never decoded here — the
//! reminder is deliberately generic.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use sopkoll_core::model::GatewayResponse;

use crate::AgentError;
use crate::agent::ClientRegistry;
use crate::bucket::CacheBucket;
use crate::notify::{Notification, Notifier};

/// Morning reminder slot (local hour).
pub const MORNING_HOUR: u32 = 6;
/// Evening reminder slot (local hour).
pub const EVENING_HOUR: u32 = 18;

// Dedup flags live in the same bucket as cached responses, under synthetic
// request-like keys. At two slots a day the accumulation stays harmless.
fn dedup_key(date: NaiveDate, hour: u32) -> String {
    format!("/notify-flag/notified-{date}-{hour}")
}

/// Run one reminder check against the given instant.
///
/// Produces at most one notification per date+slot; every precondition
/// failure is a silent no-op.
///
/// # Errors
///
/// Returns an [`AgentError`] when persisting the dedup flag fails. Callers
/// swallow and log this — a failed check must never take the timer down.
pub fn run_check(
    now: NaiveDateTime,
    bucket: &CacheBucket,
    clients: &ClientRegistry,
    notifier: &dyn Notifier,
    api_marker: &str,
) -> Result<(), AgentError> {
    let hour = now.hour();
    if hour != MORNING_HOUR && hour != EVENING_HOUR {
        return Ok(());
    }

    let key = dedup_key(now.date(), hour);
    if bucket.contains(&key) {
        return Ok(());
    }

    if clients.active() == 0 {
        return Ok(());
    }

    if !bucket.has_key_containing(api_marker) {
        return Ok(());
    }

    // Flag first: a notification that fails to display must not retrigger
    // this slot.
    bucket.put(
        &key,
        GatewayResponse {
            status: 200,
            body: "1".to_owned(),
        },
    )?;

    let notification = if hour == EVENING_HOUR {
        let tomorrow = now.date() + Duration::days(1);
        Notification {
            title: "Sophämtning imorgon".to_owned(),
            body: "Glöm inte att ställa ut soporna!".to_owned(),
            tag: format!("reminder-{tomorrow}"),
            target: "/".to_owned(),
        }
    } else {
        Notification {
            title: "Sophämtning idag".to_owned(),
            body: "Soporna hämtas idag!".to_owned(),
            tag: format!("reminder-{}", now.date()),
            target: "/".to_owned(),
        }
    };

    tracing::info!(tag = %notification.tag, "emitting pickup reminder");
    notifier.notify(notification);
    Ok(())
}
