//! Notification surface abstraction.

#[derive(Debug, Clone, PartialEq, Eq)]
/// A local notification ready for display.
pub struct Notification {
    /// Short title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Dedup tag: a new notification with the same tag replaces the old one
    /// instead of stacking.
    pub tag: String,
    /// Navigation target activated on click, `/` for the root view.
    pub target: String,
}

/// Capability to display notifications toward the user.
pub trait Notifier: Send + Sync {
    /// Display (or replace, by tag) a notification.
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// User-facing permission state for reminders.
pub enum NotificationPermission {
    /// Never asked.
    #[default]
    Default,
    /// Reminders enabled.
    Granted,
    /// Reminders declined; never ask again.
    Denied,
}

impl NotificationPermission {
    /// Stable string form used in the persistence store.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationPermission::Default => "default",
            NotificationPermission::Granted => "granted",
            NotificationPermission::Denied => "denied",
        }
    }

    /// Decode a stored permission; anything unrecognized counts as never
    /// asked.
    #[must_use]
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("granted") => NotificationPermission::Granted,
            Some("denied") => NotificationPermission::Denied,
            _ => NotificationPermission::Default,
        }
    }
}
