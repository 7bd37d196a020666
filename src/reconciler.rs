//! delivery-time policy: decides whether an inbound trigger surfaces the
//! ringing screen or gets swallowed. background and terminated delivery
//! never reach this code, the platform shows the raw notification instead.

use log::{info, warn};
use uuid::Uuid;

use crate::store::AlarmStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// surface the ringing screen for this alarm and suppress the native
    /// banner and sound
    Trigger(Uuid),
    Suppress(SuppressReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// an alarm is already ringing, restarting the ring would reset it
    AlreadyRinging,
    /// a setup or edit screen is open
    Configuring,
    /// a reinforcement trigger raced a dismissal that just happened
    RecentlyDismissed,
    /// the identifier names no alarm
    UnknownIdentifier,
}

/// recover the alarm id from a family identifier, primary or reinforcement
#[must_use]
pub fn alarm_id_from_identifier(identifier: &str) -> Option<Uuid> {
    let base = identifier
        .split_once("_repeat_")
        .map_or(identifier, |(base, _)| base);
    Uuid::parse_str(base).ok()
}

/// one inbound delivery while foregrounded. conditions are checked in
/// order, first match wins.
#[must_use]
pub fn on_foreground_delivery(
    identifier: &str,
    already_ringing: bool,
    configuring: bool,
    recently_dismissed: bool,
) -> Decision {
    if already_ringing {
        info!("trigger {identifier} suppressed, alarm already ringing");
        return Decision::Suppress(SuppressReason::AlreadyRinging);
    }
    if configuring {
        info!("trigger {identifier} suppressed, a setup screen is open");
        return Decision::Suppress(SuppressReason::Configuring);
    }
    if recently_dismissed {
        info!("trigger {identifier} suppressed, alarm was just dismissed");
        return Decision::Suppress(SuppressReason::RecentlyDismissed);
    }
    match alarm_id_from_identifier(identifier) {
        Some(id) => Decision::Trigger(id),
        None => {
            warn!("trigger identifier {identifier} names no alarm");
            Decision::Suppress(SuppressReason::UnknownIdentifier)
        }
    }
}

/// the user tapped a delivered notification, which always means "show me
/// the ringing screen". with the identifier lost, fall back to the first
/// enabled alarm, ambiguous as that is with several armed.
#[must_use]
pub fn on_tap(identifier: Option<&str>, store: &AlarmStore) -> Option<Uuid> {
    if let Some(id) = identifier.and_then(alarm_id_from_identifier) {
        return Some(id);
    }
    let fallback = store.first_enabled().map(|alarm| alarm.id);
    if let Some(id) = fallback {
        warn!("tapped notification lost its identifier, falling back to alarm {id}");
    }
    fallback
}
