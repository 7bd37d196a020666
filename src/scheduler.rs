//! turns one alarm into its trigger family: a recurring daily primary plus a
//! burst of one-shot reinforcement triggers trailing it. the host platform
//! may coalesce or silence any single notification, so the burst buys
//! delivery redundancy at the cost of notification budget.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use log::{debug, error, info};
use uuid::Uuid;

use crate::{
    alarm::Alarm,
    notify::{NotificationCenter, TriggerRequest},
};

/// reinforcement triggers per alarm
pub const REPEAT_COUNT: u32 = 60;
/// seconds between reinforcement triggers, 60 * 15s covers fifteen minutes
pub const REPEAT_INTERVAL_SECS: i64 = 15;
/// triggers this close to now are not worth registering
const MIN_LEAD_SECS: i64 = 1;

const ALARM_SOUND: &str = "alarm.mp3";

const REMINDER_MESSAGES: [&str; 15] = [
    "Still sleeping? Get up!",
    "Scan your code!",
    "It won't stop until you're up!",
    "Hey! Wake up!",
    "No going back to sleep!",
    "Make today count!",
    "Up and scanning!",
    "Not up yet??",
    "Rise and shine!!",
    "Seriously, wake up!",
    "Told you it was persistent",
    "Still in bed?",
    "It keeps going until you scan!",
    "Wake up, wake up!",
    "Open your eyes!",
];

/// identifier of the primary trigger
#[must_use]
pub fn primary_id(alarm_id: Uuid) -> String {
    alarm_id.to_string()
}

/// identifier of reinforcement trigger `i`
#[must_use]
pub fn repeat_id(alarm_id: Uuid, i: u32) -> String {
    format!("{alarm_id}_repeat_{i}")
}

/// every identifier an alarm could have registered, whether or not it did.
/// cancelling the whole family this way needs no side index.
#[must_use]
pub fn family_ids(alarm_id: Uuid) -> Vec<String> {
    let mut ids = Vec::with_capacity(1 + REPEAT_COUNT as usize);
    ids.push(primary_id(alarm_id));
    ids.extend((1..=REPEAT_COUNT).map(|i| repeat_id(alarm_id, i)));
    ids
}

/// next instant the time-of-day comes around: later today, otherwise
/// tomorrow
#[must_use]
pub fn next_occurrence(time: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    if time > now.time() {
        now.date().and_time(time)
    } else {
        (now.date() + Duration::days(1)).and_time(time)
    }
}

/// fire instants for the reinforcement burst, skipping any that would land
/// less than a second ahead of now
#[must_use]
pub fn reinforcement_times(
    next: NaiveDateTime,
    now: NaiveDateTime,
) -> Vec<(u32, NaiveDateTime)> {
    (1..=REPEAT_COUNT)
        .filter_map(|i| {
            let fire_at = next + Duration::seconds(i64::from(i) * REPEAT_INTERVAL_SECS);
            if fire_at - now >= Duration::seconds(MIN_LEAD_SECS) {
                Some((i, fire_at))
            } else {
                debug!("reinforcement {i} skipped, fire time already passed");
                None
            }
        })
        .collect()
}

/// registers and cancels trigger families against the notification seam
#[derive(Debug)]
pub struct Scheduler<C: NotificationCenter> {
    center: C,
}

impl<C: NotificationCenter> Scheduler<C> {
    pub const fn new(center: C) -> Self {
        Self { center }
    }

    pub const fn center(&self) -> &C {
        &self.center
    }

    pub fn center_mut(&mut self) -> &mut C {
        &mut self.center
    }

    /// cancel-then-recreate the alarm's whole trigger family. a disabled
    /// alarm ends up with no triggers at all.
    pub fn schedule(&mut self, alarm: &Alarm, now: NaiveDateTime) {
        self.cancel(alarm.id);
        if !alarm.enabled {
            return;
        }

        let next = next_occurrence(alarm.time, now);
        let primary = TriggerRequest {
            id: primary_id(alarm.id),
            fire_at: next,
            recurring: true,
            title: "⏰ Wake up".to_string(),
            body: alarm
                .label
                .clone()
                .unwrap_or_else(|| "Time to get up!".to_string()),
            sound: ALARM_SOUND.to_string(),
            badge: 1,
        };
        if let Err(e) = self.center.schedule(primary) {
            error!("couldn't register primary trigger: {e}");
        }

        // each reinforcement gets its own identifier and counter so the
        // platform treats them as independent notifications
        for (i, fire_at) in reinforcement_times(next, now) {
            let request = TriggerRequest {
                id: repeat_id(alarm.id, i),
                fire_at,
                recurring: false,
                title: format!("⏰ Wake up ({i}/{REPEAT_COUNT})"),
                body: REMINDER_MESSAGES[i as usize % REMINDER_MESSAGES.len()].to_string(),
                sound: ALARM_SOUND.to_string(),
                badge: i,
            };
            if let Err(e) = self.center.schedule(request) {
                // best effort: one rejected trigger never aborts the burst
                error!("couldn't register reinforcement trigger: {e}");
            }
        }
        info!(
            "alarm {} scheduled for {} with {REPEAT_COUNT} reinforcements",
            alarm.id,
            next.format("%H:%M")
        );
    }

    /// cancel the primary and every possible reinforcement, pending or
    /// already delivered. unknown identifiers cancel as no-ops.
    pub fn cancel(&mut self, alarm_id: Uuid) {
        self.center.cancel(&family_ids(alarm_id));
    }

    pub fn cancel_all(&mut self) {
        self.center.cancel_all();
    }

    pub fn clear_badge(&mut self) {
        self.center.clear_badge();
    }
}
