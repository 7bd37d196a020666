//! the platform notification seam. the scheduler talks to a
//! [`NotificationCenter`] and never to the platform directly, so the whole
//! trigger pipeline runs the same against the in-process center used by the
//! desktop build and tests.

use chrono::{Duration, NaiveDateTime};
use log::debug;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("trigger {id} rejected: {reason}")]
    Rejected { id: String, reason: String },
}

/// one registration request. identifiers are plain strings because the
/// cancel-by-family scheme derives every member from the alarm id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub id: String,
    pub fire_at: NaiveDateTime,
    /// recurring triggers fire daily at the same wall-clock time
    pub recurring: bool,
    pub title: String,
    pub body: String,
    pub sound: String,
    pub badge: u32,
}

pub trait NotificationCenter {
    fn request_authorization(&mut self) -> bool;
    fn authorization_status(&self) -> bool;
    fn schedule(&mut self, request: TriggerRequest) -> Result<(), NotifyError>;
    /// remove the given identifiers from the pending queue and from the
    /// delivered tray. unknown identifiers are ignored.
    fn cancel(&mut self, ids: &[String]);
    fn cancel_all(&mut self);
    fn clear_badge(&mut self);
}

/// in-process notification center. pending triggers are polled against the
/// clock by the event loop, which is how the desktop build notices an alarm
/// coming due.
#[derive(Debug, Default)]
pub struct LocalNotificationCenter {
    authorized: bool,
    pending: Vec<TriggerRequest>,
    delivered: Vec<String>,
    badge: u32,
}

impl LocalNotificationCenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// pop every trigger that has come due. one-shot triggers move to the
    /// delivered tray; recurring ones advance to the next day.
    pub fn due(&mut self, now: NaiveDateTime) -> Vec<TriggerRequest> {
        let mut fired = Vec::new();
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].fire_at > now {
                index += 1;
                continue;
            }
            if self.pending[index].recurring {
                let request = self.pending[index].clone();
                self.pending[index].fire_at += Duration::days(1);
                index += 1;
                fired.push(request);
            } else {
                let request = self.pending.remove(index);
                self.delivered.push(request.id.clone());
                fired.push(request);
            }
        }
        for request in &fired {
            self.badge = self.badge.max(request.badge);
            debug!("trigger {} delivered", request.id);
        }
        fired
    }

    #[must_use]
    pub fn pending_ids(&self) -> Vec<String> {
        self.pending.iter().map(|request| request.id.clone()).collect()
    }

    #[must_use]
    pub fn delivered_ids(&self) -> &[String] {
        &self.delivered
    }

    #[must_use]
    pub const fn badge(&self) -> u32 {
        self.badge
    }
}

impl NotificationCenter for LocalNotificationCenter {
    fn request_authorization(&mut self) -> bool {
        self.authorized = true;
        true
    }

    fn authorization_status(&self) -> bool {
        self.authorized
    }

    fn schedule(&mut self, request: TriggerRequest) -> Result<(), NotifyError> {
        // registering an identifier again replaces the earlier registration
        self.pending.retain(|pending| pending.id != request.id);
        self.pending.push(request);
        Ok(())
    }

    fn cancel(&mut self, ids: &[String]) {
        self.pending.retain(|pending| !ids.contains(&pending.id));
        self.delivered.retain(|delivered| !ids.contains(delivered));
    }

    fn cancel_all(&mut self) {
        self.pending.clear();
    }

    fn clear_badge(&mut self) {
        self.badge = 0;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn request(id: &str, fire_at: NaiveDateTime, recurring: bool) -> TriggerRequest {
        TriggerRequest {
            id: id.to_string(),
            fire_at,
            recurring,
            title: "t".to_string(),
            body: "b".to_string(),
            sound: "alarm.mp3".to_string(),
            badge: 1,
        }
    }

    #[test]
    fn one_shot_trigger_fires_once_and_lands_in_the_tray() {
        let mut center = LocalNotificationCenter::new();
        center.schedule(request("a", at(7, 0, 0), false)).unwrap();

        assert!(center.due(at(6, 59, 59)).is_empty());
        let fired = center.due(at(7, 0, 0));
        assert_eq!(fired.len(), 1);
        assert_eq!(center.delivered_ids(), ["a".to_string()]);
        assert!(center.due(at(7, 0, 1)).is_empty());
    }

    #[test]
    fn recurring_trigger_advances_a_day() {
        let mut center = LocalNotificationCenter::new();
        center.schedule(request("a", at(7, 0, 0), true)).unwrap();

        assert_eq!(center.due(at(7, 0, 5)).len(), 1);
        assert!(center.due(at(7, 0, 6)).is_empty());
        assert_eq!(center.pending_ids(), ["a".to_string()]);
    }

    #[test]
    fn rescheduling_an_identifier_replaces_it() {
        let mut center = LocalNotificationCenter::new();
        center.schedule(request("a", at(7, 0, 0), true)).unwrap();
        center.schedule(request("a", at(8, 0, 0), true)).unwrap();

        assert_eq!(center.pending_ids(), ["a".to_string()]);
        assert!(center.due(at(7, 30, 0)).is_empty());
    }

    #[test]
    fn cancel_clears_pending_and_delivered() {
        let mut center = LocalNotificationCenter::new();
        center.schedule(request("a", at(7, 0, 0), false)).unwrap();
        center.schedule(request("b", at(7, 0, 0), false)).unwrap();
        center.due(at(7, 0, 0));

        center.cancel(&["a".to_string(), "missing".to_string()]);
        assert_eq!(center.delivered_ids(), ["b".to_string()]);
        assert!(center.pending_ids().is_empty());
    }

    #[test]
    fn badge_tracks_the_highest_delivered_counter() {
        let mut center = LocalNotificationCenter::new();
        let mut high = request("a", at(7, 0, 0), false);
        high.badge = 7;
        center.schedule(high).unwrap();
        center.due(at(7, 0, 0));
        assert_eq!(center.badge(), 7);

        center.clear_badge();
        assert_eq!(center.badge(), 0);
    }
}
