//! durable record of which alarm is ringing and unacknowledged. this flag,
//! not any screen state, decides whether the ringing view comes back after
//! the process dies and relaunches.

use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    alarm::Alarm,
    notify::NotificationCenter,
    scheduler::Scheduler,
    storage::{self, Paths},
    store::AlarmStore,
};

const RINGING_KEY: &str = "ringing";

/// reinforcement triggers racing a dismissal are ignored for this long
const RECENT_DISMISS_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize, Default)]
struct RingingState {
    ringing_alarm_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct RingingTracker {
    paths: Paths,
    ringing: Option<Uuid>,
    dismissed_at: Option<Instant>,
}

impl RingingTracker {
    #[must_use]
    pub fn load(paths: Paths) -> Self {
        let ringing = match storage::load::<RingingState>(&paths.key_file(RINGING_KEY)) {
            Ok(Some(state)) => state.ringing_alarm_id,
            Ok(None) => None,
            Err(e) => {
                error!("ringing state unreadable, assuming nothing rings: {e}");
                None
            }
        };
        if let Some(id) = ringing {
            info!("alarm {id} was still ringing when the process last died");
        }
        Self {
            paths,
            ringing,
            dismissed_at: None,
        }
    }

    /// mark this alarm as ringing, persisted immediately. returns the alarm
    /// that was ringing before when a different one gets overwritten, so the
    /// caller can cancel the loser's trigger family.
    pub fn trigger(&mut self, alarm_id: Uuid) -> Option<Uuid> {
        let previous = self.ringing.filter(|prev| *prev != alarm_id);
        if let Some(prev) = previous {
            warn!("alarm {alarm_id} overwrites still-ringing alarm {prev}");
        }
        self.ringing = Some(alarm_id);
        self.persist();
        previous
    }

    /// formal dismissal: cancel the ringing alarm's trigger family, clear
    /// the badge, clear and persist the flag. without a ringing alarm this
    /// is a no-op.
    pub fn dismiss<C: NotificationCenter>(&mut self, scheduler: &mut Scheduler<C>) {
        let Some(id) = self.ringing.take() else {
            return;
        };
        scheduler.cancel(id);
        scheduler.clear_badge();
        self.dismissed_at = Some(Instant::now());
        self.persist();
        info!("alarm {id} formally dismissed");
    }

    #[must_use]
    pub const fn ringing_id(&self) -> Option<Uuid> {
        self.ringing
    }

    /// the ringing alarm's record, if the store still has it
    #[must_use]
    pub fn current<'a>(&self, store: &'a AlarmStore) -> Option<&'a Alarm> {
        self.ringing.and_then(|id| store.get(id))
    }

    /// true shortly after a dismissal, while stray reinforcement triggers
    /// may still arrive
    #[must_use]
    pub fn recently_dismissed(&self) -> bool {
        self.dismissed_at
            .is_some_and(|at| at.elapsed() < RECENT_DISMISS_WINDOW)
    }

    fn persist(&self) {
        let state = RingingState {
            ringing_alarm_id: self.ringing,
        };
        if let Err(e) = storage::save(&self.paths.key_file(RINGING_KEY), &state) {
            // the in-process ring still happens, only crash recovery suffers
            error!("couldn't persist ringing state: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::notify::LocalNotificationCenter;

    fn paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        (dir, paths)
    }

    fn scheduler() -> Scheduler<LocalNotificationCenter> {
        Scheduler::new(LocalNotificationCenter::new())
    }

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    #[test]
    fn trigger_survives_a_reload() {
        let (_dir, paths) = paths();
        let id = Uuid::new_v4();
        RingingTracker::load(paths.clone()).trigger(id);

        let recovered = RingingTracker::load(paths);
        assert_eq!(recovered.ringing_id(), Some(id));
    }

    #[test]
    fn dismiss_cancels_the_family_and_clears_the_flag() {
        let (_dir, paths) = paths();
        let mut scheduler = scheduler();
        let alarm = Alarm::new(NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        scheduler.schedule(&alarm, now());

        let mut tracker = RingingTracker::load(paths.clone());
        tracker.trigger(alarm.id);
        tracker.dismiss(&mut scheduler);

        assert_eq!(tracker.ringing_id(), None);
        assert!(scheduler.center().pending_ids().is_empty());
        assert!(tracker.recently_dismissed());
        assert_eq!(RingingTracker::load(paths).ringing_id(), None);
    }

    #[test]
    fn dismiss_twice_equals_dismiss_once() {
        let (_dir, paths) = paths();
        let mut scheduler = scheduler();
        let mut tracker = RingingTracker::load(paths);
        tracker.trigger(Uuid::new_v4());

        tracker.dismiss(&mut scheduler);
        tracker.dismiss(&mut scheduler);
        assert_eq!(tracker.ringing_id(), None);
    }

    #[test]
    fn overwriting_a_different_alarm_reports_the_loser() {
        let (_dir, paths) = paths();
        let mut tracker = RingingTracker::load(paths);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(tracker.trigger(first), None);
        assert_eq!(tracker.trigger(first), None);
        assert_eq!(tracker.trigger(second), Some(first));
        assert_eq!(tracker.ringing_id(), Some(second));
    }

    #[test]
    fn current_resolves_through_the_store() {
        let (_dir, paths) = paths();
        let mut store = AlarmStore::load(paths.clone(), None);
        let alarm = Alarm::new(NaiveTime::from_hms_opt(7, 0, 0).unwrap());
        store.add(alarm.clone()).unwrap();

        let mut tracker = RingingTracker::load(paths);
        tracker.trigger(alarm.id);
        assert_eq!(tracker.current(&store), Some(&alarm));

        store.delete(alarm.id).unwrap();
        assert_eq!(tracker.current(&store), None);
    }
}
