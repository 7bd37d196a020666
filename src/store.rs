use std::sync::mpsc::Sender;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    alarm::Alarm,
    communication::Message,
    storage::{self, Paths, StorageError},
};

const ALARMS_KEY: &str = "alarms";
/// the old format stored exactly one alarm under its own key
const LEGACY_KEY: &str = "alarm";

/// on-disk shape of the alarms key
#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredAlarms {
    #[serde(default)]
    setup_completed: bool,
    #[serde(default)]
    alarms: Vec<Alarm>,
}

/// the only writer of alarm records. every mutation hits disk before it is
/// considered committed, and commits are announced on the event channel.
#[derive(Debug)]
pub struct AlarmStore {
    paths: Paths,
    alarms: Vec<Alarm>,
    setup_completed: bool,
    observer: Option<Sender<Message>>,
}

impl AlarmStore {
    /// read the collection, falling back to the legacy single-alarm record
    /// when the current key is absent or unreadable
    #[must_use]
    pub fn load(paths: Paths, observer: Option<Sender<Message>>) -> Self {
        let stored = match storage::load::<StoredAlarms>(&paths.key_file(ALARMS_KEY)) {
            Ok(Some(stored)) => Some(stored),
            Ok(None) => None,
            Err(e) => {
                error!("alarm collection unreadable, trying legacy record: {e}");
                None
            }
        };
        let stored = stored.unwrap_or_else(|| Self::migrate_legacy(&paths));
        Self {
            paths,
            alarms: stored.alarms,
            setup_completed: stored.setup_completed,
            observer,
        }
    }

    fn migrate_legacy(paths: &Paths) -> StoredAlarms {
        let legacy_path = paths.key_file(LEGACY_KEY);
        match storage::load::<Alarm>(&legacy_path) {
            Ok(Some(alarm)) => {
                info!("migrating legacy single-alarm record {}", alarm.id);
                let stored = StoredAlarms {
                    setup_completed: true,
                    alarms: vec![alarm],
                };
                match storage::save(&paths.key_file(ALARMS_KEY), &stored) {
                    Ok(()) => storage::remove(&legacy_path),
                    Err(e) => error!("couldn't persist migrated alarm collection: {e}"),
                }
                stored
            }
            Ok(None) => StoredAlarms::default(),
            Err(e) => {
                error!("legacy alarm record unreadable, starting empty: {e}");
                StoredAlarms::default()
            }
        }
    }

    /// alarms in insertion order
    #[must_use]
    pub fn list(&self) -> &[Alarm] {
        &self.alarms
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.id == id)
    }

    /// first alarm still switched on, used when a tapped notification loses
    /// its identifier
    #[must_use]
    pub fn first_enabled(&self) -> Option<&Alarm> {
        self.alarms.iter().find(|alarm| alarm.enabled)
    }

    pub fn add(&mut self, alarm: Alarm) -> Result<(), StorageError> {
        let mut next = self.alarms.clone();
        next.push(alarm);
        self.commit(next)
    }

    /// apply a transformation to the alarm with this id. absent id is a
    /// no-op, not an error.
    pub fn update(
        &mut self,
        id: Uuid,
        mutator: impl FnOnce(&mut Alarm),
    ) -> Result<(), StorageError> {
        let mut next = self.alarms.clone();
        let Some(alarm) = next.iter_mut().find(|alarm| alarm.id == id) else {
            return Ok(());
        };
        mutator(alarm);
        // the id is the notification-group key, it must never change
        alarm.id = id;
        self.commit(next)
    }

    /// remove the alarm and hand it back so the caller can release its voice
    /// recording and cancel its trigger family
    pub fn delete(&mut self, id: Uuid) -> Result<Option<Alarm>, StorageError> {
        let Some(index) = self.alarms.iter().position(|alarm| alarm.id == id) else {
            return Ok(None);
        };
        let mut next = self.alarms.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        Ok(Some(removed))
    }

    #[must_use]
    pub const fn setup_completed(&self) -> bool {
        self.setup_completed
    }

    pub fn set_setup_completed(&mut self, completed: bool) -> Result<(), StorageError> {
        let previous = self.setup_completed;
        self.setup_completed = completed;
        if let Err(e) = self.persist() {
            self.setup_completed = previous;
            error!("couldn't persist setup flag: {e}");
            return Err(e);
        }
        Ok(())
    }

    /// durably replace the collection, then swap it in and notify observers.
    /// a failed write leaves both disk and memory untouched.
    fn commit(&mut self, next: Vec<Alarm>) -> Result<(), StorageError> {
        let stored = StoredAlarms {
            setup_completed: self.setup_completed,
            alarms: next,
        };
        if let Err(e) = storage::save(&self.paths.key_file(ALARMS_KEY), &stored) {
            error!("alarm collection write failed, mutation dropped: {e}");
            return Err(e);
        }
        self.alarms = stored.alarms;
        self.notify();
        Ok(())
    }

    fn persist(&self) -> Result<(), StorageError> {
        storage::save(
            &self.paths.key_file(ALARMS_KEY),
            &StoredAlarms {
                setup_completed: self.setup_completed,
                alarms: self.alarms.clone(),
            },
        )
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            if observer.send(Message::AlarmsChanged).is_err() {
                warn!("alarm change dropped, event loop is gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::mpsc};

    use chrono::NaiveTime;

    use super::*;

    fn paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        (dir, paths)
    }

    fn alarm(hour: u32, minute: u32) -> Alarm {
        Alarm::new(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }

    #[test]
    fn add_then_get_round_trips_every_field() {
        let (_dir, paths) = paths();
        let mut store = AlarmStore::load(paths, None);

        let mut a = alarm(7, 0);
        a.qr_code = Some("ABC123".to_string());
        a.label = Some("work".to_string());
        a.voice_recording = Some("motivation_1.wav".into());
        store.add(a.clone()).unwrap();

        assert_eq!(store.get(a.id), Some(&a));
    }

    #[test]
    fn reload_preserves_order_and_contents() {
        let (_dir, paths) = paths();
        let mut store = AlarmStore::load(paths.clone(), None);
        let first = alarm(6, 30);
        let second = alarm(7, 45);
        store.add(first.clone()).unwrap();
        store.add(second.clone()).unwrap();
        store.set_setup_completed(true).unwrap();

        let reloaded = AlarmStore::load(paths, None);
        assert_eq!(reloaded.list(), &[first, second]);
        assert!(reloaded.setup_completed());
    }

    #[test]
    fn update_of_missing_id_is_a_noop() {
        let (_dir, paths) = paths();
        let mut store = AlarmStore::load(paths, None);
        store.add(alarm(7, 0)).unwrap();

        store.update(Uuid::new_v4(), |a| a.enabled = false).unwrap();
        assert!(store.list()[0].enabled);
    }

    #[test]
    fn delete_returns_the_removed_alarm() {
        let (_dir, paths) = paths();
        let mut store = AlarmStore::load(paths, None);
        let a = alarm(7, 0);
        store.add(a.clone()).unwrap();

        assert_eq!(store.delete(a.id).unwrap(), Some(a));
        assert!(store.list().is_empty());
        assert_eq!(store.delete(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn mutations_notify_observers() {
        let (_dir, paths) = paths();
        let (tx, rx) = mpsc::channel();
        let mut store = AlarmStore::load(paths, Some(tx));

        store.add(alarm(7, 0)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Message::AlarmsChanged);
    }

    #[test]
    fn legacy_record_migrates_into_the_collection() {
        let (_dir, paths) = paths();
        let legacy = alarm(5, 15);
        storage::save(&paths.key_file(LEGACY_KEY), &legacy).unwrap();

        let store = AlarmStore::load(paths.clone(), None);
        assert_eq!(store.list(), &[legacy.clone()]);
        assert!(!paths.key_file(LEGACY_KEY).exists());

        // and the migrated collection survives another load on its own
        let again = AlarmStore::load(paths, None);
        assert_eq!(again.list(), &[legacy]);
    }

    #[test]
    fn corrupt_collection_falls_back_to_legacy_record() {
        let (_dir, paths) = paths();
        fs::create_dir_all(paths.key_file(ALARMS_KEY).parent().unwrap()).unwrap();
        fs::write(paths.key_file(ALARMS_KEY), "alarms = [broken").unwrap();
        let legacy = alarm(5, 15);
        storage::save(&paths.key_file(LEGACY_KEY), &legacy).unwrap();

        let store = AlarmStore::load(paths, None);
        assert_eq!(store.list(), &[legacy]);
    }

    #[test]
    fn corrupt_everything_degrades_to_empty() {
        let (_dir, paths) = paths();
        fs::create_dir_all(paths.key_file(ALARMS_KEY).parent().unwrap()).unwrap();
        fs::write(paths.key_file(ALARMS_KEY), "alarms = [broken").unwrap();
        fs::write(paths.key_file(LEGACY_KEY), "also broken = [").unwrap();

        let store = AlarmStore::load(paths, None);
        assert!(store.list().is_empty());
    }
}
