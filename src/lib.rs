#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender},
    time::Duration,
};

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use uuid::Uuid;

pub mod alarm;
pub mod audio;
pub mod communication;
pub mod library;
pub mod notify;
pub mod reconciler;
pub mod ringing;
pub mod scan;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod volume;

use alarm::Alarm;
use audio::SoundOutput;
use communication::Message;
use library::{CodeLibrary, RecordingLibrary, SavedRecording};
use notify::{LocalNotificationCenter, NotificationCenter};
use reconciler::Decision;
use ringing::{Action, DismissalFlow, Phase};
use scheduler::Scheduler;
use storage::{Paths, StorageError};
use store::AlarmStore;
use tracker::RingingTracker;

/// owns every service and the single event-processing loop. platform
/// callbacks, the scanner feed, and the sound thread all talk to it through
/// the message channel, so state only ever mutates from one place.
pub struct App<C: NotificationCenter, S: SoundOutput> {
    paths: Paths,
    store: AlarmStore,
    codes: CodeLibrary,
    recordings: RecordingLibrary,
    tracker: RingingTracker,
    scheduler: Scheduler<C>,
    flow: DismissalFlow,
    sounder: S,
    configuring: bool,
    pending_save: Option<PathBuf>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl<C: NotificationCenter, S: SoundOutput> App<C, S> {
    #[must_use]
    pub fn new(
        paths: Paths,
        center: C,
        sounder: S,
        tx: Sender<Message>,
        rx: Receiver<Message>,
    ) -> Self {
        let store = AlarmStore::load(paths.clone(), Some(tx.clone()));
        let codes = CodeLibrary::load(paths.clone());
        let recordings = RecordingLibrary::load(paths.clone());
        let tracker = RingingTracker::load(paths.clone());
        Self {
            paths,
            store,
            codes,
            recordings,
            tracker,
            scheduler: Scheduler::new(center),
            flow: DismissalFlow::new(),
            sounder,
            configuring: false,
            pending_save: None,
            tx,
            rx,
        }
    }

    #[must_use]
    pub fn sender(&self) -> Sender<Message> {
        self.tx.clone()
    }

    #[must_use]
    pub const fn store(&self) -> &AlarmStore {
        &self.store
    }

    #[must_use]
    pub const fn codes(&self) -> &CodeLibrary {
        &self.codes
    }

    pub fn codes_mut(&mut self) -> &mut CodeLibrary {
        &mut self.codes
    }

    #[must_use]
    pub const fn recordings(&self) -> &RecordingLibrary {
        &self.recordings
    }

    pub fn recordings_mut(&mut self) -> &mut RecordingLibrary {
        &mut self.recordings
    }

    /// standing answer for the warning banner
    #[must_use]
    pub fn notifications_authorized(&self) -> bool {
        self.scheduler.center().authorization_status()
    }

    #[must_use]
    pub const fn flow(&self) -> &DismissalFlow {
        &self.flow
    }

    #[must_use]
    pub const fn tracker(&self) -> &RingingTracker {
        &self.tracker
    }

    /// bring schedules in line with the stored alarms and pick up a ring
    /// that survived a process death
    pub fn startup(&mut self, now: NaiveDateTime) {
        if !self.scheduler.center_mut().request_authorization() {
            // standing warning, everything else keeps working
            warn!("notifications are not authorized, alarms cannot fire in the background");
        }
        if !self.store.setup_completed() {
            info!("first-run setup has not been completed yet");
        }
        self.reschedule_all(now);

        if let Some(alarm) = self.tracker.current(&self.store).cloned() {
            info!("resuming unacknowledged ring of alarm {}", alarm.id);
            let actions = self.flow.begin(alarm);
            self.execute(actions, now);
        } else if self.tracker.ringing_id().is_some() {
            warn!("ringing alarm no longer exists, dismissing");
            self.tracker.dismiss(&mut self.scheduler);
        }
    }

    fn reschedule_all(&mut self, now: NaiveDateTime) {
        for alarm in self.store.list().to_vec() {
            self.scheduler.schedule(&alarm, now);
        }
    }

    // ---- alarm mutation, each one write-through plus reschedule ----

    pub fn add_alarm(&mut self, alarm: Alarm, now: NaiveDateTime) -> Result<Uuid, StorageError> {
        let id = alarm.id;
        self.store.add(alarm.clone())?;
        self.scheduler.schedule(&alarm, now);
        Ok(id)
    }

    pub fn update_alarm(
        &mut self,
        id: Uuid,
        mutator: impl FnOnce(&mut Alarm),
        now: NaiveDateTime,
    ) -> Result<(), StorageError> {
        self.store.update(id, mutator)?;
        if let Some(alarm) = self.store.get(id).cloned() {
            self.scheduler.schedule(&alarm, now);
        }
        Ok(())
    }

    /// delete the alarm, cancel its trigger family, and release its voice
    /// recording unless the library still references that file
    pub fn remove_alarm(&mut self, id: Uuid, now: NaiveDateTime) -> Result<bool, StorageError> {
        let Some(removed) = self.store.delete(id)? else {
            return Ok(false);
        };
        self.scheduler.cancel(id);
        if self.tracker.ringing_id() == Some(id) {
            let actions = self.flow.reset();
            self.execute(actions, now);
            self.tracker.dismiss(&mut self.scheduler);
        }
        if let Some(path) = removed.voice_recording {
            self.release_recording(&path);
        }
        Ok(true)
    }

    fn release_recording(&mut self, path: &Path) {
        let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
            return;
        };
        if self.recordings.find_by_file_name(file_name).is_some() {
            info!("recording {file_name} stays, the library still references it");
            return;
        }
        audio::delete_file(&self.resolve_recording(path));
    }

    fn resolve_recording(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.recordings_dir().join(path)
        }
    }

    /// the save offer from the last voice playback, if one is open
    pub fn save_offered_recording(
        &mut self,
        name: String,
    ) -> Result<Option<SavedRecording>, StorageError> {
        let Some(path) = self.pending_save.take() else {
            return Ok(None);
        };
        let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
            warn!("offered recording has no usable file name");
            return Ok(None);
        };
        let duration = audio::clip_duration(&self.resolve_recording(&path)).unwrap_or(0.0);
        self.recordings
            .add(name, file_name.to_string(), duration)
            .map(Some)
    }

    pub fn set_setup_completed(&mut self, completed: bool) -> Result<(), StorageError> {
        self.store.set_setup_completed(completed)
    }

    // ---- event processing ----

    /// process one message. returns false once the loop should stop.
    pub fn handle(&mut self, message: Message, now: NaiveDateTime) -> bool {
        match message {
            Message::NotificationDelivered { id } => {
                let decision = reconciler::on_foreground_delivery(
                    &id,
                    self.tracker.ringing_id().is_some(),
                    self.configuring,
                    self.tracker.recently_dismissed(),
                );
                if let Decision::Trigger(alarm_id) = decision {
                    self.trigger(alarm_id, now);
                }
            }
            Message::NotificationTapped { id } => {
                if let Some(alarm_id) = reconciler::on_tap(id.as_deref(), &self.store) {
                    self.trigger(alarm_id, now);
                }
            }
            Message::ScanRequested => {
                let actions = self.flow.request_scan(now);
                self.execute(actions, now);
            }
            Message::CodeScanned(code) => {
                let actions = self.flow.scan_result(&code);
                self.execute(actions, now);
            }
            Message::ScanCancelled => {
                let actions = self.flow.cancel_scan();
                self.execute(actions, now);
            }
            Message::StopPressed => {
                let actions = self.flow.press_stop();
                self.execute(actions, now);
            }
            Message::PlaybackFinished => {
                let saved = self.playback_clip_saved();
                let actions = self.flow.playback_finished(saved);
                self.execute(actions, now);
            }
            Message::PlaybackSkipped => {
                let saved = self.playback_clip_saved();
                let actions = self.flow.skip_playback(saved);
                self.execute(actions, now);
            }
            Message::Configuring(open) => self.configuring = open,
            Message::AlarmsChanged => debug!("alarm collection changed"),
            Message::Shutdown => return false,
        }
        true
    }

    /// clock tick while the loop idles
    pub fn tick(&mut self, now: NaiveDateTime) {
        let actions = self.flow.tick(now);
        self.execute(actions, now);
        self.sounder.tick();
    }

    /// surface the ringing screen for this alarm. a second alarm arriving
    /// on top of an active one wins, and the loser's trigger family goes
    /// with it.
    fn trigger(&mut self, alarm_id: Uuid, now: NaiveDateTime) {
        let Some(alarm) = self.store.get(alarm_id).cloned() else {
            warn!("trigger for unknown alarm {alarm_id} dropped");
            return;
        };
        if self.flow.phase() != Phase::Idle {
            let actions = self.flow.reset();
            self.execute(actions, now);
        }
        if let Some(loser) = self.tracker.trigger(alarm_id) {
            self.scheduler.cancel(loser);
        }
        let actions = self.flow.begin(alarm);
        self.execute(actions, now);
    }

    fn playback_clip_saved(&self) -> bool {
        self.flow
            .ringing_alarm()
            .and_then(|alarm| alarm.voice_recording.as_deref())
            .and_then(Path::file_name)
            .and_then(OsStr::to_str)
            .map_or(true, |file_name| {
                self.recordings.find_by_file_name(file_name).is_some()
            })
    }

    fn execute(&mut self, actions: Vec<Action>, now: NaiveDateTime) {
        for action in actions {
            match action {
                Action::StartRing => self.sounder.start_ring(),
                Action::PauseRing => self.sounder.pause_ring(),
                Action::ResumeRing => self.sounder.resume_ring(),
                Action::StopRing => self.sounder.stop_ring(),
                Action::Dismiss => {
                    let dismissed = self.tracker.ringing_id();
                    self.tracker.dismiss(&mut self.scheduler);
                    // the family is gone, re-register so tomorrow still rings
                    if let Some(alarm) = dismissed.and_then(|id| self.store.get(id).cloned()) {
                        if alarm.enabled {
                            self.scheduler.schedule(&alarm, now);
                        }
                    }
                }
                Action::PlayVoice(path) => {
                    let resolved = self.resolve_recording(&path);
                    self.sounder.play_voice(&resolved);
                }
                Action::StopVoice => self.sounder.stop_voice(),
                Action::OfferSaveRecording(path) => {
                    info!(
                        "voice memo {} is not in the library yet, it can be saved for reuse",
                        path.display()
                    );
                    self.pending_save = Some(path);
                }
            }
        }
    }
}

impl<S: SoundOutput> App<LocalNotificationCenter, S> {
    /// hand every due trigger to the reconciler, the way a foregrounded
    /// process sees its deliveries
    pub fn poll_due(&mut self, now: NaiveDateTime) {
        for request in self.scheduler.center_mut().due(now) {
            self.handle(Message::NotificationDelivered { id: request.id }, now);
        }
    }

    /// the event loop: poll due triggers, drain messages, tick timeouts
    pub fn run(&mut self) {
        loop {
            let now = chrono::Local::now().naive_local();
            self.poll_due(now);
            self.tick(now);
            match self.rx.recv_timeout(Duration::from_millis(250)) {
                Ok(message) => {
                    let now = chrono::Local::now().naive_local();
                    if !self.handle(message, now) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("event loop stopped");
    }
}
