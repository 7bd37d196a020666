//! the dismissal flow, from the first trigger to a quiet screen.
//!
//! ```text
//!            begin()                 request_scan()
//!  Idle ──────────────► Ringing ──────────────────► ScanPending
//!   ▲                    ▲   │                        │  │
//!   │   press_stop()     │   │                        │  │ scan_result(match)
//!   │   (no code set)    │   └── cancel_scan() ◄──────┘  │
//!   │                    │       or 30s timeout          ▼
//!   │                    │                            Verified
//!   │                    └─(mismatch: stays pending)     │
//!   │                                                    │ voice memo?
//!   ├───────────────── no ◄──────────────────────────────┤
//!   │                                                    ▼ yes
//!   └──────────── playback_finished() ──────────── PlaybackPending
//! ```
//!
//! `Verified` is where the ring actually dies: sound stops, the captured
//! volume level comes back, and the tracker drops the durable ringing flag
//! along with the whole trigger family. while the scanner is up the ring is
//! paused, never stopped, so a failed scan resumes mid-loop.

use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use std::path::PathBuf;

use crate::{alarm::Alarm, scan::ScannedCode};

/// how long the scanner may sit open before the ring resumes
pub const SCAN_TIMEOUT_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Ringing,
    ScanPending,
    PlaybackPending,
}

/// side effects the flow wants executed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    StartRing,
    PauseRing,
    ResumeRing,
    StopRing,
    /// formal dismissal: clear the tracker, cancel the trigger family,
    /// clear the badge
    Dismiss,
    PlayVoice(PathBuf),
    StopVoice,
    /// ask whether to keep this clip in the recording library
    OfferSaveRecording(PathBuf),
}

#[derive(Debug, Default)]
pub struct DismissalFlow {
    phase: Phase,
    alarm: Option<Alarm>,
    scan_deadline: Option<NaiveDateTime>,
}

impl DismissalFlow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn ringing_alarm(&self) -> Option<&Alarm> {
        self.alarm.as_ref()
    }

    /// the tracker says this alarm rings, start making noise. the wake
    /// signal is always the alarm tone, never the user's recording.
    pub fn begin(&mut self, alarm: Alarm) -> Vec<Action> {
        if self.phase != Phase::Idle {
            warn!("ring of {} ignored, flow already busy", alarm.id);
            return Vec::new();
        }
        info!("alarm {} ringing", alarm.id);
        self.phase = Phase::Ringing;
        self.alarm = Some(alarm);
        vec![Action::StartRing]
    }

    /// the user wants the scanner. only meaningful with a registered code.
    pub fn request_scan(&mut self, now: NaiveDateTime) -> Vec<Action> {
        let Some(alarm) = &self.alarm else {
            return Vec::new();
        };
        if self.phase != Phase::Ringing || !alarm.has_qr_code() {
            return Vec::new();
        }
        self.phase = Phase::ScanPending;
        self.scan_deadline = Some(now + Duration::seconds(SCAN_TIMEOUT_SECS));
        vec![Action::PauseRing]
    }

    /// a decode arrived from the camera. the registered code must match
    /// exactly, byte for byte; anything else keeps the scanner open.
    pub fn scan_result(&mut self, code: &ScannedCode) -> Vec<Action> {
        if self.phase != Phase::ScanPending {
            return Vec::new();
        }
        let registered = self
            .alarm
            .as_ref()
            .and_then(|alarm| alarm.qr_code.as_deref());
        if registered == Some(code.value.as_str()) {
            info!("scan matched, alarm verified");
            self.scan_deadline = None;
            self.verify()
        } else {
            info!("scan mismatch ({}), try again", code.symbology);
            Vec::new()
        }
    }

    /// the scanner was closed without a match
    pub fn cancel_scan(&mut self) -> Vec<Action> {
        if self.phase != Phase::ScanPending {
            return Vec::new();
        }
        self.phase = Phase::Ringing;
        self.scan_deadline = None;
        vec![Action::ResumeRing]
    }

    /// clock tick: an expired scan window counts as a cancel
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<Action> {
        if self.phase == Phase::ScanPending
            && self.scan_deadline.is_some_and(|deadline| now >= deadline)
        {
            info!("scan window expired, ringing again");
            return self.cancel_scan();
        }
        Vec::new()
    }

    /// stop button. only honored when no code is registered, otherwise the
    /// scan stays the single gate out.
    pub fn press_stop(&mut self) -> Vec<Action> {
        let Some(alarm) = &self.alarm else {
            return Vec::new();
        };
        if self.phase != Phase::Ringing {
            return Vec::new();
        }
        if alarm.has_qr_code() {
            warn!("stop refused, this alarm dismisses by scan");
            return Vec::new();
        }
        self.verify()
    }

    /// the gate is satisfied: silence everything, formally dismiss, then
    /// either play the voice memo or go home
    fn verify(&mut self) -> Vec<Action> {
        let mut actions = vec![Action::StopRing, Action::Dismiss];
        let voice = self
            .alarm
            .as_ref()
            .and_then(|alarm| alarm.voice_recording.clone());
        if let Some(path) = voice {
            self.phase = Phase::PlaybackPending;
            actions.push(Action::PlayVoice(path));
        } else {
            self.phase = Phase::Idle;
            self.alarm = None;
        }
        actions
    }

    /// voice memo ran to the end. `already_saved` is the library's answer
    /// for this clip's file name.
    pub fn playback_finished(&mut self, already_saved: bool) -> Vec<Action> {
        self.close_playback(already_saved, false)
    }

    /// the user skipped the memo mid-playback
    pub fn skip_playback(&mut self, already_saved: bool) -> Vec<Action> {
        self.close_playback(already_saved, true)
    }

    fn close_playback(&mut self, already_saved: bool, stop_voice: bool) -> Vec<Action> {
        if self.phase != Phase::PlaybackPending {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if stop_voice {
            actions.push(Action::StopVoice);
        }
        if let Some(path) = self
            .alarm
            .take()
            .and_then(|alarm| alarm.voice_recording)
        {
            if !already_saved {
                actions.push(Action::OfferSaveRecording(path));
            }
        }
        self.phase = Phase::Idle;
        actions
    }

    /// drop everything, e.g. because the ringing alarm was deleted out from
    /// under the flow
    pub fn reset(&mut self) -> Vec<Action> {
        let actions = match self.phase {
            Phase::Idle => Vec::new(),
            Phase::Ringing | Phase::ScanPending => vec![Action::StopRing],
            Phase::PlaybackPending => vec![Action::StopVoice],
        };
        self.phase = Phase::Idle;
        self.alarm = None;
        self.scan_deadline = None;
        actions
    }
}
