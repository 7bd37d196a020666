//! sound output and voice capture collaborators. the ring and the voice
//! memo play on a dedicated thread that owns the rodio output stream and is
//! driven over a channel, because the stream cannot move between threads.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use rodio::{source::SineWave, Decoder, OutputStream, Sink, Source};

use crate::{
    communication::Message,
    volume::{ForceMax, NullVolume},
};

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no recording in progress")]
    NotRecording,
    #[error("recorder unavailable: {0}")]
    RecorderUnavailable(String),
}

/// everything the dismissal flow does with the speaker: the looping wake
/// signal with vibration pulses, and one-shot voice memo playback. pausing
/// keeps the ring resumable while the scanner has the screen.
pub trait SoundOutput {
    fn start_ring(&mut self);
    fn pause_ring(&mut self);
    fn resume_ring(&mut self);
    fn stop_ring(&mut self);
    fn play_voice(&mut self, file: &Path);
    fn stop_voice(&mut self);
    /// periodic upkeep from the event loop
    fn tick(&mut self) {}
}

/// a finished voice capture
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedClip {
    pub file_name: String,
    pub duration_secs: f64,
}

/// microphone capture collaborator
pub trait VoiceRecorder {
    fn start_recording(&mut self) -> Result<(), AudioError>;
    fn stop_recording(&mut self) -> Result<RecordedClip, AudioError>;
    fn is_recording(&self) -> bool;
    fn elapsed(&self) -> Duration;
}

/// decoded length of a clip, where the container reports one
#[must_use]
pub fn clip_duration(path: &Path) -> Option<f64> {
    let file = File::open(path)
        .map_err(|e| warn!("couldn't open {}: {e}", path.display()))
        .ok()?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| warn!("couldn't decode {}: {e}", path.display()))
        .ok()?;
    source.total_duration().map(|d| d.as_secs_f64())
}

/// remove a clip from disk, logging instead of failing
pub fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("recording file removed: {}", path.display()),
        Err(e) => warn!("couldn't remove {}: {e}", path.display()),
    }
}

enum SoundCmd {
    StartRing,
    PauseRing,
    ResumeRing,
    StopRing,
    PlayVoice(PathBuf),
    StopVoice,
}

/// handle to the sound thread. volume forcing happens on the caller side so
/// the ordering against pause and resume matches the ringing flow.
pub struct RodioSound {
    tx: Sender<SoundCmd>,
    volume: ForceMax<NullVolume>,
}

impl RodioSound {
    /// spawn the sound thread. voice-memo completion comes back as a
    /// [`Message::PlaybackFinished`] on the event channel.
    #[must_use]
    pub fn spawn(events: Sender<Message>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || sound_loop(&rx, &events));
        Self {
            tx,
            volume: ForceMax::new(NullVolume::default()),
        }
    }

    fn send(&self, cmd: SoundCmd) {
        if self.tx.send(cmd).is_err() {
            warn!("sound thread is gone");
        }
    }
}

impl SoundOutput for RodioSound {
    fn start_ring(&mut self) {
        self.volume.engage();
        self.send(SoundCmd::StartRing);
    }

    fn pause_ring(&mut self) {
        self.send(SoundCmd::PauseRing);
        // keep the captured level, the ring is expected back
        self.volume.release(false);
    }

    fn resume_ring(&mut self) {
        self.volume.engage();
        self.send(SoundCmd::ResumeRing);
    }

    fn stop_ring(&mut self) {
        self.send(SoundCmd::StopRing);
        self.volume.release(true);
    }

    fn play_voice(&mut self, file: &Path) {
        self.send(SoundCmd::PlayVoice(file.to_path_buf()));
    }

    fn stop_voice(&mut self) {
        self.send(SoundCmd::StopVoice);
    }

    fn tick(&mut self) {
        self.volume.hold();
    }
}

const VIBRATION_PERIOD: Duration = Duration::from_millis(1500);
const FALLBACK_PERIOD: Duration = Duration::from_secs(1);

fn sound_loop(rx: &Receiver<SoundCmd>, events: &Sender<Message>) {
    // the stream handle must not leave this thread
    let output = match OutputStream::try_default() {
        Ok(output) => Some(output),
        Err(e) => {
            error!("no audio output, ringing falls back to alert pulses: {e}");
            None
        }
    };
    let handle = output.as_ref().map(|(_stream, handle)| handle);

    let mut ring: Option<Sink> = None;
    let mut ring_fallback = false;
    let mut ring_paused = false;
    let mut voice: Option<Sink> = None;
    let mut last_pulse = Instant::now();
    let mut last_bell = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(SoundCmd::StartRing) => {
                if ring.is_some() || ring_fallback {
                    debug!("ring already active");
                    continue;
                }
                ring_paused = false;
                match handle.and_then(|handle| ring_sink(handle)) {
                    Some(sink) => ring = Some(sink),
                    None => {
                        // degraded wake signal, but never a silent one
                        ring_fallback = true;
                    }
                }
            }
            Ok(SoundCmd::PauseRing) => {
                ring_paused = true;
                if let Some(sink) = &ring {
                    sink.pause();
                }
            }
            Ok(SoundCmd::ResumeRing) => {
                ring_paused = false;
                if let Some(sink) = &ring {
                    sink.play();
                }
            }
            Ok(SoundCmd::StopRing) => {
                if let Some(sink) = ring.take() {
                    sink.stop();
                }
                ring_fallback = false;
                ring_paused = false;
            }
            Ok(SoundCmd::PlayVoice(path)) => {
                voice = handle.and_then(|handle| voice_sink(handle, &path));
                if voice.is_none() {
                    // never hold the flow hostage to the audio subsystem
                    warn!("voice memo playback unavailable, skipping");
                    let _ = events.send(Message::PlaybackFinished);
                }
            }
            Ok(SoundCmd::StopVoice) => {
                if let Some(sink) = voice.take() {
                    sink.stop();
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let ring_active = (ring.is_some() || ring_fallback) && !ring_paused;
        if ring_active && last_pulse.elapsed() >= VIBRATION_PERIOD {
            last_pulse = Instant::now();
            debug!("vibration pulse");
        }
        if ring_fallback && !ring_paused && last_bell.elapsed() >= FALLBACK_PERIOD {
            last_bell = Instant::now();
            // terminal bell, the poorest alarm that still wakes someone
            eprint!("\x07");
        }

        if voice.as_ref().is_some_and(Sink::empty) {
            voice = None;
            let _ = events.send(Message::PlaybackFinished);
        }
    }
}

/// endless beep pattern at full sink volume
fn ring_sink(handle: &rodio::OutputStreamHandle) -> Option<Sink> {
    let sink = Sink::try_new(handle)
        .map_err(|e| error!("couldn't open ring sink: {e}"))
        .ok()?;
    let beep = SineWave::new(880.0)
        .take_duration(Duration::from_millis(400))
        .amplify(0.9)
        .repeat_infinite();
    sink.set_volume(1.0);
    sink.append(beep);
    sink.play();
    Some(sink)
}

fn voice_sink(handle: &rodio::OutputStreamHandle, path: &Path) -> Option<Sink> {
    let file = File::open(path)
        .map_err(|e| error!("couldn't open voice memo {}: {e}", path.display()))
        .ok()?;
    let source = Decoder::new(BufReader::new(file))
        .map_err(|e| error!("couldn't decode voice memo {}: {e}", path.display()))
        .ok()?;
    let sink = Sink::try_new(handle)
        .map_err(|e| error!("couldn't open voice sink: {e}"))
        .ok()?;
    sink.append(source);
    sink.play();
    info!("voice memo playback started: {}", path.display());
    Some(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{library::RecordingLibrary, storage::Paths};

    /// scripted capture device standing in for the microphone
    struct FakeRecorder {
        recording: bool,
        started_at: Option<Instant>,
        clip: RecordedClip,
    }

    impl VoiceRecorder for FakeRecorder {
        fn start_recording(&mut self) -> Result<(), AudioError> {
            self.recording = true;
            self.started_at = Some(Instant::now());
            Ok(())
        }
        fn stop_recording(&mut self) -> Result<RecordedClip, AudioError> {
            if !self.recording {
                return Err(AudioError::NotRecording);
            }
            self.recording = false;
            Ok(self.clip.clone())
        }
        fn is_recording(&self) -> bool {
            self.recording
        }
        fn elapsed(&self) -> Duration {
            self.started_at.map_or(Duration::ZERO, |at| at.elapsed())
        }
    }

    #[test]
    fn record_then_save_into_the_library() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        std::fs::create_dir_all(paths.recordings_dir()).unwrap();
        std::fs::write(paths.recordings_dir().join("memo_1.wav"), b"pcm").unwrap();

        let mut recorder = FakeRecorder {
            recording: false,
            started_at: None,
            clip: RecordedClip {
                file_name: "memo_1.wav".to_string(),
                duration_secs: 4.5,
            },
        };
        recorder.start_recording().unwrap();
        assert!(recorder.is_recording());
        let clip = recorder.stop_recording().unwrap();

        let mut library = RecordingLibrary::load(paths);
        let entry = library
            .add("morning pep talk".to_string(), clip.file_name, clip.duration_secs)
            .unwrap();
        assert!(library.find_by_file_name(&entry.file_name).is_some());
    }

    #[test]
    fn stopping_without_a_recording_is_an_error() {
        let mut recorder = FakeRecorder {
            recording: false,
            started_at: None,
            clip: RecordedClip {
                file_name: "x.wav".to_string(),
                duration_secs: 0.0,
            },
        };
        assert!(matches!(
            recorder.stop_recording(),
            Err(AudioError::NotRecording)
        ));
    }

    #[test]
    fn clip_duration_of_garbage_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"not audio").unwrap();
        assert_eq!(clip_duration(&path), None);
    }
}
