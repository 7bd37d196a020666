use std::{error::Error, io, io::BufRead, path::PathBuf, sync::mpsc, thread};

use chrono::NaiveTime;
use clap::{command, Parser, Subcommand};
use scanwake::{
    alarm::Alarm,
    audio::RodioSound,
    communication::Message,
    notify::LocalNotificationCenter,
    scan::{CodeSource, ScannedCode, Symbology},
    storage::Paths,
    App,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// create the data directory and mark first-run setup as done
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// add an alarm, time given as HH:MM
    Add {
        time: String,
        #[clap(long)]
        label: Option<String>,
        /// code that must be scanned to dismiss the alarm
        #[clap(long)]
        code: Option<String>,
        /// voice memo file played back after dismissal
        #[clap(long)]
        voice: Option<PathBuf>,
    },
    /// show every alarm
    List,
    /// flip an alarm on or off
    Toggle { id: Uuid },
    /// delete an alarm
    Remove { id: Uuid },
    /// manage the saved scan-code library
    Codes {
        #[clap(subcommand)]
        action: CodeAction,
    },
    /// manage the saved voice-recording library
    Recordings {
        #[clap(subcommand)]
        action: RecordingAction,
    },
    /// stay in the foreground, ringing and scanning
    Run,
}

#[derive(Subcommand)]
enum CodeAction {
    /// save a code under a reusable name
    Save { name: String, value: String },
    List,
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum RecordingAction {
    List,
    /// rename a saved recording
    Rename { id: Uuid, name: String },
    /// delete a saved recording and its file
    Remove { id: Uuid },
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_file_logger::init_logger!("scanwake")
        .map_err(|e| format!("couldn't initialize logger: {e}"))?;

    let args = Args::parse();
    let paths = Paths::new()?;
    let (tx, rx) = mpsc::channel();
    let sound = RodioSound::spawn(tx.clone());
    let mut app = App::new(paths, LocalNotificationCenter::new(), sound, tx, rx);
    let now = chrono::Local::now().naive_local();

    match args.command {
        Some(Command::Init { force }) => {
            if force || !app.store().setup_completed() {
                app.set_setup_completed(true)?;
                println!("setup complete");
            } else {
                println!("already set up, use --force to redo");
            }
        }
        Some(Command::Add {
            time,
            label,
            code,
            voice,
        }) => {
            let time = NaiveTime::parse_from_str(&time, "%H:%M")?;
            let mut alarm = Alarm::new(time);
            alarm.label = label;
            alarm.qr_code = code;
            alarm.voice_recording = voice;
            let id = app.add_alarm(alarm, now)?;
            println!("alarm {id} set");
        }
        Some(Command::List) => {
            for alarm in app.store().list() {
                let mut extras = Vec::new();
                if let Some(label) = &alarm.label {
                    extras.push(label.clone());
                }
                if alarm.has_qr_code() {
                    extras.push("scan to dismiss".to_string());
                }
                if alarm.has_voice_recording() {
                    extras.push("voice memo".to_string());
                }
                println!(
                    "{}  {}  [{}]  {}",
                    alarm.id,
                    alarm.time_string(),
                    if alarm.enabled { "on" } else { "off" },
                    extras.join(", ")
                );
            }
        }
        Some(Command::Toggle { id }) => {
            app.update_alarm(id, |alarm| alarm.enabled = !alarm.enabled, now)?;
            match app.store().get(id) {
                Some(alarm) => println!(
                    "alarm {id} is now {}",
                    if alarm.enabled { "on" } else { "off" }
                ),
                None => println!("no such alarm"),
            }
        }
        Some(Command::Remove { id }) => {
            if app.remove_alarm(id, now)? {
                println!("alarm removed");
            } else {
                println!("no such alarm");
            }
        }
        Some(Command::Codes { action }) => match action {
            CodeAction::Save { name, value } => {
                let entry = app.codes_mut().add(name, value, Symbology::Other)?;
                println!("code saved as {}", entry.id);
            }
            CodeAction::List => {
                for code in app.codes().list() {
                    println!("{}  {}  ({})", code.id, code.name, code.symbology);
                }
            }
            CodeAction::Remove { id } => {
                app.codes_mut().delete(id)?;
                println!("code removed");
            }
        },
        Some(Command::Recordings { action }) => match action {
            RecordingAction::List => {
                for recording in app.recordings().list() {
                    println!(
                        "{}  {}  {}  ({})",
                        recording.id,
                        recording.name,
                        recording.duration_string(),
                        recording.file_name
                    );
                }
            }
            RecordingAction::Rename { id, name } => {
                app.recordings_mut().rename(id, name)?;
                println!("recording renamed");
            }
            RecordingAction::Remove { id } => {
                app.recordings_mut().delete(id)?;
                println!("recording removed");
            }
        },
        Some(Command::Run) | None => {
            app.startup(now);
            if !app.notifications_authorized() {
                println!("warning: notifications are not authorized, alarms cannot fire in the background");
            }
            spawn_console(app.sender());
            println!("ready. commands: scan, cancel, stop, skip, tap, quit; anything else counts as a scanned code");
            app.run();
        }
    }
    Ok(())
}

/// stands in for the camera: every console line is one decoded code
struct ConsoleScanner<R> {
    reader: R,
}

impl<R: BufRead> CodeSource for ConsoleScanner<R> {
    fn next_code(&mut self) -> Option<ScannedCode> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).ok()? == 0 {
                return None;
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(ScannedCode::new(trimmed.to_string(), Symbology::Other));
            }
        }
    }
}

fn spawn_console(events: mpsc::Sender<Message>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        let mut scanner = ConsoleScanner {
            reader: stdin.lock(),
        };
        while let Some(code) = scanner.next_code() {
            let word = match code.value.as_str() {
                "scan" => Some(Message::ScanRequested),
                "cancel" => Some(Message::ScanCancelled),
                "stop" => Some(Message::StopPressed),
                "skip" => Some(Message::PlaybackSkipped),
                "tap" => Some(Message::NotificationTapped { id: None }),
                "quit" => Some(Message::Shutdown),
                _ => None,
            };
            let message = word.unwrap_or(Message::CodeScanned(code));
            let done = message == Message::Shutdown;
            if events.send(message).is_err() || done {
                break;
            }
        }
    });
}
