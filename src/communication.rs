use crate::scan::ScannedCode;

/// everything the event loop can be told, by platform callbacks, the scanner
/// feed, the sound thread, or the user surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// a scheduled notification came due while the process is foregrounded
    NotificationDelivered { id: String },
    /// the user tapped a delivered notification; the identifier may be lost
    /// on the way in
    NotificationTapped { id: Option<String> },
    /// the user asked for the scanner on the ringing screen
    ScanRequested,
    /// the scanner decoded something
    CodeScanned(ScannedCode),
    /// the scan screen was closed without a match
    ScanCancelled,
    /// stop button on the ringing screen
    StopPressed,
    /// the voice memo finished playing on its own
    PlaybackFinished,
    /// the user skipped the voice memo
    PlaybackSkipped,
    /// a setup or edit screen opened (true) or closed (false)
    Configuring(bool),
    /// the alarm collection committed a mutation
    AlarmsChanged,
    /// stop the event loop
    Shutdown,
}
