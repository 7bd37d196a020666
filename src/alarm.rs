use std::path::PathBuf;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::always_true;

/// one user-configured wake event.
/// the id doubles as the notification-group key, so it never changes once the
/// alarm exists.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: Uuid,
    /// time of day the alarm fires, repeats daily
    #[serde(with = "toml_datetime_compat")]
    pub time: NaiveTime,
    #[serde(default = "always_true")]
    pub enabled: bool,
    /// recorded voice memo played back after dismissal
    pub voice_recording: Option<PathBuf>,
    /// code that must be scanned to dismiss; none means a plain stop button
    pub qr_code: Option<String>,
    pub label: Option<String>,
}

impl Alarm {
    #[must_use]
    pub fn new(time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            enabled: true,
            voice_recording: None,
            qr_code: None,
            label: None,
        }
    }

    #[must_use]
    pub fn has_voice_recording(&self) -> bool {
        self.voice_recording.is_some()
    }

    #[must_use]
    pub fn has_qr_code(&self) -> bool {
        self.qr_code.as_ref().is_some_and(|code| !code.is_empty())
    }

    #[must_use]
    pub fn time_string(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seven() -> NaiveTime {
        NaiveTime::from_hms_opt(7, 0, 0).unwrap()
    }

    #[test]
    fn new_alarm_is_enabled_with_no_gates() {
        let alarm = Alarm::new(seven());
        assert!(alarm.enabled);
        assert!(!alarm.has_voice_recording());
        assert!(!alarm.has_qr_code());
    }

    #[test]
    fn empty_qr_code_counts_as_unset() {
        let mut alarm = Alarm::new(seven());
        alarm.qr_code = Some(String::new());
        assert!(!alarm.has_qr_code());
        alarm.qr_code = Some("ABC123".to_string());
        assert!(alarm.has_qr_code());
    }

    #[test]
    fn time_string_is_24_hour() {
        let alarm = Alarm::new(NaiveTime::from_hms_opt(19, 5, 0).unwrap());
        assert_eq!(alarm.time_string(), "19:05");
    }
}
