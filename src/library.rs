//! reusable scan codes and voice clips the user has saved by name, so an
//! alarm can be armed without re-scanning or re-recording.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use log::{error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    scan::Symbology,
    storage::{self, Paths, StorageError},
};

const CODES_KEY: &str = "codes";
const RECORDINGS_KEY: &str = "recordings";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SavedCode {
    pub id: Uuid,
    /// user-chosen name, e.g. "fridge barcode"
    pub name: String,
    pub code: String,
    pub symbology: Symbology,
    #[serde(with = "toml_datetime_compat")]
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SavedRecording {
    pub id: Uuid,
    pub name: String,
    /// file name inside the recordings directory
    pub file_name: String,
    pub duration_secs: f64,
    #[serde(with = "toml_datetime_compat")]
    pub created_at: NaiveDateTime,
}

impl SavedRecording {
    /// absolute path, only while the file still exists
    #[must_use]
    pub fn file_path(&self, paths: &Paths) -> Option<PathBuf> {
        let path = paths.recordings_dir().join(&self.file_name);
        path.exists().then_some(path)
    }

    #[must_use]
    pub fn duration_string(&self) -> String {
        let total = self.duration_secs.max(0.0).round() as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredCodes {
    #[serde(default)]
    codes: Vec<SavedCode>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredRecordings {
    #[serde(default)]
    recordings: Vec<SavedRecording>,
}

#[derive(Debug)]
pub struct CodeLibrary {
    paths: Paths,
    codes: Vec<SavedCode>,
}

impl CodeLibrary {
    #[must_use]
    pub fn load(paths: Paths) -> Self {
        let codes = match storage::load::<StoredCodes>(&paths.key_file(CODES_KEY)) {
            Ok(Some(stored)) => stored.codes,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("saved codes unreadable, starting empty: {e}");
                Vec::new()
            }
        };
        Self { paths, codes }
    }

    #[must_use]
    pub fn list(&self) -> &[SavedCode] {
        &self.codes
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&SavedCode> {
        self.codes.iter().find(|code| code.id == id)
    }

    #[must_use]
    pub fn find_by_value(&self, value: &str) -> Option<&SavedCode> {
        self.codes.iter().find(|code| code.code == value)
    }

    pub fn add(
        &mut self,
        name: String,
        code: String,
        symbology: Symbology,
    ) -> Result<SavedCode, StorageError> {
        let entry = SavedCode {
            id: Uuid::new_v4(),
            name,
            code,
            symbology,
            created_at: chrono::Local::now().naive_local(),
        };
        let mut next = self.codes.clone();
        next.push(entry.clone());
        self.commit(next)?;
        Ok(entry)
    }

    pub fn rename(&mut self, id: Uuid, name: String) -> Result<(), StorageError> {
        let mut next = self.codes.clone();
        let Some(entry) = next.iter_mut().find(|code| code.id == id) else {
            return Ok(());
        };
        entry.name = name;
        self.commit(next)
    }

    pub fn delete(&mut self, id: Uuid) -> Result<(), StorageError> {
        let mut next = self.codes.clone();
        next.retain(|code| code.id != id);
        self.commit(next)
    }

    fn commit(&mut self, next: Vec<SavedCode>) -> Result<(), StorageError> {
        let stored = StoredCodes { codes: next };
        if let Err(e) = storage::save(&self.paths.key_file(CODES_KEY), &stored) {
            error!("saved codes write failed, mutation dropped: {e}");
            return Err(e);
        }
        self.codes = stored.codes;
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingLibrary {
    paths: Paths,
    recordings: Vec<SavedRecording>,
}

impl RecordingLibrary {
    /// load the library, dropping entries whose file has gone missing
    #[must_use]
    pub fn load(paths: Paths) -> Self {
        let recordings = match storage::load::<StoredRecordings>(&paths.key_file(RECORDINGS_KEY)) {
            Ok(Some(stored)) => stored.recordings,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("saved recordings unreadable, starting empty: {e}");
                Vec::new()
            }
        };
        let mut library = Self { paths, recordings };
        library.drop_missing_files();
        library
    }

    fn drop_missing_files(&mut self) {
        let before = self.recordings.len();
        let kept: Vec<_> = self
            .recordings
            .iter()
            .filter(|recording| recording.file_path(&self.paths).is_some())
            .cloned()
            .collect();
        if kept.len() != before {
            info!("dropped {} recordings with missing files", before - kept.len());
            if let Err(e) = self.commit(kept) {
                error!("couldn't persist recording cleanup: {e}");
            }
        }
    }

    #[must_use]
    pub fn list(&self) -> &[SavedRecording] {
        &self.recordings
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&SavedRecording> {
        self.recordings.iter().find(|recording| recording.id == id)
    }

    #[must_use]
    pub fn find_by_file_name(&self, file_name: &str) -> Option<&SavedRecording> {
        self.recordings
            .iter()
            .find(|recording| recording.file_name == file_name)
    }

    pub fn add(
        &mut self,
        name: String,
        file_name: String,
        duration_secs: f64,
    ) -> Result<SavedRecording, StorageError> {
        let entry = SavedRecording {
            id: Uuid::new_v4(),
            name,
            file_name,
            duration_secs,
            created_at: chrono::Local::now().naive_local(),
        };
        let mut next = self.recordings.clone();
        next.push(entry.clone());
        self.commit(next)?;
        Ok(entry)
    }

    pub fn rename(&mut self, id: Uuid, name: String) -> Result<(), StorageError> {
        let mut next = self.recordings.clone();
        let Some(entry) = next.iter_mut().find(|recording| recording.id == id) else {
            return Ok(());
        };
        entry.name = name;
        self.commit(next)
    }

    /// remove the entry and its file
    pub fn delete(&mut self, id: Uuid) -> Result<(), StorageError> {
        let Some(index) = self.recordings.iter().position(|r| r.id == id) else {
            return Ok(());
        };
        let removed = self.recordings[index].clone();
        let mut next = self.recordings.clone();
        next.remove(index);
        self.commit(next)?;
        if let Some(path) = removed.file_path(&self.paths) {
            crate::audio::delete_file(&path);
        }
        Ok(())
    }

    fn commit(&mut self, next: Vec<SavedRecording>) -> Result<(), StorageError> {
        let stored = StoredRecordings { recordings: next };
        if let Err(e) = storage::save(&self.paths.key_file(RECORDINGS_KEY), &stored) {
            error!("saved recordings write failed, mutation dropped: {e}");
            return Err(e);
        }
        self.recordings = stored.recordings;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn paths() -> (tempfile::TempDir, Paths) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::at(dir.path().to_path_buf());
        (dir, paths)
    }

    fn write_clip(paths: &Paths, file_name: &str) {
        fs::create_dir_all(paths.recordings_dir()).unwrap();
        fs::write(paths.recordings_dir().join(file_name), b"audio").unwrap();
    }

    #[test]
    fn codes_round_trip_and_find_by_value() {
        let (_dir, paths) = paths();
        let mut library = CodeLibrary::load(paths.clone());
        let entry = library
            .add("fridge".to_string(), "4901234567894".to_string(), Symbology::Ean13)
            .unwrap();

        let reloaded = CodeLibrary::load(paths);
        assert_eq!(reloaded.list(), &[entry.clone()]);
        assert_eq!(reloaded.find_by_value("4901234567894"), Some(&entry));
        assert_eq!(reloaded.find_by_value("nope"), None);
    }

    #[test]
    fn code_rename_and_delete() {
        let (_dir, paths) = paths();
        let mut library = CodeLibrary::load(paths);
        let entry = library
            .add("fridge".to_string(), "abc".to_string(), Symbology::Qr)
            .unwrap();

        library.rename(entry.id, "kitchen".to_string()).unwrap();
        assert_eq!(library.get(entry.id).unwrap().name, "kitchen");

        library.delete(entry.id).unwrap();
        assert!(library.list().is_empty());
    }

    #[test]
    fn recordings_with_missing_files_are_dropped_on_load() {
        let (_dir, paths) = paths();
        write_clip(&paths, "kept.wav");
        let mut library = RecordingLibrary::load(paths.clone());
        library
            .add("kept".to_string(), "kept.wav".to_string(), 4.0)
            .unwrap();
        library
            .add("gone".to_string(), "gone.wav".to_string(), 2.0)
            .unwrap();

        let reloaded = RecordingLibrary::load(paths);
        assert_eq!(reloaded.list().len(), 1);
        assert_eq!(reloaded.list()[0].name, "kept");
    }

    #[test]
    fn deleting_a_recording_removes_its_file() {
        let (_dir, paths) = paths();
        write_clip(&paths, "clip.wav");
        let mut library = RecordingLibrary::load(paths.clone());
        let entry = library
            .add("clip".to_string(), "clip.wav".to_string(), 3.0)
            .unwrap();

        library.delete(entry.id).unwrap();
        assert!(!paths.recordings_dir().join("clip.wav").exists());
        assert!(library.find_by_file_name("clip.wav").is_none());
    }

    #[test]
    fn duration_string_is_minutes_and_seconds() {
        let recording = SavedRecording {
            id: Uuid::new_v4(),
            name: "x".to_string(),
            file_name: "x.wav".to_string(),
            duration_secs: 75.2,
            created_at: chrono::Local::now().naive_local(),
        };
        assert_eq!(recording.duration_string(), "1:15");
    }
}
