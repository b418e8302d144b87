use super::PreferenceStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

const FILE_VERSION: u32 = 1;

/// On-disk layout of the preference file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreferenceFile {
    pub version: u32,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

impl Default for PreferenceFile {
    fn default() -> Self {
        Self {
            version: FILE_VERSION,
            values: BTreeMap::new(),
            saved_at: None,
        }
    }
}

/// Preference store backed by a JSON file, written through on every set
pub struct JsonPreferenceStore {
    path: PathBuf,
    file: PreferenceFile,
}

impl JsonPreferenceStore {
    /// Default location: `~/.searchhome/prefs.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".searchhome").join("prefs.json"))
    }

    /// Open the store at `path`.
    ///
    /// A missing file starts empty. A file that cannot be read or parsed is
    /// logged and also starts empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = if path.exists() {
            match Self::read(&path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable preference file {}: {}",
                        path.display(),
                        e
                    );
                    PreferenceFile::default()
                }
            }
        } else {
            tracing::debug!("No preference file at {}, starting empty", path.display());
            PreferenceFile::default()
        };

        Self { path, file }
    }

    /// Read and parse a preference file
    pub fn read(path: &Path) -> Result<PreferenceFile> {
        tracing::debug!("Reading preferences from: {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let file: PreferenceFile = serde_json::from_reader(reader)?;

        if file.version != FILE_VERSION {
            return Err(Error::Preference(format!(
                "Unsupported preference file version {}",
                file.version
            )));
        }

        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.file.values
    }

    /// Drop every stored value and persist the empty file
    pub fn clear(&mut self) -> Result<()> {
        self.file.values.clear();
        self.save()
    }

    fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.file.saved_at = Some(chrono::Utc::now().to_rfc3339());

        let mut writer = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut writer, &self.file)?;
        writer.flush()?;

        tracing::debug!(
            "Saved {} preference values to {}",
            self.file.values.len(),
            self.path.display()
        );

        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.file.values.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<()> {
        if self.file.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.file.values.insert(key.to_string(), value.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{LAST_KNOWN_GOOGLE_URL, LAST_PROMPTED_GOOGLE_URL};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonPreferenceStore::open(dir.path().join("prefs.json"));

        assert!(store.values().is_empty());
        assert_eq!(store.get_string(LAST_KNOWN_GOOGLE_URL), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut store = JsonPreferenceStore::open(&path);
        store
            .set_string(LAST_KNOWN_GOOGLE_URL, "http://www.google.de/")
            .unwrap();
        store.set_string(LAST_PROMPTED_GOOGLE_URL, "").unwrap();

        let reopened = JsonPreferenceStore::open(&path);
        assert_eq!(
            reopened.get_string(LAST_KNOWN_GOOGLE_URL).as_deref(),
            Some("http://www.google.de/")
        );
        assert_eq!(reopened.get_string(LAST_PROMPTED_GOOGLE_URL).as_deref(), Some(""));

        let raw = JsonPreferenceStore::read(&path).unwrap();
        assert_eq!(raw.version, 1);
        assert!(raw.saved_at.is_some());
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = JsonPreferenceStore::open(&path);
        assert!(store.values().is_empty());

        // the next write replaces the broken file
        store
            .set_string(LAST_KNOWN_GOOGLE_URL, "http://www.google.fr/")
            .unwrap();
        assert!(JsonPreferenceStore::read(&path).is_ok());
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, r#"{"version": 7, "values": {}}"#).unwrap();

        let err = JsonPreferenceStore::read(&path).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }

    #[test]
    fn test_clear_removes_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = JsonPreferenceStore::open(&path);
        store
            .set_string(LAST_PROMPTED_GOOGLE_URL, "http://www.google.fr/")
            .unwrap();
        store.clear().unwrap();

        assert!(JsonPreferenceStore::open(&path).values().is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_is_reported() {
        // every write to /dev/full fails with ENOSPC once the buffer is flushed
        let mut store = JsonPreferenceStore::open("/dev/full");

        let result = store.set_string(LAST_KNOWN_GOOGLE_URL, "http://www.google.de/");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
