use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Chrome user-data directory the tracked browsing session runs in
pub struct BrowserProfile {
    path: PathBuf,
    is_temporary: bool,
}

impl BrowserProfile {
    /// Throwaway profile, removed when dropped
    pub fn temporary() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("searchhome-profile-")
            .tempdir()?
            .keep();

        tracing::debug!("Using temporary profile at {}", path.display());
        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    /// Named profile kept under `~/.searchhome/profiles/<name>`
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Profile(format!("invalid profile name '{}'", name)));
        }
        let root = dirs::home_dir()
            .ok_or_else(|| Error::Profile("could not determine home directory".to_string()))?;
        Self::at(root.join(".searchhome").join("profiles").join(name))
    }

    /// Profile at an explicit directory, created if missing
    pub fn at(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
        }

        Ok(Self {
            path,
            is_temporary: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.is_temporary && self.path.exists() {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_profile_is_removed_on_drop() {
        let profile = BrowserProfile::temporary().unwrap();
        let path = profile.path().to_path_buf();

        assert!(path.is_dir());
        assert!(profile.is_temporary());

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn test_explicit_profile_is_created_and_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let profile_path = temp_dir.path().join("work");

        let profile = BrowserProfile::at(profile_path.clone()).unwrap();
        assert!(profile_path.is_dir());
        assert!(!profile.is_temporary());

        drop(profile);
        assert!(profile_path.exists());
    }

    #[test]
    fn test_named_profile_rejects_path_like_names() {
        assert!(BrowserProfile::named("").is_err());
        assert!(BrowserProfile::named("../escape").is_err());
        assert!(BrowserProfile::named("..").is_err());
    }
}
