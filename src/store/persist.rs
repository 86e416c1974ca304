// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted registry artifacts.
//!
//! The registry keeps two files inside its storage directory:
//!
//! - `profiles.json`: JSON array of [`Profile`] records.
//! - `active.txt`: one line holding the active [`ProfileId`], or nothing at
//!   all when no profile is active.
//!
//! Every write goes through [`write_atomic`], so a reader either sees the old
//! file or the new one, never a torn mix of both.

use crate::profile::{Profile, ProfileId};

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// File name of the profile list.
pub const PROFILES_FILE: &str = "profiles.json";

/// File name of the active profile pointer.
pub const ACTIVE_FILE: &str = "active.txt";

/// Write file contents atomically.
///
/// Contents are written to a temporary file in the same directory as the
/// target, flushed to disk, then renamed over the target. Missing parent
/// directories are created. If the target is a symlink, the file it points to
/// is replaced instead of the link itself. An existing target keeps its
/// permissions.
///
/// # Errors
///
/// - Return [`std::io::Error`] if any step of the write fails. The target is
///   left untouched in that case.
#[instrument(skip(contents), level = "debug")]
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(resolved) => resolved,
        Err(_) => path.to_path_buf(),
    };

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;

    // INVARIANT: Replacement keeps the mode of the file it replaces.
    if let Ok(meta) = fs::metadata(&target) {
        temp.as_file().set_permissions(meta.permissions())?;
    }

    temp.persist(&target).map_err(|err| err.error)?;
    debug!("wrote {} bytes to {:?}", contents.len(), target.display());

    Ok(())
}

/// Remove file, treating an already missing file as success.
///
/// Returns `true` if a file was actually removed.
///
/// # Errors
///
/// - Return [`std::io::Error`] for any failure other than the file being
///   absent.
pub fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Read profile list.
///
/// A missing or blank file yields an empty list.
///
/// # Errors
///
/// - Return [`StorageError::Read`] if the file exists but cannot be read.
/// - Return [`StorageError::MalformedProfiles`] if the file is not a valid
///   profile list.
pub fn read_profiles(path: &Path) -> Result<Vec<Profile>> {
    let Some(content) = read_optional(path)? else {
        return Ok(Vec::new());
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|err| StorageError::MalformedProfiles {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Write profile list atomically.
///
/// # Errors
///
/// - Return [`StorageError::Encode`] if the list cannot be serialized.
/// - Return [`StorageError::Write`] if the file cannot be written.
pub fn write_profiles(path: &Path, profiles: &[Profile]) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(profiles).map_err(StorageError::Encode)?;
    data.push(b'\n');
    write_atomic(path, &data).map_err(|err| StorageError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Read active profile pointer.
///
/// A missing or blank file means no profile is active.
///
/// # Errors
///
/// - Return [`StorageError::Read`] if the file exists but cannot be read.
/// - Return [`StorageError::MalformedActive`] if the line is not an identifier.
pub fn read_active(path: &Path) -> Result<Option<ProfileId>> {
    let Some(content) = read_optional(path)? else {
        return Ok(None);
    };

    let line = content.trim();
    if line.is_empty() {
        return Ok(None);
    }

    line.parse()
        .map(Some)
        .map_err(|err| StorageError::MalformedActive {
            source: err,
            path: path.to_path_buf(),
        })
}

/// Write active profile pointer atomically.
///
/// # Errors
///
/// - Return [`StorageError::Write`] if the file cannot be written.
pub fn write_active(path: &Path, active: Option<ProfileId>) -> Result<()> {
    let line = active.map(|id| id.to_string()).unwrap_or_default();
    write_atomic(path, line.as_bytes()).map_err(|err| StorageError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(StorageError::Read {
            source: err,
            path: path.to_path_buf(),
        }),
    }
}

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Persisted file exists but cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Profile list is not valid JSON, or not a list of profiles.
    #[error("malformed profile list at {:?}", path.display())]
    MalformedProfiles {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Active pointer does not hold an identifier.
    #[error("malformed active profile pointer at {:?}", path.display())]
    MalformedActive {
        #[source]
        source: uuid::Error,
        path: PathBuf,
    },

    /// Profile list cannot be serialized.
    #[error("failed to encode profile list")]
    Encode(#[source] serde_json::Error),

    /// Persisted file cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl StorageError {
    /// Check if error came from reading rather than writing.
    pub fn is_read_failure(&self) -> bool {
        matches!(
            self,
            Self::Read { .. } | Self::MalformedProfiles { .. } | Self::MalformedActive { .. }
        )
    }
}

/// Friendly result alias :3
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_files_read_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;

        assert_eq!(read_profiles(&temp.path().join(PROFILES_FILE))?, Vec::new());
        assert_eq!(read_active(&temp.path().join(ACTIVE_FILE))?, None);

        Ok(())
    }

    #[test]
    fn blank_active_file_reads_as_unset() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join(ACTIVE_FILE);
        fs::write(&path, "\n")?;

        assert_eq!(read_active(&path)?, None);

        Ok(())
    }

    #[test]
    fn malformed_files_are_reported() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let profiles = temp.path().join(PROFILES_FILE);
        let active = temp.path().join(ACTIVE_FILE);
        fs::write(&profiles, "{ not json")?;
        fs::write(&active, "definitely-not-an-id")?;

        let result = read_profiles(&profiles);
        assert!(matches!(result, Err(StorageError::MalformedProfiles { .. })));
        assert!(result.is_err_and(|err| err.is_read_failure()));

        let result = read_active(&active);
        assert!(matches!(result, Err(StorageError::MalformedActive { .. })));

        Ok(())
    }

    #[test]
    fn profiles_and_active_round_trip() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let profiles_path = temp.path().join("nested").join(PROFILES_FILE);
        let active_path = temp.path().join("nested").join(ACTIVE_FILE);

        let mut work = Profile::new("Work", "Bob", "bob@work.com");
        work.ssh_key_path = Some("/Users/bob/.ssh/id_work".into());
        work.add_rule("/Users/bob/work");
        let home = Profile::new("Home", "Bob", "bob@home.io");
        let expect = vec![work.clone(), home];

        write_profiles(&profiles_path, &expect)?;
        write_active(&active_path, Some(work.id))?;

        assert_eq!(read_profiles(&profiles_path)?, expect);
        assert_eq!(read_active(&active_path)?, Some(work.id));
        assert_eq!(fs::read_to_string(&active_path)?, work.id.to_string());

        write_active(&active_path, None)?;
        assert_eq!(fs::read_to_string(&active_path)?, "");
        assert_eq!(read_active(&active_path)?, None);

        Ok(())
    }

    #[test]
    fn atomic_write_replaces_contents_and_leaves_no_temp_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("gitconfig");
        fs::write(&path, "old contents\n")?;

        write_atomic(&path, b"new contents\n")?;

        assert_eq!(fs::read_to_string(&path)?, "new contents\n");
        let entries = fs::read_dir(temp.path())?.count();
        assert_eq!(entries, 1);

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_follows_symlinks() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let real = temp.path().join("dotfiles-gitconfig");
        let link = temp.path().join(".gitconfig");
        fs::write(&real, "[user]\n")?;
        std::os::unix::fs::symlink(&real, &link)?;

        write_atomic(&link, b"[core]\n")?;

        assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real)?, "[core]\n");

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn atomic_write_keeps_file_mode() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir()?;
        let path = temp.path().join(".gitconfig");
        fs::write(&path, "[user]\n")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;

        write_atomic(&path, b"[core]\n")?;

        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        assert_eq!(fs::read_to_string(&path)?, "[core]\n");

        Ok(())
    }

    #[test]
    fn remove_if_exists_tolerates_missing_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("gone.gitconfig");

        assert!(!remove_if_exists(&path)?);
        fs::write(&path, "")?;
        assert!(remove_if_exists(&path)?);
        assert!(!path.exists());

        Ok(())
    }
}
