// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository overrides.
//!
//! A __repository override__ pins a profile to one repository by writing its
//! identity straight into that repository's local configuration file. Unlike
//! directory rules, nothing about an override is regenerated later on. It is
//! a one-time edit that stays put until explicitly removed.
//!
//! Git reads the local configuration after the global one, so an override
//! and a directory rule that both cover a repository are settled by Git's own
//! include and precedence rules, not by the switcher.

use crate::{
    gitconfig::{ConfigWriter, ConfigWriterError, Git2ConfigWriter, Identity},
    profile::Profile,
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Directory marking the root of a repository.
pub const REPO_MARKER: &str = ".git";

/// Path to local configuration file of a repository.
pub fn local_config_path(repo: impl AsRef<Path>) -> PathBuf {
    repo.as_ref().join(REPO_MARKER).join("config")
}

/// Check if path is the root of a repository with its own Git directory.
///
/// Linked worktrees keep a `.git` file instead of a directory, and are not
/// considered repositories here, because their local configuration lives
/// elsewhere.
pub fn is_repository(repo: impl AsRef<Path>) -> bool {
    repo.as_ref().join(REPO_MARKER).is_dir()
}

/// Write and remove repository overrides.
#[derive(Debug, Default, Clone)]
pub struct RepoOverrideWriter<W = Git2ConfigWriter>
where
    W: ConfigWriter,
{
    writer: W,
}

impl<W> RepoOverrideWriter<W>
where
    W: ConfigWriter,
{
    /// Construct new repository override writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Pin profile to repository.
    ///
    /// Sets `user.name`, `user.email`, and `user.signingkey` when the profile
    /// has one. Everything is kept inside the `[user]` section, so that
    /// [`remove_override`](Self::remove_override) undoes it completely.
    /// Returns path to the edited configuration file.
    ///
    /// # Errors
    ///
    /// - Return [`OverrideError::NotARepository`] if `repo` has no `.git`
    ///   directory.
    /// - Return [`OverrideError::Writer`] if the configuration edit fails.
    #[instrument(skip(self, repo, profile), level = "debug")]
    pub fn write_override(&self, repo: impl AsRef<Path>, profile: &Profile) -> Result<PathBuf> {
        let repo = repo.as_ref();
        if !is_repository(repo) {
            return Err(OverrideError::NotARepository {
                path: repo.to_path_buf(),
            });
        }

        let config = local_config_path(repo);
        self.writer
            .apply_identity(&config, &Identity::user_section(profile))?;
        info!("pinned {:?} to {:?}", profile.label, repo.display());

        Ok(config)
    }

    /// Unpin whatever profile was pinned to repository.
    ///
    /// Does nothing if `repo` is not a repository, or if no override was ever
    /// written to it.
    ///
    /// # Errors
    ///
    /// - Return [`OverrideError::Writer`] if the configuration edit fails.
    #[instrument(skip(self, repo), level = "debug")]
    pub fn remove_override(&self, repo: impl AsRef<Path>) -> Result<()> {
        let repo = repo.as_ref();
        if !is_repository(repo) {
            debug!("{:?} is not a repository, nothing to unpin", repo.display());
            return Ok(());
        }

        if !self.writer.remove_section(&local_config_path(repo), "user")? {
            debug!("{:?} had no override", repo.display());
        }

        Ok(())
    }
}

/// Repository override error types.
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    /// Target lacks a `.git` directory.
    #[error("not a git repository: {:?}", path.display())]
    NotARepository { path: PathBuf },

    /// Configuration edit fails.
    #[error(transparent)]
    Writer(#[from] ConfigWriterError),
}

/// Friendly result alias :3
pub type Result<T, E = OverrideError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, fs};

    #[derive(Default)]
    struct RecordingWriter {
        calls: RefCell<Vec<String>>,
    }

    impl ConfigWriter for RecordingWriter {
        fn apply_identity(&self, file: &Path, identity: &Identity<'_>) -> crate::gitconfig::Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("apply {} {} {}", file.display(), identity.name, identity.email));
            Ok(())
        }

        fn remove_section(&self, file: &Path, section: &str) -> crate::gitconfig::Result<bool> {
            self.calls
                .borrow_mut()
                .push(format!("remove {} {section}", file.display()));
            Ok(false)
        }

        fn read_value(&self, _: &Path, _: &str) -> crate::gitconfig::Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn write_override_rejects_non_repository() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = RepoOverrideWriter::new(RecordingWriter::default());
        let profile = Profile::new("Work", "Bob", "bob@work.com");

        let result = writer.write_override(temp.path(), &profile);

        assert!(matches!(result, Err(OverrideError::NotARepository { .. })));
        assert!(writer.writer.calls.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn git_file_is_not_a_repository_marker() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join(".git"), "gitdir: /elsewhere\n")?;

        assert!(!is_repository(temp.path()));

        Ok(())
    }

    #[test]
    fn write_override_targets_local_config() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        fs::create_dir(temp.path().join(".git"))?;
        let writer = RepoOverrideWriter::new(RecordingWriter::default());
        let profile = Profile::new("Personal", "Alice", "alice@home.io");

        let config = writer.write_override(temp.path(), &profile)?;

        assert_eq!(config, local_config_path(temp.path()));
        let calls = writer.writer.calls.borrow();
        assert_eq!(
            *calls,
            vec![format!("apply {} Alice alice@home.io", config.display())]
        );

        Ok(())
    }

    #[test]
    fn remove_override_skips_non_repository() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = RepoOverrideWriter::new(RecordingWriter::default());

        writer.remove_override(temp.path())?;
        assert!(writer.writer.calls.borrow().is_empty());

        fs::create_dir(temp.path().join(".git"))?;
        writer.remove_override(temp.path())?;
        assert_eq!(writer.writer.calls.borrow().len(), 1);

        Ok(())
    }
}
