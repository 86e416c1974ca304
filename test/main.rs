// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use git2::{Config, ErrorCode, Repository, RepositoryInitOptions};
use git_profile_switcher::ProfileRegistry;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) struct RepoFixture {
    repo: Repository,
}

impl RepoFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub(crate) fn root(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    /// Read value from local configuration only, ignoring global and system levels.
    pub(crate) fn local_value(&self, key: &str) -> Result<Option<String>> {
        let config = Config::open(&self.repo.path().join("config"))?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Scratch home directory holding a storage directory and a global config.
pub(crate) struct HomeFixture {
    temp: TempDir,
}

impl HomeFixture {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        self.temp.path()
    }

    pub(crate) fn storage_dir(&self) -> PathBuf {
        self.temp.path().join(".config").join("git-profile-switcher")
    }

    pub(crate) fn global_config(&self) -> PathBuf {
        self.temp.path().join(".gitconfig")
    }

    pub(crate) fn registry(&self) -> ProfileRegistry {
        ProfileRegistry::open(self.storage_dir(), self.global_config())
    }
}
