// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conditional include rule management.
//!
//! Git can pull extra configuration in based on where a repository lives via
//! `includeIf "gitdir/i:<path>"` sections. The switcher leans on this to apply
//! profiles per directory: each directory rule becomes one such section inside
//! the managed block of the global configuration file, pointing at the
//! owning profile's companion file.
//!
//! # Synchronization
//!
//! [`IncludeRules::apply`] brings the file system in line with a profile set
//! in one pass:
//!
//! 1. Companion files are written for profiles with rules, and removed for
//!    profiles without them. Stray companion files of profiles that no longer
//!    exist are swept away too.
//! 2. The managed block is regenerated from scratch, in profile order, then
//!    rule order.
//! 3. The block is swapped into the global configuration file, which is
//!    written back atomically, and only if something actually changed.
//!
//! Step 3 is a read-modify-write of a shared file. Two syncs must never run
//! at the same time. [`ProfileRegistry`](crate::store::ProfileRegistry) takes
//! care of that by requiring exclusive access for every mutation.
//!
//! # See Also
//!
//! - [Git conditional includes](https://git-scm.com/docs/git-config#_conditional_includes)

pub mod block;
pub mod companion;

use crate::{
    profile::{normalize_rule, Profile, ProfileId},
    rules::{
        block::{render_block, ConfigLayout, IncludeEntry},
        companion::render_companion,
    },
    store::persist::{remove_if_exists, write_atomic},
};

use std::{
    collections::HashSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Extension of companion files.
const COMPANION_EXTENSION: &str = "gitconfig";

/// Include rules engine.
///
/// Owns the managed block of one global configuration file, and the companion
/// files inside one storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRules {
    global_config: PathBuf,
    storage_dir: PathBuf,
}

impl IncludeRules {
    /// Construct new include rules engine.
    pub fn new(global_config: impl Into<PathBuf>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config: global_config.into(),
            storage_dir: storage_dir.into(),
        }
    }

    /// Path to managed global configuration file.
    pub fn global_config(&self) -> &Path {
        self.global_config.as_path()
    }

    /// Path to companion file of a profile.
    pub fn companion_path(&self, id: &ProfileId) -> PathBuf {
        self.storage_dir.join(id.companion_file_name())
    }

    /// Render the managed block for a profile set without touching disk.
    pub fn render(&self, profiles: &[Profile]) -> String {
        render_block(profiles.iter().flat_map(|profile| {
            let companion = self.companion_path(&profile.id);
            profile.directory_rules.iter().map(move |rule| IncludeEntry {
                rule: normalize_rule(rule),
                companion: companion.clone(),
            })
        }))
    }

    /// Compute new global configuration text from its current text.
    pub fn rewrite(&self, existing: &str, profiles: &[Profile]) -> String {
        let block = self.render(profiles);
        let layout = ConfigLayout::parse(existing);
        if layout.is_corrupted() {
            warn!(
                "managed block in {:?} lacks end marker, appending fresh block",
                self.global_config.display()
            );
        }

        layout.splice(&block)
    }

    /// Synchronize companion files and managed block with profile set.
    ///
    /// Must receive the complete profile set. Companion files of profiles
    /// missing from it are considered orphaned and get removed.
    ///
    /// # Errors
    ///
    /// - Return [`RulesError::WriteCompanion`] if a companion file cannot be
    ///   written.
    /// - Return [`RulesError::ReadConfig`] if the global configuration file
    ///   exists but cannot be read.
    /// - Return [`RulesError::WriteConfig`] if the global configuration file
    ///   cannot be written.
    #[instrument(skip(self, profiles), level = "debug")]
    pub fn apply(&self, profiles: &[Profile]) -> Result<()> {
        for profile in profiles {
            if profile.directory_rules.is_empty() {
                // INVARIANT: Removal failure is tolerated, file may already be gone.
                if let Err(error) = self.remove_companion(&profile.id) {
                    debug!("{error}");
                }
            } else {
                self.write_companion(profile)?;
            }
        }
        self.sweep_orphans(profiles);

        let existing = match fs::read_to_string(&self.global_config) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
            Err(err) => {
                return Err(RulesError::ReadConfig {
                    source: err,
                    path: self.global_config.clone(),
                })
            }
        };

        let updated = self.rewrite(&existing, profiles);
        if updated == existing {
            debug!("{:?} already up to date", self.global_config.display());
            return Ok(());
        }

        write_atomic(&self.global_config, updated.as_bytes()).map_err(|err| {
            RulesError::WriteConfig {
                source: err,
                path: self.global_config.clone(),
            }
        })?;
        info!("updated include rules in {:?}", self.global_config.display());

        Ok(())
    }

    /// Write or overwrite companion file of a profile.
    ///
    /// # Errors
    ///
    /// - Return [`RulesError::WriteCompanion`] if the file cannot be written.
    pub fn write_companion(&self, profile: &Profile) -> Result<()> {
        let path = self.companion_path(&profile.id);
        debug!("write companion {:?}", path.display());
        write_atomic(&path, render_companion(profile).as_bytes())
            .map_err(|err| RulesError::WriteCompanion { source: err, path })
    }

    /// Remove companion file of a profile.
    ///
    /// Returns `false` if there was no file to remove.
    ///
    /// # Errors
    ///
    /// - Return [`RulesError::RemoveCompanion`] if the file exists but cannot
    ///   be removed.
    pub fn remove_companion(&self, id: &ProfileId) -> Result<bool> {
        let path = self.companion_path(id);
        remove_if_exists(&path).map_err(|err| RulesError::RemoveCompanion { source: err, path })
    }

    fn sweep_orphans(&self, profiles: &[Profile]) {
        let known = profiles.iter().map(|profile| profile.id).collect::<HashSet<_>>();
        let Ok(entries) = fs::read_dir(&self.storage_dir) else {
            return;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(COMPANION_EXTENSION) {
                continue;
            }

            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<ProfileId>().ok())
            else {
                continue;
            };

            if known.contains(&id) {
                continue;
            }

            match remove_if_exists(&path) {
                Ok(_) => info!("removed orphaned companion {:?}", path.display()),
                Err(err) => debug!("cannot remove orphaned companion {:?}: {err}", path.display()),
            }
        }
    }
}

/// Include rule error types.
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    /// Global configuration file exists but cannot be read.
    #[error("failed to read global config at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Global configuration file cannot be written.
    #[error("failed to write global config at {:?}", path.display())]
    WriteConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Companion file cannot be written.
    #[error("failed to write companion config at {:?}", path.display())]
    WriteCompanion {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Companion file exists but cannot be removed.
    #[error("failed to remove companion config at {:?}", path.display())]
    RemoveCompanion {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = RulesError> = std::result::Result<T, E>;
