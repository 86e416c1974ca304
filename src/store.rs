// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Profile registry management.
//!
//! The switcher keeps every known profile in one place called the
//! __profile registry__. The registry owns two things: the ordered list of
//! profiles, and a pointer to whichever profile is currently active.
//!
//! # Storage Layout
//!
//! The registry lives inside a storage directory, which is
//! `~/.config/git-profile-switcher` by default:
//!
//! - `profiles.json` holds the profile list.
//! - `active.txt` holds the active profile identifier, or nothing.
//! - `<ID>.gitconfig` is the companion file of each profile that owns
//!   directory rules.
//!
//! # Failure Policy
//!
//! In-memory state is authoritative for the lifetime of the process. Loading
//! never fails: unreadable or malformed files are logged and treated as
//! empty. Persisting never fails either: write errors are logged, and the
//! mutation stands in memory regardless. Only [`ProfileRegistry::resync`]
//! hands errors back, because callers invoke it on purpose.
//!
//! # Serialization
//!
//! Every mutator takes `&mut self`. Whoever owns the registry therefore
//! serializes all mutations, and with them every read-modify-write of the
//! global configuration file. Callers that need to share a registry across
//! threads wrap it in a mutex.

pub mod persist;

use crate::{
    profile::{Profile, ProfileId},
    rules::{IncludeRules, RulesError},
    store::persist::{
        read_active, read_profiles, write_active, write_profiles, ACTIVE_FILE, PROFILES_FILE,
    },
};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tracing::{debug, error, info, instrument, warn};

/// Profile registry.
///
/// Ordered collection of profiles plus the active profile pointer, backed by
/// files in a storage directory. Every mutation that can change directory
/// rules also resynchronizes the include rules engine.
#[derive(Debug)]
pub struct ProfileRegistry {
    storage_dir: PathBuf,
    profiles: Vec<Profile>,
    active: Option<ProfileId>,
    rules: IncludeRules,
}

impl ProfileRegistry {
    /// Open registry in storage directory, managing given global config.
    ///
    /// Does not write anything to disk.
    pub fn open(storage_dir: impl Into<PathBuf>, global_config: impl Into<PathBuf>) -> Self {
        let storage_dir = storage_dir.into();
        let rules = IncludeRules::new(global_config, storage_dir.clone());
        Self::with_rules(storage_dir, rules)
    }

    /// Open registry in storage directory with a prepared rules engine.
    ///
    /// Does not write anything to disk.
    pub fn with_rules(storage_dir: impl Into<PathBuf>, rules: IncludeRules) -> Self {
        let mut registry = Self {
            storage_dir: storage_dir.into(),
            profiles: Vec::new(),
            active: None,
            rules,
        };
        registry.load();
        registry
    }

    /// Reload profiles and active pointer from disk.
    ///
    /// Missing or malformed files load as empty. Duplicate identifiers keep
    /// their first occurrence. An active pointer that names no loaded profile
    /// is cleared in memory only.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&mut self) {
        let profiles_path = self.profiles_path();
        let mut profiles = read_profiles(&profiles_path).unwrap_or_else(|err| {
            warn!("{err}, starting with no profiles");
            Vec::new()
        });

        let mut seen = HashSet::new();
        profiles.retain(|profile| {
            let fresh = seen.insert(profile.id);
            if !fresh {
                warn!("dropping duplicate profile {}", profile.id);
            }
            fresh
        });

        let mut active = read_active(&self.active_path()).unwrap_or_else(|err| {
            warn!("{err}, no profile is active");
            None
        });

        // INVARIANT: Active pointer is unset, or names a loaded profile.
        if let Some(id) = active {
            if !seen.contains(&id) {
                debug!("clearing orphaned active profile {id}");
                active = None;
            }
        }

        debug!("loaded {} profiles from {:?}", profiles.len(), self.storage_dir.display());
        self.profiles = profiles;
        self.active = active;
    }

    /// Storage directory backing this registry.
    pub fn storage_dir(&self) -> &Path {
        self.storage_dir.as_path()
    }

    /// Include rules engine driven by this registry.
    pub fn rules(&self) -> &IncludeRules {
        &self.rules
    }

    /// All profiles in insertion order.
    pub fn profiles(&self) -> &[Profile] {
        self.profiles.as_slice()
    }

    /// Look up profile by identifier.
    pub fn get(&self, id: &ProfileId) -> Option<&Profile> {
        self.profiles.iter().find(|profile| &profile.id == id)
    }

    /// Identifier of active profile.
    pub fn active_id(&self) -> Option<ProfileId> {
        self.active
    }

    /// Active profile.
    pub fn active(&self) -> Option<&Profile> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    /// Find profile by identifier, or by case-insensitive label.
    ///
    /// # Errors
    ///
    /// - Return [`LookupError::NotFound`] if nothing matches.
    /// - Return [`LookupError::Ambiguous`] if several labels match.
    pub fn find(&self, query: &str) -> Result<&Profile, LookupError> {
        if let Ok(id) = query.parse::<ProfileId>() {
            if let Some(profile) = self.get(&id) {
                return Ok(profile);
            }
        }

        let mut matches = self
            .profiles
            .iter()
            .filter(|profile| profile.label.eq_ignore_ascii_case(query.trim()));

        match (matches.next(), matches.next()) {
            (Some(profile), None) => Ok(profile),
            (Some(_), Some(_)) => Err(LookupError::Ambiguous(query.to_string())),
            (None, _) => Err(LookupError::NotFound(query.to_string())),
        }
    }

    /// Add profile.
    ///
    /// Labels may repeat. A profile whose identifier is already registered
    /// replaces that entry in place instead, keeping identifiers unique.
    pub fn add(&mut self, profile: Profile) {
        match self.position(&profile.id) {
            Some(index) => {
                warn!("profile {} already registered, replacing it", profile.id);
                self.profiles[index] = profile;
            }
            None => {
                info!("add profile {:?}", profile.label);
                self.profiles.push(profile);
            }
        }

        self.persist_profiles();
        self.resync_logged();
    }

    /// Replace registered profile with same identifier.
    ///
    /// Returns `false` and does nothing if the identifier is unknown.
    pub fn update(&mut self, profile: Profile) -> bool {
        let Some(index) = self.position(&profile.id) else {
            debug!("cannot update unknown profile {}", profile.id);
            return false;
        };

        info!("update profile {:?}", profile.label);
        self.profiles[index] = profile;
        self.persist_profiles();
        self.resync_logged();

        true
    }

    /// Delete profile.
    ///
    /// Removes its companion file on a best-effort basis, and clears the
    /// active pointer if it pointed here. Returns the removed profile, or
    /// `None` if the identifier is unknown.
    pub fn delete(&mut self, id: &ProfileId) -> Option<Profile> {
        let index = self.position(id)?;

        if let Err(err) = self.rules.remove_companion(id) {
            warn!("{err}");
        }

        let profile = self.profiles.remove(index);
        info!("delete profile {:?}", profile.label);

        if self.active == Some(*id) {
            self.active = None;
            self.persist_active();
        }

        self.persist_profiles();
        self.resync_logged();

        Some(profile)
    }

    /// Set or clear active profile.
    ///
    /// Only the pointer is persisted. Directory rules do not depend on which
    /// profile is active, so no resync happens. Returns `false` and leaves the
    /// pointer alone if the identifier is not registered.
    pub fn set_active(&mut self, id: Option<ProfileId>) -> bool {
        if let Some(id) = id {
            if self.get(&id).is_none() {
                warn!("cannot activate unknown profile {id}");
                return false;
            }
        }

        self.active = id;
        self.persist_active();

        true
    }

    /// Resynchronize include rules with current profile set.
    ///
    /// # Errors
    ///
    /// - Return [`RulesError`] if the include rules engine fails.
    pub fn resync(&self) -> Result<(), RulesError> {
        self.rules.apply(&self.profiles)
    }

    fn resync_logged(&self) {
        if let Err(err) = self.resync() {
            error!("{err}: {}", source_chain(&err));
        }
    }

    fn persist_profiles(&self) {
        if let Err(err) = write_profiles(&self.profiles_path(), &self.profiles) {
            error!("{err}: {}", source_chain(&err));
        }
    }

    fn persist_active(&self) {
        if let Err(err) = write_active(&self.active_path(), self.active) {
            error!("{err}: {}", source_chain(&err));
        }
    }

    fn position(&self, id: &ProfileId) -> Option<usize> {
        self.profiles.iter().position(|profile| &profile.id == id)
    }

    fn profiles_path(&self) -> PathBuf {
        self.storage_dir.join(PROFILES_FILE)
    }

    fn active_path(&self) -> PathBuf {
        self.storage_dir.join(ACTIVE_FILE)
    }
}

fn source_chain(err: &dyn std::error::Error) -> String {
    let mut causes = Vec::new();
    let mut current = err.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }

    causes.join(": ")
}

/// Profile lookup error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No profile matches.
    #[error("no profile matches {0:?}")]
    NotFound(String),

    /// More than one profile label matches.
    #[error("several profiles are labeled {0:?}, use the profile id instead")]
    Ambiguous(String),
}
