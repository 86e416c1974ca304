// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Direct Git configuration file edits.
//!
//! Some operations cannot go through the managed block, because they target
//! a specific configuration file directly: activating a profile system wide
//! writes straight into the global configuration, and pinning a repository
//! writes into that repository's local configuration. Both go through the
//! [`ConfigWriter`] layer of indirection, whose default implementation uses
//! libgit2 so that Git's own quoting and locking rules apply.

use crate::profile::Profile;

use git2::{Config, ErrorCode};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Identity settings to apply to a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    /// Value for `user.name`.
    pub name: &'a str,

    /// Value for `user.email`.
    pub email: &'a str,

    /// Key used to build `core.sshCommand`.
    pub ssh_key_path: Option<&'a str>,

    /// Value for `user.signingkey`.
    pub signing_key: Option<&'a str>,

    /// Value for `gpg.format`. Only applied alongside a signing key.
    pub signing_format: Option<&'a str>,
}

impl<'a> Identity<'a> {
    /// Full identity of a profile.
    pub fn from_profile(profile: &'a Profile) -> Self {
        Self {
            name: &profile.display_name,
            email: &profile.email,
            ssh_key_path: profile.ssh_key(),
            signing_key: profile.signing(),
            signing_format: profile.format(),
        }
    }

    /// Only the `[user]` section settings of a profile.
    pub fn user_section(profile: &'a Profile) -> Self {
        Self {
            name: &profile.display_name,
            email: &profile.email,
            ssh_key_path: None,
            signing_key: profile.signing(),
            signing_format: None,
        }
    }

    fn ssh_command(&self) -> Option<String> {
        self.ssh_key_path.map(crate::profile::ssh_command)
    }
}

/// Layer of indirection for configuration file edits.
pub trait ConfigWriter {
    /// Apply identity settings to configuration file.
    fn apply_identity(&self, file: &Path, identity: &Identity<'_>) -> Result<()>;

    /// Remove every entry of a section.
    ///
    /// Returns `false` if the section had nothing to remove.
    fn remove_section(&self, file: &Path, section: &str) -> Result<bool>;

    /// Read a single value, if set.
    fn read_value(&self, file: &Path, key: &str) -> Result<Option<String>>;
}

/// Configuration file edits through libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2ConfigWriter;

impl Git2ConfigWriter {
    /// Construct new libgit2 configuration writer.
    pub fn new() -> Self {
        Self
    }

    fn open(file: &Path) -> Result<Config> {
        Config::open(file).map_err(|err| ConfigWriterError::Open {
            source: err,
            path: file.to_path_buf(),
        })
    }
}

impl ConfigWriter for Git2ConfigWriter {
    #[instrument(skip(self, identity), level = "debug")]
    fn apply_identity(&self, file: &Path, identity: &Identity<'_>) -> Result<()> {
        let mut config = Self::open(file)?;
        let mut set = |key: &str, value: &str| {
            debug!("set {key} in {:?}", file.display());
            config
                .set_str(key, value)
                .map_err(|err| ConfigWriterError::Set {
                    source: err,
                    key: key.to_string(),
                    path: file.to_path_buf(),
                })
        };

        set("user.name", identity.name)?;
        set("user.email", identity.email)?;

        if let Some(command) = identity.ssh_command() {
            set("core.sshCommand", &command)?;
        }

        if let Some(key) = identity.signing_key {
            set("user.signingkey", key)?;
            if let Some(format) = identity.signing_format {
                set("gpg.format", format)?;
            }
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn remove_section(&self, file: &Path, section: &str) -> Result<bool> {
        let mut config = Self::open(file)?;
        let pattern = format!("^{}\\.", section.to_lowercase());
        let remove_err = |err: git2::Error| ConfigWriterError::Remove {
            source: err,
            section: section.to_string(),
            path: file.to_path_buf(),
        };

        let mut names: Vec<String> = Vec::new();
        {
            let mut entries = config.entries(Some(pattern.as_str())).map_err(remove_err)?;
            while let Some(entry) = entries.next() {
                let entry = entry.map_err(remove_err)?;
                if let Some(name) = entry.name() {
                    if !names.iter().any(|known| known == name) {
                        names.push(name.to_string());
                    }
                }
            }
        }

        if names.is_empty() {
            debug!("no [{section}] entries in {:?}", file.display());
            return Ok(false);
        }

        for name in &names {
            match config.remove_multivar(name, ".*") {
                Ok(()) => {}
                // INVARIANT: Entry vanished underneath us, nothing left to do.
                Err(err) if err.code() == ErrorCode::NotFound => {}
                Err(err) => return Err(remove_err(err)),
            }
        }
        info!("removed [{section}] from {:?}", file.display());

        Ok(true)
    }

    fn read_value(&self, file: &Path, key: &str) -> Result<Option<String>> {
        let config = Self::open(file)?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(ConfigWriterError::Read {
                source: err,
                key: key.to_string(),
                path: file.to_path_buf(),
            }),
        }
    }
}

/// Activate profile system wide.
///
/// Writes the full identity of the profile into the global configuration
/// file, so it applies to every repository without a more specific rule.
///
/// # Errors
///
/// - Return [`ConfigWriterError`] if the configuration writer fails.
pub fn activate(
    writer: &impl ConfigWriter,
    global_config: impl AsRef<Path>,
    profile: &Profile,
) -> Result<()> {
    info!("activate {:?} in {:?}", profile.label, global_config.as_ref().display());
    writer.apply_identity(global_config.as_ref(), &Identity::from_profile(profile))
}

/// Read `user.name` and `user.email` from configuration file.
///
/// Returns `None` unless both are set.
///
/// # Errors
///
/// - Return [`ConfigWriterError`] if the configuration writer fails.
pub fn read_identity(
    writer: &impl ConfigWriter,
    file: impl AsRef<Path>,
) -> Result<Option<(String, String)>> {
    let name = writer.read_value(file.as_ref(), "user.name")?;
    let email = writer.read_value(file.as_ref(), "user.email")?;
    Ok(name.zip(email))
}

/// Configuration writer error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigWriterError {
    /// Configuration file cannot be opened.
    #[error("failed to open git config at {:?}", path.display())]
    Open {
        #[source]
        source: git2::Error,
        path: PathBuf,
    },

    /// Configuration value cannot be set.
    #[error("failed to set {key} in {:?}", path.display())]
    Set {
        #[source]
        source: git2::Error,
        key: String,
        path: PathBuf,
    },

    /// Configuration value cannot be read.
    #[error("failed to read {key} from {:?}", path.display())]
    Read {
        #[source]
        source: git2::Error,
        key: String,
        path: PathBuf,
    },

    /// Configuration section cannot be removed.
    #[error("failed to remove [{section}] from {:?}", path.display())]
    Remove {
        #[source]
        source: git2::Error,
        section: String,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigWriterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn activate_writes_full_identity() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("gitconfig");
        fs::write(&path, "[alias]\n\tco = checkout\n")?;
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        profile.ssh_key_path = Some("/Users/bob/.ssh/id_work".into());
        profile.signing_key = Some("ABCDEF".into());
        profile.signing_format = Some("openpgp".into());

        let writer = Git2ConfigWriter::new();
        activate(&writer, &path, &profile)?;

        assert_eq!(
            read_identity(&writer, &path)?,
            Some(("Bob".to_string(), "bob@work.com".to_string()))
        );
        assert_eq!(
            writer.read_value(&path, "core.sshCommand")?,
            Some("ssh -i '/Users/bob/.ssh/id_work' -o IdentitiesOnly=yes".to_string())
        );
        assert_eq!(writer.read_value(&path, "user.signingkey")?, Some("ABCDEF".to_string()));
        assert_eq!(writer.read_value(&path, "gpg.format")?, Some("openpgp".to_string()));
        assert_eq!(writer.read_value(&path, "alias.co")?, Some("checkout".to_string()));

        Ok(())
    }

    #[test]
    fn identity_and_profile_build_same_ssh_command() {
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        profile.ssh_key_path = Some("/Users/bob/.ssh/bob's key".into());

        let identity = Identity::from_profile(&profile);
        assert_eq!(identity.ssh_command(), profile.ssh_command());
        assert_eq!(Identity::user_section(&profile).ssh_command(), None);
    }

    #[test]
    fn remove_section_reports_when_nothing_was_there() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config");
        fs::write(&path, "[core]\n\tbare = false\n")?;

        let writer = Git2ConfigWriter::new();
        assert!(!writer.remove_section(&path, "user")?);

        let profile = Profile::new("Work", "Bob", "bob@work.com");
        writer.apply_identity(&path, &Identity::user_section(&profile))?;
        assert!(writer.remove_section(&path, "user")?);

        assert_eq!(read_identity(&writer, &path)?, None);
        assert_eq!(writer.read_value(&path, "core.bare")?, Some("false".to_string()));

        Ok(())
    }

    #[test]
    fn read_value_of_missing_key_is_none() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config");
        fs::write(&path, "")?;

        assert_eq!(Git2ConfigWriter::new().read_value(&path, "user.name")?, None);

        Ok(())
    }
}
