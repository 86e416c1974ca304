// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional settings file that tells the switcher
//! where to keep its profile storage, and which global Git configuration file
//! to manage. File I/O is left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Switcher settings layout.
///
/// # General Layout
///
/// Both keys are optional. Anything left out falls back to the defaults
/// from [`crate::path`]:
///
/// ```toml
/// storage_dir = "~/.config/git-profile-switcher"
/// global_config = "$HOME/.gitconfig"
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Directory housing the profile list, active pointer, and companion files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Global Git configuration file whose managed block we maintain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_config: Option<PathBuf>,
}

impl Settings {
    /// Resolve storage directory, falling back to the default location.
    ///
    /// # Errors
    ///
    /// - Return [`crate::path::NoWayHome`] if the default cannot be determined.
    pub fn storage_dir(&self) -> crate::path::Result<PathBuf> {
        match &self.storage_dir {
            Some(path) => Ok(path.clone()),
            None => crate::path::default_storage_dir(),
        }
    }

    /// Resolve global configuration file, falling back to `~/.gitconfig`.
    ///
    /// # Errors
    ///
    /// - Return [`crate::path::NoWayHome`] if the default cannot be determined.
    pub fn global_config(&self) -> crate::path::Result<PathBuf> {
        match &self.global_config {
            Some(path) => Ok(path.clone()),
            None => crate::path::default_global_config(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.storage_dir = settings.storage_dir.map(expand).transpose()?;
        settings.global_config = settings.global_config.map(expand).transpose()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
