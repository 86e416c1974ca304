// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine the default locations of every file the switcher reads or
//! writes: its own storage directory, the settings file inside it, and the
//! user's global Git configuration file.

use std::{
    env::VarError,
    path::{Path, PathBuf},
};

/// Name of the directory that houses profile storage.
pub const STORAGE_DIR_NAME: &str = "git-profile-switcher";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to profile storage directory.
///
/// Always `~/.config/git-profile-switcher`, regardless of platform, so that
/// existing installs keep finding their profile list. Does not check if the
/// path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_storage_dir() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".config").join(STORAGE_DIR_NAME))
}

/// Determine default absolute path to the user's global Git configuration.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_global_config() -> Result<PathBuf> {
    home_dir().map(|home| home.join(".gitconfig"))
}

/// Determine default absolute path to the settings file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_settings_file() -> Result<PathBuf> {
    default_storage_dir().map(|dir| dir.join("settings.toml"))
}

/// Make a user supplied path absolute.
///
/// Performs shell expansion first, so `~/work` and `$HOME/work` both work.
/// Relative paths are resolved against `base`. No symlinks are resolved and
/// the path does not need to exist.
///
/// # Errors
///
/// - Return [`shellexpand::LookupError`] if `raw` names an environment
///   variable that is unset or not valid unicode.
pub fn absolutize(
    raw: impl AsRef<str>,
    base: impl AsRef<Path>,
) -> Result<PathBuf, shellexpand::LookupError<VarError>> {
    let path = PathBuf::from(shellexpand::full(raw.as_ref())?.into_owned());
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base.as_ref().join(path))
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[test]
    fn absolutize_keeps_absolute_paths() -> anyhow::Result<()> {
        let result = absolutize("/srv/work", "/tmp")?;
        assert_eq!(result, PathBuf::from("/srv/work"));

        Ok(())
    }

    #[test]
    fn absolutize_joins_relative_paths_onto_base() -> anyhow::Result<()> {
        let result = absolutize("code/work", "/home/bob")?;
        assert_eq!(result, PathBuf::from("/home/bob/code/work"));

        Ok(())
    }

    #[sealed_test(env = [("WORK_ROOT", "/srv/bob")])]
    fn absolutize_expands_environment_variables() -> anyhow::Result<()> {
        assert_eq!(absolutize("$WORK_ROOT/work", "/tmp")?, PathBuf::from("/srv/bob/work"));
        assert_eq!(absolutize("${WORK_ROOT}/oss", "/tmp")?, PathBuf::from("/srv/bob/oss"));

        Ok(())
    }

    #[test]
    fn absolutize_rejects_unknown_variable() {
        let result = absolutize("$NO_SUCH_VARIABLE_HOPEFULLY/work", "/tmp");
        assert!(result.is_err());
    }
}
