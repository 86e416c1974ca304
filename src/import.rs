// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Import identities from GitHub.
//!
//! A profile can be seeded from a GitHub account instead of being typed in by
//! hand. The lookup goes through the [`IdentitySource`] trait, whose default
//! implementation [`GhCli`] asks the GitHub CLI (`gh`) for account details.
//! Response parsing is kept in plain functions so it can be tested without
//! any process being spawned.

use crate::{
    command::{CommandError, CommandRunner, SystemRunner},
    profile::Profile,
};

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    env,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Host name of public GitHub.
pub const DEFAULT_HOST: &str = "github.com";

/// Well known install locations checked after `PATH`.
pub const GH_CANDIDATES: [&str; 3] = ["/opt/homebrew/bin/gh", "/usr/local/bin/gh", "/usr/bin/gh"];

/// Identity details of an external account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Account login.
    pub login: String,

    /// Public display name, or the login when the account has none.
    pub name: String,

    /// Public email, if the account exposes one.
    pub email: Option<String>,
}

impl ExternalIdentity {
    /// Turn imported identity into a new profile.
    ///
    /// The `email` argument takes precedence over whatever the account
    /// exposes. The login is remembered on the profile.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::MissingEmail`] if neither the account nor the
    ///   caller supplies an email.
    pub fn into_profile(self, label: impl Into<String>, email: Option<String>) -> Result<Profile> {
        let email = email
            .filter(|email| !email.trim().is_empty())
            .or(self.email)
            .ok_or_else(|| ImportError::MissingEmail {
                login: self.login.clone(),
            })?;

        let mut profile = Profile::new(label, self.name, email);
        profile.external_identity = Some(self.login);

        Ok(profile)
    }
}

/// Which account to look up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityQuery {
    /// Account the external tool is currently logged into.
    Authenticated,

    /// Public account with given login.
    User(String),
}

/// Layer of indirection for identity lookups.
pub trait IdentitySource {
    /// Fetch identity details of an account.
    fn fetch(&self, query: &IdentityQuery) -> Result<ExternalIdentity>;
}

/// Account the GitHub CLI is logged into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhAccount {
    pub login: String,
    pub host: String,
    pub active: bool,
}

impl GhAccount {
    /// Login, qualified by host unless the host is public GitHub.
    pub fn display_name(&self) -> String {
        if self.host == DEFAULT_HOST {
            self.login.clone()
        } else {
            format!("{} ({})", self.login, self.host)
        }
    }
}

impl Display for GhAccount {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.display_name())
    }
}

/// Identity lookups through the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCli<R = SystemRunner>
where
    R: CommandRunner,
{
    program: PathBuf,
    runner: R,
}

impl GhCli<SystemRunner> {
    /// Locate `gh` on this system.
    ///
    /// Searches `PATH` first, then a few well known install locations.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::NotInstalled`] if `gh` cannot be found.
    pub fn discover() -> Result<Self> {
        let on_path = env::var_os("PATH")
            .map(|paths| env::split_paths(&paths).map(|dir| dir.join("gh")).collect::<Vec<_>>())
            .unwrap_or_default();

        let program = on_path
            .into_iter()
            .chain(GH_CANDIDATES.into_iter().map(PathBuf::from))
            .find(|path| is_executable(path))
            .ok_or(ImportError::NotInstalled)?;
        debug!("found gh at {:?}", program.display());

        Ok(Self::new(program, SystemRunner::new()))
    }
}

impl<R> GhCli<R>
where
    R: CommandRunner,
{
    /// Construct new GitHub CLI source around explicit program path.
    pub fn new(program: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// Path to `gh` program in use.
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    /// Check if `gh` program exists and is executable.
    pub fn is_available(&self) -> bool {
        is_executable(&self.program)
    }

    /// List every account `gh` is logged into.
    ///
    /// # Errors
    ///
    /// - Return [`ImportError::Command`] if `gh` cannot be run.
    /// - Return [`ImportError::CommandFailed`] if `gh` reports failure.
    /// - Return [`ImportError::Malformed`] if the output is not valid JSON.
    #[instrument(skip(self), level = "debug")]
    pub fn accounts(&self) -> Result<Vec<GhAccount>> {
        let stdout = self.call(&["auth", "status", "--json", "hosts"])?;
        parse_accounts(&stdout)
    }

    fn call(&self, args: &[&str]) -> Result<String> {
        let output = self.runner.run(&self.program, args)?;
        if !output.success() {
            return Err(ImportError::CommandFailed {
                message: output.stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl<R> IdentitySource for GhCli<R>
where
    R: CommandRunner,
{
    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, query: &IdentityQuery) -> Result<ExternalIdentity> {
        let stdout = match query {
            IdentityQuery::Authenticated => self.call(&["api", "user"])?,
            IdentityQuery::User(login) => {
                let login = login.trim();
                if login.is_empty() {
                    return Err(ImportError::UserNotFound(login.to_string()));
                }

                let endpoint = format!("users/{login}");
                self.call(&["api", endpoint.as_str()]).map_err(|err| match err {
                    ImportError::CommandFailed { message } if message.contains("404") => {
                        ImportError::UserNotFound(login.to_string())
                    }
                    err => err,
                })?
            }
        };

        let identity = parse_user_json(&stdout)?;
        info!("fetched identity of {:?}", identity.login);

        Ok(identity)
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: Option<String>,
    name: Option<String>,
    email: Option<String>,
}

/// Parse a GitHub user record.
///
/// # Errors
///
/// - Return [`ImportError::Malformed`] if the input is not a JSON object.
/// - Return [`ImportError::MissingLogin`] if the record has no login.
pub fn parse_user_json(json: &str) -> Result<ExternalIdentity> {
    let raw: RawUser = serde_json::from_str(json)?;
    let login = raw
        .login
        .map(|login| login.trim().to_string())
        .filter(|login| !login.is_empty())
        .ok_or(ImportError::MissingLogin)?;

    let name = raw
        .name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| login.clone());

    let email = raw
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());

    Ok(ExternalIdentity { login, name, email })
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    login: String,
    host: String,
    active: bool,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    hosts: BTreeMap<String, Vec<RawAccount>>,
}

/// Parse output of `gh auth status --json hosts`.
///
/// Accounts come out grouped by host in host name order.
///
/// # Errors
///
/// - Return [`ImportError::Malformed`] if the input does not match the
///   expected layout.
pub fn parse_accounts(json: &str) -> Result<Vec<GhAccount>> {
    let status: RawStatus = serde_json::from_str(json)?;
    let accounts = status
        .hosts
        .into_values()
        .flatten()
        .map(|raw| GhAccount {
            login: raw.login,
            host: raw.host,
            active: raw.active,
        })
        .collect();

    Ok(accounts)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Identity import error types.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// GitHub CLI is not installed.
    #[error("GitHub CLI (gh) not found, install it from https://cli.github.com")]
    NotInstalled,

    /// GitHub CLI cannot be run.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// GitHub CLI ran but reported failure.
    #[error("gh command failed: {message}")]
    CommandFailed { message: String },

    /// Requested account does not exist.
    #[error("GitHub user {0:?} not found")]
    UserNotFound(String),

    /// Response is not valid JSON of the expected shape.
    #[error("could not parse GitHub response")]
    Malformed(#[from] serde_json::Error),

    /// Response lacks a login.
    #[error("GitHub response has no login")]
    MissingLogin,

    /// No email to build a profile with.
    #[error("GitHub user {login:?} has no public email, supply one explicitly")]
    MissingEmail { login: String },
}

/// Friendly result alias :3
pub type Result<T, E = ImportError> = std::result::Result<T, E>;
