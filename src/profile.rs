// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Identity profile representation.
//!
//! A __profile__ is a named bundle of the settings Git needs to act as one
//! particular person: author name, email, SSH key, and signing key.
//!
//! # Directory Rules
//!
//! A profile may list any number of __directory rules__. Each rule is an
//! absolute directory path, and means "use this profile for every repository
//! whose Git directory lives under this path, ignoring case". Rules are not
//! evaluated by the switcher itself. Instead they are translated into
//! `includeIf "gitdir/i:..."` directives inside the global configuration
//! file, leaving the matching to Git.
//!
//! # Repository Overrides
//!
//! A profile also remembers every repository it was explicitly pinned to via
//! [`RepoOverrideWriter`](crate::repo::RepoOverrideWriter). This list is
//! informational only. The pin itself lives inside that repository's local
//! configuration file.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use uuid::Uuid;

/// Unique identifier of a profile.
///
/// Generated once at creation, never reused. Serialized in uppercase
/// hyphenated form, but parsing accepts either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ProfileId(Uuid);

impl ProfileId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name of the companion configuration owned by this profile.
    pub fn companion_file_name(&self) -> String {
        format!("{self}.gitconfig")
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProfileId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ProfileId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:X}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = uuid::Error;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(data.trim()).map(Self)
    }
}

impl From<ProfileId> for String {
    fn from(id: ProfileId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ProfileId {
    type Error = uuid::Error;

    fn try_from(data: String) -> Result<Self, Self::Error> {
        data.parse()
    }
}

/// Identity profile.
///
/// Field names on disk follow the established `profiles.json` layout, hence
/// the renames. Optional fields that are absent are left out of the encoding.
/// Unknown fields are ignored, and missing lists decode as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Immutable unique identifier.
    pub id: ProfileId,

    /// Human readable label. Need not be unique.
    #[serde(rename = "name")]
    pub label: String,

    /// Value for `user.name`.
    #[serde(rename = "gitName")]
    pub display_name: String,

    /// Value for `user.email`.
    #[serde(rename = "gitEmail")]
    pub email: String,

    /// Private key handed to `ssh -i`.
    #[serde(rename = "sshKeyPath", default, skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<String>,

    /// Value for `user.signingkey`.
    #[serde(rename = "signingKey", default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Value for `gpg.format`, e.g. "ssh" or "openpgp".
    #[serde(rename = "signingFormat", default, skip_serializing_if = "Option::is_none")]
    pub signing_format: Option<String>,

    /// Login of the external account this profile was imported from.
    #[serde(rename = "githubLogin", default, skip_serializing_if = "Option::is_none")]
    pub external_identity: Option<String>,

    /// Directory rules in the order they were added.
    #[serde(rename = "directoryRules", default)]
    pub directory_rules: Vec<String>,

    /// Repository roots this profile was pinned to.
    #[serde(rename = "repoOverrides", default)]
    pub repo_overrides: Vec<String>,
}

impl Profile {
    /// Construct new profile with a freshly generated identifier.
    pub fn new(
        label: impl Into<String>,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: ProfileId::new(),
            label: label.into(),
            display_name: display_name.into(),
            email: email.into(),
            ssh_key_path: None,
            signing_key: None,
            signing_format: None,
            external_identity: None,
            directory_rules: Vec::new(),
            repo_overrides: Vec::new(),
        }
    }

    /// SSH key path, treating an empty string as unset.
    pub fn ssh_key(&self) -> Option<&str> {
        self.ssh_key_path.as_deref().filter(|key| !key.is_empty())
    }

    /// Signing key, treating an empty string as unset.
    pub fn signing(&self) -> Option<&str> {
        self.signing_key.as_deref().filter(|key| !key.is_empty())
    }

    /// Signing format, treating an empty string as unset.
    pub fn format(&self) -> Option<&str> {
        self.signing_format.as_deref().filter(|format| !format.is_empty())
    }

    /// Add a directory rule.
    ///
    /// Returns `false` if the rule is already present, comparing normalized
    /// forms so `/a` and `/a/` count as the same rule.
    pub fn add_rule(&mut self, rule: impl Into<String>) -> bool {
        let rule = rule.into();
        let target = normalize_rule(&rule);
        if self
            .directory_rules
            .iter()
            .any(|existing| normalize_rule(existing) == target)
        {
            return false;
        }

        self.directory_rules.push(rule);
        true
    }

    /// Remove a directory rule.
    ///
    /// Matches against both the raw and the normalized form, so `/a/b` also
    /// removes a stored `/a/b/`. Returns `false` if nothing was removed.
    pub fn remove_rule(&mut self, rule: impl AsRef<str>) -> bool {
        let target = normalize_rule(rule.as_ref());
        let before = self.directory_rules.len();
        self.directory_rules
            .retain(|existing| normalize_rule(existing) != target);
        before != self.directory_rules.len()
    }

    /// Record a repository this profile was pinned to.
    pub fn add_override(&mut self, repo: impl Into<String>) -> bool {
        insert_unique(&mut self.repo_overrides, repo.into())
    }

    /// Forget a repository this profile was pinned to.
    pub fn remove_override(&mut self, repo: impl AsRef<str>) -> bool {
        let before = self.repo_overrides.len();
        self.repo_overrides.retain(|existing| existing != repo.as_ref());
        before != self.repo_overrides.len()
    }

    /// Shell command Git should use for SSH transport, if this profile has a key.
    pub fn ssh_command(&self) -> Option<String> {
        self.ssh_key().map(ssh_command)
    }
}

fn insert_unique(list: &mut Vec<String>, entry: String) -> bool {
    if list.contains(&entry) {
        return false;
    }

    list.push(entry);
    true
}

/// Normalize directory rule so it always ends with a path separator.
///
/// Git treats a trailing slash in `gitdir:` patterns as "everything below",
/// so the separator is required for the rule to cover nested repositories.
pub fn normalize_rule(rule: &str) -> String {
    if rule.ends_with('/') {
        rule.to_string()
    } else {
        format!("{rule}/")
    }
}

/// SSH command forcing use of one private key.
pub fn ssh_command(key: &str) -> String {
    format!("ssh -i {} -o IdentitiesOnly=yes", shell_quote(key))
}

/// Quote string for a POSIX shell.
///
/// Always wraps in single quotes, and escapes embedded single quotes as
/// `'\''`.
pub fn shell_quote(data: &str) -> String {
    format!("'{}'", data.replace('\'', "'\\''"))
}

/// Escape value for the right-hand side of a Git configuration entry.
///
/// Mirrors what `git config` itself writes: backslashes and double quotes are
/// escaped, newlines and tabs become escape sequences, and the whole value is
/// double quoted if it has surrounding whitespace or contains a comment
/// character.
pub fn escape_config_value(value: &str) -> String {
    let needs_quotes = value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.contains(['#', ';']);

    let mut out = String::with_capacity(value.len() + 2);
    if needs_quotes {
        out.push('"');
    }

    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }

    if needs_quotes {
        out.push('"');
    }

    out
}

/// Escape subsection name for a Git configuration section header.
pub fn escape_subsection(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}
