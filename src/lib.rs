// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Git identity profile switcher.
//!
//! An __identity profile__ bundles everything Git needs to act as one
//! person: name, email, and optionally an SSH key and a signing key. The
//! switcher keeps a registry of profiles and makes Git pick the right one
//! automatically through three mechanisms:
//!
//! 1. __Directory rules__: a profile can own directory prefixes. Every
//!    repository below such a prefix uses that profile. Rules are realized as
//!    a machine managed block of `includeIf` directives inside the global
//!    configuration file, each pointing at a small per-profile companion
//!    file.
//! 2. __Repository overrides__: a profile can be pinned to one repository by
//!    writing its identity into that repository's local configuration.
//! 3. __Activation__: a profile can be written into the global configuration
//!    directly, making it the fallback identity everywhere else.
//!
//! Everything outside the managed block of the global configuration file is
//! owned by the user, and is preserved byte for byte.

pub mod command;
pub mod config;
pub mod gitconfig;
pub mod import;
pub mod path;
pub mod profile;
pub mod repo;
pub mod rules;
pub mod store;

pub use profile::{Profile, ProfileId};
pub use repo::RepoOverrideWriter;
pub use rules::IncludeRules;
pub use store::ProfileRegistry;
