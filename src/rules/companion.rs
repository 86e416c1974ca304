// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Companion configuration files.
//!
//! Every profile that owns at least one directory rule gets a small
//! configuration file of its own, named after its identifier. The managed
//! block points each of the profile's rules at that file, so Git pulls the
//! profile's identity in whenever a repository matches.

use crate::profile::{escape_config_value, Profile};

use std::fmt::Write;

/// Render companion file contents for profile.
///
/// Always carries `user.name` and `user.email`. Signing key, signing format,
/// and SSH command are only written when the profile sets them.
pub fn render_companion(profile: &Profile) -> String {
    let mut out = String::new();

    // INVARIANT: Writing into a String cannot fail.
    let _ = writeln!(out, "[user]");
    let _ = writeln!(out, "\tname = {}", escape_config_value(&profile.display_name));
    let _ = writeln!(out, "\temail = {}", escape_config_value(&profile.email));

    if let Some(key) = profile.signing() {
        let _ = writeln!(out, "\tsigningkey = {}", escape_config_value(key));
        if let Some(format) = profile.format() {
            let _ = writeln!(out, "[gpg]");
            let _ = writeln!(out, "\tformat = {}", escape_config_value(format));
        }
    }

    if let Some(command) = profile.ssh_command() {
        let _ = writeln!(out, "[core]");
        let _ = writeln!(out, "\tsshCommand = {}", escape_config_value(&command));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn companion_holds_identity_only_by_default() {
        let profile = Profile::new("Work", "Bob", "bob@work.com");

        let result = render_companion(&profile);
        let expect = indoc! {"
            [user]
            \tname = Bob
            \temail = bob@work.com
        "};
        assert_eq!(result, expect);
    }

    #[test]
    fn companion_carries_signing_and_ssh_settings() {
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        profile.signing_key = Some("~/.ssh/id_work.pub".into());
        profile.signing_format = Some("ssh".into());
        profile.ssh_key_path = Some("/Users/bob/.ssh/id_work".into());

        let result = render_companion(&profile);
        let expect = indoc! {"
            [user]
            \tname = Bob
            \temail = bob@work.com
            \tsigningkey = ~/.ssh/id_work.pub
            [gpg]
            \tformat = ssh
            [core]
            \tsshCommand = ssh -i '/Users/bob/.ssh/id_work' -o IdentitiesOnly=yes
        "};
        assert_eq!(result, expect);
    }

    #[test]
    fn signing_format_without_key_is_skipped() {
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        profile.signing_format = Some("ssh".into());

        assert!(!render_companion(&profile).contains("[gpg]"));
    }

    #[test]
    fn companion_shell_quotes_awkward_key_paths() {
        let mut profile = Profile::new("Work", "Bob", "bob@work.com");
        profile.ssh_key_path = Some("/Users/bob/my keys/it's".into());

        // Git unescapes the doubled backslash back into the shell's '\''.
        let result = render_companion(&profile);
        assert!(result.contains(
            "\tsshCommand = ssh -i '/Users/bob/my keys/it'\\\\''s' -o IdentitiesOnly=yes\n"
        ));
    }
}
