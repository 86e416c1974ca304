// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Managed block handling.
//!
//! The switcher owns exactly one region of the user's global configuration
//! file, called the __managed block__. It is bounded by two fixed marker
//! lines, and holds one `includeIf` directive pair per directory rule:
//!
//! ```text
//! # >>> git-profile-switcher managed — do not edit manually <<<
//! [includeIf "gitdir/i:/Users/bob/work/"]
//!     path = /Users/bob/.config/git-profile-switcher/<ID>.gitconfig
//! # <<< git-profile-switcher managed >>>
//! ```
//!
//! Everything outside of the managed block belongs to the user, and is never
//! touched. The block itself is never patched line by line. It is always
//! regenerated in full, and swapped in as one region, which is what makes
//! repeated application byte-for-byte idempotent.
//!
//! Everything in here is pure string manipulation. Reading and writing the
//! actual file is left to [`IncludeRules`](crate::rules::IncludeRules).

use crate::profile::{escape_config_value, escape_subsection};

use std::path::PathBuf;

/// Line opening the managed block.
pub const BEGIN_MARKER: &str = "# >>> git-profile-switcher managed — do not edit manually <<<";

/// Line closing the managed block.
pub const END_MARKER: &str = "# <<< git-profile-switcher managed >>>";

/// One conditional include directive pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeEntry {
    /// Normalized directory rule, always ending with a separator.
    pub rule: String,

    /// Companion file to include when the rule matches.
    pub companion: PathBuf,
}

/// Render full managed block text.
///
/// Entries are emitted in the order given. No entries means no block at all,
/// so an empty string is returned rather than an empty marker pair.
pub fn render_block(entries: impl IntoIterator<Item = IncludeEntry>) -> String {
    let mut lines = vec![BEGIN_MARKER.to_string()];
    for entry in entries {
        lines.push(format!(
            "[includeIf \"gitdir/i:{}\"]",
            escape_subsection(&entry.rule)
        ));
        lines.push(format!(
            "\tpath = {}",
            escape_config_value(&entry.companion.to_string_lossy())
        ));
    }

    if lines.len() == 1 {
        return String::new();
    }

    lines.push(END_MARKER.to_string());
    let mut block = lines.join("\n");
    block.push('\n');
    block
}

/// Layout of a global configuration file with respect to the managed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayout<'a> {
    /// No begin marker anywhere.
    Unmanaged { content: &'a str },

    /// Both markers found, in order.
    ///
    /// The prefix is everything before the begin marker. The suffix is
    /// everything after the end marker, minus one trailing newline.
    Managed { prefix: &'a str, suffix: &'a str },

    /// Begin marker found, but no end marker follows it.
    Corrupted { content: &'a str },
}

impl<'a> ConfigLayout<'a> {
    /// Split configuration text around the managed block.
    pub fn parse(content: &'a str) -> Self {
        let Some(start) = content.find(BEGIN_MARKER) else {
            return Self::Unmanaged { content };
        };

        // INVARIANT: Only honor an end marker that follows the begin marker.
        let search_from = start + BEGIN_MARKER.len();
        let Some(offset) = content[search_from..].find(END_MARKER) else {
            return Self::Corrupted { content };
        };

        let mut end = search_from + offset + END_MARKER.len();
        if content[end..].starts_with('\n') {
            end += 1;
        }

        Self::Managed {
            prefix: &content[..start],
            suffix: &content[end..],
        }
    }

    /// Produce new configuration text with `block` as the managed block.
    ///
    /// An existing block is swapped out as a whole. Corrupted files get the
    /// fresh block appended, leaving the dangling marker for a later pass to
    /// absorb. An empty block never introduces markers into a file that had
    /// none.
    pub fn splice(&self, block: &str) -> String {
        match self {
            Self::Managed { prefix, suffix } => {
                let mut out = String::with_capacity(prefix.len() + block.len() + suffix.len());
                out.push_str(prefix);
                out.push_str(block);
                out.push_str(suffix);
                out
            }
            Self::Unmanaged { content } | Self::Corrupted { content } => {
                append_block(content, block)
            }
        }
    }

    /// Check if parse hit a dangling begin marker.
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }
}

/// Compute new configuration text from old text and fresh block.
pub fn rewrite(existing: &str, block: &str) -> String {
    ConfigLayout::parse(existing).splice(block)
}

fn append_block(content: &str, block: &str) -> String {
    if block.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len() + block.len() + 1);
    out.push_str(content);
    if !content.is_empty() && !content.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(block);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::{formatdoc, indoc};
    use pretty_assertions::assert_eq;

    fn entry(rule: &str, companion: &str) -> IncludeEntry {
        IncludeEntry {
            rule: rule.into(),
            companion: companion.into(),
        }
    }

    fn work_block() -> String {
        render_block([entry("/Users/bob/work/", "/store/A.gitconfig")])
    }

    #[test]
    fn render_block_lists_entries_between_markers() {
        let result = render_block([
            entry("/Users/bob/work/", "/store/A.gitconfig"),
            entry("/srv/oss/", "/store/B.gitconfig"),
        ]);

        let expect = formatdoc! {"
            {begin}
            [includeIf \"gitdir/i:/Users/bob/work/\"]
            \tpath = /store/A.gitconfig
            [includeIf \"gitdir/i:/srv/oss/\"]
            \tpath = /store/B.gitconfig
            {end}
        ", begin = BEGIN_MARKER, end = END_MARKER};
        assert_eq!(result, expect);
    }

    #[test]
    fn render_block_without_entries_is_empty() {
        assert_eq!(render_block(Vec::<IncludeEntry>::new()), "");
    }

    #[test]
    fn parse_recognizes_every_layout() {
        let plain = "[user]\n\tname = Alice\n";
        assert_eq!(
            ConfigLayout::parse(plain),
            ConfigLayout::Unmanaged { content: plain }
        );

        let managed = format!("[user]\n{}[core]\n", work_block());
        assert_eq!(
            ConfigLayout::parse(&managed),
            ConfigLayout::Managed {
                prefix: "[user]\n",
                suffix: "[core]\n"
            }
        );

        let dangling = format!("[user]\n{BEGIN_MARKER}\n[includeIf \"gitdir/i:/x/\"]\n");
        assert!(ConfigLayout::parse(&dangling).is_corrupted());
    }

    #[test]
    fn end_marker_before_begin_marker_is_corrupted() {
        let content = format!("{END_MARKER}\n[user]\n{BEGIN_MARKER}\n");
        assert!(ConfigLayout::parse(&content).is_corrupted());
    }

    #[test]
    fn rewrite_appends_block_with_single_separator() {
        let block = work_block();

        let result = rewrite("[user]\n\tname = Alice", &block);
        assert_eq!(result, format!("[user]\n\tname = Alice\n{block}"));

        let result = rewrite("[user]\n\tname = Alice\n", &block);
        assert_eq!(result, format!("[user]\n\tname = Alice\n{block}"));

        let result = rewrite("", &block);
        assert_eq!(result, block);
    }

    #[test]
    fn rewrite_with_empty_block_leaves_unmanaged_content_alone() {
        let content = "[user]\n\tname = Alice";
        assert_eq!(rewrite(content, ""), content);
    }

    #[test]
    fn rewrite_swaps_existing_block_and_keeps_surroundings() {
        let old = format!("[user]\n\tname = Alice\n{}[alias]\n\tco = checkout\n", work_block());
        let fresh = render_block([entry("/srv/oss/", "/store/B.gitconfig")]);

        let result = rewrite(&old, &fresh);

        let expect = formatdoc! {"
            [user]
            \tname = Alice
            {begin}
            [includeIf \"gitdir/i:/srv/oss/\"]
            \tpath = /store/B.gitconfig
            {end}
            [alias]
            \tco = checkout
        ", begin = BEGIN_MARKER, end = END_MARKER};
        assert_eq!(result, expect);
    }

    #[test]
    fn rewrite_with_empty_block_removes_existing_block() {
        let old = format!("[user]\n\tname = Alice\n{}", work_block());
        let result = rewrite(&old, "");
        assert_eq!(result, "[user]\n\tname = Alice\n");
    }

    #[test]
    fn rewrite_is_idempotent() {
        let block = work_block();
        let inputs = [
            String::new(),
            "[user]\n\tname = Alice".to_string(),
            format!("[user]\n{block}[core]\n\teditor = vim\n"),
        ];

        for input in inputs {
            let once = rewrite(&input, &block);
            let twice = rewrite(&once, &block);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rewrite_appends_fresh_block_to_corrupted_file() {
        let corrupted = indoc! {"
            [user]
            \tname = Alice
            # >>> git-profile-switcher managed — do not edit manually <<<
            [includeIf \"gitdir/i:/old/\"]
        "};
        let block = work_block();

        let result = rewrite(corrupted, &block);
        assert_eq!(result, format!("{corrupted}{block}"));

        // Next pass absorbs the dangling marker into one well formed block.
        let healed = rewrite(&result, &block);
        assert_eq!(healed, format!("[user]\n\tname = Alice\n{block}"));
    }

    #[test]
    fn rewrite_escapes_special_characters_in_paths() {
        let block = render_block([entry("/Users/bob/\"odd\"/", "/store dir/#1/A.gitconfig")]);
        assert!(block.contains("[includeIf \"gitdir/i:/Users/bob/\\\"odd\\\"/\"]"));
        assert!(block.contains("\tpath = \"/store dir/#1/A.gitconfig\""));
    }
}
