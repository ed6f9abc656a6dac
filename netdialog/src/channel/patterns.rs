//! Pattern specifications for waits and prompt matching.

use std::fmt;

use regex::{Regex, RegexBuilder};

/// Regex flags a pattern was compiled with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    /// `^`/`$` match at line boundaries.
    pub multiline: bool,

    /// Case-insensitive matching.
    pub case_insensitive: bool,
}

/// A compiled regular expression plus the flags it was built with.
///
/// Supplied per call; nothing holds on to one past the wait it drives.
#[derive(Debug, Clone)]
pub struct PatternSpec {
    regex: Regex,
    flags: MatchFlags,
}

impl PatternSpec {
    /// Compile a pattern with default flags.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_flags(pattern, MatchFlags::default())
    }

    /// Compile a pattern with explicit flags.
    pub fn with_flags(pattern: &str, flags: MatchFlags) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(pattern)
            .multi_line(flags.multiline)
            .case_insensitive(flags.case_insensitive)
            .build()?;
        Ok(Self { regex, flags })
    }

    /// Compile with `^`/`$` anchored at line boundaries.
    pub fn multiline(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_flags(
            pattern,
            MatchFlags {
                multiline: true,
                ..MatchFlags::default()
            },
        )
    }

    /// Compile case-insensitively.
    pub fn case_insensitive(pattern: &str) -> Result<Self, regex::Error> {
        Self::with_flags(
            pattern,
            MatchFlags {
                case_insensitive: true,
                ..MatchFlags::default()
            },
        )
    }

    /// Match `text` literally.
    pub fn literal(text: &str) -> Result<Self, regex::Error> {
        Self::new(&regex::escape(text))
    }

    /// Alternation of two patterns, keeping the flags of `self`.
    pub fn or(&self, other: &str) -> Result<Self, regex::Error> {
        Self::with_flags(&format!("{}|{}", self.as_str(), other), self.flags)
    }

    /// The pattern source.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// The flags this pattern was compiled with.
    pub fn flags(&self) -> MatchFlags {
        self.flags
    }

    /// Get a reference to the underlying regex.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Check whether the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl From<Regex> for PatternSpec {
    fn from(regex: Regex) -> Self {
        Self {
            regex,
            flags: MatchFlags::default(),
        }
    }
}

impl fmt::Display for PatternSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring test used for banner filtering.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
