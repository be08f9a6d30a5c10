//! `GameName#TAG` display identifiers.

use std::fmt;

use super::RiotError;

/// A parsed display identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiotId {
    pub game_name: String,
    pub tag_line: String,
}

impl RiotId {
    /// Split on the first `#`. Both sides are trimmed and must be non-empty
    /// and free of control characters.
    pub fn parse(input: &str) -> Result<Self, RiotError> {
        let invalid = || RiotError::InvalidIdentifierFormat {
            input: input.to_string(),
        };

        let (name, tag) = input.split_once('#').ok_or_else(invalid)?;
        let (name, tag) = (name.trim(), tag.trim());

        if name.is_empty() || tag.is_empty() {
            return Err(invalid());
        }
        if name.chars().chain(tag.chars()).any(char::is_control) {
            return Err(invalid());
        }

        Ok(Self {
            game_name: name.to_string(),
            tag_line: tag.to_string(),
        })
    }
}

impl fmt::Display for RiotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.game_name, self.tag_line)
    }
}
