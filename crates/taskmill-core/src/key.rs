use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use thiserror::Error;

use crate::note::ListItemMeta;

/// Position of a list item inside its note.
///
/// The structural line index is the primary key; items whose source span is
/// unknown fall back to the line of their parent item so that identity stays
/// deterministic across refreshes.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum PosKey {
    /// Item keyed by its own line index.
    Line(u32),
    /// Item keyed by the line index of its parent item.
    Parent(u32),
}

impl fmt::Display for PosKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => write!(f, "L{line}"),
            Self::Parent(line) => write!(f, "P{line}"),
        }
    }
}

/// Identity of one list item: owning note path plus position key.
///
/// Two records with the same `ItemKey` are the same logical task; the later
/// one replaces the earlier one in the task table.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ItemKey {
    /// Vault-relative path of the owning note.
    pub path: String,
    /// Structural position inside the note.
    pub pos: PosKey,
}

impl ItemKey {
    /// Build a key from explicit parts.
    #[must_use]
    pub const fn new(path: String, pos: PosKey) -> Self {
        Self { path, pos }
    }

    /// Derive the key for a structural list item.
    ///
    /// Uses the item's own line when a span is present, otherwise the parent
    /// line (or line zero when the item has neither).
    #[must_use]
    pub fn for_item(path: &str, item: &ListItemMeta) -> Self {
        let pos = item.span.map_or_else(
            || PosKey::Parent(item.parent.unwrap_or(0)),
            |span| PosKey::Line(span.line),
        );
        Self::new(path.to_owned(), pos)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path, self.pos)
    }
}

/// Errors raised while parsing the string form of an [`ItemKey`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// The `#` separator between path and position is missing.
    #[error("missing '#' separator in item key: {0}")]
    MissingSeparator(String),
    /// The position segment is not `L<line>` or `P<line>`.
    #[error("invalid position segment in item key: {0}")]
    InvalidPosition(String),
}

impl FromStr for ItemKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, pos) = s
            .rsplit_once('#')
            .ok_or_else(|| KeyParseError::MissingSeparator(s.to_owned()))?;
        let invalid = || KeyParseError::InvalidPosition(pos.to_owned());
        let (kind, line) = pos.split_at_checked(1).ok_or_else(invalid)?;
        let line: u32 = line.parse().map_err(|_| invalid())?;
        let pos = match kind {
            "L" => PosKey::Line(line),
            "P" => PosKey::Parent(line),
            _ => return Err(invalid()),
        };
        Ok(Self::new(path.to_owned(), pos))
    }
}

impl Serialize for ItemKey {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemKey {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::Span;

    #[test]
    fn key_roundtrips_through_display() {
        let key = ItemKey::new("Projects/plan.md".into(), PosKey::Line(12));
        let parsed: ItemKey = key.to_string().parse().expect("must parse key");
        assert_eq!(parsed, key);

        let fallback = ItemKey::new("inbox.md".into(), PosKey::Parent(3));
        let parsed: ItemKey = fallback.to_string().parse().expect("must parse key");
        assert_eq!(parsed, fallback);
    }

    #[test]
    fn key_parse_rejects_malformed_input() {
        assert_eq!(
            "no-separator".parse::<ItemKey>(),
            Err(KeyParseError::MissingSeparator("no-separator".into()))
        );
        assert_eq!(
            "a.md#X9".parse::<ItemKey>(),
            Err(KeyParseError::InvalidPosition("X9".into()))
        );
        assert_eq!(
            "a.md#L".parse::<ItemKey>(),
            Err(KeyParseError::InvalidPosition("L".into()))
        );
    }

    #[test]
    fn path_with_hash_uses_last_separator() {
        let parsed: ItemKey = "notes/#ideas.md#L4".parse().expect("must parse key");
        assert_eq!(parsed.path, "notes/#ideas.md");
        assert_eq!(parsed.pos, PosKey::Line(4));
    }

    #[test]
    fn item_key_prefers_span_over_parent() {
        let item = ListItemMeta {
            span: Some(Span { line: 7, end_line: 7 }),
            parent: Some(2),
            marker: Some(' '),
        };
        assert_eq!(ItemKey::for_item("a.md", &item).pos, PosKey::Line(7));

        let spanless = ListItemMeta {
            span: None,
            parent: Some(2),
            marker: Some(' '),
        };
        assert_eq!(ItemKey::for_item("a.md", &spanless).pos, PosKey::Parent(2));
    }
}
