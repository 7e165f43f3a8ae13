//! # Label Domain
//!
//! Every classifier in the ensemble, and the corpus reference annotation,
//! is reduced to a [`Label`]. Corpora disagree on how the reference is
//! encoded as an integer, so decoding always goes through an explicit
//! [`LabelPolarity`].
//!
//! ## Canonical encoding
//!
//! | Label | Row-store cell | Reference code |
//! |-------|----------------|----------------|
//! | `Toxic` | `toxic` | `0` |
//! | `Neutral` | `neutral` | `1` |
//! | `Unknown` | `unknown` | n/a |
//!
//! The reference code column of a row store is always written in this
//! canonical form, whatever polarity the input corpus used.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A discrete classification label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// Harmless content.
    Neutral,
    /// Toxic, harassing or otherwise unsafe content.
    Toxic,
    /// No usable opinion (unparseable cell, missing value).
    Unknown,
}

impl Label {
    /// Returns true for [`Label::Toxic`].
    #[inline]
    #[must_use]
    pub const fn is_toxic(self) -> bool {
        matches!(self, Self::Toxic)
    }

    /// Returns true for labels that carry an opinion.
    #[inline]
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Lower-case cell text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Toxic => "toxic",
            Self::Unknown => "unknown",
        }
    }

    /// Reads a stored label cell.
    ///
    /// Accepts the synonyms found in older prediction logs
    /// (`harassment`/`negative` for toxic, `positive` for neutral).
    /// Anything else is [`Label::Unknown`].
    #[must_use]
    pub fn from_cell(cell: &str) -> Self {
        match cell.trim().to_lowercase().as_str() {
            "toxic" | "harassment" | "negative" => Self::Toxic,
            "neutral" | "positive" => Self::Neutral,
            _ => Self::Unknown,
        }
    }

    /// Canonical reference code: `0` toxic, `1` neutral.
    #[must_use]
    pub const fn reference_code(self) -> Option<u8> {
        match self {
            Self::Toxic => Some(0),
            Self::Neutral => Some(1),
            Self::Unknown => None,
        }
    }

    /// Inverse of [`Label::reference_code`].
    #[must_use]
    pub const fn from_reference_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Toxic),
            1 => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a corpus encodes its integer reference annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolarity {
    /// `0` = toxic/harassment, `1` = neutral.
    #[default]
    ZeroIsToxic,
    /// `1` = toxic ("positive" class), `0` = neutral.
    OneIsToxic,
}

impl LabelPolarity {
    /// Decodes a raw corpus value; `None` for anything outside {0, 1}.
    #[must_use]
    pub fn decode(self, code: i64) -> Option<Label> {
        let (toxic, neutral) = match self {
            Self::ZeroIsToxic => (0, 1),
            Self::OneIsToxic => (1, 0),
        };
        if code == toxic {
            Some(Label::Toxic)
        } else if code == neutral {
            Some(Label::Neutral)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cell_synonyms() {
        assert_eq!(Label::from_cell("toxic"), Label::Toxic);
        assert_eq!(Label::from_cell(" Harassment "), Label::Toxic);
        assert_eq!(Label::from_cell("NEGATIVE"), Label::Toxic);
        assert_eq!(Label::from_cell("Neutral"), Label::Neutral);
        assert_eq!(Label::from_cell("positive"), Label::Neutral);
        assert_eq!(Label::from_cell("Error"), Label::Unknown);
        assert_eq!(Label::from_cell(""), Label::Unknown);
    }

    #[test]
    fn test_reference_code_is_canonical() {
        assert_eq!(Label::Toxic.reference_code(), Some(0));
        assert_eq!(Label::Neutral.reference_code(), Some(1));
        assert_eq!(Label::Unknown.reference_code(), None);
        assert_eq!(Label::from_reference_code(0), Some(Label::Toxic));
        assert_eq!(Label::from_reference_code(7), None);
    }

    #[test]
    fn test_polarity_decode() {
        assert_eq!(LabelPolarity::ZeroIsToxic.decode(0), Some(Label::Toxic));
        assert_eq!(LabelPolarity::ZeroIsToxic.decode(1), Some(Label::Neutral));
        assert_eq!(LabelPolarity::OneIsToxic.decode(1), Some(Label::Toxic));
        assert_eq!(LabelPolarity::OneIsToxic.decode(0), Some(Label::Neutral));
        assert_eq!(LabelPolarity::OneIsToxic.decode(2), None);
        assert_eq!(LabelPolarity::ZeroIsToxic.decode(-1), None);
    }

    #[test]
    fn test_display_matches_cell() {
        for label in [Label::Neutral, Label::Toxic, Label::Unknown] {
            assert_eq!(Label::from_cell(&label.to_string()), label);
        }
    }

    #[test]
    fn test_polarity_serde_names() {
        let json = serde_json::to_string(&LabelPolarity::OneIsToxic).unwrap();
        assert_eq!(json, "\"one_is_toxic\"");
    }
}
