//! Verse identity and audio URL resolution
//!
//! A `VerseKey` names one playable clip. It is the join key between what the
//! listener asked for and what the player currently has loaded, so equality
//! is plain field equality.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of surahs in the mushaf
pub const SURAH_COUNT: u16 = 114;

/// Verse count per surah (Hafs numbering), index 0 is surah 1
const VERSE_COUNTS: [u16; SURAH_COUNT as usize] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53,
    89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12,
    12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26,
    30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

/// Number of verses in a surah, `None` for an unknown surah number
pub fn verse_count(surah: u16) -> Option<u16> {
    if surah == 0 {
        return None;
    }
    VERSE_COUNTS.get(usize::from(surah) - 1).copied()
}

/// Identifies one verse audio clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VerseKey {
    /// Surah number (1-114)
    pub surah: u16,
    /// Verse number within the surah (1-based)
    pub verse: u16,
}

impl VerseKey {
    pub fn new(surah: u16, verse: u16) -> Self {
        Self { surah, verse }
    }

    /// Key of the following verse in the same surah
    pub fn next(&self) -> Self {
        Self {
            surah: self.surah,
            verse: self.verse.saturating_add(1),
        }
    }

    /// True when this key names a verse of the given surah
    pub fn is_within(&self, context: &SurahContext) -> bool {
        self.surah == context.surah && self.verse >= 1 && self.verse <= context.total_verses
    }
}

impl fmt::Display for VerseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surah, self.verse)
    }
}

impl FromStr for VerseKey {
    type Err = Error;

    /// Parses the conventional `surah:verse` form, e.g. `2:255`
    fn from_str(s: &str) -> Result<Self> {
        let (surah, verse) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| Error::InvalidInput(format!("verse reference '{}' is not surah:verse", s)))?;

        let surah: u16 = surah
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid surah number in '{}'", s)))?;
        let verse: u16 = verse
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid verse number in '{}'", s)))?;

        if surah == 0 || surah > SURAH_COUNT {
            return Err(Error::InvalidInput(format!("surah {} out of range", surah)));
        }
        if verse == 0 {
            return Err(Error::InvalidInput("verse numbers start at 1".to_string()));
        }

        Ok(Self { surah, verse })
    }
}

/// The surah a reading session is bound to
///
/// `total_verses` is the ceiling for autoplay advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurahContext {
    pub surah: u16,
    pub total_verses: u16,
}

impl SurahContext {
    pub fn new(surah: u16, total_verses: u16) -> Self {
        Self { surah, total_verses }
    }

    /// Context for a surah using the built-in verse counts
    pub fn for_surah(surah: u16) -> Result<Self> {
        verse_count(surah)
            .map(|total| Self::new(surah, total))
            .ok_or_else(|| Error::InvalidInput(format!("surah {} out of range", surah)))
    }

    /// Key for a verse number of this surah
    pub fn key(&self, verse: u16) -> VerseKey {
        VerseKey::new(self.surah, verse)
    }
}

/// Resolves verse keys to audio URLs
///
/// Produces `{base_url}/{reciter}/{surah:03}{verse:03}.mp3`, the layout used by
/// the common per-verse recitation mirrors. Resolution is pure: the same key
/// always yields the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub base_url: String,
    pub reciter: String,
}

impl AudioSource {
    pub fn new(base_url: impl Into<String>, reciter: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            reciter: reciter.into(),
        }
    }

    pub fn url_for(&self, key: VerseKey) -> String {
        format!(
            "{}/{}/{:03}{:03}.mp3",
            self.base_url.trim_end_matches('/'),
            self.reciter.trim_matches('/'),
            key.surah,
            key.verse
        )
    }
}

impl Default for AudioSource {
    fn default() -> Self {
        Self::new("https://everyayah.com/data", "Alafasy_128kbps")
    }
}
