//! Candidate identity and roster handling.
//!
//! Candidates are loaded once per session and owned by the [`Roster`]; the
//! drivers reference them by [`CandidateId`] only and never duplicate the
//! records. Ids derive from display names by normalization (lowercase,
//! spaces and hyphens to underscores, periods and apostrophes stripped) so
//! a roster file can be plain names.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RankError;

// ---------------------------------------------------------------------------
// CandidateId
// ---------------------------------------------------------------------------

/// A validated candidate identifier.
///
/// Ids are lowercase alphanumeric with underscores, 1–128 characters —
/// exactly the alphabet produced by [`CandidateId::from_display_name`].
/// Examples: `george_washington`, `track_07`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateId(String);

impl CandidateId {
    /// The maximum length of a candidate id.
    pub const MAX_LEN: usize = 128;

    /// Create a new `CandidateId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the id is empty, too long, or contains characters
    /// outside `[a-z0-9_]`.
    pub fn new(s: &str) -> Result<Self, RankError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Derive an id from a human display name.
    ///
    /// Lowercases, maps spaces and hyphens to underscores, and strips
    /// periods and apostrophes, so `"Martin Van Buren"` becomes
    /// `martin_van_buren` and `"O'Neill"` becomes `oneill`.
    ///
    /// # Errors
    /// Returns an error if nothing survives normalization or the result is
    /// still invalid (e.g. too long).
    pub fn from_display_name(name: &str) -> Result<Self, RankError> {
        let normalized: String = name
            .trim()
            .chars()
            .filter_map(|c| match c {
                ' ' | '-' => Some('_'),
                '.' | '\'' => None,
                _ => Some(c.to_ascii_lowercase()),
            })
            .collect();
        Self::validate(&normalized).map_err(|_| RankError::InvalidInput {
            reason: format!("cannot derive a candidate id from {name:?}"),
        })?;
        Ok(Self(normalized))
    }

    /// Return the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), RankError> {
        if s.is_empty() {
            return Err(RankError::invalid_input("candidate id must not be empty"));
        }
        if s.len() > Self::MAX_LEN {
            return Err(RankError::InvalidInput {
                reason: format!(
                    "candidate id must be at most {} characters, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(RankError::InvalidInput {
                reason: format!(
                    "candidate id {s:?} must contain only lowercase letters (a-z), digits (0-9), and underscores (_)"
                ),
            });
        }
        Ok(())
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CandidateId {
    type Err = RankError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CandidateId {
    type Error = RankError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<CandidateId> for String {
    fn from(id: CandidateId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One item being ranked. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique, stable identifier.
    pub id: CandidateId,
    /// Name shown to the judging user.
    pub display_name: String,
    /// Optional reference position (1 = best). Used by the scripted oracle
    /// and simulation harness, never by the interactive drivers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<u32>,
}

impl Candidate {
    /// Build a candidate whose id is derived from the display name.
    ///
    /// # Errors
    /// Returns an error if no valid id can be derived.
    pub fn named(display_name: &str, ordinal: Option<u32>) -> Result<Self, RankError> {
        Ok(Self {
            id: CandidateId::from_display_name(display_name)?,
            display_name: display_name.trim().to_owned(),
            ordinal,
        })
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// The fixed candidate set for one ranking session.
///
/// Validated at construction: at least one candidate, no duplicate ids.
/// Preserves input order; [`Roster::ids`] is the order drivers see before
/// any shuffling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Roster {
    candidates: Vec<Candidate>,
}

impl Roster {
    /// Create a roster from candidates.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidInput`] if the set is empty or two
    /// candidates share an id.
    pub fn new(candidates: Vec<Candidate>) -> Result<Self, RankError> {
        if candidates.is_empty() {
            return Err(RankError::invalid_input(
                "candidate set is empty — nothing to rank",
            ));
        }
        let mut seen = BTreeSet::new();
        for c in &candidates {
            if !seen.insert(c.id.clone()) {
                return Err(RankError::InvalidInput {
                    reason: format!(
                        "duplicate candidate id {:?} (from {:?})",
                        c.id.as_str(),
                        c.display_name
                    ),
                });
            }
        }
        Ok(Self { candidates })
    }

    /// Parse a roster file body.
    ///
    /// One candidate per line. Blank lines and `#` comments are ignored.
    /// A line is either a plain display name or `ordinal,name`.
    ///
    /// # Errors
    /// Returns [`RankError::InvalidInput`] for an empty file, an unusable
    /// name, or two names that normalize to the same id.
    pub fn parse(text: &str) -> Result<Self, RankError> {
        let mut candidates = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let candidate = match line.split_once(',') {
                Some((first, rest)) => match first.trim().parse::<u32>() {
                    Ok(ordinal) => Candidate::named(rest, Some(ordinal))?,
                    Err(_) => Candidate::named(line, None)?,
                },
                None => Candidate::named(line, None)?,
            };
            candidates.push(candidate);
        }
        Self::new(candidates)
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the roster holds no candidates. Construction rejects empty
    /// sets, so this is `false` for any `Roster` obtained through [`new`].
    ///
    /// [`new`]: Roster::new
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Ids in roster order.
    #[must_use]
    pub fn ids(&self) -> Vec<CandidateId> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }

    /// Id set for membership checks during state repair.
    #[must_use]
    pub fn id_set(&self) -> BTreeSet<CandidateId> {
        self.candidates.iter().map(|c| c.id.clone()).collect()
    }

    /// Look up a candidate by id.
    #[must_use]
    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| &c.id == id)
    }

    /// Whether the roster contains `id`.
    #[must_use]
    pub fn contains(&self, id: &CandidateId) -> bool {
        self.get(id).is_some()
    }

    /// Display name for `id`, falling back to the raw id when unknown.
    #[must_use]
    pub fn display_name<'a>(&'a self, id: &'a CandidateId) -> &'a str {
        self.get(id).map_or_else(|| id.as_str(), |c| &c.display_name)
    }

    /// Iterate candidates in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.candidates.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- CandidateId --

    #[test]
    fn id_valid() {
        let id = CandidateId::new("george_washington").unwrap();
        assert_eq!(id.as_str(), "george_washington");
    }

    #[test]
    fn id_valid_digits() {
        assert!(CandidateId::new("track_07").is_ok());
    }

    #[test]
    fn id_rejects_empty() {
        assert!(CandidateId::new("").is_err());
    }

    #[test]
    fn id_rejects_uppercase() {
        assert!(CandidateId::new("Washington").is_err());
    }

    #[test]
    fn id_rejects_space() {
        assert!(CandidateId::new("george washington").is_err());
    }

    #[test]
    fn id_rejects_pipe() {
        assert!(CandidateId::new("a|b").is_err());
    }

    #[test]
    fn id_rejects_too_long() {
        let long = "a".repeat(129);
        assert!(CandidateId::new(&long).is_err());
    }

    #[test]
    fn id_max_length_ok() {
        let max = "a".repeat(128);
        assert!(CandidateId::new(&max).is_ok());
    }

    #[test]
    fn id_from_display_name_normalizes() {
        let id = CandidateId::from_display_name("Martin Van Buren").unwrap();
        assert_eq!(id.as_str(), "martin_van_buren");
    }

    #[test]
    fn id_from_display_name_strips_punctuation() {
        let id = CandidateId::from_display_name("Franklin D. Roosevelt").unwrap();
        assert_eq!(id.as_str(), "franklin_d_roosevelt");
        let id = CandidateId::from_display_name("O'Neill").unwrap();
        assert_eq!(id.as_str(), "oneill");
    }

    #[test]
    fn id_from_display_name_maps_hyphens() {
        let id = CandidateId::from_display_name("Jean-Luc").unwrap();
        assert_eq!(id.as_str(), "jean_luc");
    }

    #[test]
    fn id_from_display_name_rejects_unusable() {
        assert!(CandidateId::from_display_name("...").is_err());
        assert!(CandidateId::from_display_name("   ").is_err());
    }

    #[test]
    fn id_display_and_from_str() {
        let id: CandidateId = "abe_lincoln".parse().unwrap();
        assert_eq!(format!("{id}"), "abe_lincoln");
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = CandidateId::new("ulysses_s_grant").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ulysses_s_grant\"");
        let decoded: CandidateId = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn id_serde_rejects_invalid() {
        assert!(serde_json::from_str::<CandidateId>("\"Not Valid\"").is_err());
    }

    // -- Roster --

    fn roster_of(names: &[&str]) -> Roster {
        let candidates = names
            .iter()
            .map(|n| Candidate::named(n, None).unwrap())
            .collect();
        Roster::new(candidates).unwrap()
    }

    #[test]
    fn roster_basic() {
        let r = roster_of(&["Alpha", "Beta", "Gamma"]);
        assert_eq!(r.len(), 3);
        assert!(!r.is_empty());
        assert_eq!(
            r.ids().iter().map(CandidateId::as_str).collect::<Vec<_>>(),
            vec!["alpha", "beta", "gamma"]
        );
    }

    #[test]
    fn roster_rejects_empty() {
        let err = Roster::new(Vec::new()).unwrap_err();
        assert!(matches!(err, RankError::InvalidInput { .. }));
    }

    #[test]
    fn roster_rejects_duplicate_ids() {
        let candidates = vec![
            Candidate::named("John Tyler", None).unwrap(),
            Candidate::named("john tyler", None).unwrap(),
        ];
        let err = Roster::new(candidates).unwrap_err();
        assert!(matches!(err, RankError::InvalidInput { .. }));
    }

    #[test]
    fn roster_lookup_and_display_name() {
        let r = roster_of(&["Alpha", "Beta"]);
        let alpha = CandidateId::new("alpha").unwrap();
        assert!(r.contains(&alpha));
        assert_eq!(r.display_name(&alpha), "Alpha");

        let ghost = CandidateId::new("ghost").unwrap();
        assert!(!r.contains(&ghost));
        assert_eq!(r.display_name(&ghost), "ghost");
    }

    // -- parse --

    #[test]
    fn parse_plain_names() {
        let r = Roster::parse("Alpha\nBeta\n\n# a comment\nGamma\n").unwrap();
        assert_eq!(r.len(), 3);
        assert!(r.iter().all(|c| c.ordinal.is_none()));
    }

    #[test]
    fn parse_csv_lines_carry_ordinals() {
        let r = Roster::parse("1,George Washington\n2,John Adams\n").unwrap();
        assert_eq!(r.len(), 2);
        let gw = CandidateId::new("george_washington").unwrap();
        assert_eq!(r.get(&gw).unwrap().ordinal, Some(1));
        assert_eq!(r.get(&gw).unwrap().display_name, "George Washington");
    }

    #[test]
    fn parse_rejects_name_outside_id_alphabet() {
        // First field is not a number, so the comma stays in the name, and
        // commas do not normalize into the id alphabet.
        let err = Roster::parse("Crosby, Stills and Nash\n").unwrap_err();
        assert!(matches!(err, RankError::InvalidInput { .. }));
    }

    #[test]
    fn parse_rejects_empty_file() {
        assert!(Roster::parse("# nothing here\n\n").is_err());
    }

    #[test]
    fn parse_rejects_colliding_normalized_names() {
        let err = Roster::parse("John Tyler\njohn-tyler\n").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("john_tyler"), "message should name the id: {msg}");
    }
}
