use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Listing sites the finder knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    TopClassActions,
    LawsuitUpdateCenter,
    ClaimDepot,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::TopClassActions,
        SourceKind::LawsuitUpdateCenter,
        SourceKind::ClaimDepot,
    ];

    /// Stable machine name, also used inside identities
    pub fn slug(&self) -> &'static str {
        match self {
            SourceKind::TopClassActions => "top_class_actions",
            SourceKind::LawsuitUpdateCenter => "lawsuit_update_center",
            SourceKind::ClaimDepot => "claim_depot",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::TopClassActions => "Top Class Actions",
            SourceKind::LawsuitUpdateCenter => "Lawsuit Update Center",
            SourceKind::ClaimDepot => "Claim Depot",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Whether a claim needs proof of purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofRequirement {
    Required,
    NotRequired,
    #[default]
    Unknown,
}

impl fmt::Display for ProofRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProofRequirement::Required => "required",
            ProofRequirement::NotRequired => "not required",
            ProofRequirement::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Claim deadline as published. Kept as raw text when no known format parses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Deadline {
    Date(NaiveDate),
    Text(String),
}

impl Deadline {
    const FORMATS: [&'static str; 8] = [
        "%Y-%m-%d",
        "%m/%d/%y",
        "%m/%d/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%b. %d, %Y",
        "%d %B %Y",
        "%m-%d-%Y",
    ];

    /// Interpret deadline text from a listing.
    ///
    /// Returns `None` for empty and placeholder values ("Unknown", "TBD",
    /// "See website"); a missing deadline is never invented.
    pub fn parse(raw: &str) -> Option<Deadline> {
        let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let cleaned = strip_deadline_label(&cleaned);
        if cleaned.is_empty() || is_placeholder(cleaned) {
            return None;
        }

        // Ordinal suffixes ("June 3rd, 2026") trip chrono
        let without_ordinals = strip_ordinals(cleaned);
        for fmt in &Self::FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&without_ordinals, fmt) {
                return Some(Deadline::Date(date));
            }
        }

        Some(Deadline::Text(cleaned.to_string()))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Deadline::Date(d) => Some(*d),
            Deadline::Text(_) => None,
        }
    }

    /// Only a parsed date can close a claim; free text never does.
    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.date().map_or(true, |d| d >= today)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deadline::Date(d) => write!(f, "{}", d.format("%B %-d, %Y")),
            Deadline::Text(t) => f.write_str(t),
        }
    }
}

/// Drop a leading "Deadline:" style label. A label only counts when it is
/// the whole text or is followed by a colon or whitespace, so "Deadlines
/// vary" is left alone.
fn strip_deadline_label(s: &str) -> &str {
    let lower = s.to_lowercase();
    for label in ["claim deadline", "deadline", "claim by"] {
        if !lower.starts_with(label) {
            continue;
        }
        let Some(rest) = s.get(label.len()..) else {
            continue;
        };
        if let Some(after_colon) = rest.strip_prefix(':') {
            return after_colon.trim();
        }
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return rest.trim();
        }
    }
    s.trim()
}

fn is_placeholder(s: &str) -> bool {
    matches!(
        s.to_lowercase().as_str(),
        "unknown" | "tbd" | "n/a" | "na" | "-" | "see website" | "check website" | "pending"
    )
}

fn strip_ordinals(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let digits = word.trim_end_matches(',');
            let suffix_len = ["st", "nd", "rd", "th"]
                .iter()
                .find(|suf| {
                    digits.len() > suf.len()
                        && digits.ends_with(*suf)
                        && digits[..digits.len() - suf.len()].chars().all(|c| c.is_ascii_digit())
                })
                .map(|suf| suf.len());
            match suffix_len {
                Some(n) => {
                    let comma = if word.ends_with(',') { "," } else { "" };
                    format!("{}{}", &digits[..digits.len() - n], comma)
                }
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One discoverable claim opportunity, in the shape shared by every source
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settlement {
    pub title: String,
    pub source: SourceKind,
    #[serde(default)]
    pub deadline: Option<Deadline>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub proof_required: ProofRequirement,
    pub claim_url: Url,
}

impl Settlement {
    /// Dedup key; see [`crate::identity::compute_identity`]
    pub fn identity(&self) -> String {
        crate::identity::compute_identity(self)
    }

    /// No proof required, and the claim deadline (if dated) has not passed
    pub fn is_eligible_on(&self, today: NaiveDate) -> bool {
        self.proof_required == ProofRequirement::NotRequired && self.is_open_on(today)
    }

    pub fn is_open_on(&self, today: NaiveDate) -> bool {
        self.deadline.as_ref().map_or(true, |d| d.is_open_on(today))
    }
}

/// Adapter output: an unclassified settlement plus the listing text the
/// eligibility filter reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub settlement: Settlement,
    pub raw_text: String,
}

/// One structural unit of a listing page (card, table row), detached from
/// the parsed document so it can cross task boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub html: String,
    /// Page-level text that applies to every block on the page
    pub context: Option<String>,
    pub page_url: Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 7, 14).unwrap();
        for raw in [
            "2026-07-14",
            "07/14/2026",
            "July 14, 2026",
            "Jul 14, 2026",
            "Deadline: July 14th, 2026",
            "  Claim Deadline:   07/14/2026 ",
        ] {
            assert_eq!(Deadline::parse(raw), Some(Deadline::Date(expected)), "{raw}");
        }
    }

    #[test]
    fn test_deadline_placeholders_are_none() {
        for raw in ["", "Unknown", "TBD", "See Website", "Deadline: N/A"] {
            assert_eq!(Deadline::parse(raw), None, "{raw}");
        }
    }

    #[test]
    fn test_deadline_unparsable_kept_as_text() {
        assert_eq!(
            Deadline::parse("Varies by state"),
            Some(Deadline::Text("Varies by state".to_string()))
        );
        assert_eq!(
            Deadline::parse("Deadlines vary by state"),
            Some(Deadline::Text("Deadlines vary by state".to_string()))
        );
        assert_eq!(
            Deadline::parse("Deadline varies by state"),
            Some(Deadline::Text("varies by state".to_string()))
        );
        assert_eq!(Deadline::parse("Deadline"), None);
    }

    #[test]
    fn test_open_on() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(!Deadline::parse("10/18/2026").unwrap().is_open_on(today));
        assert!(Deadline::parse("10/19/2026").unwrap().is_open_on(today));
        assert!(Deadline::parse("Varies by state").unwrap().is_open_on(today));
    }

    #[test]
    fn test_slug_matches_serde_name() {
        for kind in SourceKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.slug()));
        }
    }
}
