//! Proof-of-purchase classification
//!
//! Phrase matching over the listing text. Not-required phrases are matched
//! first and masked out, so "no proof required" is not also read as
//! "proof required". Anything ambiguous resolves to `Required`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{FinderError, Result};
use crate::types::{Candidate, ProofRequirement, Settlement};

const LEXICON_FILE: &str = "tracking/lexicon.yml";

const DEFAULT_NOT_REQUIRED: &[&str] = &[
    "no proof required",
    "no proof needed",
    "no proof necessary",
    "no proof of purchase",
    "no proof",
    "no-proof",
    "no receipt",
    "no receipts",
    "receipt not required",
    "receipts not required",
    "proof of purchase not required",
    "proof of purchase is not required",
    "proof not required",
    "without proof",
    "without a receipt",
    "without receipt",
    "does not require proof",
    "do not need proof",
    "don't need proof",
    "no documentation required",
];

const DEFAULT_REQUIRED: &[&str] = &[
    "proof of purchase required",
    "proof of purchase is required",
    "proof of purchase must be",
    "proof required",
    "proof is required",
    "receipt required",
    "receipts required",
    "receipt is required",
    "must provide proof",
    "must submit proof",
    "must include proof",
    "requires proof",
    "documentation required",
];

/// Phrase lists, as read from `tracking/lexicon.yml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Lexicon {
    #[serde(default)]
    pub not_required: Vec<String>,
    #[serde(default)]
    pub required: Vec<String>,
    /// Use only the listed phrases instead of extending the built-in ones
    #[serde(default)]
    pub replace_defaults: bool,
}

impl Lexicon {
    pub fn builtin() -> Self {
        Self {
            not_required: DEFAULT_NOT_REQUIRED.iter().map(|s| s.to_string()).collect(),
            required: DEFAULT_REQUIRED.iter().map(|s| s.to_string()).collect(),
            replace_defaults: true,
        }
    }

    /// Load the lexicon override under `root`, or the built-in lexicon when
    /// no override exists.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(LEXICON_FILE);
        if !path.exists() {
            return Ok(Self::builtin());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| FinderError::Config(format!("failed to read {:?}: {}", path, e)))?;
        let overrides: Lexicon = serde_yaml::from_str(&content)
            .map_err(|e| FinderError::Config(format!("failed to parse {:?}: {}", path, e)))?;

        Ok(Self::builtin().merge(overrides))
    }

    fn merge(self, overrides: Lexicon) -> Self {
        if overrides.replace_defaults {
            return overrides;
        }
        let mut merged = self;
        merged.not_required.extend(overrides.not_required);
        merged.required.extend(overrides.required);
        merged
    }
}

/// Compiled lexicon
#[derive(Debug, Clone)]
pub struct ProofClassifier {
    not_required: Vec<Regex>,
    required: Vec<Regex>,
}

impl ProofClassifier {
    pub fn new(lexicon: &Lexicon) -> Result<Self> {
        if lexicon.not_required.iter().all(|p| p.trim().is_empty()) {
            return Err(FinderError::Config(
                "lexicon has no not-required phrases; nothing could ever be eligible".to_string(),
            ));
        }
        Ok(Self {
            not_required: compile_phrases(&lexicon.not_required)?,
            required: compile_phrases(&lexicon.required)?,
        })
    }

    /// Decide the proof requirement for a block of listing text
    pub fn classify_text(&self, text: &str) -> ProofRequirement {
        let mut masked = text.to_string();
        let mut saw_not_required = false;

        for re in &self.not_required {
            if re.is_match(&masked) {
                saw_not_required = true;
                masked = re.replace_all(&masked, " ").into_owned();
            }
        }

        let saw_required = self.required.iter().any(|re| re.is_match(&masked));

        match (saw_not_required, saw_required) {
            (_, true) => ProofRequirement::Required,
            (true, false) => ProofRequirement::NotRequired,
            (false, false) => ProofRequirement::Unknown,
        }
    }

    /// Stamp the candidate's settlement with its proof requirement
    pub fn classify(&self, candidate: Candidate) -> Settlement {
        let proof_required = self.classify_text(&candidate.raw_text);
        debug!(title = %candidate.settlement.title, %proof_required, "classified");
        Settlement {
            proof_required,
            ..candidate.settlement
        }
    }
}

/// Phrases match case-insensitively on word boundaries, with any run of
/// whitespace between words.
fn compile_phrases(phrases: &[String]) -> Result<Vec<Regex>> {
    let mut compiled = Vec::new();
    // Longest first so "no proof required" is masked before "no proof"
    let mut sorted: Vec<&String> = phrases.iter().filter(|p| !p.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    sorted.dedup();

    for phrase in sorted {
        let words: Vec<String> = phrase.split_whitespace().map(regex::escape).collect();
        let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
        let re = Regex::new(&pattern)
            .map_err(|e| FinderError::Config(format!("bad lexicon phrase {:?}: {}", phrase, e)))?;
        compiled.push(re);
    }
    Ok(compiled)
}
