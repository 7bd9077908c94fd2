//! Run configuration
//!
//! Paths are resolved against a root directory (the scheduler's checkout).
//! `tracking/sources.yml` may override listing URLs or disable a source;
//! without it the three built-in sources run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{FinderError, Result};
use crate::scrapers::{CLAIM_DEPOT_URL, LAWSUIT_UPDATE_CENTER_URL, TOP_CLASS_ACTIONS_URL};
use crate::storage::DEFAULT_STORE_FILE;
use crate::types::SourceKind;

const SOURCES_FILE: &str = "tracking/sources.yml";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub store_path: PathBuf,
    pub timeout: Duration,
    /// Run the pipeline without writing the store or notifying
    pub dry_run: bool,
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            store_path: root.join(DEFAULT_STORE_FILE),
            root,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            dry_run: false,
        }
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.store_path = if path.is_absolute() { path } else { self.root.join(path) };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceEntry>,
}

impl SourcesFile {
    pub fn builtin() -> Self {
        let entry = |kind: SourceKind, url: &str| SourceEntry {
            name: kind.display_name().to_string(),
            kind,
            url: url.to_string(),
            enabled: true,
        };
        Self {
            sources: vec![
                entry(SourceKind::TopClassActions, TOP_CLASS_ACTIONS_URL),
                entry(SourceKind::LawsuitUpdateCenter, LAWSUIT_UPDATE_CENTER_URL),
                entry(SourceKind::ClaimDepot, CLAIM_DEPOT_URL),
            ],
        }
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(SOURCES_FILE)
    }

    /// Load `tracking/sources.yml`, or the built-in list when it is absent
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.exists() {
            return Ok(Self::builtin());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| FinderError::Config(format!("failed to read {:?}: {}", path, e)))?;
        serde_yaml::from_str(&content)
            .map_err(|e| FinderError::Config(format!("failed to parse {:?}: {}", path, e)))
    }

    /// Problems that would make a run misbehave, split into errors and
    /// warnings.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut seen_kinds = HashSet::new();

        for source in &self.sources {
            if source.name.trim().is_empty() {
                errors.push(format!("Source of kind '{}' has empty name", source.kind.slug()));
            }

            match Url::parse(&source.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(format!(
                    "Source '{}' has unsupported scheme '{}': {}",
                    source.name,
                    url.scheme(),
                    source.url
                )),
                Err(e) => errors.push(format!("Source '{}' has invalid URL {:?}: {}", source.name, source.url, e)),
            }

            if source.enabled && !seen_kinds.insert(source.kind) {
                warnings.push(format!(
                    "Source '{}' repeats kind '{}'; its listings will be fetched twice",
                    source.name,
                    source.kind.slug()
                ));
            }

            if !source.enabled {
                warnings.push(format!("Source '{}' is disabled", source.name));
            }
        }

        for kind in SourceKind::ALL {
            if !self.sources.iter().any(|s| s.kind == kind) {
                warnings.push(format!("No entry for source kind '{}'; it will not run", kind.slug()));
            }
        }

        if !self.sources.iter().any(|s| s.enabled) {
            warnings.push("No sources are enabled; every run will find nothing".to_string());
        }

        (errors, warnings)
    }
}
