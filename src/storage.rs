use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{FinderError, Result};
use crate::types::{Settlement, SourceKind};

pub const DEFAULT_STORE_FILE: &str = "tracking/previous_settlements.json";

const STORE_VERSION: u32 = 1;

/// A settlement that has already been reported
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KnownSettlement {
    pub identity: String,
    pub title: String,
    pub source: SourceKind,
    pub claim_url: String,
    pub first_seen: NaiveDate,
}

#[derive(Debug, Deserialize, Serialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    settlements: Vec<KnownSettlement>,
}

/// Identities already notified, persisted between runs. Entries are never
/// removed.
#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    known: BTreeMap<String, KnownSettlement>,
}

impl DedupStore {
    /// Load the store at `path`. A missing file is an empty store; a file
    /// that exists but cannot be read or parsed is `StoreCorrupt`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no dedup store yet; starting empty");
                return Ok(Self::empty(path));
            }
            Err(e) => return Err(corrupt(&path, e.to_string())),
        };

        let file: StoreFile = serde_json::from_str(&content).map_err(|e| corrupt(&path, e.to_string()))?;
        if file.version != STORE_VERSION {
            return Err(corrupt(&path, format!("unsupported store version {}", file.version)));
        }

        let mut known = BTreeMap::new();
        for entry in file.settlements {
            if entry.identity.is_empty() {
                return Err(corrupt(&path, format!("entry for {:?} has no identity", entry.title)));
            }
            known.insert(entry.identity.clone(), entry);
        }

        debug!(path = %path.display(), known = known.len(), "loaded dedup store");
        Ok(Self { path, known })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            known: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.known.contains_key(identity)
    }

    /// Mark every settlement as known. Existing entries keep their
    /// `first_seen`. Returns how many identities were added.
    pub fn remember(&mut self, settlements: &[Settlement], today: NaiveDate) -> usize {
        let mut added = 0;
        for settlement in settlements {
            let identity = settlement.identity();
            if self.known.contains_key(&identity) {
                continue;
            }
            self.known.insert(
                identity.clone(),
                KnownSettlement {
                    identity,
                    title: settlement.title.clone(),
                    source: settlement.source,
                    claim_url: settlement.claim_url.to_string(),
                    first_seen: today,
                },
            );
            added += 1;
        }
        added
    }

    /// Write the store: temp file in the same directory, fsync, then rename
    /// over the old file. An interrupted write leaves the previous store.
    pub fn persist(&self) -> Result<()> {
        let file = StoreFile {
            version: STORE_VERSION,
            updated_at: Some(Utc::now()),
            settlements: self.known.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| write_failed(&self.path, e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| write_failed(&self.path, e.to_string()))?;
        }

        let temp_path = temp_path_for(&self.path);
        if let Err(e) = write_synced(&temp_path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_failed(&self.path, format!("temp file {:?}: {}", temp_path, e)));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(write_failed(&self.path, e.to_string()));
        }

        // Store already replaced; a directory sync failure is only logged
        if let Err(e) = sync_parent_dir(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to sync store directory");
        }

        debug!(path = %self.path.display(), known = self.known.len(), "persisted dedup store");
        Ok(())
    }
}

/// Settlements whose identity is not yet known, in discovery order. A
/// settlement listed twice in one run is returned once.
pub fn diff_new(candidates: &[Settlement], known: &DedupStore) -> Vec<Settlement> {
    let mut seen_this_run = HashSet::new();
    candidates
        .iter()
        .filter(|s| {
            let identity = s.identity();
            !known.contains(&identity) && seen_this_run.insert(identity)
        })
        .cloned()
        .collect()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Flush the directory entry so the rename survives a crash
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn corrupt(path: &Path, reason: String) -> FinderError {
    FinderError::StoreCorrupt {
        path: path.to_path_buf(),
        reason,
    }
}

fn write_failed(path: &Path, reason: String) -> FinderError {
    FinderError::StoreWrite {
        path: path.to_path_buf(),
        reason,
    }
}
