//! Settlement identity
//!
//! Identity is derived from source, title and claim URL only, so the same
//! settlement keeps its key when a site rewords the deadline or payout.
//! - title: trimmed, lowercased, whitespace collapsed
//! - claim URL: scheme, lowercased host, port and path; query and fragment dropped

use sha2::{Digest, Sha256};
use url::Url;

use crate::types::Settlement;

/// Stable dedup key for a settlement (hex sha256)
pub fn compute_identity(settlement: &Settlement) -> String {
    let key = format!(
        "{}|{}|{}",
        settlement.source.slug(),
        normalize_text(&settlement.title),
        normalize_claim_url(&settlement.claim_url)
    );
    content_hash(key.as_bytes())
}

/// Normalize text for comparison (lowercase, collapse whitespace)
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce a claim URL to the parts that name the settlement.
///
/// Tracking parameters and session ids live in the query string, so the
/// whole query is dropped rather than filtered.
pub fn normalize_claim_url(url: &Url) -> String {
    let scheme = url.scheme().to_lowercase();
    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host_port = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    let path = url.path();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    format!("{}://{}{}", scheme, host_port, path)
}

fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
