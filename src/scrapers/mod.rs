mod claim_depot;
mod lawsuit_update_center;
mod top_class_actions;

pub use claim_depot::{ClaimDepot, DEFAULT_URL as CLAIM_DEPOT_URL};
pub use lawsuit_update_center::{LawsuitUpdateCenter, DEFAULT_URL as LAWSUIT_UPDATE_CENTER_URL};
pub use top_class_actions::{TopClassActions, DEFAULT_URL as TOP_CLASS_ACTIONS_URL};

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Selector};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SourcesFile;
use crate::error::{FinderError, Result};
use crate::types::{Candidate, RawBlock, SourceKind};

pub const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ",
    "AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

/// What one source yielded in a run
#[derive(Debug, Default)]
pub struct Harvest {
    pub candidates: Vec<Candidate>,
    /// Blocks dropped because title or claim URL could not be extracted
    pub skipped: usize,
}

/// One listing site. Implementations only differ in how they cut the page
/// into blocks and how they read a block.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn listing_url(&self) -> &Url;

    /// Cut a listing page into its structural units
    fn split_blocks(&self, html: &str, page_url: &Url) -> Vec<RawBlock>;

    /// Read one block. `None` when title or claim URL is missing.
    fn parse(&self, block: &RawBlock) -> Option<Candidate>;

    async fn fetch(&self, client: &Client) -> Result<Vec<RawBlock>> {
        let page = fetch_page(client, self.kind(), self.listing_url()).await?;
        // Relative links resolve against where redirects landed
        Ok(self.split_blocks(&page.html, &page.url))
    }

    async fn extract(&self, client: &Client) -> Result<Harvest> {
        let blocks = self.fetch(client).await?;
        let total = blocks.len();
        let candidates: Vec<Candidate> = blocks.iter().filter_map(|b| self.parse(b)).collect();
        let skipped = total - candidates.len();

        if total == 0 {
            warn!(source = %self.kind(), "no listing blocks found; markup may have changed");
        } else if skipped > 0 {
            debug!(source = %self.kind(), skipped, "skipped incomplete listings");
        }

        Ok(Harvest { candidates, skipped })
    }
}

/// Build the adapters enabled in the sources file, in file order
pub fn build_adapters(sources: &SourcesFile) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    for entry in sources.sources.iter().filter(|s| s.enabled) {
        let url = Url::parse(&entry.url).map_err(|e| {
            FinderError::Config(format!("source '{}' has invalid url {:?}: {}", entry.name, entry.url, e))
        })?;

        let adapter: Arc<dyn SourceAdapter> = match entry.kind {
            SourceKind::TopClassActions => Arc::new(TopClassActions::new(url)),
            SourceKind::LawsuitUpdateCenter => Arc::new(LawsuitUpdateCenter::new(url)),
            SourceKind::ClaimDepot => Arc::new(ClaimDepot::new(url)),
        };
        adapters.push(adapter);
    }

    Ok(adapters)
}

/// Shared HTTP client. The timeout bounds every fetch, so one hung site
/// cannot hold up the run.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
    );

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| FinderError::Config(format!("failed to build HTTP client: {}", e)))
}

/// A fetched listing page and the URL it was finally served from
#[derive(Debug, Clone)]
pub struct Page {
    pub html: String,
    pub url: Url,
}

/// GET a listing page; any failure is `SourceUnavailable`
pub async fn fetch_page(client: &Client, site: SourceKind, url: &Url) -> Result<Page> {
    debug!(source = %site, %url, "fetching listing page");

    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FinderError::SourceUnavailable {
            site,
            reason: describe_request_error(&e),
        })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(FinderError::SourceUnavailable {
            site,
            reason: format!("HTTP {} ({})", status.as_u16(), status_label(status.as_u16())),
        });
    }

    let final_url = resp.url().clone();
    if final_url != *url {
        debug!(source = %site, from = %url, to = %final_url, "listing page redirected");
    }

    let html = resp.text().await.map_err(|e| FinderError::SourceUnavailable {
        site,
        reason: format!("failed to read body: {}", e),
    })?;

    Ok(Page { html, url: final_url })
}

fn describe_request_error(e: &reqwest::Error) -> String {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_redirect() {
        "too many redirects"
    } else if e.is_connect() {
        "connection failed"
    } else {
        "network error"
    };
    format!("{}: {}", kind, e)
}

fn status_label(code: u16) -> &'static str {
    match code {
        404 | 410 => "not found",
        403 => "forbidden",
        429 => "rate limited",
        500..=599 => "server error",
        _ => "unexpected status",
    }
}

// ---------------------------------------------------------------------------
// Extraction helpers shared by the adapters
// ---------------------------------------------------------------------------

/// Text of an element with whitespace collapsed
pub(crate) fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty text among `selectors`, tried in order
pub(crate) fn first_text(element: &ElementRef, selectors: &[&str]) -> Option<String> {
    for sel_str in selectors {
        if let Ok(sel) = Selector::parse(sel_str) {
            for found in element.select(&sel) {
                let text = element_text(&found);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// First non-empty `href` among `selectors`, tried in order
pub(crate) fn first_href(element: &ElementRef, selectors: &[&str]) -> Option<String> {
    for sel_str in selectors {
        if let Ok(sel) = Selector::parse(sel_str) {
            for found in element.select(&sel) {
                if let Some(href) = found.value().attr("href") {
                    let href = href.trim();
                    if !href.is_empty() && !href.starts_with('#') {
                        return Some(href.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Resolve an href against the page it came from. Only http(s) URLs are
/// claimable.
pub(crate) fn resolve_claim_url(page_url: &Url, href: &str) -> Option<Url> {
    let url = page_url.join(href).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

static AMOUNT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(up\s+to\s+)?\$\s?\d[\d,]*(\.\d{2})?(\s*(million|billion|[mk])\b)?",
        r"(\s*(per|each|/)\s*",
        r"(claim|claimant|household|person|product|item|purchase|class\s+member|year|month|account))?",
    ))
    .ok()
});

/// First payout expression in listing text ("up to $50 per claim")
pub(crate) fn extract_amount(text: &str) -> Option<String> {
    let re = AMOUNT_RE.as_ref()?;
    re.find(text).map(|m| collapse_whitespace(m.as_str()))
}

/// Listing text as the eligibility filter should see it
pub(crate) fn raw_text(context: Option<&str>, body: &str) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{}\n{}", ctx, body),
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourcesFile;

    #[test]
    fn test_extract_amount() {
        assert!(AMOUNT_RE.is_some());
        assert_eq!(extract_amount("Get up to $50 per claim today").as_deref(), Some("up to $50 per claim"));
        assert_eq!(extract_amount("Payout: $1,250.00").as_deref(), Some("$1,250.00"));
        assert_eq!(extract_amount("A $5 million fund").as_deref(), Some("$5 million"));
        assert_eq!(extract_amount("Payment amount varies"), None);
    }

    #[test]
    fn test_resolve_claim_url() {
        let page = Url::parse("https://www.claimdepot.com/settlements").unwrap();
        assert_eq!(
            resolve_claim_url(&page, "/settlements/acme").unwrap().as_str(),
            "https://www.claimdepot.com/settlements/acme"
        );
        assert_eq!(
            resolve_claim_url(&page, "https://acmesettlement.com/claim").unwrap().as_str(),
            "https://acmesettlement.com/claim"
        );
        assert!(resolve_claim_url(&page, "mailto:admin@example.com").is_none());
        assert!(resolve_claim_url(&page, "javascript:void(0)").is_none());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(404), "not found");
        assert_eq!(status_label(429), "rate limited");
        assert_eq!(status_label(503), "server error");
        assert_eq!(status_label(418), "unexpected status");
    }

    #[test]
    fn test_build_adapters_follows_sources_file() {
        let mut sources = SourcesFile::builtin();
        assert_eq!(build_adapters(&sources).unwrap().len(), 3);

        sources.sources[1].enabled = false;
        let kinds: Vec<SourceKind> = build_adapters(&sources).unwrap().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![SourceKind::TopClassActions, SourceKind::ClaimDepot]);
    }

    #[test]
    fn test_build_adapters_rejects_bad_url() {
        let mut sources = SourcesFile::builtin();
        sources.sources[0].url = "not a url".to_string();
        assert!(matches!(build_adapters(&sources), Err(FinderError::Config(_))));
    }
}
