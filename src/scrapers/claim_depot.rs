use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{element_text, extract_amount, first_href, first_text, raw_text, resolve_claim_url, SourceAdapter};
use crate::types::{Candidate, Deadline, ProofRequirement, RawBlock, Settlement, SourceKind};

pub const DEFAULT_URL: &str = "https://www.claimdepot.com/settlements";

/// Claim Depot settlement cards. Proof status is shown as a tag
/// (`span.no-proof-tag` / `span.proof-tag`) inside the card.
pub struct ClaimDepot {
    listing_url: Url,
}

impl ClaimDepot {
    pub fn new(listing_url: Url) -> Self {
        Self { listing_url }
    }
}

#[async_trait]
impl SourceAdapter for ClaimDepot {
    fn kind(&self) -> SourceKind {
        SourceKind::ClaimDepot
    }

    fn listing_url(&self) -> &Url {
        &self.listing_url
    }

    fn split_blocks(&self, html: &str, page_url: &Url) -> Vec<RawBlock> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("div.settlement-card") else {
            return vec![];
        };

        document
            .select(&selector)
            .map(|card| RawBlock {
                html: card.html(),
                context: None,
                page_url: page_url.clone(),
            })
            .collect()
    }

    fn parse(&self, block: &RawBlock) -> Option<Candidate> {
        let fragment = Html::parse_fragment(&block.html);
        let card = fragment.root_element();

        let title = first_text(&card, &["h3.settlement-title", ".settlement-title", "h3", "h2"])?;
        let href = first_href(&card, &["a.settlement-link", ".settlement-title a", "a[href]"])?;
        let claim_url = resolve_claim_url(&block.page_url, &href)?;

        let deadline = first_text(&card, &["div.deadline", ".deadline"]).and_then(|d| Deadline::parse(&d));
        let card_text = element_text(&card);
        let amount = first_text(&card, &[".payout", ".settlement-amount"]).or_else(|| extract_amount(&card_text));

        // Tags first so they are read even when the description is long
        let tags: Vec<String> = Selector::parse("span.no-proof-tag, span.proof-tag, span.tag")
            .map(|sel| card.select(&sel).map(|t| element_text(&t)).collect())
            .unwrap_or_default();
        let body = if tags.is_empty() {
            card_text
        } else {
            format!("{}\n{}", tags.join(" | "), card_text)
        };

        Some(Candidate {
            settlement: Settlement {
                title,
                source: self.kind(),
                deadline,
                amount,
                proof_required: ProofRequirement::Unknown,
                claim_url,
            },
            raw_text: raw_text(block.context.as_deref(), &body),
        })
    }
}
