use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{
    element_text, extract_amount, first_href, first_text, raw_text, resolve_claim_url, SourceAdapter,
};
use crate::types::{Candidate, Deadline, ProofRequirement, RawBlock, Settlement, SourceKind};

pub const DEFAULT_URL: &str =
    "https://topclassactions.com/category/lawsuit-settlements/open-lawsuit-settlements/";

/// Open settlements listing on Top Class Actions. One `article` card per
/// settlement; eligibility wording lives in the card description.
pub struct TopClassActions {
    listing_url: Url,
}

impl TopClassActions {
    pub fn new(listing_url: Url) -> Self {
        Self { listing_url }
    }
}

#[async_trait]
impl SourceAdapter for TopClassActions {
    fn kind(&self) -> SourceKind {
        SourceKind::TopClassActions
    }

    fn listing_url(&self) -> &Url {
        &self.listing_url
    }

    fn split_blocks(&self, html: &str, page_url: &Url) -> Vec<RawBlock> {
        let document = Html::parse_document(html);
        let card_selectors = ["article.settlement-card", "article.post", "article"];

        for selector_str in &card_selectors {
            if let Ok(selector) = Selector::parse(selector_str) {
                let blocks: Vec<RawBlock> = document
                    .select(&selector)
                    .map(|card| RawBlock {
                        html: card.html(),
                        context: None,
                        page_url: page_url.clone(),
                    })
                    .collect();

                if !blocks.is_empty() {
                    return blocks;
                }
            }
        }

        vec![]
    }

    fn parse(&self, block: &RawBlock) -> Option<Candidate> {
        let fragment = Html::parse_fragment(&block.html);
        let card = fragment.root_element();

        let title = first_text(&card, &["h2.settlement-title", ".settlement-title", ".entry-title", "h2", "h3"])?;
        let href = first_href(
            &card,
            &[
                "a.settlement-link",
                ".settlement-title a",
                ".entry-title a",
                "h2 a",
                "h3 a",
                "a[href]",
            ],
        )?;
        let claim_url = resolve_claim_url(&block.page_url, &href)?;

        let description = first_text(&card, &[".settlement-description", ".entry-summary", "p"]).unwrap_or_default();
        let deadline = first_text(&card, &[".settlement-deadline", ".deadline"]).and_then(|d| Deadline::parse(&d));
        let amount = first_text(&card, &[".settlement-amount", ".payout"])
            .or_else(|| extract_amount(&description));

        Some(Candidate {
            settlement: Settlement {
                title,
                source: self.kind(),
                deadline,
                amount,
                proof_required: ProofRequirement::Unknown,
                claim_url,
            },
            raw_text: raw_text(block.context.as_deref(), &element_text(&card)),
        })
    }
}
