use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use super::{collapse_whitespace, element_text, extract_amount, first_href, raw_text, resolve_claim_url, SourceAdapter};
use crate::types::{Candidate, Deadline, ProofRequirement, RawBlock, Settlement, SourceKind};

pub const DEFAULT_URL: &str =
    "https://www.lawsuitupdatecenter.com/no-proof-class-action-lawsuits-that-paid-money-recently.html";

/// Lawsuit Update Center's no-proof table. The whole page is a no-proof
/// list, so its heading is carried into every row as context. Rows rarely
/// link out; those that don't are claimed through the listing page itself.
pub struct LawsuitUpdateCenter {
    listing_url: Url,
}

impl LawsuitUpdateCenter {
    pub fn new(listing_url: Url) -> Self {
        Self { listing_url }
    }
}

#[async_trait]
impl SourceAdapter for LawsuitUpdateCenter {
    fn kind(&self) -> SourceKind {
        SourceKind::LawsuitUpdateCenter
    }

    fn listing_url(&self) -> &Url {
        &self.listing_url
    }

    fn split_blocks(&self, html: &str, page_url: &Url) -> Vec<RawBlock> {
        let document = Html::parse_document(html);

        let context = Selector::parse("h1")
            .ok()
            .and_then(|sel| document.select(&sel).next().map(|h| element_text(&h)))
            .or_else(|| {
                Selector::parse("title")
                    .ok()
                    .and_then(|sel| document.select(&sel).next().map(|t| element_text(&t)))
            })
            .filter(|c| !c.is_empty());

        let (Ok(table_sel), Ok(row_sel), Ok(th_sel)) =
            (Selector::parse("table"), Selector::parse("tr"), Selector::parse("th"))
        else {
            return vec![];
        };

        let Some(table) = document.select(&table_sel).next() else {
            return vec![];
        };

        let has_th_header = table.select(&th_sel).next().is_some();

        table
            .select(&row_sel)
            .enumerate()
            // Header is either a <th> row or, on bare tables, the first row
            .filter(|(i, row)| {
                if has_th_header {
                    row.select(&th_sel).next().is_none()
                } else {
                    *i > 0
                }
            })
            // Rows only parse inside a table
            .map(|(_, row)| RawBlock {
                html: format!("<table><tbody>{}</tbody></table>", row.html()),
                context: context.clone(),
                page_url: page_url.clone(),
            })
            .collect()
    }

    fn parse(&self, block: &RawBlock) -> Option<Candidate> {
        let fragment = Html::parse_fragment(&block.html);
        let row = fragment.root_element();
        let cell_sel = Selector::parse("td").ok()?;

        let cells: Vec<String> = row.select(&cell_sel).map(|c| element_text(&c)).collect();
        if cells.len() < 2 {
            return None;
        }

        let title = collapse_whitespace(&cells[0]);
        if title.is_empty() {
            return None;
        }

        let claim_url = match first_href(&row, &["a[href]"]) {
            Some(href) => resolve_claim_url(&block.page_url, &href)?,
            None => block.page_url.clone(),
        };

        let row_text = element_text(&row);
        let amount = cells
            .get(2)
            .filter(|a| !a.is_empty())
            .cloned()
            .or_else(|| extract_amount(&row_text));

        Some(Candidate {
            settlement: Settlement {
                title,
                source: self.kind(),
                deadline: Deadline::parse(&cells[1]),
                amount,
                proof_required: ProofRequirement::Unknown,
                claim_url,
            },
            raw_text: raw_text(block.context.as_deref(), &row_text),
        })
    }
}
