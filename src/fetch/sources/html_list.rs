// src/fetch/sources/html_list.rs
//! Generic HTML listing adapter.
//!
//! Every configured funding site publishes its open calls as an HTML list;
//! only the CSS selectors differ per site. One adapter parameterized by a
//! [`SourceSpec`] therefore covers all of them. Malformed individual listings
//! (no title and no link) are skipped and counted, never fatal.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::fetch::types::{FetchError, FundingSource};
use crate::record::RawRecord;

/// Static description of one funding site: where to fetch and how to pick
/// listings out of the page.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub listing_urls: &'static [&'static str],
    pub selectors: ListingSelectors,
}

/// CSS selectors for the per-site listing markup. `item` scopes one listing;
/// the rest select within it. Optional fields fall back to empty text and are
/// handled by the normalizer's sentinels.
#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub item: &'static str,
    pub title: &'static str,
    pub link: &'static str,
    pub description: Option<&'static str>,
    pub deadline: Option<&'static str>,
    pub amount: Option<&'static str>,
}

enum Mode {
    Http {
        client: reqwest::Client,
        politeness: Duration,
    },
    /// One pre-fetched HTML document per listing URL; used in tests.
    Fixture(Vec<String>),
}

pub struct HtmlListSource {
    spec: SourceSpec,
    compiled: CompiledSelectors,
    mode: Mode,
}

struct CompiledSelectors {
    item: Selector,
    title: Selector,
    link: Selector,
    description: Option<Selector>,
    deadline: Option<Selector>,
    amount: Option<Selector>,
}

fn compile(spec: &SourceSpec) -> anyhow::Result<CompiledSelectors> {
    let parse = |sel: &str| {
        Selector::parse(sel)
            .map_err(|e| anyhow::anyhow!("source `{}`: bad selector `{sel}`: {e}", spec.id))
    };
    let opt = |sel: Option<&str>| sel.map(parse).transpose();
    Ok(CompiledSelectors {
        item: parse(spec.selectors.item)?,
        title: parse(spec.selectors.title)?,
        link: parse(spec.selectors.link)?,
        description: opt(spec.selectors.description)?,
        deadline: opt(spec.selectors.deadline)?,
        amount: opt(spec.selectors.amount)?,
    })
}

impl HtmlListSource {
    pub fn from_http(
        spec: SourceSpec,
        client: reqwest::Client,
        politeness: Duration,
    ) -> anyhow::Result<Self> {
        let compiled = compile(&spec)?;
        Ok(Self {
            spec,
            compiled,
            mode: Mode::Http { client, politeness },
        })
    }

    pub fn from_fixtures(spec: SourceSpec, pages: Vec<String>) -> anyhow::Result<Self> {
        let compiled = compile(&spec)?;
        Ok(Self {
            spec,
            compiled,
            mode: Mode::Fixture(pages),
        })
    }

    /// Parse one listing page. Synchronous on purpose: `scraper::Html` is not
    /// `Send`, so it must never live across an await point.
    fn parse_listing(&self, html: &str) -> Vec<RawRecord> {
        let doc = Html::parse_document(html);
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for item in doc.select(&self.compiled.item) {
            let title = select_text(&item, &self.compiled.title);
            let href = item
                .select(&self.compiled.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default();
            let url = self.absolutize(href);

            if title.is_empty() && url.is_empty() {
                skipped += 1;
                continue;
            }

            let description = self
                .compiled
                .description
                .as_ref()
                .map(|s| select_text(&item, s))
                .unwrap_or_else(|| item.text().collect::<String>());

            out.push(RawRecord {
                source: self.spec.id.to_string(),
                source_name: String::new(),
                title,
                description,
                eligibility: String::new(),
                research_areas: String::new(),
                deadline: self
                    .compiled
                    .deadline
                    .as_ref()
                    .map(|s| select_text(&item, s))
                    .unwrap_or_default(),
                amount: self
                    .compiled
                    .amount
                    .as_ref()
                    .map(|s| select_text(&item, s))
                    .unwrap_or_default(),
                url,
                contact: String::new(),
            });
        }

        if skipped > 0 {
            warn!(source = self.spec.id, skipped, "skipped malformed listings");
        }
        debug!(source = self.spec.id, parsed = out.len(), "parsed listing page");
        out
    }

    fn absolutize(&self, href: &str) -> String {
        if href.is_empty() {
            return String::new();
        }
        match reqwest::Url::parse(self.spec.base_url).and_then(|base| base.join(href)) {
            Ok(u) => u.to_string(),
            Err(_) => href.to_string(),
        }
    }
}

fn select_text(item: &scraper::ElementRef<'_>, sel: &Selector) -> String {
    item.select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl FundingSource for HtmlListSource {
    fn id(&self) -> &str {
        self.spec.id
    }

    fn name(&self) -> &str {
        self.spec.name
    }

    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        match &self.mode {
            Mode::Fixture(pages) => {
                let mut all = Vec::new();
                for page in pages {
                    all.extend(self.parse_listing(page));
                }
                Ok(all)
            }
            Mode::Http { client, politeness } => {
                let mut all = Vec::new();
                for (i, url) in self.spec.listing_urls.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(*politeness).await;
                    }
                    let resp = client.get(*url).send().await?;
                    let status = resp.status();
                    if !status.is_success() {
                        return Err(FetchError::from_status(status.as_u16()));
                    }
                    let body = resp.text().await?;
                    all.extend(self.parse_listing(&body));
                }
                Ok(all)
            }
        }
    }
}
