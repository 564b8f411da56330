// src/fetch/sources/catalog.rs
//! The fixed set of Dutch/EU funding sources this tool watches, expressed as
//! selector specs for the generic HTML listing adapter. Site layouts change;
//! a stale selector degrades to an empty listing, it does not break the run.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::FetchSection;
use crate::fetch::sources::html_list::{HtmlListSource, ListingSelectors, SourceSpec};
use crate::fetch::types::FundingSource;

pub const SOURCE_SPECS: &[SourceSpec] = &[
    SourceSpec {
        id: "nwo",
        name: "Nederlandse Organisatie voor Wetenschappelijk Onderzoek",
        base_url: "https://www.nwo.nl",
        listing_urls: &["https://www.nwo.nl/calls", "https://www.nwo.nl/en/calls"],
        selectors: ListingSelectors {
            item: "article.overviewContent, div.call-item",
            title: "h2, h3",
            link: "a",
            description: Some("p"),
            deadline: Some(".deadline, time"),
            amount: None,
        },
    },
    SourceSpec {
        id: "zonmw",
        name: "ZonMw",
        base_url: "https://www.zonmw.nl",
        listing_urls: &[
            "https://www.zonmw.nl/nl/subsidies/openstaande-subsidieoproepen",
            "https://www.zonmw.nl/en/funding-opportunities",
        ],
        selectors: ListingSelectors {
            item: "div.subsidie-item, article.teaser",
            title: "h2, h3",
            link: "a",
            description: Some("p, .teaser__text"),
            deadline: Some(".deadline, .date"),
            amount: Some(".budget"),
        },
    },
    SourceSpec {
        id: "rvo",
        name: "Rijksdienst voor Ondernemend Nederland",
        base_url: "https://www.rvo.nl",
        listing_urls: &[
            "https://www.rvo.nl/subsidies-financiering",
            "https://www.rvo.nl/subsidies-financiering/innovatie",
        ],
        selectors: ListingSelectors {
            item: "div.subsidy-teaser, article",
            title: "h2, h3",
            link: "a",
            description: Some("p"),
            deadline: Some(".deadline, .sluitingsdatum"),
            amount: Some(".budget, .bedrag"),
        },
    },
    SourceSpec {
        id: "horizon_europe",
        name: "Horizon Europe (Dutch participation)",
        base_url: "https://ec.europa.eu",
        listing_urls: &[
            "https://ec.europa.eu/info/funding-tenders/opportunities/portal/screen/opportunities/topic-search",
        ],
        selectors: ListingSelectors {
            item: "eui-card, div.topic-card",
            title: ".card-title, h3",
            link: "a",
            description: Some(".card-description, p"),
            deadline: Some(".deadline-date, .deadline"),
            amount: Some(".budget"),
        },
    },
    SourceSpec {
        id: "health_holland",
        name: "Health~Holland",
        base_url: "https://www.health-holland.com",
        listing_urls: &["https://www.health-holland.com/funding"],
        selectors: ListingSelectors {
            item: "div.funding-item, article.card",
            title: "h2, h3",
            link: "a",
            description: Some("p"),
            deadline: Some(".deadline"),
            amount: Some(".budget"),
        },
    },
];

/// Build the HTTP-backed adapter set from the catalog. One shared client,
/// per-request timeout from the fetch config.
pub fn build_sources(cfg: &FetchSection) -> Result<Vec<Arc<dyn FundingSource>>> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("building http client")?;

    SOURCE_SPECS
        .iter()
        .map(|spec| {
            HtmlListSource::from_http(spec.clone(), client.clone(), cfg.request_delay())
                .map(|s| Arc::new(s) as Arc<dyn FundingSource>)
        })
        .collect()
}
