// src/fetch/sources/mod.rs
pub mod catalog;
pub mod html_list;

pub use catalog::{build_sources, SOURCE_SPECS};
pub use html_list::{HtmlListSource, ListingSelectors, SourceSpec};
