//! Record extractors
//!
//! A `RecordExtractor` turns the markup of one detail page into a flat JSON
//! object. The default `PageSummaryExtractor` collects:
//! - The page title and first `<h1>`
//! - The meta description
//! - The canonical URL
//! - The number of links leaving the page's host

use crate::url::check_href;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use url::Url;

/// A JSON object produced for one page
pub type Record = Map<String, Value>;

/// Transforms page markup into a structured record
pub trait RecordExtractor: Send + Sync {
    /// Extracts a record from `html`, served at `page_url`
    fn extract(&self, html: &str, page_url: &Url) -> anyhow::Result<Record>;
}

/// Generic extractor summarising a page's metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSummaryExtractor;

impl RecordExtractor for PageSummaryExtractor {
    fn extract(&self, html: &str, page_url: &Url) -> anyhow::Result<Record> {
        let document = Html::parse_document(html);
        let mut record = Record::new();

        record.insert("title".to_string(), text_of(&document, "title").into());
        record.insert("heading".to_string(), text_of(&document, "h1").into());
        record.insert(
            "description".to_string(),
            attr_of(&document, "meta[name='description']", "content").into(),
        );
        record.insert(
            "canonical_url".to_string(),
            attr_of(&document, "link[rel='canonical']", "href")
                .and_then(|href| page_url.join(&href).ok())
                .map(|url| url.to_string())
                .into(),
        );
        record.insert(
            "outbound_links".to_string(),
            count_outbound_links(&document, page_url).into(),
        );

        Ok(record)
    }
}

/// Trimmed text of the first element matching `selector`
fn text_of(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Trimmed attribute of the first element matching `selector`
fn attr_of(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .find_map(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Counts `<a href>` links resolving to an http(s) URL on another host
fn count_outbound_links(document: &Html, page_url: &Url) -> usize {
    let Ok(selector) = Selector::parse("a[href]") else {
        return 0;
    };

    document
        .select(&selector)
        .filter_map(|element| check_href(element.value().attr("href")).ok())
        .filter_map(|href| page_url.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| url.host_str() != page_url.host_str())
        .count()
}
