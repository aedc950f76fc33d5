//! Sitemap parsing
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents. The
//! coordinator follows an index one level deep.

use scraper::{Html, Selector};

/// Locations listed by one sitemap document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapDocument {
    /// Page URLs from `<url><loc>` entries
    pub urls: Vec<String>,
    /// Child sitemaps from `<sitemap><loc>` entries
    pub children: Vec<String>,
}

impl SitemapDocument {
    pub fn is_index(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Extracts page and child-sitemap locations from sitemap XML
///
/// Locations are trimmed; empty ones are dropped. Order follows the document.
pub fn parse_sitemap(xml: &str) -> SitemapDocument {
    let document = Html::parse_document(xml);

    SitemapDocument {
        urls: locations(&document, "url > loc"),
        children: locations(&document, "sitemap > loc"),
    }
}

fn locations(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|loc| loc.text().collect::<String>().trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}
