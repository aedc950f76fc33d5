//! CSS selector based product extraction
//!
//! Selectors come from each source's `[source.selectors]` table and are
//! compiled once when the registry is built.

use crate::config::SelectorConfig;
use crate::product::{parse_price_text, Merchant, Price, ProductRecord};
use crate::sources::SourceAdapter;
use crate::url::UrlFilter;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

const MERCHANT_NAME: &str = ".merchant-name";
const MERCHANT_PRICE: &str = ".price .amount";
const MERCHANT_LINK: &str = ".merchant-link a";

/// Extracts products from retailer pages with configured CSS selectors
pub struct SelectorAdapter {
    source_name: String,
    currency: String,
    filter: UrlFilter,
    title: Selector,
    description: Selector,
    price: Selector,
    original_price: Option<Selector>,
    brand: Selector,
    breadcrumb: Selector,
    image: Selector,
    spec_row: Selector,
    spec_key: Selector,
    spec_value: Selector,
    merchant: Selector,
    merchant_name: Selector,
    merchant_price: Selector,
    merchant_link: Selector,
    extra: Vec<(String, Selector)>,
}

impl SelectorAdapter {
    pub fn new(
        selectors: &SelectorConfig,
        filter: UrlFilter,
        source_name: &str,
        currency: &str,
    ) -> ConfigResult<Self> {
        let extra = selectors
            .extra
            .iter()
            .map(|(field, selector)| Ok((field.clone(), compile(field, selector)?)))
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            source_name: source_name.to_string(),
            currency: currency.to_string(),
            filter,
            title: compile("title", &selectors.title)?,
            description: compile("description", &selectors.description)?,
            price: compile("price", &selectors.price)?,
            original_price: selectors
                .original_price
                .as_deref()
                .map(|selector| compile("original-price", selector))
                .transpose()?,
            brand: compile("brand", &selectors.brand)?,
            breadcrumb: compile("breadcrumb", &selectors.breadcrumb)?,
            image: compile("image", &selectors.image)?,
            spec_row: compile("spec-row", &selectors.spec_row)?,
            spec_key: compile("spec-row", "th")?,
            spec_value: compile("spec-row", "td")?,
            merchant: compile("merchant", &selectors.merchant)?,
            merchant_name: compile("merchant", MERCHANT_NAME)?,
            merchant_price: compile("merchant", MERCHANT_PRICE)?,
            merchant_link: compile("merchant", MERCHANT_LINK)?,
            extra,
        })
    }

    fn merchants(&self, document: &Html, base: Option<&Url>) -> Vec<Merchant> {
        document
            .select(&self.merchant)
            .filter_map(|offer| {
                let name = first_text_in(offer, &self.merchant_name).unwrap_or_default();
                let price = first_text_in(offer, &self.merchant_price)
                    .and_then(|text| parse_price_text(&text));
                let url = offer
                    .select(&self.merchant_link)
                    .next()
                    .and_then(|link| link.value().attr("href"))
                    .and_then(|href| resolve(base, href))
                    .unwrap_or_default();

                if name.is_empty() && price.is_none() && url.is_empty() {
                    None
                } else {
                    Some(Merchant { name, price, url })
                }
            })
            .collect()
    }

    fn images(&self, document: &Html, base: Option<&Url>) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();
        for img in document.select(&self.image) {
            let src = img
                .value()
                .attr("src")
                .filter(|src| !src.trim().is_empty() && !src.starts_with("data:"))
                .or_else(|| img.value().attr("data-src"));
            if let Some(resolved) = src.and_then(|src| resolve(base, src)) {
                if !images.contains(&resolved) {
                    images.push(resolved);
                }
            }
        }
        images
    }
}

impl SourceAdapter for SelectorAdapter {
    fn accepts(&self, url: &str) -> bool {
        self.filter.accepts(url)
    }

    fn extract(&self, document: &str, url: &str) -> Option<ProductRecord> {
        let html = Html::parse_document(document);
        let base = Url::parse(url).ok();

        let title = first_text(&html, &self.title)?;
        let mut record = ProductRecord::new(url, title);
        record.source = self.source_name.clone();
        record.description = first_text(&html, &self.description).unwrap_or_default();
        record.brand = first_text(&html, &self.brand).unwrap_or_default();

        let crumbs: Vec<String> = html
            .select(&self.breadcrumb)
            .map(element_text)
            .filter(|crumb| !crumb.is_empty())
            .collect();
        if crumbs.len() > 1 {
            record.category = crumbs[crumbs.len() - 2].clone();
        }

        record.images = self.images(&html, base.as_ref());

        for row in html.select(&self.spec_row) {
            let key = first_text_in(row, &self.spec_key);
            let value = first_text_in(row, &self.spec_value);
            if let (Some(key), Some(value)) = (key, value) {
                record.specifications.insert(key, value);
            }
        }

        record.merchants = self.merchants(&html, base.as_ref());

        let current = first_text(&html, &self.price)
            .and_then(|text| parse_price_text(&text))
            .or_else(|| record.lowest_merchant_price());
        let original = self
            .original_price
            .as_ref()
            .and_then(|selector| first_text(&html, selector))
            .and_then(|text| parse_price_text(&text));
        record.price =
            current.map(|amount| Price::new(amount, self.currency.as_str()).with_original(original));

        for (field, selector) in &self.extra {
            if let Some(text) = first_text(&html, selector) {
                record.extra.insert(field.clone(), Value::String(text));
            }
        }

        Some(record)
    }
}

fn compile(field: &str, selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: selector.to_string(),
    })
}

/// Element text with whitespace runs collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn first_text_in(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Resolves `href` against the page URL, keeping only http(s) results
fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("data:") {
        return None;
    }

    let resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
