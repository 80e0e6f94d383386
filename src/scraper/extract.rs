//! Selector-based article extraction.
//!
//! Pure functions over a parsed document: no network, no shared state.

use std::collections::HashSet;

use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::{FieldRule, SelectorRule};
use crate::error::{Result, ScrapeError};
use crate::models::Article;

/// Articles found on one page, plus how many cards were thrown away
#[derive(Debug, Default)]
pub struct Extraction {
    pub articles: Vec<Article>,
    /// Containers matched by any rule.
    pub containers: usize,
    /// Containers skipped for lacking a headline.
    pub dropped: usize,
}

struct CompiledField<'a> {
    selector: Selector,
    rule: &'a FieldRule,
}

struct CompiledRule<'a> {
    container: Selector,
    title: Option<CompiledField<'a>>,
    link: Option<CompiledField<'a>>,
    publisher: Option<CompiledField<'a>>,
    time: Option<CompiledField<'a>>,
    image: Option<CompiledField<'a>>,
    tags: Option<CompiledField<'a>>,
    summary: Option<CompiledField<'a>>,
}

impl<'a> CompiledRule<'a> {
    fn compile(rule: &'a SelectorRule, page_url: &Url) -> Result<Self> {
        let field = |rule: &'a Option<FieldRule>| -> Result<Option<CompiledField<'a>>> {
            rule.as_ref()
                .map(|rule| {
                    rule.selector()
                        .map(|selector| CompiledField { selector, rule })
                        .map_err(|e| ScrapeError::parse(page_url.as_str(), e.to_string()))
                })
                .transpose()
        };

        Ok(Self {
            container: rule
                .container_selector()
                .map_err(|e| ScrapeError::parse(page_url.as_str(), e.to_string()))?,
            title: field(&rule.title)?,
            link: field(&rule.link)?,
            publisher: field(&rule.publisher)?,
            time: field(&rule.time)?,
            image: field(&rule.image)?,
            tags: field(&rule.tags)?,
            summary: field(&rule.summary)?,
        })
    }
}

/// Parse `html` and extract articles from it.
///
/// An empty body is a parse failure: a real listing page is never blank.
pub fn extract_html(html: &str, rules: &[SelectorRule], page_url: &Url) -> Result<Extraction> {
    if html.trim().is_empty() {
        return Err(ScrapeError::parse(page_url.as_str(), "empty document"));
    }
    let document = Html::parse_document(html);
    extract(&document, rules, page_url)
}

/// Apply every rule in order to `document` and concatenate the results.
///
/// Within one call an article URL is emitted at most once, first rule wins.
/// Returns a parse error when no rule matched a single container.
pub fn extract(document: &Html, rules: &[SelectorRule], page_url: &Url) -> Result<Extraction> {
    let compiled = rules
        .iter()
        .map(|rule| CompiledRule::compile(rule, page_url))
        .collect::<Result<Vec<_>>>()?;

    let mut extraction = Extraction::default();
    let mut seen = HashSet::new();

    for rule in &compiled {
        for container in document.select(&rule.container) {
            extraction.containers += 1;

            let Some(article) = extract_card(container, rule, page_url) else {
                extraction.dropped += 1;
                continue;
            };
            if seen.insert(article.dedup_key().to_string()) {
                extraction.articles.push(article);
            }
        }
    }

    if extraction.containers == 0 {
        return Err(ScrapeError::parse(
            page_url.as_str(),
            "no article containers matched any selector rule",
        ));
    }

    debug!(
        url = %page_url,
        containers = extraction.containers,
        articles = extraction.articles.len(),
        dropped = extraction.dropped,
        "Extracted articles"
    );
    Ok(extraction)
}

fn extract_card(container: ElementRef<'_>, rule: &CompiledRule<'_>, page_url: &Url) -> Option<Article> {
    let headline = rule.title.as_ref().and_then(|f| first_value(container, f))?;

    let article_url = match &rule.link {
        Some(field) => first_value(container, field),
        None if container.value().name() == "a" => container.value().attr("href").map(str::to_string),
        None => None,
    }
    .and_then(|raw| resolve_url(page_url, &raw))
    .unwrap_or_default();

    let image_url = rule
        .image
        .as_ref()
        .and_then(|f| image_value(container, f))
        .and_then(|raw| resolve_url(page_url, &raw));

    Some(Article {
        headline,
        article_url,
        publisher: rule
            .publisher
            .as_ref()
            .and_then(|f| first_value(container, f))
            .unwrap_or_default(),
        source: String::new(),
        view: String::new(),
        published_time: rule.time.as_ref().and_then(|f| first_value(container, f)),
        image_url,
        tags: rule.tags.as_ref().map(|f| all_values(container, f)).unwrap_or_default(),
        summary: rule.summary.as_ref().and_then(|f| first_value(container, f)),
        scraped_at: Utc::now(),
    })
}

/// Text or attribute of a single element, whitespace collapsed.
fn element_value(element: ElementRef<'_>, attribute: Option<&str>) -> Option<String> {
    let raw = match attribute {
        Some(attr) => element.value().attr(attr)?.to_string(),
        None => element.text().collect::<Vec<_>>().join(" "),
    };
    let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    (!value.is_empty()).then_some(value)
}

/// First non-empty match of a field rule under `container`.
fn first_value(container: ElementRef<'_>, field: &CompiledField<'_>) -> Option<String> {
    container
        .select(&field.selector)
        .find_map(|el| element_value(el, field.rule.attribute.as_deref()))
}

fn all_values(container: ElementRef<'_>, field: &CompiledField<'_>) -> Vec<String> {
    let mut seen = HashSet::new();
    container
        .select(&field.selector)
        .filter_map(|el| element_value(el, field.rule.attribute.as_deref()))
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Image source, falling back to lazy-load attributes.
fn image_value(container: ElementRef<'_>, field: &CompiledField<'_>) -> Option<String> {
    container.select(&field.selector).find_map(|img| {
        field
            .rule
            .attribute
            .as_deref()
            .and_then(|attr| element_value(img, Some(attr)))
            .or_else(|| element_value(img, Some("data-src")))
            .or_else(|| element_value(img, Some("src")))
    })
}

/// Resolve against the page URL and drop the fragment.
///
/// Only http(s) results are kept; `javascript:` and `mailto:` links yield
/// `None`.
pub fn resolve_url(page_url: &Url, raw: &str) -> Option<String> {
    let mut resolved = page_url.join(raw.trim()).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
