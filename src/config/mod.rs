//! Declarative site configuration.
//!
//! A site list describes, per news source, where to fetch listing pages and
//! how to find article cards on them. Nothing in here touches the network.
//!
//! ```yaml
//! sites:
//!   - name: example-news
//!     url: https://news.example.com/
//!     multi_view: true
//!     views:
//!       - { label: top, suffix: "" }
//!       - { label: latest, suffix: "?type=latest" }
//!     selectors:
//!       - container_tag: article
//!         container_class: story-card
//!         title: { tag: h2 }
//!         link: { tag: a, attribute: href }
//! ```

use std::collections::HashSet;
use std::path::Path;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, ScrapeError};

/// One configured news source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Unique identifier, also used as `Article::source`.
    pub name: String,
    /// Base URL of the listing page.
    pub url: String,
    #[serde(default)]
    pub multi_view: bool,
    /// Alternate listings of the same site, in scrape order.
    #[serde(default)]
    pub views: Vec<ViewConfig>,
    /// Card layouts, applied in order against every fetched page.
    #[serde(default)]
    pub selectors: Vec<SelectorRule>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Disabled sites are skipped without a single request.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A view label and the suffix appended to the site URL to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub label: String,
    #[serde(default)]
    pub suffix: String,
}

/// How to find one article card and its fields within a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorRule {
    pub container_tag: String,
    #[serde(default)]
    pub container_class: Option<String>,
    #[serde(default)]
    pub title: Option<FieldRule>,
    #[serde(default)]
    pub link: Option<FieldRule>,
    #[serde(default)]
    pub publisher: Option<FieldRule>,
    #[serde(default)]
    pub time: Option<FieldRule>,
    #[serde(default)]
    pub image: Option<FieldRule>,
    #[serde(default)]
    pub tags: Option<FieldRule>,
    #[serde(default)]
    pub summary: Option<FieldRule>,
}

/// Locates a descendant of the container and reads its text, or `attribute`
/// when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub tag: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
}

impl FieldRule {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: None,
            attribute: None,
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.attribute = Some(attribute.to_string());
        self
    }

    pub fn selector(&self) -> Result<Selector> {
        css_selector(&self.tag, self.class.as_deref())
    }
}

impl SelectorRule {
    pub fn new(container_tag: &str, container_class: Option<&str>) -> Self {
        Self {
            container_tag: container_tag.to_string(),
            container_class: container_class.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn container_selector(&self) -> Result<Selector> {
        css_selector(&self.container_tag, self.container_class.as_deref())
    }

    /// All field rules paired with their name, for validation and logging.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldRule)> {
        [
            ("title", &self.title),
            ("link", &self.link),
            ("publisher", &self.publisher),
            ("time", &self.time),
            ("image", &self.image),
            ("tags", &self.tags),
            ("summary", &self.summary),
        ]
        .into_iter()
        .filter_map(|(name, rule)| rule.as_ref().map(|r| (name, r)))
    }
}

/// Build a CSS selector from a tag and a whitespace separated class list.
///
/// Classes are matched as words of the `class` attribute, so names that are
/// not CSS identifiers (`lg:grid`, `w-1/2`, `2col`) work as written.
pub fn css_selector(tag: &str, class: Option<&str>) -> Result<Selector> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Err(ScrapeError::config("selector tag must not be empty"));
    }

    let mut css = if tag == "*" && class.is_some_and(|c| !c.trim().is_empty()) {
        String::new()
    } else {
        tag.to_string()
    };
    for class in class.unwrap_or_default().split_whitespace() {
        css.push_str("[class~=\"");
        for ch in class.chars() {
            if matches!(ch, '"' | '\\') {
                css.push('\\');
            }
            css.push(ch);
        }
        css.push_str("\"]");
    }

    Selector::parse(&css)
        .map_err(|e| ScrapeError::config(format!("invalid selector '{css}': {e:?}")))
}

/// Prefix a selector error with where it was configured.
fn rule_error(site: &str, context: &str, err: ScrapeError) -> ScrapeError {
    match err {
        ScrapeError::Config(message) => ScrapeError::config(format!("site '{site}' {context}: {message}")),
        other => other,
    }
}

impl SiteConfig {
    /// Check the invariants a run relies on.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScrapeError::config("site name must not be empty"));
        }
        let site = &self.name;

        Url::parse(&self.url)
            .map_err(|e| ScrapeError::config(format!("site '{site}': invalid url '{}': {e}", self.url)))?;

        if self.multi_view {
            if self.views.is_empty() {
                return Err(ScrapeError::config(format!(
                    "site '{site}': multi_view is set but no views are configured"
                )));
            }
            let mut labels = HashSet::new();
            for view in &self.views {
                if view.label.trim().is_empty() {
                    return Err(ScrapeError::config(format!("site '{site}': empty view label")));
                }
                if !labels.insert(view.label.as_str()) {
                    return Err(ScrapeError::config(format!(
                        "site '{site}': duplicate view label '{}'",
                        view.label
                    )));
                }
            }
        }

        if self.selectors.is_empty() {
            return Err(ScrapeError::config(format!("site '{site}': no selector rules")));
        }
        for (index, rule) in self.selectors.iter().enumerate() {
            rule.container_selector()
                .map_err(|e| rule_error(site, &format!("rule {index} container"), e))?;
            for (field, field_rule) in rule.fields() {
                field_rule
                    .selector()
                    .map_err(|e| rule_error(site, &format!("rule {index} {field}"), e))?;
            }
        }

        Ok(())
    }
}

/// Validate a whole site list.
///
/// Every entry needs a unique name. URL, views and selectors are only
/// checked for enabled sites, so a disabled entry may hold placeholders.
pub fn validate_sites(sites: &[SiteConfig]) -> Result<()> {
    let mut names = HashSet::new();
    for site in sites {
        if site.name.trim().is_empty() {
            return Err(ScrapeError::config("site name must not be empty"));
        }
        if !names.insert(site.name.as_str()) {
            return Err(ScrapeError::config(format!("duplicate site name '{}'", site.name)));
        }
        if site.enabled {
            site.validate()?;
        }
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SiteDocument {
    List(Vec<SiteConfig>),
    Wrapped { sites: Vec<SiteConfig> },
}

impl SiteDocument {
    fn into_sites(self) -> Vec<SiteConfig> {
        match self {
            Self::List(sites) | Self::Wrapped { sites } => sites,
        }
    }
}

/// On-disk format of a site list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Guess from the file extension; anything unknown is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse and validate a site list document.
pub fn parse_sites(contents: &str, format: ConfigFormat) -> Result<Vec<SiteConfig>> {
    let document: SiteDocument = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents)
            .map_err(|e| ScrapeError::config(format!("invalid YAML site list: {e}")))?,
        ConfigFormat::Json => serde_json::from_str(contents)
            .map_err(|e| ScrapeError::config(format!("invalid JSON site list: {e}")))?,
    };
    let sites = document.into_sites();
    validate_sites(&sites)?;
    debug!(count = sites.len(), "Parsed site list");
    Ok(sites)
}

/// Read a site list from disk.
pub async fn load_sites(path: &Path) -> Result<Vec<SiteConfig>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScrapeError::config(format!("cannot read {}: {e}", path.display())))?;
    let sites = parse_sites(&contents, ConfigFormat::from_path(path))?;
    info!(
        path = %path.display(),
        total = sites.len(),
        enabled = sites.iter().filter(|s| s.enabled).count(),
        "Loaded site configuration"
    );
    Ok(sites)
}
