//! Link discovery: turn a game into candidate interview URLs.
//!
//! One search request is sent per game with the query
//! `"<Title>" <Developer> interview game`. The HTML result page is then
//! scraped with a best-effort heuristic:
//!
//! - every result container (`div.web-result`) is a candidate
//! - containers marked as adverts (`web-result-sponsored`) are skipped
//! - the `href` of the first primary anchor (`a.large`) is the link
//!
//! Result-page markup is not a stable contract, so containers that do not
//! match are skipped without surfacing an error.

use crate::config::Settings;
use crate::error::{ConfigError, ExtractError, FetchError};
use crate::fetch::Fetcher;
use crate::models::{EntityRecord, LinkSet};
use crate::policy::RefreshPolicy;
use crate::stages::Resolved;
use crate::utils::truncate_for_log;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

/// Compiled selectors for a search result page.
#[derive(Debug, Clone)]
pub struct ResultPageParser {
    result: Selector,
    anchor: Selector,
    sponsored_class: String,
}

impl ResultPageParser {
    pub fn new(selectors: &crate::config::Selectors) -> Result<Self, ConfigError> {
        Ok(Self {
            result: compile("selectors.result", &selectors.result)?,
            anchor: compile("selectors.anchor", &selectors.anchor)?,
            sponsored_class: selectors.sponsored_class.clone(),
        })
    }

    /// Extract result links in page order. Absolute hrefs are returned as
    /// written; relative and protocol-relative ones are resolved against
    /// `base`.
    pub fn parse(&self, html: &str, base: &Url) -> LinkSet {
        let document = Html::parse_document(html);
        let mut links = Vec::new();
        for node in document.select(&self.result) {
            if self.is_sponsored(node) {
                debug!("Skipping sponsored result");
                continue;
            }
            match self.extract(node, base) {
                Ok(Some(link)) => links.push(link),
                Ok(None) => debug!("Result has no primary anchor"),
                Err(e) => debug!(error = %e, "Skipping unusable result"),
            }
        }
        links
    }

    fn is_sponsored(&self, node: ElementRef<'_>) -> bool {
        node.value().classes().any(|c| c == self.sponsored_class)
    }

    /// `Ok(None)` when the node has no primary anchor at all; an error when
    /// the anchor is there but does not carry a usable link.
    fn extract(&self, node: ElementRef<'_>, base: &Url) -> Result<Option<String>, ExtractError> {
        let Some(anchor) = node.select(&self.anchor).next() else {
            return Ok(None);
        };
        let href = anchor
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(ExtractError::MissingHref)?;
        // Absolute links are kept exactly as written; they key the content cache.
        if Url::parse(href).is_ok() {
            return Ok(Some(href.to_string()));
        }
        let resolved = base.join(href).map_err(|source| ExtractError::BadHref {
            href: href.to_string(),
            source,
        })?;
        Ok(Some(resolved.to_string()))
    }
}

fn compile(name: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::Selector {
        name,
        selector: selector.to_string(),
    })
}

/// The search endpoint, query template, and result-page parser.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    endpoint: Url,
    hint: String,
    parser: ResultPageParser,
}

impl SearchEngine {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let endpoint =
            Url::parse(&settings.search_endpoint).map_err(|source| ConfigError::Endpoint {
                endpoint: settings.search_endpoint.clone(),
                source,
            })?;
        Ok(Self {
            endpoint,
            hint: settings.query_hint.clone(),
            parser: ResultPageParser::new(&settings.selectors)?,
        })
    }

    /// `"<Title>" <Developer> <hint>`
    pub fn query(&self, record: &EntityRecord) -> String {
        format!("\"{}\" {} {}", record.title, record.developer, self.hint)
    }

    pub fn search_url(&self, record: &EntityRecord) -> String {
        let separator = if self.endpoint.query().is_some() { '&' } else { '?' };
        format!(
            "{}{}q={}",
            self.endpoint,
            separator,
            urlencoding::encode(&self.query(record))
        )
    }

    pub fn parse(&self, html: &str) -> LinkSet {
        self.parser.parse(html, &self.endpoint)
    }
}

/// Resolve the links for one game.
///
/// # Arguments
///
/// * `record` - The game to search for
/// * `cached` - The game's links from the cache, empty when it has none
/// * `policy` - Cache and force settings for this run
/// * `engine` - Query template, endpoint, and result-page parser
/// * `fetcher` - Client for the search request
///
/// # Returns
///
/// [`Resolved::Cached`], with no network call, when `cached` is non-empty,
/// caching is on, and the game is not forced. Otherwise
/// [`Resolved::Fetched`] with the links of the result page in page order,
/// possibly empty.
///
/// # Errors
///
/// Returns the [`FetchError`] of the search request if it times out or fails
/// in transport. The request is not retried.
#[instrument(level = "info", skip_all, fields(title = %record.title))]
pub async fn discover<F: Fetcher>(
    record: &EntityRecord,
    cached: &[String],
    policy: &RefreshPolicy,
    engine: &SearchEngine,
    fetcher: &F,
) -> Result<Resolved<LinkSet>, FetchError> {
    if !policy.needs_fetch(&record.title, !cached.is_empty()) {
        debug!(count = cached.len(), "Links already cached");
        return Ok(Resolved::Cached);
    }

    let url = engine.search_url(record);
    debug!(%url, "Searching");
    let html = fetcher.fetch_text(&url).await?;
    let links = engine.parse(&html);

    if links.is_empty() {
        debug!(page = %truncate_for_log(&html, 300), "Search page yielded no results");
    }
    info!(count = links.len(), "Discovered links");
    Ok(Resolved::Fetched(links))
}
