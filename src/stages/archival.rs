//! Content archival: download every discovered page of a game.
//!
//! Pages are stored verbatim, keyed by the exact URL that was requested. A
//! page that cannot be loaded (timeout, connection error, undecodable body)
//! is logged and left out; nothing is retried and nothing escapes the game's
//! boundary, so one dead link never fails the batch.

use crate::fetch::Fetcher;
use crate::models::ArchivedContent;
use crate::policy::RefreshPolicy;
use crate::stages::Resolved;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tracing::{debug, info, instrument, warn};

/// Resolve the archived pages for one game.
///
/// # Arguments
///
/// * `title` - The game's catalog title, used for the forced check
/// * `links` - The game's discovered links, in discovery order
/// * `has_archived` - Whether the cache already holds a non-empty page map
/// * `policy` - Cache and force settings for this run
/// * `fetcher` - Client for the page requests
/// * `concurrency` - Maximum number of pages loaded at once
/// * `verbose` - Report each page load at `info` instead of `debug`
///
/// # Returns
///
/// [`Resolved::Cached`] when the cached map stands (caching on, map present,
/// game not forced). Otherwise [`Resolved::Fetched`] with a brand new map of
/// the pages that loaded; pages from an earlier pass are never merged in.
///
/// Page failures never escape this function; they are logged and skipped.
#[instrument(level = "info", skip_all, fields(%title, links = links.len()))]
pub async fn archive<F: Fetcher>(
    title: &str,
    links: &[String],
    has_archived: bool,
    policy: &RefreshPolicy,
    fetcher: &F,
    concurrency: usize,
    verbose: bool,
) -> Resolved<ArchivedContent> {
    if !policy.needs_fetch(title, has_archived) {
        debug!("Content already archived");
        return Resolved::Cached;
    }
    if has_archived {
        debug!("Discarding archived content for reload");
    }

    Resolved::Fetched(fetch_pages(links, fetcher, concurrency, verbose).await)
}

/// Fetch `links`, `concurrency` at a time. Repeated links are requested once.
pub async fn fetch_pages<F: Fetcher>(
    links: &[String],
    fetcher: &F,
    concurrency: usize,
    verbose: bool,
) -> ArchivedContent {
    let unique: Vec<&String> = links.iter().unique().collect();
    let total = unique.len();
    let results: Vec<Option<(String, String)>> = stream::iter(unique.into_iter().enumerate())
        .map(|(i, url)| async move {
            if verbose {
                info!(n = i + 1, total, %url, "Loading page");
            } else {
                debug!(n = i + 1, total, %url, "Loading page");
            }
            match fetcher.fetch_text(url).await {
                Ok(body) => Some((url.clone(), body)),
                Err(e) => {
                    warn!(error = %e, %url, "Failed to load page; skipping");
                    None
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let pages: ArchivedContent = results.into_iter().flatten().collect();
    info!(
        archived = pages.len(),
        failed = total - pages.len(),
        "Archived pages"
    );
    pages
}
