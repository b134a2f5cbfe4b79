//! Batch driver for the two stages.
//!
//! The pipeline owns the catalog, the search engine, one fetcher per timeout
//! profile, and the two cache stores. Each stage run follows the same cycle:
//!
//! 1. **Load** the stage's cache document (unless caching is off)
//! 2. **Resolve** every entity, `entity_concurrency` at a time
//! 3. **Write back** the whole document (unless write-back is off)
//!
//! An entity's result is applied to the in-memory document in one assignment
//! once all of its requests are done, so a checkpoint or a save after
//! cancellation only ever sees whole entities.
//!
//! # Cancellation
//!
//! Cancelling the pipeline's token stops scheduling: queued entities are
//! dropped, in-flight ones are abandoned, and everything already resolved is
//! still written back.

use crate::catalog::Catalog;
use crate::config::Settings;
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::models::{ContentCache, EntityRecord, LinkCache, LinkEntry, LinkSet};
use crate::policy::RefreshPolicy;
use crate::stages::Resolved;
use crate::stages::archival::archive;
use crate::stages::discovery::{SearchEngine, discover};
use crate::store::Store;
use crate::utils::percent;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashSet;
use std::pin::pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Options for one stage run.
#[derive(Debug, Clone)]
pub struct StageOptions {
    /// Read the existing cache and skip entities that already have results.
    pub use_cache: bool,
    /// Save the cache document after the pass.
    pub write_back: bool,
    /// Report per-entity progress at `info` instead of `debug`.
    pub verbose: bool,
    /// Return an existing cache document as is and skip the stage.
    pub use_file: bool,
    /// Titles to refetch even when cached.
    pub force: Vec<String>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            write_back: true,
            verbose: false,
            use_file: false,
            force: Vec::new(),
        }
    }
}

impl StageOptions {
    fn policy(&self) -> RefreshPolicy {
        RefreshPolicy::new(self.use_cache, self.force.iter().cloned())
    }

    /// Forced titles that match none of the `scheduled` titles.
    fn unscheduled_forced<'a>(&'a self, scheduled: &HashSet<&str>) -> Vec<&'a str> {
        self.force
            .iter()
            .map(String::as_str)
            .filter(|title| !scheduled.contains(title))
            .collect()
    }

    fn warn_unscheduled_forced(&self, scheduled: &HashSet<&str>) {
        for title in self.unscheduled_forced(scheduled) {
            warn!(%title, "Forced title matches no game; ignoring");
        }
    }
}

/// Counters for one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Entities scheduled.
    pub total: usize,
    /// Entities whose cached result was kept.
    pub cached: usize,
    /// Entities resolved from the network.
    pub fetched: usize,
    /// Entities whose search request failed (discovery only).
    pub failed_entities: usize,
    /// Pages that could not be loaded (archival only).
    pub failed_pages: usize,
    /// True when the run was cut short by cancellation.
    pub cancelled: bool,
    /// True when the cache was returned verbatim without running the stage.
    pub from_file: bool,
}

/// Result of a stage run: the full cache document and what happened.
#[derive(Debug, Clone)]
pub struct StageRun<T> {
    pub cache: T,
    pub report: StageReport,
}

/// Search and content fetchers; they differ only in their timeouts.
#[derive(Debug, Clone)]
pub struct Fetchers<F> {
    pub search: F,
    pub content: F,
}

/// The link cache and content cache stores.
#[derive(Debug, Clone)]
pub struct Stores<L, C> {
    pub links: L,
    pub content: C,
}

pub struct Pipeline<F, L, C> {
    catalog: Catalog,
    engine: SearchEngine,
    fetchers: Fetchers<F>,
    stores: Stores<L, C>,
    entity_concurrency: usize,
    url_concurrency: usize,
    checkpoint_interval: Option<usize>,
    cancel: CancellationToken,
}

impl<F, L, C> Pipeline<F, L, C>
where
    F: Fetcher,
    L: Store<LinkCache>,
    C: Store<ContentCache>,
{
    pub fn new(
        catalog: Catalog,
        engine: SearchEngine,
        fetchers: Fetchers<F>,
        stores: Stores<L, C>,
        settings: &Settings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            engine,
            fetchers,
            stores,
            entity_concurrency: settings.entity_concurrency.max(1),
            url_concurrency: settings.url_concurrency.max(1),
            checkpoint_interval: settings.checkpoint_interval,
            cancel,
        }
    }

    /// Discover links for every entity and return the link cache.
    ///
    /// Catalog entities missing from the cache are added with no links;
    /// cached entities no longer in the catalog are kept as they are. A
    /// failed search leaves the entity's previous links (usually none) in
    /// place so the next cached run retries it.
    #[instrument(
        level = "info",
        skip_all,
        fields(use_cache = opts.use_cache, forced = opts.force.len())
    )]
    pub async fn discover_links(
        &self,
        opts: &StageOptions,
    ) -> Result<StageRun<LinkCache>, PipelineError> {
        let loaded = if opts.use_cache || opts.use_file {
            self.stores.links.load().await?
        } else {
            None
        };
        if opts.use_file {
            if let Some(cache) = loaded {
                info!(entities = cache.len(), "Using link cache as is");
                return Ok(StageRun {
                    report: StageReport {
                        total: cache.len(),
                        cached: cache.len(),
                        from_file: true,
                        ..StageReport::default()
                    },
                    cache,
                });
            }
        }

        let mut cache = loaded.unwrap_or_default();
        for record in self.catalog.iter() {
            cache
                .entry(record.title.clone())
                .or_insert_with(|| LinkEntry::new(record.clone()));
        }

        // Catalog order first, then cached entities the catalog no longer has.
        let jobs: Vec<(EntityRecord, LinkSet)> = self
            .catalog
            .iter()
            .map(|record| record.title.as_str())
            .chain(
                cache
                    .keys()
                    .map(String::as_str)
                    .filter(|title| self.catalog.get(title).is_none()),
            )
            .filter_map(|title| cache.get(title))
            .map(|entry| (entry.record.clone(), entry.links.clone()))
            .collect();

        let scheduled: HashSet<&str> = jobs.iter().map(|(r, _)| r.title.as_str()).collect();
        opts.warn_unscheduled_forced(&scheduled);

        let policy = opts.policy();
        let mut report = StageReport {
            total: jobs.len(),
            ..StageReport::default()
        };
        if opts.verbose {
            info!(entities = report.total, "Compiling a list of URLs");
        }

        let results = stream::iter(jobs)
            .map(|(record, cached)| {
                let policy = &policy;
                async move {
                    let result =
                        discover(&record, &cached, policy, &self.engine, &self.fetchers.search)
                            .await;
                    (record.title, result)
                }
            })
            .buffer_unordered(self.entity_concurrency)
            .take_until(self.cancel.cancelled());
        let mut results = pin!(results);

        let mut done = 0;
        while let Some((title, result)) = results.next().await {
            done += 1;
            let progress = percent(done, report.total);
            match result {
                Ok(Resolved::Cached) => {
                    report.cached += 1;
                    let count = cache.get(&title).map_or(0, |e| e.links.len());
                    if opts.verbose {
                        info!(progress, %title, count, "Links already cached");
                    } else {
                        debug!(progress, %title, count, "Links already cached");
                    }
                }
                Ok(Resolved::Fetched(links)) => {
                    report.fetched += 1;
                    let count = links.len();
                    if let Some(entry) = cache.get_mut(&title) {
                        entry.links = links;
                    }
                    if opts.verbose {
                        info!(progress, %title, count, "Scraped links");
                    } else {
                        debug!(progress, %title, count, "Scraped links");
                    }
                    self.checkpoint(&self.stores.links, &cache, opts, report.fetched)
                        .await?;
                }
                Err(e) => {
                    report.failed_entities += 1;
                    warn!(progress, %title, error = %e, "Search failed; will retry on next run");
                }
            }
        }
        report.cancelled = done < report.total;

        self.finish("discovery", &self.stores.links, &cache, opts, &report)
            .await?;
        Ok(StageRun { cache, report })
    }

    /// Archive the pages of every entity and return the content cache.
    ///
    /// Links come from a default discovery pass first (cache on, write-back
    /// on, nothing forced), so entities without links get them before their
    /// pages are fetched.
    #[instrument(
        level = "info",
        skip_all,
        fields(use_cache = opts.use_cache, forced = opts.force.len())
    )]
    pub async fn archive_content(
        &self,
        opts: &StageOptions,
    ) -> Result<StageRun<ContentCache>, PipelineError> {
        let loaded = if opts.use_cache || opts.use_file {
            self.stores.content.load().await?
        } else {
            None
        };
        if opts.use_file {
            if let Some(cache) = loaded {
                info!(entities = cache.len(), "Using content cache as is");
                return Ok(StageRun {
                    report: StageReport {
                        total: cache.len(),
                        cached: cache.len(),
                        from_file: true,
                        ..StageReport::default()
                    },
                    cache,
                });
            }
        }
        let mut content = loaded.unwrap_or_default();

        let links = self.discover_links(&StageOptions::default()).await?.cache;

        let jobs: Vec<(String, LinkSet, bool)> = links
            .into_iter()
            .map(|(title, entry)| {
                let has_archived = content.get(&title).is_some_and(|pages| !pages.is_empty());
                (title, entry.links, has_archived)
            })
            .collect();

        let scheduled: HashSet<&str> = jobs.iter().map(|(t, _, _)| t.as_str()).collect();
        opts.warn_unscheduled_forced(&scheduled);

        let policy = opts.policy();
        let mut report = StageReport {
            total: jobs.len(),
            ..StageReport::default()
        };
        if opts.verbose {
            info!(entities = report.total, "Scraping all the URLs");
        }

        let results = stream::iter(jobs)
            .map(|(title, links, has_archived)| {
                let policy = &policy;
                async move {
                    let requested = links.iter().unique().count();
                    let resolved = archive(
                        &title,
                        &links,
                        has_archived,
                        policy,
                        &self.fetchers.content,
                        self.url_concurrency,
                        opts.verbose,
                    )
                    .await;
                    (title, requested, resolved)
                }
            })
            .buffer_unordered(self.entity_concurrency)
            .take_until(self.cancel.cancelled());
        let mut results = pin!(results);

        let mut done = 0;
        while let Some((title, requested, resolved)) = results.next().await {
            done += 1;
            let progress = percent(done, report.total);
            match resolved {
                Resolved::Cached => {
                    report.cached += 1;
                    if opts.verbose {
                        info!(progress, %title, "Skipping, already has content");
                    } else {
                        debug!(progress, %title, "Skipping, already has content");
                    }
                }
                Resolved::Fetched(pages) => {
                    report.fetched += 1;
                    report.failed_pages += requested - pages.len();
                    let count = pages.len();
                    content.insert(title.clone(), pages);
                    if opts.verbose {
                        info!(progress, %title, count, requested, "Archived pages");
                    } else {
                        debug!(progress, %title, count, requested, "Archived pages");
                    }
                    self.checkpoint(&self.stores.content, &content, opts, report.fetched)
                        .await?;
                }
            }
        }
        report.cancelled = done < report.total;

        self.finish("archival", &self.stores.content, &content, opts, &report)
            .await?;
        Ok(StageRun {
            cache: content,
            report,
        })
    }

    /// Save mid-run every `checkpoint_interval` freshly resolved entities.
    async fn checkpoint<T, S: Store<T>>(
        &self,
        store: &S,
        value: &T,
        opts: &StageOptions,
        fetched: usize,
    ) -> Result<(), PipelineError> {
        match self.checkpoint_interval {
            Some(every) if opts.write_back && every > 0 && fetched % every == 0 => {
                debug!(fetched, "Checkpointing cache");
                store.save(value).await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn finish<T, S: Store<T>>(
        &self,
        stage: &'static str,
        store: &S,
        value: &T,
        opts: &StageOptions,
        report: &StageReport,
    ) -> Result<(), PipelineError> {
        if report.cancelled {
            let resolved = report.cached + report.fetched + report.failed_entities;
            warn!(
                stage,
                remaining = report.total - resolved,
                "Run cancelled; keeping completed entities"
            );
        }
        if opts.write_back {
            store.save(value).await?;
        }
        info!(
            stage,
            total = report.total,
            cached = report.cached,
            fetched = report.fetched,
            failed_entities = report.failed_entities,
            failed_pages = report.failed_pages,
            cancelled = report.cancelled,
            "Stage complete"
        );
        Ok(())
    }
}
