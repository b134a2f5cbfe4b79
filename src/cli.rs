//! Command-line interface definitions.
//!
//! Each pipeline operation is a subcommand. Global options override the
//! matching keys of the YAML config file.

use crate::pipeline::StageOptions;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Print the normalized catalog
/// interview_scraper catalog
///
/// # Discover links, showing progress
/// interview_scraper -v discover
///
/// # Re-archive two games, ignoring their cached pages
/// interview_scraper archive -f NetHack -f "Dark Cloud 2"
///
/// # Dump the existing content cache without touching the network
/// interview_scraper archive --use-file
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a config.yaml file
    #[arg(short, long, global = true, env = "INTERVIEW_SCRAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// CSV catalog to use instead of the bundled one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Directory holding the cache files
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Number of games resolved at the same time
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Report per-game progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the normalized catalog as JSON
    Catalog,
    /// Search for interview links for every game
    Discover(StageArgs),
    /// Download the pages behind every discovered link
    Archive(StageArgs),
}

/// Flags shared by both stages.
#[derive(Args, Debug, Clone, Default)]
pub struct StageArgs {
    /// Ignore the existing cache and fetch everything
    #[arg(long)]
    pub no_cache: bool,

    /// Do not write the cache back after the run
    #[arg(long)]
    pub no_write: bool,

    /// Print the existing cache file and skip the stage
    #[arg(long)]
    pub use_file: bool,

    /// Refetch this game even when it is cached (repeatable)
    #[arg(short, long = "force", value_name = "TITLE")]
    pub force: Vec<String>,
}

impl StageArgs {
    pub fn options(&self, verbose: bool) -> StageOptions {
        StageOptions {
            use_cache: !self.no_cache,
            write_back: !self.no_write,
            verbose,
            use_file: self.use_file,
            force: self.force.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_command() {
        let cli = Cli::parse_from(["interview_scraper", "catalog"]);
        assert!(matches!(cli.command, Command::Catalog));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_discover_defaults() {
        let cli = Cli::parse_from(["interview_scraper", "discover"]);
        let Command::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        let opts = args.options(cli.verbose);
        assert!(opts.use_cache);
        assert!(opts.write_back);
        assert!(!opts.use_file);
        assert!(opts.force.is_empty());
    }

    #[test]
    fn test_archive_with_forced_titles() {
        let cli = Cli::parse_from([
            "interview_scraper",
            "archive",
            "-f",
            "NetHack",
            "--force",
            "Dark Cloud 2",
            "--no-write",
            "-v",
        ]);
        assert!(cli.verbose);
        let Command::Archive(args) = cli.command else {
            panic!("expected archive");
        };
        assert_eq!(args.force, vec!["NetHack", "Dark Cloud 2"]);
        assert!(!args.options(true).write_back);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "interview_scraper",
            "discover",
            "--cache-dir",
            "/tmp/cache",
            "--concurrency",
            "8",
            "--no-cache",
        ]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(cli.concurrency, Some(8));
        let Command::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert!(!args.options(false).use_cache);
    }
}
