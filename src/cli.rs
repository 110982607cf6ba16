//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

/// Discover images on a site and bundle them into a single archive.
///
/// Harvester crawls a page and its same-site links one level deep, lists the
/// images it finds, and downloads a chosen set into a zip with a manifest.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl a page and print the images found as JSON
    Discover(DiscoverArgs),
    /// Download images listed in a JSON file into a zip archive
    Download(DownloadArgs),
    /// Discover images on a page, then download all of them
    Harvest(HarvestArgs),
}

/// Crawl limits that can be set per invocation.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct CrawlArgs {
    /// Stop after finding this many images (1-10000)
    #[arg(long, value_parser = RangedU64ValueParser::<usize>::new().range(1..=10_000))]
    pub max_resources: Option<usize>,

    /// Stop crawling after this many seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub max_crawl_secs: Option<u64>,

    /// Do not consult robots.txt
    #[arg(long)]
    pub no_robots: bool,
}

/// Fetch limits that can be set per invocation.
#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct FetchArgs {
    /// Maximum concurrent image downloads (1-16)
    #[arg(short = 'c', long, value_parser = RangedU64ValueParser::<usize>::new().range(1..=16))]
    pub concurrency: Option<usize>,

    /// Timeout for each image download in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub fetch_timeout_secs: Option<u64>,
}

/// Arguments of `harvester discover`.
#[derive(clap::Args, Debug)]
pub struct DiscoverArgs {
    /// Page to start from (https:// is assumed when no scheme is given)
    pub url: String,

    #[command(flatten)]
    pub crawl: CrawlArgs,
}

/// Arguments of `harvester download`.
#[derive(clap::Args, Debug)]
pub struct DownloadArgs {
    /// JSON file of discovered images, or `-` for stdin
    pub input: String,

    /// Where to write the zip archive
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Arguments of `harvester harvest`.
#[derive(clap::Args, Debug)]
pub struct HarvestArgs {
    /// Page to start from (https:// is assumed when no scheme is given)
    pub url: String,

    /// Where to write the zip archive
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub crawl: CrawlArgs,

    #[command(flatten)]
    pub fetch: FetchArgs,
}
