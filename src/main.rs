//! CLI entry point for the harvester tool.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::Parser;
use harvester_core::ResourceDescriptor;
use harvester_core::discovery::{CrawlConfig, DiscoveryEngine};
use harvester_core::download::{
    BulkDownloader, DownloadLimits, DownloadOutcome, HttpClient,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::{FileConfig, load_config, resolve_crawl_config, resolve_download_limits};
use cli::{Args, Command};
use progress::DownloadProgress;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = load_config(args.config.as_deref())?;

    init_tracing(&args, loaded.config.as_ref());
    debug!(?args, "CLI arguments parsed");
    if let Some(path) = loaded.path.as_deref() {
        debug!(
            path = %path.display(),
            loaded = loaded.loaded_from_file(),
            "config file"
        );
    }

    let file = loaded.config.as_ref();
    let client = HttpClient::new();
    let request_id = new_request_id();

    match &args.command {
        Command::Discover(cmd) => {
            let crawl = resolve_crawl_config(file, &cmd.crawl);
            let resources = discover(&client, crawl, &cmd.url, &request_id).await?;
            println!("{}", serde_json::to_string_pretty(&resources)?);
        }
        Command::Download(cmd) => {
            let resources = read_descriptors(&cmd.input)?;
            let limits = resolve_download_limits(file, &cmd.fetch);
            download(&client, limits, resources, &cmd.output, &request_id, args.quiet).await?;
        }
        Command::Harvest(cmd) => {
            let crawl = resolve_crawl_config(file, &cmd.crawl);
            let limits = resolve_download_limits(file, &cmd.fetch);
            let mut resources = discover(&client, crawl, &cmd.url, &request_id).await?;
            if resources.is_empty() {
                bail!("No images found on {}", cmd.url);
            }
            if resources.len() > limits.max_items {
                warn!(
                    found = resources.len(),
                    kept = limits.max_items,
                    "more images than one batch allows, keeping the first ones"
                );
                resources.truncate(limits.max_items);
            }
            download(&client, limits, resources, &cmd.output, &request_id, args.quiet).await?;
        }
    }

    Ok(())
}

/// Installs the log subscriber on stderr.
///
/// Priority: `RUST_LOG` > `--quiet` > `-v`/`-vv` > config verbosity > info.
fn init_tracing(args: &Args, file: Option<&FileConfig>) {
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => file
                .and_then(|f| f.verbosity)
                .map_or("info", app_config::VerbositySetting::filter),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn new_request_id() -> String {
    format!("{}-{}", std::process::id(), Utc::now().timestamp_millis())
}

async fn discover(
    client: &HttpClient,
    config: CrawlConfig,
    url: &str,
    request_id: &str,
) -> Result<Vec<ResourceDescriptor>> {
    let engine = DiscoveryEngine::new(client.clone(), config);
    let report = engine.discover(url, request_id).await;
    if let Some(error) = report.error {
        return Err(anyhow!(error)).with_context(|| format!("Discovery of {url} failed"));
    }
    info!(
        images = report.resources.len(),
        pages = report.pages_fetched,
        budget_exhausted = report.budget_exhausted,
        "Discovery finished"
    );
    Ok(report.resources)
}

fn read_descriptors(input: &str) -> Result<Vec<ResourceDescriptor>> {
    let raw = if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read descriptors from stdin")?;
        buffer
    } else {
        fs::read_to_string(input).with_context(|| format!("Failed to read '{input}'"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("Invalid descriptor JSON in '{input}'"))
}

async fn download(
    client: &HttpClient,
    limits: DownloadLimits,
    resources: Vec<ResourceDescriptor>,
    output: &Path,
    request_id: &str,
    quiet: bool,
) -> Result<()> {
    let downloader = BulkDownloader::new(client.clone(), limits)?;
    let total = resources.len();
    let run = downloader.download(resources, request_id);

    let cancel = run.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling download");
            cancel.cancel();
        }
    });

    let progress = DownloadProgress::new(
        progress::should_draw(io::stderr().is_terminal(), quiet),
        total,
    );
    let outcome = run.finish_with(|p| progress.update(p)).await;
    progress.finish();

    match outcome {
        DownloadOutcome::Completed(done) => {
            fs::write(output, &done.archive)
                .with_context(|| format!("Failed to write archive '{}'", output.display()))?;
            info!(
                succeeded = done.succeeded_count,
                failed = done.failed_count,
                total = done.total_count,
                bytes = done.total_bytes,
                archive = %output.display(),
                "Download complete"
            );
            Ok(())
        }
        DownloadOutcome::Failed(failure) => {
            bail!("Download failed ({}): {}", failure.error_kind, failure.message)
        }
        DownloadOutcome::Cancelled {
            succeeded_count,
            total_count,
        } => bail!(
            "Download cancelled after {succeeded_count} of {total_count} images; no archive written"
        ),
    }
}
