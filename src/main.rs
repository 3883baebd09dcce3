//! `license-bundlr` — resolve the license of every pinned Python dependency and
//! bundle the license texts for compliance reporting.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load registry settings and override tables ([`config::load_config`]).
//! 3. Read pinned packages from the manifests ([`manifest::load_identities`]).
//! 4. Prepare a fresh output directory ([`report::aggregator::OutputLayout`]).
//! 5. For each package, in name order: classify its license from registry
//!    metadata ([`license`]), then fetch its license text ([`text`]).
//! 6. Write the per-license groups and print a summary ([`report`]).
//!
//! Per-package failures are logged and skipped; the exit code is `0` unless
//! the output directory itself cannot be written.

mod cli;
mod config;
mod error;
mod license;
mod manifest;
mod models;
mod registry;
mod report;
mod text;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::Cli;
use config::load_config;
use license::resolver::Resolver;
use registry::HttpClient;
use report::aggregator::{Aggregator, OutputLayout};
use text::TextAcquirer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cwd = std::env::current_dir()?;
    let mut config = load_config(&cwd, cli.config.as_deref())?;
    if let Some(url) = &cli.registry_url {
        config.registry.base_url = url.clone();
    }

    let identities = manifest::load_identities(&cli.inputs)?;
    info!("{} pinned packages", identities.len());
    if identities.is_empty() {
        warn!("No name==version pins found in the given manifests");
    }

    if cli.github_credentials.is_none() {
        warn!("No --github-credentials given; license API calls are unauthenticated and rate-limited");
    }

    let layout = OutputLayout::new(&cli.output);
    layout.prepare()?;

    let http = HttpClient::new(&config.registry.user_agent)?;
    let aggregator = Aggregator::new(
        Resolver::new(&http, &config),
        TextAcquirer::new(
            &http,
            &config,
            cli.github_credentials.as_ref(),
            &layout.scratch,
        ),
        &layout,
    );

    let pb = if !cli.quiet {
        let pb = ProgressBar::new(identities.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let summary = aggregator.run(&identities, pb.as_ref()).await?;

    if let Some(pb) = pb {
        pb.finish_with_message("Done");
    }

    report::terminal::render(&summary, &layout, cli.verbose, cli.quiet)?;

    Ok(())
}
