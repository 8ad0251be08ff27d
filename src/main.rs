//! # article_reveal
//!
//! Fetch an article by slug, render it into a headless page, scroll through
//! it the way a reader would and print a JSON report of what the reveal
//! controller did.
//!
//! ## Usage
//!
//! ```sh
//! article_reveal big-news-today-abc123 --viewport-width 390
//! ```
//!
//! ## Pipeline
//!
//! 1. **Config**: CLI flags, env and optional YAML
//! 2. **Fetching**: API with retries, JSON backup on failure
//! 3. **Mounting**: render the page and arm the controller
//! 4. **Simulation**: scroll, resolve the mid slot, load scripts
//! 5. **Output**: JSON report on stdout

use article_reveal::ads::WindowQueues;
use article_reveal::api::{ApiArticleSource, BackupArticleSource, RetryFetch, get_articles};
use article_reveal::cli::Cli;
use article_reveal::config::{AppConfig, load_config};
use article_reveal::dom::HeadlessPage;
use article_reveal::models::Viewport;
use article_reveal::reveal::RevealController;
use article_reveal::simulate::{SimulationOptions, SimulationReport, run_simulation};
use clap::Parser;
use itertools::Itertools;
use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("article_reveal starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(slug = %args.slug, config = ?args.config, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if args.mgid {
        config.page.is_mgid = 1;
    }
    if let Some(strategy) = args.strategy {
        config.controller.mid_slot = strategy.to_strategy();
    }
    info!(
        network = ?config.page.network(),
        mid_slot = ?config.controller.mid_slot,
        threshold = config.controller.trigger.threshold_fraction,
        "Configuration ready"
    );

    // ---- Fetch articles ----
    let client = reqwest::Client::builder().build()?;
    let timeout = config.controller.fetch_timeout();
    let primary = RetryFetch::new(
        ApiArticleSource::new(client.clone(), &args.api_base_url, timeout),
        config.controller.fetch_retries,
        config.controller.fetch_backoff(),
    );
    let backup = RetryFetch::new(
        BackupArticleSource::new(client, &args.backup_base_url, timeout)?,
        config.controller.fetch_retries,
        config.controller.fetch_backoff(),
    );
    let articles = get_articles(&args.slug, &primary, &backup).await;
    info!(
        count = articles.len(),
        titles = %articles.iter().map(|a| a.name.as_str()).join(" | "),
        "Fetched articles"
    );

    // ---- Mount ----
    let viewport = Viewport { width: args.viewport_width, height: args.viewport_height };
    let dom = Rc::new(RefCell::new(HeadlessPage::new(viewport)));
    let queues = Rc::new(WindowQueues::new());
    let controller = RevealController::mount(
        Rc::clone(&dom),
        queues.clone(),
        &articles,
        config.page.clone(),
        config.controller.clone(),
    )?;

    // ---- Simulate ----
    let report = match controller {
        Some(controller) => {
            let options = SimulationOptions { scroll_step: args.scroll_step, ..Default::default() };
            let report = run_simulation(&controller, &queues, options).await?;
            controller.teardown();
            report
        }
        None => {
            warn!(slug = %args.slug, "Article not found");
            SimulationReport::not_found(&dom.borrow(), &queues)
        }
    };

    // ---- Output ----
    println!("{}", serde_json::to_string_pretty(&report)?);

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}
