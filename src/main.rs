//! CLI entry point for the wikimirror tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};
use wikimirror_core::session::{WebDriverOptions, WebDriverSession};
use wikimirror_core::{HttpClient, MirrorRun, RunSummary};

mod cli;

use cli::Args;

const FAILURE_TIP: &str = "TIP: Analyze the logs, try to find and fix the problem, and then \
perform the action again. Sometimes it's enough to wait to solve a problem.";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if let Err(message) = args.validate() {
        error!("{message}");
        return Ok(ExitCode::from(2));
    }

    let client = HttpClient::new().context("failed to build HTTP client")?;
    if let Err(e) = client.inner().get(&args.community_url).send().await {
        error!(error = %e, "The community URL does not exist or is unavailable");
        return Ok(ExitCode::from(2));
    }

    let run = MirrorRun::prepare(args.to_config()).context("failed to prepare staging")?;

    let mut options = WebDriverOptions::new(run.download_staging());
    options.endpoint.clone_from(&args.webdriver_url);
    options.browser = args.browser;
    options.headless = !args.visual;

    info!(browser = %options.browser, endpoint = %options.endpoint, "starting browser session");
    let mut session = match WebDriverSession::start(&options).await {
        Ok(session) => session,
        Err(e) => {
            run.abandon();
            return Err(e).context("failed to start the browser session");
        }
    };

    let summary = run.execute(&mut session, Arc::new(client)).await;
    report(&summary);

    Ok(if summary.completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report(summary: &RunSummary) {
    info!(
        communities = summary.communities,
        wikis = summary.wikis,
        pages_saved = summary.pages_saved,
        pages_missed = summary.pages_missed,
        "Mirror complete"
    );
    info!(
        attempted = summary.downloads.attempted,
        succeeded = summary.downloads.succeeded,
        failed = summary.downloads.failed,
        collisions = summary.downloads.collisions,
        "Downloads"
    );
    for failure in &summary.downloads.failures {
        debug!(url = %failure.url, reason = %failure.reason, "failed download");
    }
    if let Some(dir) = &summary.content_dir {
        info!(path = %dir.display(), "content directory");
    }
    if !summary.completed {
        info!("{FAILURE_TIP}");
    }
}
