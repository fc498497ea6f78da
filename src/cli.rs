//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;

use wikimirror_core::session::{Browser, Credentials, DEFAULT_WEBDRIVER_URL};
use wikimirror_core::{DEFAULT_CONCURRENCY, MirrorConfig};

/// Mirror a portal community and its wikis to a local directory.
///
/// Wikimirror walks a community's wiki tree (and, with --recursive, its
/// subcommunities) in a browser, then saves every page, internal link and
/// attachment into a directory tree that can be browsed offline.
#[derive(Parser, Debug)]
#[command(name = "wikimirror")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the community to mirror
    #[arg(long, value_parser = parse_http_url)]
    pub community_url: String,

    /// Existing directory the mirrored community is moved into
    #[arg(long, default_value = ".", value_parser = parse_existing_dir)]
    pub target_dir: PathBuf,

    /// Existing directory for temporary staging (default: system temp dir)
    #[arg(long, value_parser = parse_existing_dir)]
    pub temp_dir: Option<PathBuf>,

    /// Credentials for automatic sign-in
    #[arg(long, value_name = "LOGIN:PASSWORD")]
    pub auth: Option<Credentials>,

    /// Also mirror subcommunities, at any depth
    #[arg(long)]
    pub recursive: bool,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub visual: bool,

    /// Browser driven through WebDriver (firefox or chrome)
    #[arg(long, default_value = "firefox")]
    pub browser: Browser,

    /// WebDriver server endpoint (geckodriver, chromedriver, ...)
    #[arg(long, default_value = DEFAULT_WEBDRIVER_URL)]
    pub webdriver_url: String,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Seconds to wait for a community or wiki page to load
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub page_timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Checks constraints spanning several flags.
    pub fn validate(&self) -> Result<(), String> {
        if !self.visual && self.auth.is_none() {
            return Err(
                "If you want to launch the app without opening the browser you must provide \
                 the credentials (--auth LOGIN:PASSWORD) or pass --visual"
                    .to_string(),
            );
        }
        Ok(())
    }

    /// Library configuration for this invocation.
    pub fn to_config(&self) -> MirrorConfig {
        let mut config = MirrorConfig::new(self.community_url.clone());
        config.recursive = self.recursive;
        config.target_dir.clone_from(&self.target_dir);
        if let Some(temp_dir) = &self.temp_dir {
            config.temp_dir.clone_from(temp_dir);
        }
        config.concurrency = usize::from(self.concurrency);
        config.walk.credentials.clone_from(&self.auth);
        config.walk.page_timeout = Duration::from_secs(self.page_timeout);
        config
    }
}

fn parse_http_url(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|e| format!("The URL has an incorrect format: {e}"))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(value.to_string()),
        _ => Err("The URL has an incorrect format: expected http(s)://host/...".to_string()),
    }
}

fn parse_existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{value}: the path does not exist or cannot be accessed"))
    }
}
