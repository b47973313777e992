use core::time::Duration;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::BaseDirs;

use crate::retry::RetryPolicy;

/// Name of the state directory under the home directory.
pub const STATE_DIR: &str = ".rmap";

/// Fixed waits of the scraping loop.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// After navigation, before touching the page.
    pub settle: Duration,
    /// After every expanding click.
    pub latency: Duration,
    /// After every profile scroll.
    pub scroll_latency: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            latency: Duration::from_millis(750),
            scroll_latency: Duration::from_millis(1500),
        }
    }
}

impl Pacing {
    pub const fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            latency: Duration::ZERO,
            scroll_latency: Duration::ZERO,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub root: PathBuf,
    pub seed_url: Option<String>,
    /// Only posts referenced from user comments in this subreddit are queued.
    pub subreddit: Option<String>,
    pub headless: bool,
    pub proxy: Option<String>,
    /// Ceiling of a single scrape attempt.
    pub timeout: Duration,
    /// Silence from the browser after which it counts as dead.
    pub idle: Duration,
    pub retry: RetryPolicy,
    pub pacing: Pacing,
}

impl Config {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            seed_url: None,
            subreddit: None,
            headless: true,
            proxy: None,
            timeout: Duration::from_secs(1200),
            idle: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            pacing: Pacing::default(),
        }
    }

    /// Creates the state directory if needed.
    pub fn ensure_root(&self) -> anyhow::Result<&Path> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("cannot create state directory {}", self.root.display()))?;
        Ok(&self.root)
    }
}

pub fn default_root() -> anyhow::Result<PathBuf> {
    let dirs = BaseDirs::new().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(STATE_DIR))
}

/// Options every scraping binary accepts.
#[derive(clap::Args, Debug)]
pub struct CommonArgs {
    /// State directory holding the feed files [default: ~/.rmap]
    #[arg(long, env = "RMAP_HOME", value_name = "dir")]
    pub root: Option<PathBuf>,
    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
    #[arg(long, env = "RMAP_PROXY")]
    pub proxy: Option<String>,
    /// Seconds before a single scrape attempt is abandoned
    #[arg(long, default_value_t = 1200)]
    pub timeout: u64,
    /// Seconds without any browser event before the browser is considered dead
    #[arg(long, default_value_t = 60)]
    pub idle_timeout: u64,
    /// Attempts per target on timeouts
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_retries: u32,
}

impl CommonArgs {
    pub fn into_config(self) -> anyhow::Result<Config> {
        let root = match self.root {
            Some(root) => root,
            None => default_root()?,
        };

        let mut config = Config::new(root);
        config.headless = !self.headful;
        config.proxy = self.proxy;
        config.timeout = Duration::from_secs(self.timeout);
        config.idle = Duration::from_secs(self.idle_timeout);
        config.retry = RetryPolicy::new(self.max_retries);
        Ok(config)
    }
}
