use rmap::{config::CommonArgs, scrape::ChromeSession, work};

/// Scrape posts and their comments into the registry.
///
/// Posts referenced by already scraped user comments are queued, together with the post urls of
/// an optional seed list; posts the registry already holds are skipped.
#[derive(clap::Parser)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
    /// Plain-text list of post urls, one per line
    #[arg(long, env = "RMAP_SEED_URL", value_name = "url")]
    seed_url: Option<String>,
    /// Only follow user comments made in this subreddit
    #[arg(long)]
    subreddit: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let mut config = args.common.into_config()?;
    config.seed_url = args.seed_url;
    config.subreddit = args.subreddit;

    let seeds = match &config.seed_url {
        Some(url) => rmap::seed::fetch_urls(&rmap::seed::client()?, url).await?,
        None => Vec::new(),
    };

    let summary = work::run_posts(&config, &seeds, || {
        ChromeSession::new(config.headless, config.proxy.clone(), config.idle)
    })
    .await?;

    tracing::info!(
        target: "main",
        "\x1b[1;36m{} scraped, {} failed, {} new records\x1b[0m",
        summary.scraped,
        summary.failed,
        summary.new_records,
    );

    Ok(())
}
