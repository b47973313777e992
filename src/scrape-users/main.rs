use rmap::{config::CommonArgs, scrape::ChromeSession, work};

/// Scrape the comment pages of users into the registry.
#[derive(clap::Parser)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "username", required = true)]
    usernames: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use clap::Parser;

    pretty_env_logger::init_timed();

    let args = Args::parse();
    let config = args.common.into_config()?;

    let summary = work::run_users(&config, &args.usernames, || {
        ChromeSession::new(config.headless, config.proxy.clone(), config.idle)
    })
    .await?;

    tracing::info!(
        target: "main",
        "\x1b[1;36m{} users scraped, {} failed, {} new comments\x1b[0m",
        summary.scraped,
        summary.failed,
        summary.new_records,
    );

    Ok(())
}
