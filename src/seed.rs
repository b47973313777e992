use core::time::Duration;

use reqwest::Client;

use crate::util::list_lines;

pub fn client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(const { Duration::from_secs(8) })
        .timeout(const { Duration::from_secs(60) })
        .build()
}

/// Downloads a plain-text url list, one url per line.
pub async fn fetch_urls(client: &Client, url: &str) -> anyhow::Result<Vec<String>> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let urls = list_lines(&text).map(ToOwned::to_owned).collect::<Vec<_>>();
    tracing::info!(target: "seed", "{} urls from {url}", urls.len());
    Ok(urls)
}
