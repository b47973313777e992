use anyhow::anyhow;
use scraper::Html;
use serde_json::Value;
use tokio::time::sleep;

use crate::{
    config::Pacing,
    model::{Comment, Post, UserComment},
    page::{Offset, Page},
    parse,
};

pub mod puppeteer;

pub use puppeteer::{ChromePage, ChromeSession};

/// Something that reveals more content when clicked.
#[derive(Clone, Copy, Debug)]
pub struct Expandable {
    pub selector: &'static str,
    pub offset: Option<Offset>,
}

/// Checked in this order on every pass: lazy "more comments" partials, then collapsed threads.
/// A collapsed comment only expands when its toggle, not its body, receives the click.
pub const EXPANDABLES: [Expandable; 2] = [
    Expandable {
        selector: r#"faceplate-partial[loading="action"]"#,
        offset: None,
    },
    Expandable {
        selector: "shreddit-comment[collapsed]",
        offset: Some(Offset { x: 14.0, y: 20.0 }),
    },
];

pub const SCROLL_TO_TOP: &str = "window.scrollTo({ top: 0 })";
pub const SCROLL_HEIGHT: &str = "document.body.scrollHeight";

/// Clicks expandables until a whole pass finds nothing left to click. Returns the click count.
///
/// There is no cap on the number of passes; the caller's timeout bounds a page that keeps
/// producing expandables.
pub async fn expand_comments(page: &impl Page, expandables: &[Expandable], pacing: &Pacing) -> anyhow::Result<usize> {
    let mut clicks = 0;

    loop {
        let mut clicked = false;

        for expandable in expandables {
            if page.count(expandable.selector).await? == 0 {
                continue;
            }
            if !page.is_visible(expandable.selector).await? {
                continue;
            }

            page.evaluate(SCROLL_TO_TOP).await?;
            page.click(expandable.selector, expandable.offset).await?;
            clicked = true;
            clicks += 1;
            sleep(pacing.latency).await;
        }

        if !clicked {
            tracing::debug!(target: "expand", "{clicks} clicks");
            return Ok(clicks);
        }
    }
}

async fn navigate(page: &impl Page, url: &str, pacing: &Pacing) -> anyhow::Result<()> {
    page.goto(url).await?;
    sleep(pacing.settle).await;
    Ok(())
}

async fn snapshot(page: &impl Page) -> anyhow::Result<Html> {
    Ok(Html::parse_document(&page.content().await?))
}

/// A thread page: the post plus every comment, in document order, once fully expanded.
pub async fn scrape_post(page: &impl Page, url: &str, pacing: &Pacing) -> anyhow::Result<(Post, Vec<Comment>)> {
    navigate(page, url, pacing).await?;
    let clicks = expand_comments(page, &EXPANDABLES, pacing).await?;
    tracing::debug!(target: "scrape", "{url}: expanded with {clicks} clicks");

    parse::thread(&snapshot(page).await?)
}

fn height(value: &Value) -> anyhow::Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| anyhow!("scroll height is not a number: {value}"))
}

/// Scrolls an infinitely loading page to the bottom until it stops growing.
pub async fn expand_profile(page: &impl Page, pacing: &Pacing) -> anyhow::Result<()> {
    let mut previous = height(&page.evaluate(SCROLL_HEIGHT).await?)?;

    loop {
        page.evaluate(&format!("window.scrollTo(0, {previous})")).await?;
        sleep(pacing.scroll_latency).await;

        let current = height(&page.evaluate(SCROLL_HEIGHT).await?)?;
        if current <= previous {
            return Ok(());
        }
        previous = current;
    }
}

/// Every comment listed on a user's comment page.
pub async fn scrape_user_comments(page: &impl Page, url: &str, pacing: &Pacing) -> anyhow::Result<Vec<UserComment>> {
    navigate(page, url, pacing).await?;
    expand_profile(page, pacing).await?;

    parse::profile(&snapshot(page).await?)
}
