//! The scraping loops behind the binaries: load, plan, scrape one target at a time, persist.

use anyhow::anyhow;
use compact_str::CompactString;
use hashbrown::HashSet;

use crate::{
    config::Config,
    model::{self, Comment, Post, UserComment},
    page::Session,
    registry::{self, Registry},
    scrape,
    util::post_id_from_url,
};

/// A post waiting to be scraped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    pub post_id: CompactString,
    pub url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub queued: usize,
    pub scraped: usize,
    pub failed: usize,
    pub new_records: usize,
}

/// Posts referenced by known user comments (optionally of one subreddit) followed by seed urls,
/// without duplicates and without posts already in the registry.
pub fn plan(registry: &Registry, subreddit: Option<&str>, seeds: &[String]) -> Vec<Job> {
    let mut referenced = registry
        .user_comments
        .iter()
        .filter(|c| subreddit.is_none_or(|s| c.subreddit.eq_ignore_ascii_case(s)))
        .map(|c| c.post_id.clone())
        .collect::<Vec<_>>();
    referenced.sort_unstable();

    let from_comments = referenced.into_iter().map(|post_id| Job {
        url: model::url_from_id(&post_id),
        post_id,
    });

    let from_seeds = seeds.iter().filter_map(|url| {
        let Some(post_id) = post_id_from_url(url) else {
            tracing::warn!(target: "plan", "not a post url, skipping: {url}");
            return None;
        };
        Some(Job {
            post_id,
            url: url.trim().to_owned(),
        })
    });

    let mut seen = HashSet::new();
    from_comments
        .chain(from_seeds)
        .filter(|job| !registry.posts.contains(&job.post_id))
        .filter(|job| seen.insert(job.post_id.clone()))
        .collect()
}

fn page_of<S: Session>(session: &S) -> anyhow::Result<&S::Page> {
    session.page().ok_or_else(|| anyhow!("session has no page"))
}

async fn post_attempt<S: Session>(session: &S, url: &str, config: &Config) -> anyhow::Result<(Post, Vec<Comment>)> {
    scrape::scrape_post(page_of(session)?, url, &config.pacing).await
}

async fn user_attempt<S: Session>(session: &S, url: &str, config: &Config) -> anyhow::Result<Vec<UserComment>> {
    scrape::scrape_user_comments(page_of(session)?, url, &config.pacing).await
}

async fn scrape_post<S: Session>(config: &Config, session: &mut S, url: &str) -> anyhow::Result<(Post, Vec<Comment>)> {
    config
        .retry
        .run_timed(
            session,
            config.timeout,
            async |session: &mut S| post_attempt(session, url, config).await,
            async |session: &mut S| session.restart().await,
        )
        .await
}

async fn scrape_user<S: Session>(config: &Config, session: &mut S, url: &str) -> anyhow::Result<Vec<UserComment>> {
    config
        .retry
        .run_timed(
            session,
            config.timeout,
            async |session: &mut S| user_attempt(session, url, config).await,
            async |session: &mut S| session.restart().await,
        )
        .await
}

/// Gives up on a target: logs it and starts over with a clean page.
async fn abandon<S: Session>(session: &mut S, url: &str, err: &anyhow::Error) {
    tracing::error!(target: "worker", "\x1b[31mfailed\x1b[0m {url}: {err:#}");
    if let Err(e) = session.restart().await {
        tracing::error!(target: "worker", "restart after failure: {e:#}");
    }
}

async fn shutdown<S: Session>(session: &mut S) {
    if let Err(e) = session.stop().await {
        tracing::warn!(target: "worker", "stopping session: {e:#}");
    }
}

/// Scrapes every job into `registry`. The session is only created when there is work.
pub async fn scrape_posts<S: Session>(
    config: &Config,
    registry: &mut Registry,
    jobs: Vec<Job>,
    launch: impl FnOnce() -> S,
) -> anyhow::Result<Summary> {
    let mut summary = Summary {
        queued: jobs.len(),
        ..Summary::default()
    };
    if jobs.is_empty() {
        tracing::info!(target: "worker", "nothing to scrape");
        return Ok(summary);
    }

    tracing::info!(target: "worker", "loaded {} post ids to scrape", jobs.len());

    let mut session = launch();
    session.restart().await?;

    for (i, job) in jobs.iter().enumerate() {
        tracing::info!(target: "worker", "\x1b[33mscraping\x1b[0m [{}/{}] {} ...", i + 1, jobs.len(), job.url);

        match scrape_post(config, &mut session, &job.url).await {
            Ok((post, comments)) => {
                if post.id != job.post_id {
                    tracing::warn!(target: "worker", "{} resolved to {}", job.post_id, post.id);
                }
                let n_comments = comments.len();
                summary.new_records += usize::from(registry.posts.insert(post));
                summary.new_records += registry.post_comments.extend(comments);
                summary.scraped += 1;
                tracing::info!(target: "worker", "\x1b[36mfinished\x1b[0m {} ({n_comments} comments)", job.url);
            }
            Err(err) => {
                summary.failed += 1;
                abandon(&mut session, &job.url, &err).await;
            }
        }
    }

    shutdown(&mut session).await;
    Ok(summary)
}

/// Scrapes the comment pages of `usernames` into `registry`.
pub async fn scrape_users<S: Session>(
    config: &Config,
    registry: &mut Registry,
    usernames: &[String],
    launch: impl FnOnce() -> S,
) -> anyhow::Result<Summary> {
    let mut seen = HashSet::new();
    let usernames = usernames
        .iter()
        .map(|name| name.trim().trim_start_matches("u/"))
        .filter(|name| !name.is_empty() && seen.insert(*name))
        .collect::<Vec<_>>();

    let mut summary = Summary {
        queued: usernames.len(),
        ..Summary::default()
    };
    if usernames.is_empty() {
        tracing::info!(target: "worker", "nothing to scrape");
        return Ok(summary);
    }

    let mut session = launch();
    session.restart().await?;

    for username in usernames {
        let url = model::comment_url(username);
        tracing::info!(target: "worker", "\x1b[33mscraping\x1b[0m {url} ...");

        match scrape_user(config, &mut session, &url).await {
            Ok(comments) => {
                let n_comments = comments.len();
                summary.new_records += registry.user_comments.extend(comments);
                summary.scraped += 1;
                tracing::info!(target: "worker", "\x1b[36mfinished\x1b[0m {url} ({n_comments} comments)");
            }
            Err(err) => {
                summary.failed += 1;
                abandon(&mut session, &url, &err).await;
            }
        }
    }

    shutdown(&mut session).await;
    Ok(summary)
}

/// Whole post run against the registry under `config.root`.
pub async fn run_posts<S: Session>(config: &Config, seeds: &[String], launch: impl FnOnce() -> S) -> anyhow::Result<Summary> {
    let root = config.ensure_root()?;
    let mut registry = registry::load(root)?;

    let jobs = plan(&registry, config.subreddit.as_deref(), seeds);
    if jobs.is_empty() {
        tracing::info!(target: "worker", "every referenced post is already known");
        return Ok(Summary::default());
    }

    let summary = scrape_posts(config, &mut registry, jobs, launch).await?;
    registry::dump(&registry, root)?;
    Ok(summary)
}

/// Whole user-comment run against the registry under `config.root`.
pub async fn run_users<S: Session>(config: &Config, usernames: &[String], launch: impl FnOnce() -> S) -> anyhow::Result<Summary> {
    let root = config.ensure_root()?;
    let mut registry = registry::load(root)?;

    let summary = scrape_users(config, &mut registry, usernames, launch).await?;
    if summary.scraped > 0 {
        registry::dump(&registry, root)?;
    }
    Ok(summary)
}
