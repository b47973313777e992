#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet, VecDeque},
    io,
    rc::Rc,
};

use rmap::{
    config::{Config, Pacing},
    page::{Offset, Page, Session},
    retry::RetryPolicy,
    scrape::SCROLL_HEIGHT,
};
use serde_json::Value;

/// A page whose DOM is a fixed document per url and whose expandables are counters.
#[derive(Default)]
pub struct FakePage {
    pub documents: HashMap<String, String>,
    /// Selector -> clicks left before it stops matching.
    pub pending: RefCell<HashMap<String, usize>>,
    pub hidden: HashSet<String>,
    /// Successive values of the body scroll height; the last one repeats.
    pub heights: RefCell<VecDeque<f64>>,
    /// Navigations that fail with a timeout before one succeeds.
    pub timeouts: Cell<u32>,
    /// Navigations that never finish before one succeeds.
    pub stalls: Cell<u32>,
    pub current: RefCell<Option<String>>,
    pub visited: RefCell<Vec<String>>,
    pub scripts: RefCell<Vec<String>>,
    pub clicks: RefCell<Vec<(String, Option<Offset>)>>,
}

impl FakePage {
    pub fn with_document(mut self, url: &str, html: impl Into<String>) -> Self {
        self.documents.insert(url.to_owned(), html.into());
        self
    }

    pub fn with_pending(self, selector: &str, clicks: usize) -> Self {
        self.pending.borrow_mut().insert(selector.to_owned(), clicks);
        self
    }

    pub fn with_hidden(mut self, selector: &str) -> Self {
        self.hidden.insert(selector.to_owned());
        self
    }

    pub fn with_heights(self, heights: &[f64]) -> Self {
        self.heights.borrow_mut().extend(heights);
        self
    }
}

impl Page for FakePage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.visited.borrow_mut().push(url.to_owned());
        if self.stalls.get() > 0 {
            self.stalls.set(self.stalls.get() - 1);
            tokio::time::sleep(core::time::Duration::from_secs(3600)).await;
        }
        if self.timeouts.get() > 0 {
            self.timeouts.set(self.timeouts.get() - 1);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "navigation timed out").into());
        }
        *self.current.borrow_mut() = Some(url.to_owned());
        Ok(())
    }

    async fn count(&self, selector: &str) -> anyhow::Result<usize> {
        Ok(usize::from(self.pending.borrow().get(selector).is_some_and(|n| *n > 0)))
    }

    async fn is_visible(&self, selector: &str) -> anyhow::Result<bool> {
        Ok(!self.hidden.contains(selector))
    }

    async fn click(&self, selector: &str, offset: Option<Offset>) -> anyhow::Result<()> {
        self.clicks.borrow_mut().push((selector.to_owned(), offset));
        if let Some(n) = self.pending.borrow_mut().get_mut(selector) {
            *n = n.saturating_sub(1);
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value> {
        self.scripts.borrow_mut().push(script.to_owned());
        if script != SCROLL_HEIGHT {
            return Ok(Value::Null);
        }
        let mut heights = self.heights.borrow_mut();
        let height = if heights.len() > 1 {
            heights.pop_front()
        } else {
            heights.front().copied()
        };
        Ok(height.map_or(Value::Null, Value::from))
    }

    async fn content(&self) -> anyhow::Result<String> {
        let current = self.current.borrow();
        let url = current.as_deref().unwrap_or_default();
        Ok(self.documents.get(url).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct Counters {
    pub launches: Cell<usize>,
    pub restarts: Cell<usize>,
    pub stops: Cell<usize>,
}

/// Builds a fresh page on every restart; `make` receives the restart number, starting at 1.
pub struct FakeSession {
    pub counters: Rc<Counters>,
    pub make: Box<dyn Fn(usize) -> FakePage>,
    pub page: Option<FakePage>,
}

impl FakeSession {
    pub fn launcher(
        counters: &Rc<Counters>,
        make: impl Fn(usize) -> FakePage + 'static,
    ) -> impl FnOnce() -> Self {
        let counters = Rc::clone(counters);
        move || {
            counters.launches.set(counters.launches.get() + 1);
            Self {
                counters,
                make: Box::new(make),
                page: None,
            }
        }
    }
}

impl Session for FakeSession {
    type Page = FakePage;

    async fn restart(&mut self) -> anyhow::Result<()> {
        let n = self.counters.restarts.get() + 1;
        self.counters.restarts.set(n);
        self.page = Some((self.make)(n));
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.counters.stops.set(self.counters.stops.get() + 1);
        self.page = None;
        Ok(())
    }

    fn page(&self) -> Option<&FakePage> {
        self.page.as_ref()
    }
}

pub fn config(root: &std::path::Path) -> Config {
    let mut config = Config::new(root.to_path_buf());
    config.pacing = Pacing::immediate();
    config.timeout = core::time::Duration::from_secs(5);
    config.retry = RetryPolicy::new(3);
    config
}

pub fn thread_html(post_id: &str, comment_ids: &[&str]) -> String {
    let comments = comment_ids
        .iter()
        .map(|id| {
            format!(
                r#"<shreddit-comment thingid="{id}" author="user_{id}" score="1">
                    <div slot="commentMeta"><time datetime="2024-05-01T00:00:00.000Z"></time></div>
                    <div slot="comment"><p>comment {id}</p></div>
                </shreddit-comment>"#
            )
        })
        .collect::<String>();

    format!(
        r#"<html><body>
            <shreddit-post id="{post_id}" post-title="Post {post_id}" permalink="/r/test/comments/{post_id}/"
                author="op" author-id="t2_op" subreddit-prefixed-name="r/test" subreddit-id="t5_test"
                comment-count="{}" score="10" created-timestamp="2024-05-01T00:00:00.000000+0000">
                <div slot="text-body"><p>body of {post_id}</p></div>
            </shreddit-post>
            {comments}
        </body></html>"#,
        comment_ids.len(),
    )
}

pub fn post_line(id: &str) -> String {
    format!(
        r#"{{"id":"{id}","title":"t","permalink":"/r/test/comments/x/","author":"a","author_id":null,"subreddit":"r/test","subreddit_id":"t5_test","comment_count":0,"score":1,"content":null,"is_deleted":false,"created_at":"2024-05-01T00:00:00.000000+0000"}}"#
    )
}

pub fn user_comment_line(id: &str, subreddit: &str, post: &str) -> String {
    format!(
        r#"{{"id":"{id}","href":"/r/{subreddit}/comments/{post}/title/{id}/","post_id":"t3_{post}","author":"someone","author_id":"t2_someone","subreddit":"{subreddit}","score":3,"content":"hi","is_deleted":false}}"#
    )
}
