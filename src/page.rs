//! What the scraper needs from a browser.
//!
//! The orchestrator only ever talks to these traits; [`crate::scrape::puppeteer`] backs them with
//! headless Chrome and the tests back them with scripted fakes.

#![allow(async_fn_in_trait)]

use serde_json::Value;

/// Click position relative to the top-left corner of an element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// A single rendered page. Selector-based calls act on the first match.
pub trait Page {
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    async fn count(&self, selector: &str) -> anyhow::Result<usize>;

    async fn is_visible(&self, selector: &str) -> anyhow::Result<bool>;

    /// Clicks without actionability checks, at `offset` or at the element's centre.
    async fn click(&self, selector: &str, offset: Option<Offset>) -> anyhow::Result<()>;

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value>;

    /// Serialized DOM of the whole document as currently rendered.
    async fn content(&self) -> anyhow::Result<String>;
}

/// Owner of a page that can be thrown away and rebuilt.
pub trait Session {
    type Page: Page;

    /// Launches the engine on first use, then replaces the isolated context and its page.
    async fn restart(&mut self) -> anyhow::Result<()>;

    async fn stop(&mut self) -> anyhow::Result<()>;

    /// `None` until the first successful [`Session::restart`].
    fn page(&self) -> Option<&Self::Page>;
}
