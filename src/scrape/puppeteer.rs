use core::time::Duration;
use std::{ffi::OsStr, sync::Arc};

use headless_chrome::{
    Browser, LaunchOptions, Tab, browser::tab::point::Point, protocol::cdp::Target,
};
use serde::Deserialize;
use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::page::{Offset, Page, Session};

pub fn puppeteer(headless: bool, proxy: Option<&str>, idle: Duration) -> anyhow::Result<Browser> {
    Browser::new(LaunchOptions {
        args: vec![OsStr::new("--disable-blink-features=AutomationControlled")],
        headless,
        proxy_server: proxy,
        idle_browser_timeout: idle,
        ..LaunchOptions::default()
    })
}

/// Quotes `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

fn js_offset(offset: Option<f64>) -> String {
    offset.map_or_else(|| "null".to_owned(), |v| v.to_string())
}

pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    pub const fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }

    async fn with_tab<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> anyhow::Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        spawn_blocking(move || f(&tab)).await?
    }
}

impl Page for ChromePage {
    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        let url = url.to_owned();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)?.wait_until_navigated()?;
            Ok(())
        })
        .await
    }

    async fn count(&self, selector: &str) -> anyhow::Result<usize> {
        let script = format!("document.querySelectorAll({}).length", js_string(selector));
        let value = self.evaluate(&script).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow::anyhow!("count of {selector} is not a number: {value}"))
    }

    async fn is_visible(&self, selector: &str) -> anyhow::Result<bool> {
        let script = format!(
            "(() => {{
                const e = document.querySelector({});
                if (!e) return false;
                const r = e.getBoundingClientRect();
                const s = window.getComputedStyle(e);
                return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
            }})()",
            js_string(selector),
        );
        Ok(self.evaluate(&script).await?.as_bool().unwrap_or(false))
    }

    async fn click(&self, selector: &str, offset: Option<Offset>) -> anyhow::Result<()> {
        #[derive(Deserialize)]
        struct Spot {
            x: f64,
            y: f64,
        }

        let script = format!(
            "(() => {{
                const e = document.querySelector({});
                if (!e) return null;
                e.scrollIntoView({{ block: 'center', inline: 'center' }});
                const r = e.getBoundingClientRect();
                const ox = {}, oy = {};
                return JSON.stringify({{
                    x: r.left + (ox === null ? r.width / 2 : ox),
                    y: r.top + (oy === null ? r.height / 2 : oy),
                }});
            }})()",
            js_string(selector),
            js_offset(offset.map(|o| o.x)),
            js_offset(offset.map(|o| o.y)),
        );

        let Value::String(spot) = self.evaluate(&script).await? else {
            anyhow::bail!("nothing to click at {selector}");
        };
        let Spot { x, y } = serde_json::from_str(&spot)?;

        self.with_tab(move |tab| {
            tab.click_point(Point { x, y })?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, script: &str) -> anyhow::Result<Value> {
        let script = script.to_owned();
        self.with_tab(move |tab| Ok(tab.evaluate(&script, false)?.value.unwrap_or(Value::Null)))
            .await
    }

    async fn content(&self) -> anyhow::Result<String> {
        self.with_tab(|tab| tab.get_content()).await
    }
}

/// One browser process, one isolated context inside it, one page inside that.
pub struct ChromeSession {
    headless: bool,
    proxy: Option<String>,
    idle: Duration,
    browser: Option<Browser>,
    context_id: Option<String>,
    page: Option<ChromePage>,
}

impl ChromeSession {
    pub const fn new(headless: bool, proxy: Option<String>, idle: Duration) -> Self {
        Self {
            headless,
            proxy,
            idle,
            browser: None,
            context_id: None,
            page: None,
        }
    }

    async fn browser(&mut self) -> anyhow::Result<Browser> {
        if let Some(browser) = &self.browser {
            return Ok(browser.clone());
        }

        let (headless, proxy, idle) = (self.headless, self.proxy.clone(), self.idle);
        let browser = spawn_blocking(move || puppeteer(headless, proxy.as_deref(), idle)).await??;
        tracing::info!(target: "session", "browser launched (headless: {headless})");

        self.browser = Some(browser.clone());
        Ok(browser)
    }
}

fn close_page(tab: &Tab) {
    if let Err(e) = tab.close(true) {
        log::warn!(target: "session", "close page failed: {e}");
    }
}

/// Throws away an isolated context, issued through any live page of the browser.
///
/// `headless_chrome` keeps its browser-level session private, so this rides on a page session.
fn dispose_context(via: &Tab, browser_context_id: String) {
    if let Err(e) = via.call_method(Target::DisposeBrowserContext { browser_context_id }) {
        log::warn!(target: "session", "dispose context failed: {e}");
    }
}

impl Session for ChromeSession {
    type Page = ChromePage;

    async fn restart(&mut self) -> anyhow::Result<()> {
        let browser = self.browser().await?;
        let previous = self.page.take().map(|page| page.tab);
        let previous_context = self.context_id.take();

        let (context_id, tab) = spawn_blocking(move || -> anyhow::Result<_> {
            let context = browser.new_context()?;
            let context_id = context.get_id().to_owned();
            let tab = context.new_tab()?;

            if let Some(previous) = previous {
                close_page(&previous);
            }
            if let Some(previous_context) = previous_context {
                dispose_context(&tab, previous_context);
            }

            Ok((context_id, tab))
        })
        .await??;

        tracing::info!(target: "session", "\x1b[35mfresh context {context_id}\x1b[0m");
        self.context_id = Some(context_id);
        self.page = Some(ChromePage::new(tab));
        Ok(())
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.context_id = None;
        if let Some(page) = self.page.take() {
            spawn_blocking(move || close_page(&page.tab)).await?;
        }

        // Dropping the last handle terminates the browser process.
        self.browser = None;
        tracing::info!(target: "session", "browser stopped");
        Ok(())
    }

    fn page(&self) -> Option<&ChromePage> {
        self.page.as_ref()
    }
}
