//! [`BrowserDriver`] over static HTML snapshots
//!
//! Each navigation stores the page markup; queries re-parse it with `scraper`
//! inside synchronous helpers, since the parsed DOM cannot cross an await.
//! Element handles index into the document's elements in pre-order, so the
//! descendants of element `i` are the contiguous run right after it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::RwLock;
use tracing::debug;

use super::{BrowserDriver, BrowserError, BrowserResult, ElementHandle, PageHandle, PageSource};

/// Elements whose text a reader never sees.
const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that break the line when rendered.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol",
    "p", "section", "table", "td", "th", "tr", "ul",
];

struct Snapshot {
    url: String,
    html: Arc<str>,
}

pub struct SnapshotBrowser {
    source: Arc<dyn PageSource>,
    pages: RwLock<HashMap<PageHandle, Snapshot>>,
    next_page: AtomicU64,
}

impl SnapshotBrowser {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            pages: RwLock::new(HashMap::new()),
            next_page: AtomicU64::new(1),
        }
    }

    async fn markup(&self, page: PageHandle) -> BrowserResult<Arc<str>> {
        self.pages
            .read()
            .await
            .get(&page)
            .map(|snapshot| Arc::clone(&snapshot.html))
            .ok_or(BrowserError::StaleHandle)
    }

    async fn page_url(&self, page: PageHandle) -> BrowserResult<String> {
        self.pages
            .read()
            .await
            .get(&page)
            .map(|snapshot| snapshot.url.clone())
            .ok_or(BrowserError::StaleHandle)
    }
}

fn compile(hint: &str) -> BrowserResult<Selector> {
    Selector::parse(hint).map_err(|e| BrowserError::InvalidHint {
        hint: hint.to_string(),
        reason: e.to_string(),
    })
}

fn elements(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn element_at<'a>(all: &[ElementRef<'a>], node: usize) -> BrowserResult<ElementRef<'a>> {
    all.get(node).copied().ok_or(BrowserError::StaleHandle)
}

/// Indices of elements matching `selector`, optionally restricted to the
/// descendants of element `within`.
fn select_in(
    markup: &str,
    selector: &Selector,
    within: Option<usize>,
) -> BrowserResult<Vec<usize>> {
    let document = Html::parse_document(markup);
    let all = elements(&document);

    let range = match within {
        None => 0..all.len(),
        Some(node) => {
            let scope = element_at(&all, node)?;
            let below = scope
                .descendants()
                .filter(|n| n.value().is_element())
                .count()
                .saturating_sub(1);
            (node + 1)..(node + 1 + below)
        }
    };

    Ok(range.filter(|&i| selector.matches(&all[i])).collect())
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if HIDDEN_TAGS.contains(&name) {
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push(' ');
            }
            collect_visible_text(child_element, out);
            if block {
                out.push(' ');
            }
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

fn visible_text(markup: &str, node: usize) -> BrowserResult<String> {
    let document = Html::parse_document(markup);
    let all = elements(&document);
    let element = element_at(&all, node)?;

    let mut raw = String::new();
    collect_visible_text(element, &mut raw);
    Ok(raw.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn attribute(markup: &str, node: usize, name: &str) -> BrowserResult<Option<String>> {
    let document = Html::parse_document(markup);
    let all = elements(&document);
    let element = element_at(&all, node)?;
    Ok(element.value().attr(name).map(str::to_string))
}

#[async_trait]
impl BrowserDriver for SnapshotBrowser {
    async fn navigate(&self, url: &str, timeout: Duration) -> BrowserResult<PageHandle> {
        let html = tokio::time::timeout(timeout, self.source.fetch_html(url))
            .await
            .map_err(|_| BrowserError::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            })??;

        let page = PageHandle(self.next_page.fetch_add(1, Ordering::Relaxed));
        debug!("Opened page {:?} for {} ({} bytes)", page, url, html.len());
        self.pages.write().await.insert(
            page,
            Snapshot {
                url: url.to_string(),
                html: Arc::from(html),
            },
        );
        Ok(page)
    }

    async fn query(&self, page: PageHandle, hint: &str) -> BrowserResult<Vec<ElementHandle>> {
        let selector = compile(hint)?;
        let markup = self.markup(page).await?;
        let nodes = select_in(&markup, &selector, None)?;
        Ok(nodes
            .into_iter()
            .map(|node| ElementHandle { page, node })
            .collect())
    }

    async fn query_within(
        &self,
        element: ElementHandle,
        hint: &str,
    ) -> BrowserResult<Vec<ElementHandle>> {
        let selector = compile(hint)?;
        let markup = self.markup(element.page).await?;
        let nodes = select_in(&markup, &selector, Some(element.node))?;
        Ok(nodes
            .into_iter()
            .map(|node| ElementHandle {
                page: element.page,
                node,
            })
            .collect())
    }

    async fn read_text(&self, element: ElementHandle) -> BrowserResult<String> {
        let markup = self.markup(element.page).await?;
        visible_text(&markup, element.node)
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        let markup = self.markup(element.page).await?;
        attribute(&markup, element.node, name)
    }

    async fn scroll_to_bottom(&self, page: PageHandle) -> BrowserResult<()> {
        // A snapshot is fully loaded already.
        self.markup(page).await.map(|_| ())
    }

    async fn current_height(&self, page: PageHandle) -> BrowserResult<u64> {
        let markup = self.markup(page).await?;
        Ok(markup.len() as u64)
    }

    async fn capture_image(&self, page: PageHandle) -> BrowserResult<Vec<u8>> {
        let url = self.page_url(page).await?;
        self.source.screenshot(&url).await
    }

    async fn close(&self, page: PageHandle) -> BrowserResult<()> {
        self.pages.write().await.remove(&page);
        Ok(())
    }
}
