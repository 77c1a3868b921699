//! A `PageDriver` over pre-rendered HTML: one list of page snapshots per tab.
//!
//! Clicking an element whose id names a tab switches to that tab's first
//! page; clicking an element with class `next` advances one page. Any other
//! click is recorded and leaves the document unchanged. Waits are recorded,
//! not slept.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};

use super::PageDriver;
use crate::error::DriverError;

const EMPTY_DOCUMENT: &str = "<html><body></body></html>";

#[derive(Debug, Clone)]
pub struct SnapshotElement {
    path: Vec<(String, usize)>,
    generation: u64,
}

#[derive(Debug, Default, Clone)]
pub struct InteractionLog {
    /// `(tab, page index)` every time a new document became current.
    pub pages_visited: Vec<(String, usize)>,
    pub next_clicks: usize,
    pub other_clicks: usize,
    pub waited: Duration,
}

enum ClickTarget {
    Tab(String),
    Next,
    Other,
}

pub struct SnapshotDriver {
    tabs: Vec<(String, Vec<String>)>,
    tab: usize,
    page: usize,
    generation: u64,
    reachable: bool,
    log: InteractionLog,
}

impl SnapshotDriver {
    /// Single unnamed tab.
    pub fn new(pages: Vec<String>) -> Self {
        Self::with_tabs(vec![(String::new(), pages)])
    }

    /// Tabs keyed by the id of the element that activates them.
    pub fn with_tabs(tabs: Vec<(String, Vec<String>)>) -> Self {
        Self {
            tabs,
            tab: 0,
            page: 0,
            generation: 0,
            reachable: true,
            log: InteractionLog::default(),
        }
    }

    /// Load `<dir>/<tab-id>/*.html`, or `<dir>/*.html` as a single tab.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut subdirs = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                subdirs.push(path);
            }
        }
        subdirs.sort();

        if subdirs.is_empty() {
            return Ok(Self::new(read_pages(dir)?));
        }
        let mut tabs = Vec::new();
        for sub in subdirs {
            let id = sub
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tabs.push((id, read_pages(&sub)?));
        }
        Ok(Self::with_tabs(tabs))
    }

    /// Make every `goto` fail, as an unreachable host would.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    fn current(&self) -> &str {
        self.tabs
            .get(self.tab)
            .and_then(|(_, pages)| pages.get(self.page))
            .map(String::as_str)
            .unwrap_or(EMPTY_DOCUMENT)
    }

    fn document_changed(&mut self) {
        self.generation += 1;
        let tab = self.tabs.get(self.tab).map(|(id, _)| id.clone()).unwrap_or_default();
        self.log.pages_visited.push((tab, self.page));
    }

    /// Walk `element`'s selector path in the current document.
    fn with_element<R>(
        &self,
        element: &SnapshotElement,
        f: impl FnOnce(ElementRef) -> R,
    ) -> Result<R, DriverError> {
        let detached = || {
            let css = element.path.last().map(|(s, _)| s.clone()).unwrap_or_default();
            DriverError::Detached(css)
        };
        if element.generation != self.generation {
            return Err(detached());
        }
        let doc = Html::parse_document(self.current());
        let mut steps = element.path.iter();
        let (css, idx) = steps.next().ok_or_else(detached)?;
        let mut node = doc.select(&parse_selector(css)?).nth(*idx).ok_or_else(detached)?;
        for (css, idx) in steps {
            node = node.select(&parse_selector(css)?).nth(*idx).ok_or_else(detached)?;
        }
        Ok(f(node))
    }

    fn count_matches(&self, css: &str) -> Result<usize, DriverError> {
        let selector = parse_selector(css)?;
        let doc = Html::parse_document(self.current());
        let n = doc.select(&selector).count();
        Ok(n)
    }
}

fn read_pages(dir: &Path) -> Result<Vec<String>> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();
    files
        .iter()
        .map(|p| std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())))
        .collect()
}

fn parse_selector(css: &str) -> Result<Selector, DriverError> {
    Selector::parse(css).map_err(|_| DriverError::Selector(css.to_string()))
}

/// Hidden by `hidden` or an inline `display:none` on the element or any ancestor.
fn rendered(el: ElementRef) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .all(|e| {
            let v = e.value();
            let style = v.attr("style").unwrap_or("").replace(' ', "").to_lowercase();
            v.attr("hidden").is_none() && !style.contains("display:none")
        })
}

impl PageDriver for SnapshotDriver {
    type Element = SnapshotElement;

    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        if !self.reachable {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "host unreachable".into(),
            });
        }
        self.tab = 0;
        self.page = 0;
        self.document_changed();
        Ok(())
    }

    async fn query_selector(&mut self, selector: &str) -> Result<Option<SnapshotElement>, DriverError> {
        Ok(self.query_selector_all(selector).await?.into_iter().next())
    }

    async fn query_selector_all(&mut self, selector: &str) -> Result<Vec<SnapshotElement>, DriverError> {
        let n = self.count_matches(selector)?;
        Ok((0..n)
            .map(|i| SnapshotElement {
                path: vec![(selector.to_string(), i)],
                generation: self.generation,
            })
            .collect())
    }

    async fn query_within(
        &mut self,
        parent: &SnapshotElement,
        selector: &str,
    ) -> Result<Option<SnapshotElement>, DriverError> {
        let inner = parse_selector(selector)?;
        let found = self.with_element(parent, |p| p.select(&inner).next().is_some())?;
        Ok(found.then(|| {
            let mut path = parent.path.clone();
            path.push((selector.to_string(), 0));
            SnapshotElement {
                path,
                generation: self.generation,
            }
        }))
    }

    async fn is_visible(&mut self, element: &SnapshotElement) -> Result<bool, DriverError> {
        self.with_element(element, rendered)
    }

    async fn inner_text(&mut self, element: &SnapshotElement) -> Result<String, DriverError> {
        self.with_element(element, |e| e.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
    }

    async fn click(&mut self, element: &SnapshotElement) -> Result<(), DriverError> {
        let tab_ids: Vec<&str> = self.tabs.iter().map(|(id, _)| id.as_str()).collect();
        let target = self.with_element(element, |e| {
            let v = e.value();
            match v.id() {
                Some(id) if tab_ids.contains(&id) => ClickTarget::Tab(id.to_string()),
                _ if v.classes().any(|c| c == "next") => ClickTarget::Next,
                _ => ClickTarget::Other,
            }
        })?;

        match target {
            ClickTarget::Tab(id) => {
                self.tab = self.tabs.iter().position(|(t, _)| *t == id).unwrap_or(0);
                self.page = 0;
                self.document_changed();
            }
            ClickTarget::Next => {
                self.log.next_clicks += 1;
                let pages = self.tabs.get(self.tab).map(|(_, p)| p.len()).unwrap_or(0);
                if self.page + 1 < pages {
                    self.page += 1;
                    self.document_changed();
                }
            }
            ClickTarget::Other => self.log.other_clicks += 1,
        }
        Ok(())
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        if self.count_matches(selector)? > 0 {
            return Ok(());
        }
        self.log.waited += timeout;
        Err(DriverError::Timeout {
            selector: selector.to_string(),
            waited: timeout,
        })
    }

    async fn wait_for_timeout(&mut self, duration: Duration) {
        self.log.waited += duration;
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        Ok(self.current().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<html><body>{body}</body></html>")
    }

    #[tokio::test]
    async fn next_click_advances_and_detaches_old_handles() {
        let mut d = SnapshotDriver::new(vec![
            page(r#"<a class="page-link next">›</a><p>uno</p>"#),
            page(r#"<p>dos</p>"#),
        ]);
        d.goto("about:blank").await.unwrap();
        let next = d.query_selector("a.next").await.unwrap().unwrap();
        d.click(&next).await.unwrap();
        assert!(d.content().await.unwrap().contains("dos"));
        assert!(matches!(d.click(&next).await, Err(DriverError::Detached(_))));
        assert_eq!(d.log().pages_visited, vec![(String::new(), 0), (String::new(), 1)]);
    }

    #[tokio::test]
    async fn visibility_follows_ancestors() {
        let mut d = SnapshotDriver::new(vec![page(
            r#"<div style="display: none"><a id="a">x</a></div><a id="b">y</a><a id="c" hidden>z</a>"#,
        )]);
        for (css, visible) in [("#a", false), ("#b", true), ("#c", false)] {
            let el = d.query_selector(css).await.unwrap().unwrap();
            assert_eq!(d.is_visible(&el).await.unwrap(), visible, "{css}");
        }
    }

    #[tokio::test]
    async fn tab_button_switches_document() {
        let mut d = SnapshotDriver::with_tabs(vec![
            ("btn-1".into(), vec![page(r#"<a id="btn-2">T</a><p>primera</p>"#)]),
            ("btn-2".into(), vec![page("<p>segunda</p>")]),
        ]);
        let btn = d.query_selector("#btn-2").await.unwrap().unwrap();
        d.click(&btn).await.unwrap();
        assert!(d.content().await.unwrap().contains("segunda"));
    }

    #[tokio::test]
    async fn missing_selector_times_out() {
        let mut d = SnapshotDriver::new(vec![page("<p>nada</p>")]);
        let err = d
            .wait_for_selector("div.result", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(d.log().waited, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn query_within_scopes_to_parent() {
        let mut d = SnapshotDriver::new(vec![page(
            r#"<div class="r"><i>1</i></div><div class="r"><b class="x">2</b></div>"#,
        )]);
        let blocks = d.query_selector_all("div.r").await.unwrap();
        assert!(d.query_within(&blocks[0], "b.x").await.unwrap().is_none());
        let x = d.query_within(&blocks[1], "b.x").await.unwrap().unwrap();
        assert_eq!(d.inner_text(&x).await.unwrap(), "2");
    }
}
