use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{TabSpec, Timing};
use crate::driver::PageDriver;
use crate::error::DriverError;
use crate::model::RawCase;
use crate::parser;

/// "Show full filing history" control inside a result block.
const EXPAND_CONTROL: &str = "div.ver-todos.soy-ver-todos";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingContent,
    ParsingPage,
    AdvancingPage,
    Done,
}

/// Everything parsed from one listing page.
#[derive(Debug)]
pub struct PageBatch {
    /// 1-based within the tab.
    pub page: usize,
    pub cases: Vec<RawCase>,
    /// Blocks that could not be parsed.
    pub skipped: usize,
}

/// Walks the pages of one tab, one `next_page` call per page.
pub struct Paginator<'a> {
    tab: &'a TabSpec,
    timing: &'a Timing,
    expand_history: bool,
    state: State,
    page: usize,
    block_selector: String,
    next_selector: String,
    active_selector: String,
}

impl<'a> Paginator<'a> {
    pub fn new(tab: &'a TabSpec, timing: &'a Timing, expand_history: bool) -> Self {
        Self {
            tab,
            timing,
            expand_history,
            state: State::AwaitingContent,
            page: 1,
            block_selector: tab.block_selector(),
            next_selector: tab.next_selector(),
            active_selector: tab.active_page_selector(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Drive the state machine until a page has been parsed or the tab is exhausted.
    pub async fn next_page<D: PageDriver>(&mut self, driver: &mut D) -> Option<PageBatch> {
        loop {
            match self.state {
                State::AwaitingContent => {
                    self.state = match driver
                        .wait_for_selector(&self.block_selector, self.timing.content_timeout())
                        .await
                    {
                        Ok(()) => State::ParsingPage,
                        Err(e) => {
                            self.log_stop(&e, "no result blocks");
                            State::Done
                        }
                    };
                }
                State::ParsingPage => match self.parse_current(driver).await {
                    Some(batch) => {
                        self.state = State::AdvancingPage;
                        return Some(batch);
                    }
                    None => self.state = State::Done,
                },
                State::AdvancingPage => {
                    self.state = self.advance(driver).await;
                }
                State::Done => return None,
            }
        }
    }

    fn log_stop(&self, err: &DriverError, what: &str) {
        if err.is_transient() {
            info!(tab = %self.tab.status_label, page = self.page, "{what}; tab finished");
        } else {
            warn!(tab = %self.tab.status_label, page = self.page, error = %err, "{what}; tab aborted");
        }
    }

    async fn parse_current<D: PageDriver>(&mut self, driver: &mut D) -> Option<PageBatch> {
        if self.expand_history {
            self.expand_filings(driver).await;
        }
        let html = match driver.content().await {
            Ok(html) => html,
            Err(e) => {
                self.log_stop(&e, "page snapshot failed");
                return None;
            }
        };

        let blocks = match parser::parse_page(&html, &self.block_selector) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(tab = %self.tab.status_label, error = %e, "cannot parse listing");
                return None;
            }
        };
        if blocks.is_empty() {
            info!(tab = %self.tab.status_label, page = self.page, "empty page; tab finished");
            return None;
        }

        let mut cases = Vec::with_capacity(blocks.len());
        let mut skipped = 0;
        for (idx, block) in blocks.into_iter().enumerate() {
            match block {
                Ok(mut raw) => {
                    raw.status_tab = Some(self.tab.status_label.clone());
                    cases.push(raw);
                }
                Err(e) => {
                    warn!(tab = %self.tab.status_label, page = self.page, block = idx, error = %e, "skipping block");
                    skipped += 1;
                }
            }
        }
        Some(PageBatch {
            page: self.page,
            cases,
            skipped,
        })
    }

    /// Click every visible filing-history expander on the page.
    async fn expand_filings<D: PageDriver>(&self, driver: &mut D) {
        let blocks = match driver.query_selector_all(&self.block_selector).await {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(error = %e, "could not enumerate blocks for expansion");
                return;
            }
        };
        for (idx, block) in blocks.iter().enumerate() {
            let control = match driver.query_within(block, EXPAND_CONTROL).await {
                Ok(Some(control)) => control,
                Ok(None) => continue,
                Err(e) => {
                    warn!(page = self.page, block = idx, error = %e, "filing history lookup failed");
                    continue;
                }
            };
            match driver.is_visible(&control).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(page = self.page, block = idx, error = %e, "filing history control unusable");
                    continue;
                }
            }
            if let Err(e) = driver.click(&control).await {
                warn!(page = self.page, block = idx, error = %e, "could not expand filing history");
                continue;
            }
            driver.wait_for_timeout(self.timing.expand_settle()).await;
        }
    }

    async fn advance<D: PageDriver>(&mut self, driver: &mut D) -> State {
        let next = match driver.query_selector(&self.next_selector).await {
            Ok(Some(next)) => next,
            Ok(None) => {
                info!(tab = %self.tab.status_label, pages = self.page, "no next control; tab finished");
                return State::Done;
            }
            Err(e) => {
                self.log_stop(&e, "next control lookup failed");
                return State::Done;
            }
        };
        match driver.is_visible(&next).await {
            Ok(true) => {}
            Ok(false) => {
                info!(tab = %self.tab.status_label, pages = self.page, "next control hidden; tab finished");
                return State::Done;
            }
            Err(e) => {
                self.log_stop(&e, "next control unusable");
                return State::Done;
            }
        }

        let before = self.active_page(driver).await;
        if let Err(e) = driver.click(&next).await {
            self.log_stop(&e, "next click failed");
            return State::Done;
        }

        if let Some(before) = before {
            if !self.wait_for_page_change(driver, &before).await {
                warn!(tab = %self.tab.status_label, page = self.page, "active page indicator never changed");
                return State::Done;
            }
        }
        driver.wait_for_timeout(self.timing.settle()).await;

        self.page += 1;
        debug!(tab = %self.tab.status_label, page = self.page, "advanced");
        State::AwaitingContent
    }

    async fn active_page<D: PageDriver>(&self, driver: &mut D) -> Option<String> {
        let el = driver.query_selector(&self.active_selector).await.ok().flatten()?;
        driver.inner_text(&el).await.ok().map(|t| t.trim().to_string())
    }

    async fn wait_for_page_change<D: PageDriver>(&self, driver: &mut D, before: &str) -> bool {
        let poll = self.timing.poll();
        let mut waited = Duration::ZERO;
        while waited < self.timing.page_change_timeout() {
            driver.wait_for_timeout(poll).await;
            waited += poll;
            if let Some(now) = self.active_page(driver).await {
                if now != before {
                    return true;
                }
            }
        }
        false
    }
}
