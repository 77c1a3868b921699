use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, TabSpec};
use crate::dedup::Deduplicator;
use crate::driver::PageDriver;
use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::pagination::{PageBatch, Paginator};
use crate::sink::RecordSink;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    pub tabs: usize,
    pub pages: usize,
    pub parsed: usize,
    pub skipped_blocks: usize,
    pub duplicates: usize,
    pub admitted: usize,
    pub filings: usize,
    pub parties: usize,
    pub resolutions: usize,
    /// Successful `upsert` calls, summed over sinks.
    pub written: usize,
    pub sink_failures: usize,
}

impl RunStats {
    pub fn print(&self) {
        println!(
            "Scanned {} tabs / {} pages: {} blocks parsed, {} skipped, {} duplicates.",
            self.tabs, self.pages, self.parsed, self.skipped_blocks, self.duplicates
        );
        println!(
            "Admitted {} cases ({} filings, {} parties, {} resolutions): {} sink writes, {} failures.",
            self.admitted, self.filings, self.parties, self.resolutions, self.written, self.sink_failures
        );
    }
}

/// Scrape every configured tab and push each new case through the sinks.
pub struct Pipeline<'a> {
    config: &'a AppConfig,
    dedup: Deduplicator,
    progress: ProgressBar,
    stats: RunStats,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        let progress = if config.progress {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        } else {
            ProgressBar::hidden()
        };
        Self {
            config,
            dedup: Deduplicator::new(config.dedup),
            progress,
            stats: RunStats::default(),
        }
    }

    pub async fn run<D: PageDriver>(
        mut self,
        driver: &mut D,
        sinks: &mut [&mut dyn RecordSink],
    ) -> Result<RunStats, PipelineError> {
        let config = self.config;
        if config.tabs.is_empty() {
            self.progress.finish_and_clear();
            return Err(PipelineError::NoTabs);
        }
        let url = &config.listing_url;
        info!(%url, "opening listing");
        driver
            .goto(url)
            .await
            .map_err(|source| PipelineError::Navigation {
                url: url.clone(),
                source,
            })?;

        let containers = config
            .tabs
            .iter()
            .map(|t| t.container.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        if driver
            .wait_for_selector(&containers, config.timing.content_timeout())
            .await
            .is_err()
        {
            self.progress.finish_and_clear();
            return Err(PipelineError::ListingMissing { selector: containers });
        }

        for tab in &config.tabs {
            if !self.open_tab(driver, tab).await {
                continue;
            }
            self.stats.tabs += 1;
            let mut paginator = Paginator::new(tab, &config.timing, config.expand_history);
            while let Some(batch) = paginator.next_page(driver).await {
                self.absorb(tab, batch, sinks);
            }
        }

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                warn!(sink = sink.name(), error = ?e, "sink did not finish cleanly");
                self.stats.sink_failures += 1;
            }
        }
        self.progress.finish_and_clear();
        info!(
            tabs = self.stats.tabs,
            pages = self.stats.pages,
            admitted = self.stats.admitted,
            unique_keys = self.dedup.len(),
            duplicates = self.stats.duplicates,
            failures = self.stats.sink_failures,
            "run finished"
        );
        Ok(self.stats)
    }

    /// Activate `tab`; false when its button is missing or unclickable.
    async fn open_tab<D: PageDriver>(&self, driver: &mut D, tab: &TabSpec) -> bool {
        let Some(button) = &tab.button else {
            return true;
        };
        let el = match driver.query_selector(button).await {
            Ok(Some(el)) => el,
            Ok(None) => {
                warn!(tab = %tab.status_label, %button, "tab button not found; skipping tab");
                return false;
            }
            Err(e) => {
                warn!(tab = %tab.status_label, error = %e, "tab button lookup failed; skipping tab");
                return false;
            }
        };
        if let Err(e) = driver.click(&el).await {
            warn!(tab = %tab.status_label, error = %e, "could not open tab; skipping");
            return false;
        }
        driver.wait_for_timeout(self.config.timing.settle()).await;
        info!(tab = %tab.status_label, "tab opened");
        true
    }

    fn absorb(&mut self, tab: &TabSpec, batch: PageBatch, sinks: &mut [&mut dyn RecordSink]) {
        self.stats.pages += 1;
        self.stats.parsed += batch.cases.len();
        self.stats.skipped_blocks += batch.skipped;
        let mut admitted = 0;

        for raw in &batch.cases {
            let Some(key) = self.dedup.key_for(raw.case_number(), raw.status_tab.as_deref()) else {
                warn!(tab = %tab.status_label, page = batch.page, "block without case number; skipping");
                self.stats.skipped_blocks += 1;
                continue;
            };
            if !self.dedup.admit(key) {
                debug!(case = raw.case_number(), "duplicate suppressed");
                self.stats.duplicates += 1;
                continue;
            }
            admitted += 1;

            let record = normalize(raw);
            self.stats.filings += record.filing_history.len();
            self.stats.parties += record.parties.len();
            self.stats.resolutions += record.resolutions.len();
            for sink in sinks.iter_mut() {
                match sink.upsert(&record) {
                    Ok(()) => self.stats.written += 1,
                    Err(e) => {
                        warn!(case = %record.case_number, sink = sink.name(), error = ?e, "sink write failed");
                        self.stats.sink_failures += 1;
                    }
                }
            }
        }

        self.stats.admitted += admitted;
        info!(
            tab = %tab.status_label,
            page = batch.page,
            blocks = batch.cases.len(),
            admitted,
            "page processed"
        );
        self.progress.set_message(format!(
            "{} · page {} · {} cases",
            tab.status_label, batch.page, self.stats.admitted
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteSink;
    use crate::driver::snapshot::SnapshotDriver;
    use crate::fixtures::{listing_page, result_block};
    use crate::model::Role;
    use crate::sink::memory::MemorySink;
    use chrono::NaiveDate;

    fn quiet_config() -> AppConfig {
        AppConfig {
            progress: false,
            ..AppConfig::default()
        }
    }

    fn e2e_driver() -> SnapshotDriver {
        let html = std::fs::read_to_string("tests/fixtures/e2e_listing.html").unwrap();
        SnapshotDriver::with_tabs(vec![
            ("btn-solapa-1".into(), vec![html.clone()]),
            ("btn-solapa-2".into(), vec![html.replace("id=\"solapa-1\"", "id=\"solapa-x\"")]),
        ])
    }

    #[tokio::test]
    async fn end_to_end_fixture() {
        let config = quiet_config();
        let mut driver = e2e_driver();
        let mut mem = MemorySink::default();
        let mut db = SqliteSink::in_memory().unwrap();

        let stats = Pipeline::new(&config)
            .run(&mut driver, &mut [&mut mem, &mut db])
            .await
            .unwrap();

        assert_eq!(stats.parsed, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.written, 2);
        assert_eq!((stats.filings, stats.parties, stats.resolutions), (1, 1, 1));
        assert_eq!(mem.records.len(), 1);

        let rec = &mem.records[0];
        assert_eq!(rec.case_number, "CFP 100/2020");
        assert_eq!(rec.forum, "Penal Federal");
        assert_eq!(rec.jurisdiction, "Federal");
        assert_eq!(rec.status_tab.as_deref(), Some("En trámite"));
        assert_eq!(rec.filing_history.len(), 1);
        assert_eq!(rec.filing_history[0].order, 1);
        assert_eq!(rec.filing_history[0].court_name, "Juzgado Federal 1");
        assert_eq!(rec.filing_history[0].prosecutor_name.as_deref(), Some("Juan Pérez"));

        let imputados: Vec<_> = rec.parties_with_role(&Role::Imputado).collect();
        assert_eq!(imputados.len(), 1);
        assert_eq!(imputados[0].name, "Juan Gómez");
        assert_eq!(imputados[0].counsel, vec!["Ana Ruiz".to_string()]);

        assert_eq!(rec.resolutions.len(), 1);
        assert_eq!(rec.resolutions[0].date, NaiveDate::from_ymd_opt(2020, 4, 15));
        assert_eq!(rec.resolutions[0].title, "Procesamiento");

        let letrados: usize = db
            .connection()
            .query_row("SELECT COUNT(*) FROM representacion", [], |r| r.get(0))
            .unwrap();
        assert_eq!(letrados, 1);
    }

    #[tokio::test]
    async fn non_federal_court_is_national() {
        let config = quiet_config();
        let html = std::fs::read_to_string("tests/fixtures/e2e_listing.html")
            .unwrap()
            .replace("Juzgado Federal 1", "Juzgado Nacional en lo Criminal 4");
        let mut driver = SnapshotDriver::with_tabs(vec![("btn-solapa-1".into(), vec![html])]);
        let mut mem = MemorySink::default();

        Pipeline::new(&config).run(&mut driver, &mut [&mut mem]).await.unwrap();
        assert_eq!(mem.records[0].jurisdiction, "National");
    }

    #[tokio::test]
    async fn stoplisted_parties_are_dropped() {
        let config = quiet_config();
        let html = std::fs::read_to_string("tests/fixtures/e2e_listing.html")
            .unwrap()
            .replace("<li>Juan Gómez", "<li>NN</li><li>Otros");
        let mut driver = SnapshotDriver::with_tabs(vec![("btn-solapa-1".into(), vec![html])]);
        let mut mem = MemorySink::default();

        Pipeline::new(&config).run(&mut driver, &mut [&mut mem]).await.unwrap();
        assert_eq!(mem.records[0].parties_with_role(&Role::Imputado).count(), 0);
    }

    #[tokio::test]
    async fn unreachable_listing_is_fatal() {
        let config = quiet_config();
        let mut driver = e2e_driver().unreachable();
        let err = Pipeline::new(&config).run(&mut driver, &mut []).await.unwrap_err();
        assert!(matches!(err, PipelineError::Navigation { .. }));
    }

    #[tokio::test]
    async fn empty_tab_selection_fails_before_navigation() {
        let mut config = quiet_config();
        config.tabs.clear();
        let mut driver = e2e_driver().unreachable();
        let err = Pipeline::new(&config).run(&mut driver, &mut []).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoTabs));
    }

    #[tokio::test]
    async fn missing_listing_container_is_fatal() {
        let config = quiet_config();
        let mut driver = SnapshotDriver::new(vec!["<html><body>Mantenimiento</body></html>".into()]);
        let err = Pipeline::new(&config).run(&mut driver, &mut []).await.unwrap_err();
        assert!(matches!(err, PipelineError::ListingMissing { .. }));
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_run() {
        let config = quiet_config();
        let page = listing_page(
            "solapa-1",
            &[result_block("CFP 1/2020", 0), result_block("CFP 2/2020", 0)],
            1,
            false,
        );
        let mut driver = SnapshotDriver::with_tabs(vec![("btn-solapa-1".into(), vec![page])]);
        let mut mem = MemorySink {
            fail_on: Some("CFP 1/2020".into()),
            ..MemorySink::default()
        };

        let stats = Pipeline::new(&config).run(&mut driver, &mut [&mut mem]).await.unwrap();
        assert_eq!(stats.sink_failures, 1);
        assert_eq!(mem.records.len(), 1);
        assert_eq!(mem.records[0].case_number, "CFP 2/2020");
    }

    #[tokio::test]
    async fn tabs_scanned_independently() {
        let config = quiet_config();
        let open = listing_page("solapa-1", &[result_block("CFP 1/2020", 0)], 1, false);
        let closed = listing_page(
            "solapa-2",
            &[result_block("CFP 1/2020", 0), result_block("CFP 8/2017", 0)],
            1,
            false,
        );
        let mut driver = SnapshotDriver::with_tabs(vec![
            ("btn-solapa-1".into(), vec![open]),
            ("btn-solapa-2".into(), vec![closed]),
        ]);
        let mut mem = MemorySink::default();

        let stats = Pipeline::new(&config).run(&mut driver, &mut [&mut mem]).await.unwrap();
        assert_eq!(stats.tabs, 2);
        let seen: Vec<(&str, Option<&str>)> = mem
            .records
            .iter()
            .map(|r| (r.case_number.as_str(), r.status_tab.as_deref()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("CFP 1/2020", Some("En trámite")),
                ("CFP 1/2020", Some("Terminadas")),
                ("CFP 8/2017", Some("Terminadas")),
            ]
        );
    }
}
