//! Flat CSV output: one file per entity kind, fixed headers.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::Writer;

use crate::model::CaseRecord;
use crate::normalize::format_date;
use crate::sink::RecordSink;

const CASE_HEADER: &[&str] = &[
    "case_number",
    "caption",
    "offenses",
    "status",
    "status_tab",
    "last_update",
    "filing_summary",
    "forum",
    "jurisdiction",
    "chamber",
    "year",
];
const PARTY_HEADER: &[&str] = &["case_number", "role", "name", "counsel"];
const FILING_HEADER: &[&str] = &[
    "case_number",
    "order",
    "filing_date",
    "court_name",
    "prosecutor_name",
    "prosecutor_office",
];
const RESOLUTION_HEADER: &[&str] = &["case_number", "date", "date_text", "title", "link"];

fn date_cell(d: Option<chrono::NaiveDate>) -> String {
    d.map(format_date).unwrap_or_default()
}

pub struct CsvSink {
    cases: Writer<File>,
    parties: Writer<File>,
    filings: Writer<File>,
    resolutions: Writer<File>,
    written: HashSet<(String, Option<String>)>,
}

fn open(dir: &Path, prefix: &str, kind: &str, header: &[&str]) -> Result<Writer<File>> {
    let name = if prefix.is_empty() {
        format!("{kind}.csv")
    } else {
        format!("{prefix}_{kind}.csv")
    };
    let path: PathBuf = dir.join(name);
    let mut w = Writer::from_path(&path).with_context(|| format!("creating {}", path.display()))?;
    w.write_record(header)?;
    Ok(w)
}

impl CsvSink {
    /// Create (truncating) the four output files under `dir`.
    pub fn create(dir: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self {
            cases: open(dir, prefix, "expedientes", CASE_HEADER)?,
            parties: open(dir, prefix, "intervinientes", PARTY_HEADER)?,
            filings: open(dir, prefix, "radicaciones", FILING_HEADER)?,
            resolutions: open(dir, prefix, "resoluciones", RESOLUTION_HEADER)?,
            written: HashSet::new(),
        })
    }
}

impl RecordSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn upsert(&mut self, rec: &CaseRecord) -> Result<()> {
        // Append-only output: a repeat is a no-op.
        if !self.written.insert((rec.case_number.clone(), rec.status_tab.clone())) {
            return Ok(());
        }
        let n = rec.case_number.as_str();

        let last_update = date_cell(rec.last_update);
        let offenses = rec.offense_list.join(", ");
        let year = rec.year.map(|y| y.to_string()).unwrap_or_default();
        self.cases.write_record([
            n,
            rec.caption.as_str(),
            offenses.as_str(),
            rec.status.as_str(),
            rec.status_tab.as_deref().unwrap_or(""),
            last_update.as_str(),
            rec.filing_summary.as_str(),
            rec.forum.as_str(),
            rec.jurisdiction.as_str(),
            rec.chamber.as_str(),
            year.as_str(),
        ])?;

        for p in &rec.parties {
            if p.counsel.is_empty() {
                self.parties.write_record([n, p.role.as_str(), p.name.as_str(), ""])?;
            }
            for c in &p.counsel {
                self.parties.write_record([n, p.role.as_str(), p.name.as_str(), c.as_str()])?;
            }
        }

        for f in &rec.filing_history {
            let order = f.order.to_string();
            let filed = date_cell(f.filing_date);
            self.filings.write_record([
                n,
                order.as_str(),
                filed.as_str(),
                f.court_name.as_str(),
                f.prosecutor_name.as_deref().unwrap_or(""),
                f.prosecutor_office.as_deref().unwrap_or(""),
            ])?;
        }

        for r in &rec.resolutions {
            let date = date_cell(r.date);
            self.resolutions.write_record([
                n,
                date.as_str(),
                r.date_text.as_str(),
                r.title.as_str(),
                r.link.as_deref().unwrap_or(""),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for w in [&mut self.cases, &mut self.parties, &mut self.filings, &mut self.resolutions] {
            w.flush()?;
        }
        Ok(())
    }
}
