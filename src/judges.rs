//! Court directory import: `responsables` text → judges and court assignments.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::db;
use crate::normalize::clean_text;

pub const DEFAULT_SITUATION: &str = "Efectivo";

static BLOCK_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[;\n]").unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Nombre:\s*([^|]+)").unwrap());
static POSITION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Cargo:\s*([^|]+)").unwrap());
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)E-?mail:\s*([^|]+)").unwrap());
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:Tel|Tel[eé]fono):\s*([^|]+)").unwrap());
static SITUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Situaci[oó]n:\s*([^|]+)").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct JudgeEntry {
    pub name: String,
    pub position: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub situation: String,
}

fn capture(re: &Regex, block: &str) -> Option<String> {
    re.captures(block)
        .map(|c| clean_text(&c[1]))
        .filter(|v| !v.is_empty())
}

/// Parse `Nombre: … | Cargo: … | Tel: … | Email: … | Situación: …` blocks
/// separated by `;` or newlines. Blocks without a name are dropped.
pub fn parse_responsables(text: &str) -> Vec<JudgeEntry> {
    BLOCK_SPLIT_RE
        .split(text)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .filter_map(|block| {
            Some(JudgeEntry {
                name: capture(&NAME_RE, block)?,
                position: capture(&POSITION_RE, block),
                phone: capture(&PHONE_RE, block),
                email: capture(&EMAIL_RE, block),
                situation: capture(&SITUATION_RE, block)
                    .unwrap_or_else(|| DEFAULT_SITUATION.to_string()),
            })
        })
        .collect()
}

/// One row of the court directory export.
#[derive(Debug, Deserialize)]
struct DirectoryRow {
    #[serde(default)]
    titulo: String,
    #[serde(default)]
    responsables: String,
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub rows: usize,
    pub courts: usize,
    pub assignments: usize,
    pub skipped: usize,
}

/// Load a directory CSV (`nivel,path,titulo,detalle,responsables`) into the judge tables.
pub fn import_directory(conn: &Connection, csv_path: &Path) -> Result<ImportStats> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("opening {}", csv_path.display()))?;

    let mut stats = ImportStats::default();
    for (line, row) in reader.deserialize::<DirectoryRow>().enumerate() {
        stats.rows += 1;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping malformed directory row");
                stats.skipped += 1;
                continue;
            }
        };
        let court = clean_text(&row.titulo);
        let judges = parse_responsables(&row.responsables);
        if court.is_empty() || judges.is_empty() {
            debug!(line = line + 2, "directory row without court or judges");
            stats.skipped += 1;
            continue;
        }
        stats.assignments += db::save_court_judges(conn, &court, &judges)?;
        stats.courts += 1;
    }
    info!(
        rows = stats.rows,
        courts = stats.courts,
        assignments = stats.assignments,
        "court directory imported"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteSink;
    use std::io::Write;

    #[test]
    fn parses_blocks_and_defaults_situation() {
        let judges = parse_responsables(
            "Nombre: María Servini | Cargo: Juez | Tel: 4032-7000 | Email: mservini@pjn.gov.ar | Situación: Subrogante; \
             Nombre: Luis Rodríguez | Cargo: Secretario | Tel:  | Email: \n\
             Cargo: sin nombre",
        );
        assert_eq!(judges.len(), 2);
        assert_eq!(judges[0].name, "María Servini");
        assert_eq!(judges[0].phone.as_deref(), Some("4032-7000"));
        assert_eq!(judges[0].situation, "Subrogante");
        assert_eq!(judges[1].email, None);
        assert_eq!(judges[1].phone, None);
        assert_eq!(judges[1].situation, DEFAULT_SITUATION);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(parse_responsables("").is_empty());
        assert!(parse_responsables(" ; \n ").is_empty());
    }

    #[test]
    fn imports_directory_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nivel,path,titulo,detalle,responsables").unwrap();
        writeln!(
            file,
            r#"1,/a,Juzgado Federal 1,,"Nombre: María Servini | Cargo: Juez; Nombre: Ana Paz | Cargo: Secretaria""#
        )
        .unwrap();
        writeln!(file, "1,/b,Juzgado Federal 2,,").unwrap();
        file.flush().unwrap();

        let sink = SqliteSink::in_memory().unwrap();
        let stats = import_directory(sink.connection(), file.path()).unwrap();
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.courts, 1);
        assert_eq!(stats.assignments, 2);
        assert_eq!(stats.skipped, 1);

        let again = import_directory(sink.connection(), file.path()).unwrap();
        assert_eq!(again.courts, 1);
        let n: usize = sink
            .connection()
            .query_row("SELECT COUNT(*) FROM tribunal_juez", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
