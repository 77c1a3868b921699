use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Transaction};

use crate::judges::JudgeEntry;
use crate::model::CaseRecord;
use crate::sink::RecordSink;

/// Stands in for a dimension value the listing left blank.
pub const PLACEHOLDER: &str = "Desconocido";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("opening {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fuero (
            fuero_id INTEGER PRIMARY KEY,
            nombre   TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS jurisdiccion (
            jurisdiccion_id INTEGER PRIMARY KEY,
            ambito          TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS tribunal (
            tribunal_id     INTEGER PRIMARY KEY,
            nombre          TEXT NOT NULL UNIQUE,
            fuero_id        INTEGER REFERENCES fuero(fuero_id),
            jurisdiccion_id INTEGER REFERENCES jurisdiccion(jurisdiccion_id)
        );

        CREATE TABLE IF NOT EXISTS estado_procesal (
            estado_procesal_id INTEGER PRIMARY KEY,
            nombre             TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS expediente (
            numero_expediente       TEXT PRIMARY KEY,
            caratula                TEXT,
            estado_solapa           TEXT,
            fecha_inicio            TEXT,
            fecha_ultimo_movimiento TEXT,
            camara_origen           TEXT,
            ano_inicio              INTEGER,
            radicacion              TEXT,
            extras                  TEXT,
            fuero_id                INTEGER NOT NULL REFERENCES fuero(fuero_id),
            jurisdiccion_id         INTEGER NOT NULL REFERENCES jurisdiccion(jurisdiccion_id),
            tribunal_id             INTEGER REFERENCES tribunal(tribunal_id),
            estado_procesal_id      INTEGER NOT NULL REFERENCES estado_procesal(estado_procesal_id),
            updated_at              TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS tipo_delito (
            tipo TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS expediente_delito (
            numero_expediente TEXT NOT NULL REFERENCES expediente(numero_expediente),
            tipo              TEXT NOT NULL REFERENCES tipo_delito(tipo),
            orden             INTEGER NOT NULL,
            PRIMARY KEY (numero_expediente, tipo)
        );

        CREATE TABLE IF NOT EXISTS radicacion (
            numero_expediente TEXT NOT NULL REFERENCES expediente(numero_expediente),
            orden             INTEGER NOT NULL,
            fecha_radicacion  TEXT,
            tribunal_id       INTEGER REFERENCES tribunal(tribunal_id),
            fiscal_nombre     TEXT,
            fiscalia          TEXT,
            PRIMARY KEY (numero_expediente, orden)
        );

        CREATE TABLE IF NOT EXISTS rol_parte (
            rol_parte_id INTEGER PRIMARY KEY,
            nombre       TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS parte (
            parte_id            INTEGER PRIMARY KEY,
            numero_expediente   TEXT NOT NULL REFERENCES expediente(numero_expediente),
            nombre_razon_social TEXT NOT NULL,
            rol_parte_id        INTEGER NOT NULL REFERENCES rol_parte(rol_parte_id),
            UNIQUE(numero_expediente, nombre_razon_social)
        );
        CREATE INDEX IF NOT EXISTS idx_parte_expediente ON parte(numero_expediente);

        CREATE TABLE IF NOT EXISTS letrado (
            letrado_id INTEGER PRIMARY KEY,
            nombre     TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS representacion (
            numero_expediente TEXT NOT NULL REFERENCES expediente(numero_expediente),
            parte_id          INTEGER NOT NULL REFERENCES parte(parte_id),
            letrado_id        INTEGER NOT NULL REFERENCES letrado(letrado_id),
            rol               TEXT,
            PRIMARY KEY (parte_id, letrado_id)
        );

        CREATE TABLE IF NOT EXISTS resolucion (
            resolucion_id     INTEGER PRIMARY KEY,
            numero_expediente TEXT NOT NULL REFERENCES expediente(numero_expediente),
            fecha             TEXT,
            fecha_texto       TEXT NOT NULL DEFAULT '',
            titulo            TEXT NOT NULL,
            link              TEXT NOT NULL DEFAULT '',
            UNIQUE(numero_expediente, fecha_texto, titulo, link)
        );
        CREATE INDEX IF NOT EXISTS idx_resolucion_expediente ON resolucion(numero_expediente);

        CREATE TABLE IF NOT EXISTS juez (
            juez_id  INTEGER PRIMARY KEY,
            nombre   TEXT NOT NULL UNIQUE,
            email    TEXT,
            telefono TEXT
        );

        CREATE TABLE IF NOT EXISTS tribunal_juez (
            tribunal_id INTEGER NOT NULL REFERENCES tribunal(tribunal_id),
            juez_id     INTEGER NOT NULL REFERENCES juez(juez_id),
            cargo       TEXT,
            situacion   TEXT NOT NULL DEFAULT 'Efectivo',
            PRIMARY KEY (tribunal_id, juez_id)
        );
        ",
    )?;
    Ok(())
}

// ── Dimensions ──

#[derive(Debug, Clone, Copy)]
enum Dimension {
    Fuero,
    Jurisdiccion,
    EstadoProcesal,
    RolParte,
    Letrado,
}

impl Dimension {
    /// (table, id column, natural-key column)
    fn columns(self) -> (&'static str, &'static str, &'static str) {
        match self {
            Dimension::Fuero => ("fuero", "fuero_id", "nombre"),
            Dimension::Jurisdiccion => ("jurisdiccion", "jurisdiccion_id", "ambito"),
            Dimension::EstadoProcesal => ("estado_procesal", "estado_procesal_id", "nombre"),
            Dimension::RolParte => ("rol_parte", "rol_parte_id", "nombre"),
            Dimension::Letrado => ("letrado", "letrado_id", "nombre"),
        }
    }
}

fn or_placeholder(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        PLACEHOLDER
    } else {
        value
    }
}

fn lookup_or_create(tx: &Transaction, dim: Dimension, value: &str) -> Result<i64> {
    let (table, id, key) = dim.columns();
    let value = or_placeholder(value);
    tx.prepare_cached(&format!("INSERT OR IGNORE INTO {table} ({key}) VALUES (?1)"))?
        .execute([value])?;
    let found = tx
        .prepare_cached(&format!("SELECT {id} FROM {table} WHERE {key} = ?1"))?
        .query_row([value], |r| r.get(0))?;
    Ok(found)
}

/// Courts keep the first forum/jurisdiction they were seen with.
fn court_id(
    tx: &Transaction,
    name: &str,
    fuero_id: Option<i64>,
    jurisdiccion_id: Option<i64>,
) -> Result<i64> {
    let name = or_placeholder(name);
    tx.prepare_cached(
        "INSERT INTO tribunal (nombre, fuero_id, jurisdiccion_id) VALUES (?1, ?2, ?3)
         ON CONFLICT(nombre) DO UPDATE SET
            fuero_id = COALESCE(tribunal.fuero_id, excluded.fuero_id),
            jurisdiccion_id = COALESCE(tribunal.jurisdiccion_id, excluded.jurisdiccion_id)",
    )?
    .execute(params![name, fuero_id, jurisdiccion_id])?;
    let found = tx
        .prepare_cached("SELECT tribunal_id FROM tribunal WHERE nombre = ?1")?
        .query_row([name], |r| r.get(0))?;
    Ok(found)
}

// ── Cases ──

/// Write one case and all its children in a single transaction.
pub fn upsert_case(conn: &Connection, rec: &CaseRecord) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let fuero = lookup_or_create(&tx, Dimension::Fuero, &rec.forum)?;
    let jurisdiccion = lookup_or_create(&tx, Dimension::Jurisdiccion, &rec.jurisdiction)?;
    let estado = lookup_or_create(&tx, Dimension::EstadoProcesal, &rec.status)?;
    let tribunal = match rec.current_court() {
        Some(court) => Some(court_id(&tx, court, Some(fuero), Some(jurisdiccion))?),
        None => None,
    };
    let extras = if rec.extras.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&rec.extras)?)
    };

    tx.execute(
        "INSERT INTO expediente
            (numero_expediente, caratula, estado_solapa, fecha_inicio, fecha_ultimo_movimiento,
             camara_origen, ano_inicio, radicacion, extras,
             fuero_id, jurisdiccion_id, tribunal_id, estado_procesal_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(numero_expediente) DO UPDATE SET
            caratula = excluded.caratula,
            estado_solapa = excluded.estado_solapa,
            fecha_inicio = excluded.fecha_inicio,
            fecha_ultimo_movimiento = excluded.fecha_ultimo_movimiento,
            camara_origen = excluded.camara_origen,
            ano_inicio = excluded.ano_inicio,
            radicacion = excluded.radicacion,
            extras = excluded.extras,
            fuero_id = excluded.fuero_id,
            jurisdiccion_id = excluded.jurisdiccion_id,
            tribunal_id = excluded.tribunal_id,
            estado_procesal_id = excluded.estado_procesal_id,
            updated_at = datetime('now')",
        params![
            rec.case_number,
            rec.caption,
            rec.status_tab,
            rec.first_filing_date().map(|d| d.to_string()),
            rec.last_update.map(|d| d.to_string()),
            rec.chamber,
            rec.year,
            rec.filing_summary,
            extras,
            fuero,
            jurisdiccion,
            tribunal,
            estado,
        ],
    )?;

    save_offenses(&tx, rec)?;
    save_filings(&tx, rec, fuero, jurisdiccion)?;
    save_parties(&tx, rec)?;
    save_resolutions(&tx, rec)?;

    tx.commit()?;
    Ok(())
}

fn save_offenses(tx: &Transaction, rec: &CaseRecord) -> Result<()> {
    let mut kind = tx.prepare_cached("INSERT OR IGNORE INTO tipo_delito (tipo) VALUES (?1)")?;
    let mut link = tx.prepare_cached(
        "INSERT INTO expediente_delito (numero_expediente, tipo, orden) VALUES (?1, ?2, ?3)
         ON CONFLICT(numero_expediente, tipo) DO UPDATE SET orden = excluded.orden",
    )?;
    for (i, offense) in rec.offense_list.iter().enumerate() {
        kind.execute([offense])?;
        link.execute(params![rec.case_number, offense, i as i64 + 1])?;
    }
    Ok(())
}

fn save_filings(tx: &Transaction, rec: &CaseRecord, fuero: i64, jurisdiccion: i64) -> Result<()> {
    for f in &rec.filing_history {
        let tribunal = if f.court_name.is_empty() {
            None
        } else {
            Some(court_id(tx, &f.court_name, Some(fuero), Some(jurisdiccion))?)
        };
        tx.prepare_cached(
            "INSERT INTO radicacion
                (numero_expediente, orden, fecha_radicacion, tribunal_id, fiscal_nombre, fiscalia)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(numero_expediente, orden) DO UPDATE SET
                fecha_radicacion = excluded.fecha_radicacion,
                tribunal_id = excluded.tribunal_id,
                fiscal_nombre = excluded.fiscal_nombre,
                fiscalia = excluded.fiscalia",
        )?
        .execute(params![
            rec.case_number,
            f.order,
            f.filing_date.map(|d| d.to_string()),
            tribunal,
            f.prosecutor_name,
            f.prosecutor_office,
        ])?;
    }
    Ok(())
}

fn save_parties(tx: &Transaction, rec: &CaseRecord) -> Result<()> {
    for p in &rec.parties {
        let rol = lookup_or_create(tx, Dimension::RolParte, p.role.as_str())?;
        tx.prepare_cached(
            "INSERT OR IGNORE INTO parte (numero_expediente, nombre_razon_social, rol_parte_id)
             VALUES (?1, ?2, ?3)",
        )?
        .execute(params![rec.case_number, p.name, rol])?;
        let parte_id: i64 = tx
            .prepare_cached(
                "SELECT parte_id FROM parte WHERE numero_expediente = ?1 AND nombre_razon_social = ?2",
            )?
            .query_row(params![rec.case_number, p.name], |r| r.get(0))?;

        for counsel in &p.counsel {
            let letrado = lookup_or_create(tx, Dimension::Letrado, counsel)?;
            tx.prepare_cached(
                "INSERT OR IGNORE INTO representacion (numero_expediente, parte_id, letrado_id, rol)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![rec.case_number, parte_id, letrado, p.role.as_str()])?;
        }
    }
    Ok(())
}

fn save_resolutions(tx: &Transaction, rec: &CaseRecord) -> Result<()> {
    let mut stmt = tx.prepare_cached(
        "INSERT OR IGNORE INTO resolucion (numero_expediente, fecha, fecha_texto, titulo, link)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for r in &rec.resolutions {
        stmt.execute(params![
            rec.case_number,
            r.date.map(|d| d.to_string()),
            r.date_text,
            r.title,
            r.link.as_deref().unwrap_or(""),
        ])?;
    }
    Ok(())
}

// ── Judges ──

/// Attach judges to a court from the court directory. Returns relations written.
pub fn save_court_judges(conn: &Connection, court: &str, judges: &[JudgeEntry]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let tribunal = court_id(&tx, court, None, None)?;
    let mut written = 0;
    for j in judges {
        // Blank directory fields never overwrite known contact data.
        tx.prepare_cached(
            "INSERT INTO juez (nombre, email, telefono) VALUES (?1, ?2, ?3)
             ON CONFLICT(nombre) DO UPDATE SET
                email = COALESCE(excluded.email, juez.email),
                telefono = COALESCE(excluded.telefono, juez.telefono)",
        )?
        .execute(params![j.name, j.email, j.phone])?;
        let juez_id: i64 = tx
            .prepare_cached("SELECT juez_id FROM juez WHERE nombre = ?1")?
            .query_row([&j.name], |r| r.get(0))?;

        written += tx
            .prepare_cached(
                "INSERT INTO tribunal_juez (tribunal_id, juez_id, cargo, situacion)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tribunal_id, juez_id) DO UPDATE SET
                    cargo = COALESCE(excluded.cargo, tribunal_juez.cargo),
                    situacion = excluded.situacion",
            )?
            .execute(params![tribunal, juez_id, j.position, j.situation])?;
    }
    tx.commit()?;
    Ok(written)
}

// ── Stats ──

const COUNTED_TABLES: &[&str] = &[
    "expediente",
    "radicacion",
    "parte",
    "letrado",
    "representacion",
    "resolucion",
    "tipo_delito",
    "tribunal",
    "juez",
    "tribunal_juez",
];

/// Row counts for the tables a run populates.
pub fn get_stats(conn: &Connection) -> Result<Vec<(&'static str, usize)>> {
    COUNTED_TABLES
        .iter()
        .map(|table| {
            let n: usize =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
            Ok((*table, n))
        })
        .collect()
}

// ── Sink ──

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = connect(path)?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RecordSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&mut self, record: &CaseRecord) -> Result<()> {
        upsert_case(&self.conn, record).with_context(|| format!("writing {}", record.case_number))
    }
}
