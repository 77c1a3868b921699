//! Pure text → typed-field conversions for scraped case blocks.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

use crate::model::*;

pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_DATE_HINT: &str = "DD/MM/YYYY";

static CASE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s+\d+/(\d{4})\b").unwrap());
static HONORIFIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^dr(?:a|es|as)?(?:\.\s*|\s+)").unwrap());

/// Chamber code → chamber name.
const CHAMBERS: &[(&str, &str)] = &[
    ("CFP", "Cámara Nacional de Apelaciones en lo Criminal y Correccional Federal"),
    ("CCC", "Cámara Nacional de Apelaciones en lo Criminal y Correccional"),
    ("CAF", "Cámara Nacional de Apelaciones en lo Contencioso Administrativo Federal"),
    ("CPF", "Cámara Federal de Casación Penal"),
    ("FRO", "Cámara Federal de Apelaciones de Rosario"),
    ("CCF", "Cámara Nacional de Apelaciones en lo Civil y Comercial Federal"),
    ("CIV", "Cámara Nacional de Apelaciones en lo Civil"),
    ("FGR", "Cámara Federal de Apelaciones de General Roca"),
    ("FPO", "Cámara Federal de Apelaciones de Posadas"),
    ("FTU", "Cámara Federal de Apelaciones de Tucumán"),
    ("FCB", "Cámara Federal de Apelaciones de Córdoba"),
    ("FPA", "Cámara Federal de Apelaciones de Paraná"),
    ("FSA", "Cámara Federal de Apelaciones de Salta"),
    ("FBB", "Cámara Federal de Apelaciones de Bahía Blanca"),
    ("FCT", "Cámara Federal de Apelaciones de Corrientes"),
    ("FMZ", "Cámara Federal de Apelaciones de Mendoza"),
    ("FCR", "Cámara Federal de Apelaciones de Comodoro Rivadavia"),
    ("FSM", "Cámara Federal de Apelaciones de San Martín"),
    ("FLP", "Cámara Federal de Apelaciones de La Plata"),
    ("FMP", "Cámara Federal de Apelaciones de Mar del Plata"),
    ("FRE", "Cámara Federal de Apelaciones de Resistencia"),
    ("CSS", "Cámara Federal de la Seguridad Social"),
    ("CPN", "Cámara Nacional de Casación Penal"),
    ("CPE", "Cámara Nacional en lo Penal Económico"),
    ("COM", "Cámara Nacional de Apelaciones en lo Comercial"),
    ("CNE", "Cámara Nacional Electoral"),
    ("CNT", "Cámara Nacional de Apelaciones del Trabajo"),
];

/// Chamber code → forum.
const FORUMS: &[(&str, &str)] = &[
    ("CFP", "Penal Federal"),
    ("CCC", "Penal Federal"),
    ("CPF", "Penal Federal"),
    ("FRO", "Penal Federal"),
    ("FGR", "Penal Federal"),
    ("FPO", "Penal Federal"),
    ("FTU", "Penal Federal"),
    ("FCB", "Penal Federal"),
    ("FPA", "Penal Federal"),
    ("FSA", "Penal Federal"),
    ("FBB", "Penal Federal"),
    ("FCT", "Penal Federal"),
    ("FMZ", "Penal Federal"),
    ("FCR", "Penal Federal"),
    ("FSM", "Penal Federal"),
    ("FLP", "Penal Federal"),
    ("FMP", "Penal Federal"),
    ("FRE", "Penal Federal"),
    ("CSS", "Penal Federal"),
    ("CPN", "Penal Federal"),
    ("CPE", "Penal Federal"),
    ("CCF", "Civil"),
    ("CIV", "Civil"),
    ("COM", "Comercial"),
    ("CNT", "Laboral"),
    ("CAF", "Contencioso Administrativo"),
    ("CNE", "Electoral"),
];

/// Names that stand for "unidentified" rather than a person.
const NAME_STOPLIST: &[&str] = &["OTROS", "NN", "TESTIGO DE IDENTIDAD RESERVADA"];

fn lookup(table: &[(&str, &'static str)], code: &str) -> Option<&'static str> {
    let code = code.to_uppercase();
    table.iter().find(|(k, _)| *k == code).map(|(_, v)| *v)
}

// ── Dates ──

fn hint_to_format(hint: &str) -> String {
    hint.replace("YYYY", "%Y").replace("DD", "%d").replace("MM", "%m")
}

/// Parse a `DD/MM/YYYY` date. `None` on anything else.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_date_hinted(text, DEFAULT_DATE_HINT)
}

pub fn parse_date_hinted(text: &str, format_hint: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, &hint_to_format(format_hint)).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

// ── Filing strings ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingParts {
    pub date: String,
    pub court: String,
    pub prosecutor: String,
    pub prosecutor_office: String,
}

fn after_colon(part: &str) -> &str {
    part.split_once(':').map(|(_, v)| v).unwrap_or(part).trim()
}

/// Sort the trailing prosecutor/office parts of a filing.
///
/// Prefixes win over position: a part starting with "Fiscalía" is the office
/// wherever it sits, "Fiscal:" marks the prosecutor. Unprefixed parts fill the
/// slot matching their position if it is still empty.
fn classify_officials(rest: &[&str]) -> (String, String) {
    let mut prosecutor = String::new();
    let mut office = String::new();
    for (i, part) in rest.iter().take(2).enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let upper = part.to_uppercase();
        if upper.starts_with("FISCALIA") || upper.starts_with("FISCALÍA") {
            office = after_colon(part).to_string();
        } else if upper.starts_with("FISCAL:") {
            prosecutor = after_colon(part).to_string();
        } else if i == 0 && prosecutor.is_empty() {
            prosecutor = part.to_string();
        } else if i == 1 && office.is_empty() {
            office = part.to_string();
        }
    }
    (clean_text(&prosecutor), clean_text(&office))
}

/// Split a `date | court | prosecutor | office` string.
pub fn split_filing_string(text: &str) -> FilingParts {
    let parts: Vec<&str> = text.split('|').map(str::trim).take(4).collect();
    let (prosecutor, prosecutor_office) = classify_officials(parts.get(2..).unwrap_or(&[]));
    FilingParts {
        date: parts.first().map(|s| clean_text(s)).unwrap_or_default(),
        court: parts.get(1).map(|s| clean_text(s)).unwrap_or_default(),
        prosecutor,
        prosecutor_office,
    }
}

// ── Case number derived fields ──

pub fn infer_forum(case_number: &str) -> &'static str {
    case_number
        .split_whitespace()
        .next()
        .and_then(|code| lookup(FORUMS, code))
        .unwrap_or(UNKNOWN)
}

pub fn infer_jurisdiction(filing_text: &str) -> &'static str {
    if filing_text.to_uppercase().contains("FEDERAL") {
        "Federal"
    } else {
        "National"
    }
}

pub fn extract_chamber_and_year(case_number: &str) -> (&'static str, Option<i32>) {
    match CASE_NUMBER_RE.captures(case_number) {
        Some(caps) => {
            let chamber = lookup(CHAMBERS, &caps[1]).unwrap_or(UNKNOWN);
            (chamber, caps[2].parse().ok())
        }
        None => (UNKNOWN, None),
    }
}

// ── Names ──

pub fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercase every letter that follows a non-letter, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

pub fn is_stoplisted(name: &str) -> bool {
    let key = clean_text(&name.replace('.', " ").to_uppercase());
    let squashed = key.replace(' ', "");
    NAME_STOPLIST
        .iter()
        .any(|stop| key == *stop || squashed == stop.replace(' ', ""))
}

pub fn clean_party_name(raw: &str) -> Option<String> {
    let name = clean_text(raw);
    if name.is_empty() || is_stoplisted(&name) {
        return None;
    }
    Some(title_case(&name))
}

pub fn clean_counsel_name(raw: &str) -> Option<String> {
    let name = clean_text(raw);
    let name = HONORIFIC_RE.replace(&name, "");
    clean_party_name(&name)
}

pub fn split_offenses(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for offense in text.split(',').map(clean_text).filter(|o| !o.is_empty()) {
        if !out.contains(&offense) {
            out.push(offense);
        }
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Whole record ──

fn normalize_filings(raw: &RawCase, summary: &str) -> Vec<FilingEntry> {
    let mut filings: Vec<FilingEntry> = raw
        .filings
        .iter()
        .map(|f| {
            let (prosecutor, office) = classify_officials(&[f.prosecutor.as_str(), f.office.as_str()]);
            FilingEntry {
                order: f.order,
                filing_date: parse_date(&f.date),
                court_name: clean_text(&f.court),
                prosecutor_name: non_empty(prosecutor),
                prosecutor_office: non_empty(office),
            }
        })
        .collect();

    // Older layouts only expose the pipe-joined summary.
    if filings.is_empty() && !summary.trim().is_empty() {
        let parts = split_filing_string(summary);
        filings.push(FilingEntry {
            order: 1,
            filing_date: parse_date(&parts.date),
            court_name: parts.court,
            prosecutor_name: non_empty(parts.prosecutor),
            prosecutor_office: non_empty(parts.prosecutor_office),
        });
    }

    filings.sort_by_key(|f| f.order);
    filings
}

fn normalize_parties(case_number: &str, raw: &[RawParty]) -> Vec<Party> {
    let mut parties: Vec<Party> = Vec::new();
    for p in raw {
        let Some(name) = clean_party_name(&p.name) else {
            debug!(case = case_number, name = %p.name, "dropping non-identity party name");
            continue;
        };
        let counsel: Vec<String> = p.counsel.iter().filter_map(|c| clean_counsel_name(c)).collect();
        let existing = parties.iter().position(|q| q.name == name);
        let party = match existing {
            Some(idx) => {
                let party = &mut parties[idx];
                if party.role != p.role {
                    debug!(
                        case = case_number,
                        name = %party.name,
                        kept = %party.role,
                        dropped = %p.role,
                        "party listed under two roles"
                    );
                }
                party
            }
            None => {
                parties.push(Party {
                    name,
                    role: p.role.clone(),
                    counsel: Vec::new(),
                });
                let last = parties.len() - 1;
                &mut parties[last]
            }
        };
        for c in counsel {
            if !party.counsel.contains(&c) {
                party.counsel.push(c);
            }
        }
    }
    parties
}

fn normalize_resolutions(raw: &[RawResolution]) -> Vec<Resolution> {
    raw.iter()
        .filter_map(|r| {
            let title = clean_text(&r.title);
            if title.is_empty() {
                return None;
            }
            let date_text = clean_text(&r.date_text);
            Some(Resolution {
                date: parse_date(&date_text),
                date_text,
                title,
                link: r.link.as_deref().map(str::trim).map(str::to_string).and_then(non_empty),
            })
        })
        .collect()
}

/// Turn one parsed block into a typed record.
pub fn normalize(raw: &RawCase) -> CaseRecord {
    let case_number = clean_text(raw.case_number());
    let filing_summary = clean_text(raw.field(LABEL_FILING));
    let (chamber, year) = extract_chamber_and_year(&case_number);

    CaseRecord {
        filing_history: normalize_filings(raw, &filing_summary),
        parties: normalize_parties(&case_number, &raw.parties),
        resolutions: normalize_resolutions(&raw.resolutions),
        caption: clean_text(raw.field(LABEL_CAPTION)),
        offense_list: split_offenses(raw.field(LABEL_OFFENSES)),
        status: clean_text(raw.field(LABEL_STATUS)),
        status_tab: raw.status_tab.clone(),
        last_update: parse_date(raw.field(LABEL_LAST_UPDATE)),
        forum: infer_forum(&case_number).to_string(),
        jurisdiction: infer_jurisdiction(&filing_summary).to_string(),
        chamber: chamber.to_string(),
        year,
        extras: raw
            .extras()
            .into_iter()
            .map(|(k, v)| (k.to_string(), clean_text(v)))
            .collect::<BTreeMap<_, _>>(),
        filing_summary,
        case_number,
    }
}
