use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

// ── Labels used by the listing's label/value list ──

pub const LABEL_CASE_NUMBER: &str = "Expediente";
pub const LABEL_CAPTION: &str = "Carátula";
pub const LABEL_OFFENSES: &str = "Delitos";
pub const LABEL_FILING: &str = "Radicación del expediente";
pub const LABEL_STATUS: &str = "Estado";
pub const LABEL_LAST_UPDATE: &str = "Última actualización";
pub const LABEL_RESOLUTIONS: &str = "Resolución/es";

/// Fields guaranteed to be present in every parsed block, even when empty.
pub const REQUIRED_LABELS: &[&str] = &[
    LABEL_CASE_NUMBER,
    LABEL_CAPTION,
    LABEL_OFFENSES,
    LABEL_FILING,
    LABEL_STATUS,
    LABEL_LAST_UPDATE,
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Imputado,
    Denunciado,
    Denunciante,
    Querellante,
    Other(String),
}

impl Role {
    /// Classify a section title from the interveners panel.
    ///
    /// DENUNCIADO is tested before DENUNCIANTE; neither is a substring of the other.
    pub fn from_title(title: &str) -> Role {
        let upper = title.to_uppercase();
        if upper.contains("IMPUTADO") {
            Role::Imputado
        } else if upper.contains("DENUNCIADO") {
            Role::Denunciado
        } else if upper.contains("DENUNCIANTE") {
            Role::Denunciante
        } else if upper.contains("QUERELLANTE") {
            Role::Querellante
        } else {
            Role::Other(title.trim().trim_end_matches(':').trim().to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Imputado => "Imputado",
            Role::Denunciado => "Denunciado",
            Role::Denunciante => "Denunciante",
            Role::Querellante => "Querellante",
            Role::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Raw shapes produced by the block parser ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFiling {
    pub order: u32,
    pub date: String,
    pub court: String,
    pub prosecutor: String,
    pub office: String,
}

impl RawFiling {
    /// The `date | court | prosecutor | office` summary string the listing
    /// historically exposed as the filing field value.
    pub fn summary(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.date, self.court, self.prosecutor, self.office
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawParty {
    pub role: Role,
    pub name: String,
    pub counsel: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawResolution {
    pub date_text: String,
    pub title: String,
    pub link: Option<String>,
}

/// One result block as it appears on the page, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCase {
    pub fields: BTreeMap<String, String>,
    pub filings: Vec<RawFiling>,
    pub parties: Vec<RawParty>,
    pub resolutions: Vec<RawResolution>,
    pub status_tab: Option<String>,
}

impl RawCase {
    pub fn field(&self, label: &str) -> &str {
        self.fields.get(label).map(String::as_str).unwrap_or("")
    }

    pub fn case_number(&self) -> &str {
        self.field(LABEL_CASE_NUMBER)
    }

    /// Label/value pairs outside the known set.
    pub fn extras(&self) -> BTreeMap<&str, &str> {
        self.fields
            .iter()
            .filter(|(k, _)| !REQUIRED_LABELS.contains(&k.as_str()) && k.as_str() != LABEL_RESOLUTIONS)
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

// ── Normalized records ──

#[derive(Debug, Clone, PartialEq)]
pub struct FilingEntry {
    pub order: u32,
    pub filing_date: Option<NaiveDate>,
    pub court_name: String,
    pub prosecutor_name: Option<String>,
    pub prosecutor_office: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Party {
    pub name: String,
    pub role: Role,
    pub counsel: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub date: Option<NaiveDate>,
    pub date_text: String,
    pub title: String,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub case_number: String,
    pub caption: String,
    pub offense_list: Vec<String>,
    pub status: String,
    pub status_tab: Option<String>,
    pub last_update: Option<NaiveDate>,
    pub filing_summary: String,
    pub filing_history: Vec<FilingEntry>,
    pub parties: Vec<Party>,
    pub resolutions: Vec<Resolution>,
    pub forum: String,
    pub jurisdiction: String,
    pub chamber: String,
    pub year: Option<i32>,
    pub extras: BTreeMap<String, String>,
}

impl CaseRecord {
    /// Court of the most recent filing, if any.
    pub fn current_court(&self) -> Option<&str> {
        self.filing_history
            .iter()
            .find(|f| f.order == 1)
            .map(|f| f.court_name.as_str())
            .filter(|c| !c.is_empty())
    }

    /// Date of the oldest known filing; used as the case start date.
    pub fn first_filing_date(&self) -> Option<NaiveDate> {
        self.filing_history
            .iter()
            .max_by_key(|f| f.order)
            .and_then(|f| f.filing_date)
    }

    pub fn parties_with_role<'a>(&'a self, role: &'a Role) -> impl Iterator<Item = &'a Party> + 'a {
        self.parties.iter().filter(move |p| &p.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_from_title() {
        assert_eq!(Role::from_title("Imputados:"), Role::Imputado);
        assert_eq!(Role::from_title("denunciado/s"), Role::Denunciado);
        assert_eq!(Role::from_title("DENUNCIANTES"), Role::Denunciante);
        assert_eq!(Role::from_title("Querellante"), Role::Querellante);
        assert_eq!(Role::from_title("Actor civil:"), Role::Other("Actor civil".into()));
    }

    #[test]
    fn extras_skip_known_labels() {
        let mut raw = RawCase::default();
        raw.fields.insert(LABEL_CASE_NUMBER.into(), "CFP 1/2020".into());
        raw.fields.insert("Sala".into(), "II".into());
        raw.fields.insert("Vacío".into(), String::new());
        let extras = raw.extras();
        assert_eq!(extras.len(), 1);
        assert_eq!(extras.get("Sala"), Some(&"II"));
    }
}
