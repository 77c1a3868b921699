use std::collections::HashSet;

use serde::Deserialize;

/// What makes two scraped blocks "the same case" within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// One record per case number, whichever tab it was seen on first.
    CaseNumber,
    /// A case may appear once per status tab.
    #[default]
    CaseNumberAndStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    case_number: String,
    status_tab: Option<String>,
}

/// Run-scoped record of keys already admitted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    policy: DedupPolicy,
    seen: HashSet<DedupKey>,
}

impl Deduplicator {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
        }
    }

    /// `None` when the case number is blank; such blocks are never admitted.
    pub fn key_for(&self, case_number: &str, status_tab: Option<&str>) -> Option<DedupKey> {
        let case_number = case_number.trim();
        if case_number.is_empty() {
            return None;
        }
        let status_tab = match self.policy {
            DedupPolicy::CaseNumber => None,
            DedupPolicy::CaseNumberAndStatus => status_tab.map(str::to_string),
        };
        Some(DedupKey {
            case_number: case_number.to_string(),
            status_tab,
        })
    }

    /// True the first time `key` is offered, false after.
    pub fn admit(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_rejected() {
        let mut d = Deduplicator::new(DedupPolicy::CaseNumberAndStatus);
        let k = d.key_for("CFP 1/2020", Some("En trámite")).unwrap();
        assert!(d.admit(k.clone()));
        assert!(!d.admit(k));
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn composite_policy_separates_tabs() {
        let mut d = Deduplicator::new(DedupPolicy::CaseNumberAndStatus);
        assert!(d.admit(d.key_for("CFP 1/2020", Some("En trámite")).unwrap()));
        assert!(d.admit(d.key_for("CFP 1/2020", Some("Terminadas")).unwrap()));
    }

    #[test]
    fn case_number_policy_ignores_tab() {
        let mut d = Deduplicator::new(DedupPolicy::CaseNumber);
        assert!(d.admit(d.key_for(" CFP 1/2020 ", Some("En trámite")).unwrap()));
        assert!(!d.admit(d.key_for("CFP 1/2020", Some("Terminadas")).unwrap()));
    }

    #[test]
    fn blank_case_number_has_no_key() {
        let d = Deduplicator::default();
        assert!(d.key_for("   ", Some("En trámite")).is_none());
    }
}
