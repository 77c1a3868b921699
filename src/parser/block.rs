use std::collections::BTreeMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::text::{direct_text, is_toggle, text_of};
use crate::error::ParseError;
use crate::model::*;

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static INFO_LIST: LazyLock<Selector> = LazyLock::new(|| sel("ul.info"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| sel("span"));

static FIRST_FILING: LazyLock<Selector> =
    LazyLock::new(|| sel("div.item-especial-largo.soy-first-item-largo"));
static FILING_HISTORY: LazyLock<Selector> =
    LazyLock::new(|| sel("div.ver-todos-panel.panel-item-largo"));
static HISTORY_ENTRY: LazyLock<Selector> =
    LazyLock::new(|| sel("div.item > div.item-especial-largo"));
static FILING_COLUMNS: LazyLock<[Selector; 4]> =
    LazyLock::new(|| [sel("div.t1a"), sel("div.t2a"), sel("div.t3a"), sel("div.t4a")]);

static PANEL: LazyLock<Selector> = LazyLock::new(|| sel("div.ver-todos-panel"));
static ROLE_SECTION: LazyLock<Selector> = LazyLock::new(|| sel("div.item-especial-largo-2"));
static ROLE_TITLE: LazyLock<Selector> = LazyLock::new(|| sel("div.resalta"));
static PARTY_ITEM: LazyLock<Selector> = LazyLock::new(|| sel("ul li"));
static COUNSEL_PANEL: LazyLock<Selector> = LazyLock::new(|| sel("div.ver-todos-panel-2"));
static ITEM: LazyLock<Selector> = LazyLock::new(|| sel("div.item"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| sel("a"));

/// Parse one `div.result` block into its raw field map and sub-panels.
pub fn parse_block(block: ElementRef) -> Result<RawCase, ParseError> {
    let info = block
        .select(&INFO_LIST)
        .next()
        .ok_or(ParseError::MissingInfoList)?;

    let mut fields = BTreeMap::new();
    let mut filing_item = None;
    let mut resolution_item = None;

    for li in info.children().filter_map(ElementRef::wrap) {
        if li.value().name() != "li" {
            continue;
        }
        let Some(label) = li.select(&LABEL).next() else {
            continue;
        };
        let label_text = text_of(label);
        let key = label_text.replace(':', "").trim().to_string();
        if key.is_empty() {
            continue;
        }

        let value = if key == LABEL_CAPTION {
            direct_text(li)
        } else {
            text_of(li).replacen(&label_text, "", 1).trim().to_string()
        };

        if key == LABEL_FILING {
            filing_item = Some(li);
        } else if key.contains(LABEL_RESOLUTIONS) {
            resolution_item = Some(li);
        }
        fields.insert(key, value);
    }

    let filings = parse_filings(filing_item.unwrap_or(block));
    if let Some(first) = filings.first() {
        fields.insert(LABEL_FILING.to_string(), first.summary());
    }

    for label in REQUIRED_LABELS {
        fields.entry(label.to_string()).or_default();
    }

    Ok(RawCase {
        fields,
        filings,
        parties: parse_parties(block),
        resolutions: resolution_item.map(parse_resolutions).unwrap_or_default(),
        status_tab: None,
    })
}

// ── Filing history ──

fn filing_columns(entry: ElementRef, order: u32) -> RawFiling {
    let col = |i: usize| {
        entry
            .select(&FILING_COLUMNS[i])
            .next()
            .map(text_of)
            .unwrap_or_default()
    };
    RawFiling {
        order,
        date: col(0),
        court: col(1),
        prosecutor: col(2),
        office: col(3),
    }
}

/// Current filing first (order 1), then each history entry in page order.
fn parse_filings(scope: ElementRef) -> Vec<RawFiling> {
    let Some(first) = scope.select(&FIRST_FILING).next() else {
        return Vec::new();
    };
    let mut filings = vec![filing_columns(first, 1)];

    if let Some(history) = scope.select(&FILING_HISTORY).next() {
        for entry in history.select(&HISTORY_ENTRY) {
            let order = filings.len() as u32 + 1;
            filings.push(filing_columns(entry, order));
        }
    }
    filings
}

// ── Interveners ──

fn parse_parties(block: ElementRef) -> Vec<RawParty> {
    let Some(panel) = block
        .select(&PANEL)
        .find(|p| p.select(&ROLE_SECTION).next().is_some())
    else {
        return Vec::new();
    };

    let mut parties = Vec::new();
    for section in panel.select(&ROLE_SECTION) {
        let Some(title) = section.select(&ROLE_TITLE).next() else {
            continue;
        };
        let role = Role::from_title(&text_of(title));

        for item in section.select(&PARTY_ITEM) {
            let name = direct_text(item);
            if name.is_empty() {
                continue;
            }
            let counsel = item
                .select(&COUNSEL_PANEL)
                .next()
                .map(|p| {
                    p.select(&ITEM)
                        .map(text_of)
                        .filter(|c| !c.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            parties.push(RawParty {
                role: role.clone(),
                name,
                counsel,
            });
        }
    }
    parties
}

// ── Resolutions ──

fn split_resolution(text: &str, link: Option<String>) -> Option<RawResolution> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (date_text, title) = match text.split_once(':') {
        Some((date, title)) => (date.trim(), title.trim()),
        None => ("", text),
    };
    Some(RawResolution {
        date_text: date_text.to_string(),
        title: title.to_string(),
        link,
    })
}

fn anchor_href(a: ElementRef) -> Option<String> {
    a.value().attr("href").map(str::to_string)
}

fn parse_resolutions(li: ElementRef) -> Vec<RawResolution> {
    let scope = li.select(&PANEL).next().unwrap_or(li);
    let items: Vec<ElementRef> = scope.select(&ITEM).collect();

    if items.is_empty() {
        // Single resolution rendered inline as a bare link.
        return scope
            .select(&ANCHOR)
            .filter(|a| !is_toggle(a))
            .filter_map(|a| split_resolution(&text_of(a), anchor_href(a)))
            .collect();
    }

    items
        .into_iter()
        .filter_map(|item| match item.select(&ANCHOR).next() {
            Some(a) => split_resolution(&text_of(a), anchor_href(a)),
            None => split_resolution(&text_of(item), None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn parse(html: &str) -> Result<RawCase, ParseError> {
        let doc = Html::parse_document(html);
        let block = doc.select(&sel("div.result")).next().unwrap();
        parse_block(block)
    }

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/e2e_listing.html").unwrap()
    }

    #[test]
    fn fields_from_fixture() {
        let raw = parse(&fixture()).unwrap();
        assert_eq!(raw.case_number(), "CFP 100/2020");
        assert_eq!(raw.field(LABEL_CAPTION), "N.N. s/ Defraudación");
        assert_eq!(raw.field(LABEL_OFFENSES), "Defraudación");
        assert_eq!(raw.field(LABEL_STATUS), "En trámite");
        assert_eq!(raw.field(LABEL_LAST_UPDATE), "20/04/2020");
        assert_eq!(
            raw.field(LABEL_FILING),
            "01/03/2020 | Juzgado Federal 1 | Fiscal: Juan Pérez | "
        );
    }

    #[test]
    fn parties_and_counsel_from_fixture() {
        let raw = parse(&fixture()).unwrap();
        assert_eq!(raw.parties.len(), 1);
        assert_eq!(raw.parties[0].role, Role::Imputado);
        assert_eq!(raw.parties[0].name, "Juan Gómez");
        assert_eq!(raw.parties[0].counsel, vec!["Dra. Ana Ruiz".to_string()]);
    }

    #[test]
    fn resolution_link_split_on_first_colon() {
        let raw = parse(&fixture()).unwrap();
        assert_eq!(
            raw.resolutions,
            vec![RawResolution {
                date_text: "15/04/2020".into(),
                title: "Procesamiento".into(),
                link: Some("https://www.csjn.gov.ar/doc/1.pdf".into()),
            }]
        );
    }

    #[test]
    fn missing_info_list_is_an_error() {
        let err = parse(r#"<div class="result"><p>vacío</p></div>"#).unwrap_err();
        assert!(matches!(err, ParseError::MissingInfoList));
    }

    #[test]
    fn required_labels_always_present() {
        let raw = parse(
            r#"<div class="result"><ul class="info">
                 <li><span>Expediente:</span> CCC 3/2019</li>
                 <li><span>Sala:</span> II</li>
                 <li>sin etiqueta</li>
               </ul></div>"#,
        )
        .unwrap();
        for label in REQUIRED_LABELS {
            assert!(raw.fields.contains_key(*label), "{label}");
        }
        assert_eq!(raw.field("Sala"), "II");
        assert_eq!(raw.fields.len(), REQUIRED_LABELS.len() + 1);
        assert!(raw.filings.is_empty());
    }

    #[test]
    fn filing_history_in_page_order() {
        let raw = parse(
            r#"<div class="result"><ul class="info">
                 <li><span>Expediente:</span> CFP 7/2018</li>
                 <li><span>Radicación del expediente:</span>
                   <div class="item-especial-largo soy-first-item-largo">
                     <div class="t1a">05/05/2021</div><div class="t2a">Juzgado Federal 3</div>
                     <div class="t3a">Fiscal: Ana Sosa</div><div class="t4a">Fiscalía Federal 2</div>
                   </div>
                   <div class="ver-todos soy-ver-todos">Ver historial</div>
                   <div class="ver-todos-panel panel-item-largo">
                     <div class="item"><div class="item-especial-largo">
                       <div class="t1a">01/02/2019</div><div class="t2a">Juzgado Federal 9</div>
                       <div class="t3a"></div><div class="t4a"></div>
                     </div></div>
                     <div class="item"><div class="item-especial-largo">
                       <div class="t1a">03/04/2018</div><div class="t2a">Juzgado Federal 11</div>
                       <div class="t3a">Fiscal: Luis Paz</div><div class="t4a"></div>
                     </div></div>
                   </div>
                 </li>
               </ul></div>"#,
        )
        .unwrap();
        let courts: Vec<(u32, &str)> = raw
            .filings
            .iter()
            .map(|f| (f.order, f.court.as_str()))
            .collect();
        assert_eq!(
            courts,
            vec![
                (1, "Juzgado Federal 3"),
                (2, "Juzgado Federal 9"),
                (3, "Juzgado Federal 11"),
            ]
        );
        assert_eq!(raw.filings[0].office, "Fiscalía Federal 2");
        assert!(!raw.field(LABEL_FILING).contains("Ver historial"));
    }

    #[test]
    fn other_roles_kept_with_their_title() {
        let raw = parse(
            r#"<div class="result"><ul class="info">
                 <li><span>Carátula:</span> Pérez s/ Cohecho
                   <div class="ver-todos-panel">
                     <div class="item-especial-largo-2">
                       <div class="resalta">Denunciante/s:</div>
                       <ul><li>Oficina Anticorrupción</li></ul>
                     </div>
                     <div class="item-especial-largo-2">
                       <div class="resalta">Actor civil:</div>
                       <ul><li>Estado Nacional</li><li>  </li></ul>
                     </div>
                   </div>
                 </li>
               </ul></div>"#,
        )
        .unwrap();
        assert_eq!(raw.field(LABEL_CAPTION), "Pérez s/ Cohecho");
        let roles: Vec<&Role> = raw.parties.iter().map(|p| &p.role).collect();
        assert_eq!(roles, vec![&Role::Denunciante, &Role::Other("Actor civil".into())]);
    }
}
