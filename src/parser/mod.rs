pub mod block;
pub mod text;

use scraper::{Html, Selector};

use crate::error::ParseError;
use crate::model::RawCase;

pub use block::parse_block;

/// Parse every result block matched by `block_selector` in a page snapshot.
///
/// Each block succeeds or fails on its own; a malformed block never hides
/// its neighbours.
pub fn parse_page(
    html: &str,
    block_selector: &str,
) -> Result<Vec<Result<RawCase, ParseError>>, ParseError> {
    let selector = Selector::parse(block_selector)
        .map_err(|_| ParseError::Selector(block_selector.to_string()))?;
    let doc = Html::parse_document(html);
    Ok(doc.select(&selector).map(parse_block).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_yields_one_result_per_block() {
        let html = std::fs::read_to_string("tests/fixtures/e2e_listing.html").unwrap();
        let blocks = parse_page(&html, "#solapa-1 div.result").unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(Result::is_ok));
        assert!(parse_page(&html, "#solapa-2 div.result").unwrap().is_empty());
    }

    #[test]
    fn bad_block_does_not_poison_page() {
        let html = r#"<div id="c">
            <div class="result"><p>roto</p></div>
            <div class="result"><ul class="info"><li><span>Expediente:</span> CCC 1/2020</li></ul></div>
        </div>"#;
        let blocks = parse_page(html, "#c div.result").unwrap();
        assert!(matches!(blocks[0], Err(ParseError::MissingInfoList)));
        assert_eq!(blocks[1].as_ref().unwrap().case_number(), "CCC 1/2020");
    }

    #[test]
    fn invalid_selector_reported() {
        assert!(matches!(parse_page("", "div[["), Err(ParseError::Selector(_))));
    }
}
