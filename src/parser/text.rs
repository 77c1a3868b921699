use scraper::{ElementRef, Node};

/// Expand/collapse controls injected into the listing.
const TOGGLE_CLASSES: &[&str] = &["ver-todos", "ver-menos", "ver-todos-2", "ver-menos-2"];

pub fn is_toggle(el: &ElementRef) -> bool {
    el.value().classes().any(|c| TOGGLE_CLASSES.contains(&c))
}

/// All text under `el` with toggle controls skipped, whitespace collapsed.
pub fn text_of(el: ElementRef) -> String {
    let mut pieces = Vec::new();
    collect_text(el, &mut pieces);
    pieces.join(" ")
}

fn collect_text<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        match child.value() {
            Node::Text(t) => out.extend(t.split_whitespace()),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !is_toggle(&child) {
                        collect_text(child, out);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Text nodes that are immediate children of `el`, nested elements ignored.
pub fn direct_text(el: ElementRef) -> String {
    el.children()
        .filter_map(|c| c.value().as_text())
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}
