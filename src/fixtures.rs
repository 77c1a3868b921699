//! Synthetic listing pages for driver-level tests.

/// A result block for `case_number` with `history` extra filing entries.
pub fn result_block(case_number: &str, history: usize) -> String {
    let mut panel = String::new();
    if history > 0 {
        panel.push_str(r#"<div class="ver-todos soy-ver-todos">Ver historial</div>"#);
        panel.push_str(r#"<div class="ver-todos-panel panel-item-largo" style="display:none">"#);
        for i in 0..history {
            panel.push_str(&format!(
                r#"<div class="item"><div class="item-especial-largo">
                     <div class="t1a">0{d}/01/2019</div><div class="t2a">Juzgado Federal {c}</div>
                     <div class="t3a"></div><div class="t4a"></div>
                   </div></div>"#,
                d = i + 1,
                c = i + 10,
            ));
        }
        panel.push_str("</div>");
    }
    block_with_panel(case_number, &panel)
}

/// A result block whose history control is present but whose panel is still
/// empty, as when the site fills it only after the control is clicked.
pub fn collapsed_block(case_number: &str) -> String {
    block_with_panel(
        case_number,
        r#"<div class="ver-todos soy-ver-todos">Ver historial</div>
           <div class="ver-todos-panel panel-item-largo" style="display:none"></div>"#,
    )
}

fn block_with_panel(case_number: &str, panel: &str) -> String {
    format!(
        r#"<div class="result"><ul class="info">
             <li><span class="s2">Expediente:</span> {case_number}</li>
             <li><span class="s2">Carátula:</span> Imputado s/ Cohecho</li>
             <li><span class="s2">Delitos:</span> Cohecho</li>
             <li><span class="s2">Radicación del expediente:</span>
               <div class="item-especial-largo soy-first-item-largo">
                 <div class="t1a">10/10/2020</div><div class="t2a">Juzgado Nacional 4</div>
                 <div class="t3a">Fiscal: Ana Sosa</div><div class="t4a">Fiscalía 2</div>
               </div>
               {panel}
             </li>
             <li><span class="s2">Estado:</span> En trámite</li>
             <li><span class="s2">Última actualización:</span> 11/11/2020</li>
           </ul></div>"#
    )
}

/// A full document with both tab buttons and one filled tab container.
pub fn listing_page(container_id: &str, blocks: &[String], page: usize, has_next: bool) -> String {
    let next = if has_next {
        r##"<a class="page-link next" href="#">›</a>"##
    } else {
        ""
    };
    format!(
        r##"<!DOCTYPE html><html><body>
             <a id="btn-solapa-1" href="#">En trámite</a>
             <a id="btn-solapa-2" href="#">Terminadas</a>
             <div id="{container_id}">
               {blocks}
               <nav><span class="page-link active">{page}</span>{next}</nav>
             </div>
           </body></html>"##,
        blocks = blocks.concat(),
    )
}
