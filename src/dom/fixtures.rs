//! Host-page markup and a scripted host used across the test suites.
use std::sync::{Arc, Mutex};

use scraper::{ElementRef, Selector};
use tokio::time::Instant;

use crate::dom::page::HtmlPage;

#[derive(Debug, Clone)]
pub(crate) struct RowSpec {
    identity: String,
    attempts: String,
    reason: String,
    actions: Vec<String>,
    cells: usize,
}

pub(crate) fn row(identity: &str, attempts: &str, reason: &str) -> RowSpec {
    RowSpec {
        identity: identity.into(),
        attempts: attempts.into(),
        reason: reason.into(),
        actions: vec!["Check".into(), "Edit".into()],
        cells: 11,
    }
}

impl RowSpec {
    pub(crate) fn with_actions(mut self, labels: &[&str]) -> Self {
        self.actions = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub(crate) fn with_cells(mut self, cells: usize) -> Self {
        self.cells = cells;
        self
    }

    fn markup(&self) -> String {
        let mut cells = Vec::with_capacity(self.cells);
        for idx in 0..self.cells {
            let content = match idx {
                0 => self.identity.clone(),
                5 => self.attempts.clone(),
                6 => self.reason.clone(),
                i if i + 1 == self.cells => self
                    .actions
                    .iter()
                    .map(|label| format!(r#"<button class="lazada-logistics-btn">{label}</button>"#))
                    .collect(),
                i => format!("col-{i}"),
            };
            cells.push(format!("<td>{content}</td>"));
        }
        format!(r#"<tr class="lazada-logistics-table-row">{}</tr>"#, cells.concat())
    }
}

/// Shape of the edit dialog the scripted host renders.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DialogSpec {
    pub options: usize,
    pub footer: bool,
    pub primary: bool,
    /// Re-render the dialog when a radio input is clicked.
    pub rerender_on_choice: bool,
}

impl Default for DialogSpec {
    fn default() -> Self {
        Self {
            options: 2,
            footer: true,
            primary: true,
            rerender_on_choice: false,
        }
    }
}

impl DialogSpec {
    fn markup(&self) -> String {
        let names = ["Yes", "No", "Later"];
        let options: String = (0..self.options)
            .map(|i| {
                let name = names.get(i).copied().unwrap_or("Other");
                format!(
                    r#"<label class="lazada-logistics-radio-wrapper"><input type="radio" name="reattempt" value="{}"> {name}</label>"#,
                    name.to_lowercase()
                )
            })
            .collect();
        let footer = match (self.footer, self.primary) {
            (false, _) => String::new(),
            (true, true) => r#"<div class="lazada-logistics-dialog-footer"><button class="lazada-logistics-btn">Cancel</button><button class="lazada-logistics-btn lazada-logistics-btn-primary">Submit</button></div>"#.into(),
            (true, false) => r#"<div class="lazada-logistics-dialog-footer"><button class="lazada-logistics-btn">Cancel</button></div>"#.into(),
        };
        format!(
            r#"<div class="lazada-logistics-dialog"><div id="dialogReattempt">{options}</div>{footer}</div>"#
        )
    }
}

pub(crate) fn page_markup(tables: &[Vec<RowSpec>], dialog: Option<DialogSpec>) -> String {
    let tables: String = tables
        .iter()
        .map(|rows| {
            let rows: String = rows.iter().map(RowSpec::markup).collect();
            format!(
                r#"<div class="lazada-logistics-table-body"><table><tbody>{rows}</tbody></table></div>"#
            )
        })
        .collect();
    let dialog = dialog.map(|d| d.markup()).unwrap_or_default();
    format!(
        r#"<html><body><input id="trackingNumber" value=""><button class="lazada-logistics-btn">Check-in</button>{tables}{dialog}</body></html>"#
    )
}

/// What the scripted host observed.
#[derive(Debug, Default)]
pub(crate) struct HostLog {
    pub edits_opened: Vec<String>,
    pub options_chosen: Vec<String>,
    pub submitted: Vec<String>,
    /// "edit:<id>" and "submit:<id>" in the order the host saw them.
    pub timeline: Vec<String>,
    /// ("edit" | "option" | "submit", when the host saw it).
    pub stamps: Vec<(&'static str, Instant)>,
}

struct HostState {
    tables: Vec<Vec<RowSpec>>,
    dialog: DialogSpec,
    editing: Option<String>,
}

fn enclosing_row_identity(el: ElementRef<'_>) -> Option<String> {
    let td = Selector::parse("td").ok()?;
    let tr = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "tr")?;
    let first = tr.select(&td).next()?;
    Some(first.text().collect::<String>().trim().to_string())
}

/// A page whose host opens the edit dialog on "Edit", records radio
/// choices, and closes the dialog on submit.
pub(crate) fn scripted_page(
    tables: Vec<Vec<RowSpec>>,
    dialog: DialogSpec,
) -> (Arc<HtmlPage>, Arc<Mutex<HostLog>>) {
    let log = Arc::new(Mutex::new(HostLog::default()));
    let state = Mutex::new(HostState {
        tables,
        dialog,
        editing: None,
    });
    let initial = {
        let s = state.lock().unwrap();
        page_markup(&s.tables, None)
    };

    let host_log = Arc::clone(&log);
    let page = HtmlPage::new(&initial).with_host_reaction(move |_, el| {
        let mut s = state.lock().unwrap();
        let mut log = host_log.lock().unwrap();
        let label = el.text().collect::<String>().trim().to_string();
        let classes: Vec<&str> = el.value().classes().collect();

        match el.value().name() {
            "button" if label.contains("Edit") => {
                let identity = enclosing_row_identity(el)?;
                log.edits_opened.push(identity.clone());
                log.stamps.push(("edit", Instant::now()));
                log.timeline.push(format!("edit:{identity}"));
                s.editing = Some(identity);
                Some(page_markup(&s.tables, Some(s.dialog)))
            }
            "button" if classes.contains(&"lazada-logistics-btn-primary") => {
                log.stamps.push(("submit", Instant::now()));
                if let Some(identity) = s.editing.take() {
                    log.timeline.push(format!("submit:{identity}"));
                    log.submitted.push(identity);
                }
                Some(page_markup(&s.tables, None))
            }
            "input" => {
                if let Some(value) = el.value().attr("value") {
                    log.options_chosen.push(value.to_string());
                }
                log.stamps.push(("option", Instant::now()));
                s.dialog
                    .rerender_on_choice
                    .then(|| page_markup(&s.tables, Some(s.dialog)))
            }
            _ => None,
        }
    });
    (Arc::new(page), log)
}
