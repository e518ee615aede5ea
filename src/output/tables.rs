use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: &str) -> Cell {
    match status {
        "succeeded" => Cell::new(status).fg(TableColor::Green),
        "failed" | "errored" => Cell::new(status).fg(TableColor::Red),
        "aborted" => Cell::new(status).fg(TableColor::Yellow),
        _ => Cell::new(status),
    }
}

/// Renders an absent value as a dimmed dash.
pub fn optional_cell(value: Option<&str>) -> Cell {
    match value {
        Some(value) => Cell::new(value),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}
