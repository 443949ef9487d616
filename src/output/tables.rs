use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::analysis::{Priority, StageStatus};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Stage score coloured by the roadmap split: below 10 is simple, 25 and up is heavy.
pub fn color_coded_score_cell(score: u32) -> Cell {
    if score < 10 {
        Cell::new(score).fg(TableColor::Green)
    } else if score < 25 {
        Cell::new(score).fg(TableColor::Yellow)
    } else {
        Cell::new(score).fg(TableColor::Red)
    }
}

pub fn status_cell(status: StageStatus) -> Cell {
    match status {
        StageStatus::Ready => Cell::new("✅ Ready").fg(TableColor::Green),
        StageStatus::Manual => Cell::new("⚠️ Manual").fg(TableColor::Yellow),
    }
}

pub fn priority_cell(priority: Priority) -> Cell {
    let cell = Cell::new(priority);
    match priority {
        Priority::High => cell.fg(TableColor::Red),
        Priority::Medium => cell.fg(TableColor::Yellow),
        Priority::Low => cell.fg(TableColor::Green),
    }
}
