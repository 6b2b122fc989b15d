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

pub fn label_cell(label: &str) -> Cell {
    Cell::new(label).fg(TableColor::Cyan)
}

/// Build or check outcome, green for success and red for failure.
pub fn color_coded_result_cell(result: Option<&str>) -> Cell {
    let Some(result) = result else {
        return Cell::new("pending").fg(TableColor::DarkGrey);
    };

    let color = match result.to_ascii_lowercase().as_str() {
        "succeeded" | "success" => TableColor::Green,
        "partiallysucceeded" | "neutral" => TableColor::Yellow,
        "failed" | "failure" | "timed_out" => TableColor::Red,
        _ => TableColor::DarkGrey,
    };
    Cell::new(result).fg(color)
}
