use anyhow::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

/// Right aligned price, colored against the day's average: negative prices
/// blue, cheap green, expensive red.
pub fn price_cell(price: f64, average: Option<f64>) -> Cell {
    let cell = Cell::new(format_price(price)).set_alignment(CellAlignment::Right);
    if price <= 0.0 {
        return cell.fg(Color::Blue);
    }
    match average {
        Some(avg) if price < avg * 0.9 => cell.fg(Color::Green),
        Some(avg) if price > avg * 1.1 => cell.fg(Color::Red),
        _ => cell,
    }
}

/// Formats an `Option<T>` into a `Cell`. `None` is displayed as "N/A".
pub fn format_optional_cell<T>(value: Option<T>, format_fn: impl Fn(T) -> String) -> Cell {
    value.map_or(na_cell(), |v| {
        Cell::new(format_fn(v)).set_alignment(CellAlignment::Right)
    })
}

/// Creates a cell for displaying percentage change with color coding.
/// Rising prices are bad news here, so they are red.
pub fn change_cell(change: f64) -> Cell {
    let text = format!("{change:+.2}%");
    let color = if change > 0.0 { Color::Red } else { Color::Green };
    Cell::new(text)
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

pub fn na_cell() -> Cell {
    Cell::new("N/A")
        .fg(Color::DarkGrey)
        .set_alignment(CellAlignment::Right)
}

/// Creates a spinner shown while a network request is in flight.
pub fn new_spinner(message: impl Into<String>) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_cell_colors() {
        assert_eq!(price_cell(-5.0, Some(100.0)).content(), "-5.00");
        assert_eq!(price_cell(1234.567, None).content(), "1234.57");
    }

    #[test]
    fn test_change_cell_sign() {
        assert_eq!(change_cell(12.345).content(), "+12.35%");
        assert_eq!(change_cell(-3.0).content(), "-3.00%");
    }

    #[test]
    fn test_format_optional_cell() {
        assert_eq!(format_optional_cell(Some(2.5), format_price).content(), "2.50");
        assert_eq!(format_optional_cell::<f64>(None, format_price).content(), "N/A");
    }
}
