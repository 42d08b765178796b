use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Stylize};
use repertoire::catalog::Facet;
use repertoire::view::{display_value, CollectionTree, TableModel};
use rusqlite::types::Value;
use std::collections::BTreeMap;
use unicode_width::UnicodeWidthStr;

/// Cells wider than this are cut, locations tend to be long paths.
const MAX_CELL_WIDTH: usize = 36;
const ELLIPSIS: &str = "…";

fn ansi(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(Color::Ansi(color)))
}

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(ansi(AnsiColor::Yellow).bold())
        .header(ansi(AnsiColor::Yellow).bold())
        .literal(ansi(AnsiColor::BrightWhite).bold())
        .valid(ansi(AnsiColor::Green))
        .invalid(ansi(AnsiColor::Red).bold())
        .error(ansi(AnsiColor::Red).bold())
        .placeholder(ansi(AnsiColor::BrightBlack))
}

mod palette {
    use crossterm::style::Color;

    pub const ACCENT: Color = Color::Rgb { r: 255, g: 191, b: 0 };
    pub const MUTED: Color = Color::Rgb { r: 128, g: 128, b: 128 };
    pub const DONE: Color = Color::Rgb { r: 120, g: 200, b: 120 };
    pub const SKIPPED: Color = Color::Rgb { r: 255, g: 140, b: 0 };
    pub const FAILED: Color = Color::Rgb { r: 230, g: 80, b: 80 };
}

/// How a shell command ended.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Done,
    /// Nothing changed, e.g. a track that already was a member.
    Skipped,
    Failed,
}

pub fn print_outcome(outcome: Outcome, message: &str) {
    let (mark, color) = match outcome {
        Outcome::Done => ("✓", palette::DONE),
        Outcome::Skipped => ("·", palette::SKIPPED),
        Outcome::Failed => ("✗", palette::FAILED),
    };
    println!(" {} {}", mark.with(color).bold(), message.with(color));
}

/// Cuts `text` to `width` columns, marking the cut with an ellipsis.
fn fit_cell(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut fitted = String::new();
    for c in text.chars() {
        if fitted.width() + c.to_string().width() + ELLIPSIS.width() > width {
            break;
        }
        fitted.push(c);
    }
    fitted.push_str(ELLIPSIS);
    fitted
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{}{}", fill, text)
    } else {
        format!("{}{}", text, fill)
    }
}

/// Prints a table model as aligned columns. Numbers are right aligned,
/// NULL cells show as a dimmed dash.
pub fn print_model(model: &TableModel) {
    if model.column_count() == 0 {
        println!("  {}", "(no columns)".with(palette::MUTED).attribute(Attribute::Italic));
        return;
    }

    let cells: Vec<Vec<String>> = model
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| fit_cell(&display_value(value), MAX_CELL_WIDTH))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = model
        .headers()
        .iter()
        .enumerate()
        .map(|(column, header)| {
            cells
                .iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.width())
                .fold(header.width(), usize::max)
                .max(1)
        })
        .collect();

    let header_line: Vec<String> = model
        .headers()
        .iter()
        .zip(&widths)
        .map(|(header, width)| pad(header, *width, false))
        .collect();
    println!("  {}", header_line.join("  ").with(palette::ACCENT).bold());
    let rule: Vec<String> = widths.iter().map(|width| "─".repeat(*width)).collect();
    println!("  {}", rule.join("  ").with(palette::MUTED));

    for (values, row) in model.rows().iter().zip(&cells) {
        let line: Vec<String> = values
            .iter()
            .zip(row)
            .zip(&widths)
            .map(|((value, cell), width)| match value {
                Value::Null => pad("-", *width, false).with(palette::MUTED).to_string(),
                Value::Integer(_) | Value::Real(_) => pad(cell, *width, true),
                _ => pad(cell, *width, false),
            })
            .collect();
        println!("  {}", line.join("  "));
    }
    println!("  {}", format!("{} row(s)", model.row_count()).with(palette::MUTED));
}

/// Facet groups of one collection, one facet per line.
pub fn print_groups(groups: &BTreeMap<Facet, Vec<String>>) {
    let label_width = groups.keys().map(|f| f.label().width()).max().unwrap_or(0);
    for (facet, members) in groups {
        let members = if members.is_empty() {
            "-".with(palette::MUTED).to_string()
        } else {
            members.join(", ")
        };
        println!(
            "  {}  {}",
            pad(facet.label(), label_width, false).with(palette::ACCENT),
            members
        );
    }
}

/// Prefix of a tree line. `ancestors_last` holds, per enclosing level,
/// whether that ancestor was the last of its siblings.
fn tree_prefix(ancestors_last: &[bool], is_last: bool) -> String {
    let mut prefix: String = ancestors_last
        .iter()
        .map(|last| if *last { "   " } else { "│  " })
        .collect();
    prefix.push_str(if is_last { "└─ " } else { "├─ " });
    prefix
}

pub fn print_collection_tree(tree: &CollectionTree) {
    println!("  {}", tree.root_label().with(palette::ACCENT).bold());
    let collections = tree.collections();
    for (i, collection) in collections.iter().enumerate() {
        let collection_last = i + 1 == collections.len();
        println!(
            "  {}{}",
            tree_prefix(&[], collection_last).with(palette::MUTED),
            collection.name.as_str().with(palette::ACCENT)
        );
        for (j, facet) in collection.facets.iter().enumerate() {
            let facet_last = j + 1 == collection.facets.len();
            println!(
                "  {}{} {}",
                tree_prefix(&[collection_last], facet_last).with(palette::MUTED),
                facet.facet.label(),
                format!("({})", facet.members.len()).with(palette::MUTED)
            );
            for (k, member) in facet.members.iter().enumerate() {
                println!(
                    "  {}{}",
                    tree_prefix(&[collection_last, facet_last], k + 1 == facet.members.len())
                        .with(palette::MUTED),
                    member
                );
            }
        }
    }
}

/// A titled list of names, e.g. tables or a table's columns.
pub fn print_listing(title: &str, items: &[String]) {
    println!("  {}", title.with(palette::ACCENT).bold());
    if items.is_empty() {
        println!("    {}", "(none)".with(palette::MUTED).attribute(Attribute::Italic));
    }
    for item in items {
        println!("    {}", item);
    }
}

pub fn print_banner(db_path: &str, table_count: usize) {
    println!(
        "{} {} {}",
        "Repertoire".with(palette::ACCENT).bold(),
        format!("{} ({})", env!("CARGO_PKG_VERSION"), env!("REPERTOIRE_BUILD")).with(palette::MUTED),
        format!("· {} · {} table(s) · 'help' lists commands", db_path, table_count)
            .with(palette::MUTED)
    );
}

pub fn get_prompt() -> String {
    format!("{} ", "♪".with(palette::ACCENT).bold())
}
