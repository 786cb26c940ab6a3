//! Console formatting shared by the report binaries

use std::collections::BTreeMap;

use crate::kpi::Kpi;

pub const REPORT_WIDTH: usize = 85;

pub fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(REPORT_WIDTH));
    println!("  {}", title);
    println!("{}\n", "═".repeat(REPORT_WIDTH));
}

pub fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(75));
}

/// Bar segment character for each KPI in the stacked chart
pub fn kpi_glyph(kpi: Kpi) -> char {
    match kpi {
        Kpi::Csat => '█',
        Kpi::Cres => '▓',
        Kpi::Fcr => '▒',
        Kpi::Rcr => '░',
        Kpi::Hangup => '#',
    }
}

pub fn legend() -> String {
    Kpi::ALL
        .iter()
        .map(|kpi| format!("{} {}", kpi_glyph(*kpi), kpi))
        .collect::<Vec<_>>()
        .join("   ")
}

/// Draw proportions as one bar, `units_per_char` tickets per character.
/// Segments are rounded independently, so short segments may vanish.
pub fn stacked_bar(proportions: &BTreeMap<Kpi, f64>, units_per_char: f64) -> String {
    let units_per_char = if units_per_char > 0.0 { units_per_char } else { 1.0 };
    proportions
        .iter()
        .map(|(kpi, value)| {
            let len = (value / units_per_char).round().max(0.0) as usize;
            kpi_glyph(*kpi).to_string().repeat(len)
        })
        .collect()
}

/// Cut `s` to at most `max_len` characters, marking the cut with "..."
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let keep = max_len.saturating_sub(3);
    format!("{}...", s.chars().take(keep).collect::<String>())
}

/// "-", or the value with two decimals
pub fn format_optional(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}
