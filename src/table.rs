//! Per-combination KPI table with sorting and pagination

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::deviation::{group_by_combination, kpi_average};
use crate::filter::TicketFilter;
use crate::kpi::{GoalTable, Kpi};
use crate::models::Ticket;

pub const DEFAULT_ROWS_PER_PAGE: usize = 10;

/// One table row: a driver × next-step combination with its averages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub driver: String,
    pub next_step: String,
    pub volume: usize,
    pub averages: BTreeMap<Kpi, Option<f64>>,
    /// Gap to the goal, `Some(0.0)` when met, `None` without data
    pub deviations: BTreeMap<Kpi, Option<f64>>,
}

impl TableRow {
    pub fn average(&self, kpi: Kpi) -> Option<f64> {
        self.averages.get(&kpi).copied().flatten()
    }

    pub fn deviation(&self, kpi: Kpi) -> Option<f64> {
        self.deviations.get(&kpi).copied().flatten()
    }
}

/// Build rows for every combination matching `filter`. Unlike the deviation
/// chart, combinations meeting every goal are kept.
pub fn build_rows(tickets: &[Ticket], filter: &TicketFilter, goals: &GoalTable) -> Vec<TableRow> {
    let selected = filter.apply(tickets);
    group_by_combination(&selected)
        .into_iter()
        .map(|group| {
            let mut averages = BTreeMap::new();
            let mut deviations = BTreeMap::new();
            for kpi in Kpi::ALL {
                let avg = kpi_average(&group.tickets, kpi);
                averages.insert(kpi, avg);
                deviations.insert(kpi, avg.map(|v| goals.get(kpi).gap(v)));
            }
            TableRow {
                driver: group.driver.to_string(),
                next_step: group.next_step.to_string(),
                volume: group.tickets.len(),
                averages,
                deviations,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Driver,
    NextStep,
    Volume,
    Average(Kpi),
    Deviation(Kpi),
}

impl SortColumn {
    /// "driver", "next_step", "volume", "csat", "csat_deviation", ...
    pub fn parse(s: &str) -> Option<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "driver" => Some(SortColumn::Driver),
            "next_step" | "nextstep" => Some(SortColumn::NextStep),
            "volume" => Some(SortColumn::Volume),
            _ => {
                if let Some(kpi) = key.strip_suffix("_deviation").and_then(Kpi::parse) {
                    Some(SortColumn::Deviation(kpi))
                } else {
                    Kpi::parse(&key).map(SortColumn::Average)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

enum CellValue<'a> {
    Text(&'a str),
    Number(Option<f64>),
}

fn cell(row: &TableRow, column: SortColumn) -> CellValue<'_> {
    match column {
        SortColumn::Driver => CellValue::Text(&row.driver),
        SortColumn::NextStep => CellValue::Text(&row.next_step),
        SortColumn::Volume => CellValue::Number(Some(row.volume as f64)),
        SortColumn::Average(kpi) => CellValue::Number(row.average(kpi)),
        SortColumn::Deviation(kpi) => CellValue::Number(row.deviation(kpi)),
    }
}

/// Stable sort. Missing values go last in both directions.
pub fn sort_rows(rows: &mut [TableRow], column: SortColumn, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let ordering = match (cell(a, column), cell(b, column)) {
            (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
            (CellValue::Number(x), CellValue::Number(y)) => match (x, y) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Greater,
                (Some(_), None) => return Ordering::Less,
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            },
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// One page of rows plus the numbers needed to draw the pager
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<'a, T> {
    pub rows: &'a [T],
    /// 1-based, clamped into `1..=total_pages`
    pub number: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

impl<T> Page<'_, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }
}

pub fn paginate<T>(rows: &[T], page: usize, rows_per_page: usize) -> Page<'_, T> {
    let rows_per_page = rows_per_page.max(1);
    let total_pages = rows.len().div_ceil(rows_per_page);
    let number = page.clamp(1, total_pages.max(1));
    let start = ((number - 1) * rows_per_page).min(rows.len());
    let end = (start + rows_per_page).min(rows.len());
    Page {
        rows: &rows[start..end],
        number,
        total_pages,
        total_rows: rows.len(),
    }
}

/// Background colour for a deviation cell: white when on goal, reds
/// deepening up to a 50-point gap.
pub fn deviation_color(deviation: Option<f64>) -> Option<String> {
    let deviation = deviation.filter(|d| !d.is_nan())?;
    if deviation == 0.0 {
        return Some("#ffffff".to_string());
    }
    let intensity = (deviation / 50.0).min(1.0);
    let lightness = 100.0 - intensity * 50.0;
    Some(format!("hsl(0, 100%, {}%)", lightness))
}

/// "87.50%", or empty when missing
pub fn format_percent(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiScores;

    fn ticket(id: usize, driver: &str, next_step: &str, csat: Option<f64>) -> Ticket {
        Ticket {
            id,
            agent_name: "Ana".to_string(),
            driver_level1: "L1".to_string(),
            driver: driver.to_string(),
            next_step: next_step.to_string(),
            contact_date: None,
            scores: KpiScores { csat, ..Default::default() },
            aht: None,
        }
    }

    fn rows() -> Vec<TableRow> {
        let tickets = vec![
            ticket(1, "Refund", "Escalated", Some(80.0)),
            ticket(2, "Password", "Closed", Some(95.0)),
            ticket(3, "Refund", "Escalated", Some(90.0)),
            ticket(4, "Address", "Closed", None),
            ticket(5, "Billing", "Callback", Some(60.0)),
        ];
        build_rows(&tickets, &TicketFilter::for_agent("Ana"), &GoalTable::standard())
    }

    #[test]
    fn test_rows_keep_met_and_missing() {
        let rows = rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].volume, 2);
        assert_eq!(rows[0].average(Kpi::Csat), Some(85.0));
        assert_eq!(rows[0].deviation(Kpi::Csat), Some(8.5));
        assert_eq!(rows[1].deviation(Kpi::Csat), Some(0.0));
        assert_eq!(rows[2].deviation(Kpi::Csat), None);
    }

    #[test]
    fn test_driver_filter() {
        let tickets = vec![
            ticket(1, "Refund", "Escalated", Some(80.0)),
            ticket(2, "Password", "Closed", Some(95.0)),
        ];
        let filter = TicketFilter::for_agent("Ana").with_driver(Some("Password".to_string()));
        let rows = build_rows(&tickets, &filter, &GoalTable::standard());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].driver, "Password");
    }

    #[test]
    fn test_sort_missing_last_both_ways() {
        let mut rows = rows();
        sort_rows(&mut rows, SortColumn::Average(Kpi::Csat), SortDirection::Ascending);
        let order: Vec<&str> = rows.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(order, vec!["Billing", "Refund", "Password", "Address"]);

        sort_rows(&mut rows, SortColumn::Average(Kpi::Csat), SortDirection::Descending);
        let order: Vec<&str> = rows.iter().map(|r| r.driver.as_str()).collect();
        assert_eq!(order, vec!["Password", "Refund", "Billing", "Address"]);
    }

    #[test]
    fn test_sort_text_and_stability() {
        let mut rows = rows();
        sort_rows(&mut rows, SortColumn::NextStep, SortDirection::Ascending);
        let order: Vec<&str> = rows.iter().map(|r| r.driver.as_str()).collect();
        // Password and Address share "Closed" and keep their order
        assert_eq!(order, vec!["Billing", "Password", "Address", "Refund"]);
    }

    #[test]
    fn test_parse_column() {
        assert_eq!(SortColumn::parse("volume"), Some(SortColumn::Volume));
        assert_eq!(SortColumn::parse("next-step"), Some(SortColumn::NextStep));
        assert_eq!(SortColumn::parse("CSAT"), Some(SortColumn::Average(Kpi::Csat)));
        assert_eq!(SortColumn::parse("rcr_deviation"), Some(SortColumn::Deviation(Kpi::Rcr)));
        assert_eq!(SortColumn::parse("aht"), None);
    }

    #[test]
    fn test_pagination() {
        let items: Vec<u32> = (1..=25).collect();
        let page = paginate(&items, 3, 10);
        assert_eq!(page.rows, &[21, 22, 23, 24, 25]);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_previous());
        assert!(!page.has_next());

        let clamped = paginate(&items, 9, 10);
        assert_eq!(clamped.number, 3);
        let first = paginate(&items, 0, 10);
        assert_eq!(first.number, 1);
        assert_eq!(first.rows.len(), 10);

        let empty: Vec<u32> = Vec::new();
        let page = paginate(&empty, 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_deviation_color() {
        assert_eq!(deviation_color(None), None);
        assert_eq!(deviation_color(Some(f64::NAN)), None);
        assert_eq!(deviation_color(Some(0.0)).as_deref(), Some("#ffffff"));
        assert_eq!(deviation_color(Some(25.0)).as_deref(), Some("hsl(0, 100%, 75%)"));
        assert_eq!(deviation_color(Some(80.0)).as_deref(), Some("hsl(0, 100%, 50%)"));
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(87.456)), "87.46%");
        assert_eq!(format_percent(None), "");
    }
}
