use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::kpi::Kpi;

/// Driver assigned to tickets exported without a level-2 driver
pub const UNDEFINED_DRIVER: &str = "Indefinido";
/// Next step assigned to tickets exported without a resolution reason
pub const UNDEFINED_NEXT_STEP: &str = "Não Definido";
/// Agent assigned to tickets exported without an agent name
pub const DEFAULT_AGENT: &str = "Atendente Padrão";

/// Raw record from the ticket CSV export
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CsvRecord {
    #[serde(rename = "Agent Name")]
    pub agent_name: String,
    #[serde(rename = "Driver Level1")]
    pub driver_level1: String,
    #[serde(rename = "Driver Level2")]
    pub driver_level2: String,
    #[serde(rename = "Next Steps - Reason (L2)")]
    pub next_step_reason: String,
    #[serde(rename = "Day(Contact Date)")]
    pub contact_date: String,
    #[serde(rename = "% CSAT")]
    pub csat: String,
    #[serde(rename = "% CRES")]
    pub cres: String,
    #[serde(rename = "% FCR")]
    pub fcr: String,
    #[serde(rename = "% RCR")]
    pub rcr: String,
    #[serde(rename = "% Hangup")]
    pub hangup: String,
    #[serde(rename = "AHT")]
    pub aht: String,
}

/// Per-ticket KPI percentages; `None` when the export had no usable value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiScores {
    pub csat: Option<f64>,
    pub cres: Option<f64>,
    pub fcr: Option<f64>,
    pub rcr: Option<f64>,
    pub hangup: Option<f64>,
}

impl KpiScores {
    pub fn get(&self, kpi: Kpi) -> Option<f64> {
        match kpi {
            Kpi::Csat => self.csat,
            Kpi::Cres => self.cres,
            Kpi::Fcr => self.fcr,
            Kpi::Rcr => self.rcr,
            Kpi::Hangup => self.hangup,
        }
    }

    pub fn set(&mut self, kpi: Kpi, value: Option<f64>) {
        let slot = match kpi {
            Kpi::Csat => &mut self.csat,
            Kpi::Cres => &mut self.cres,
            Kpi::Fcr => &mut self.fcr,
            Kpi::Rcr => &mut self.rcr,
            Kpi::Hangup => &mut self.hangup,
        };
        *slot = value;
    }
}

/// One customer interaction, normalized from a CSV row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// 1-based position in the export
    pub id: usize,
    pub agent_name: String,
    pub driver_level1: String,
    pub driver: String,
    pub next_step: String,
    pub contact_date: Option<NaiveDateTime>,
    pub scores: KpiScores,
    /// Average handle time, rounded to two decimals
    pub aht: Option<f64>,
}

impl Ticket {
    pub fn score(&self, kpi: Kpi) -> Option<f64> {
        self.scores.get(kpi)
    }
}

impl CsvRecord {
    /// Normalize a raw row. Never fails: bad fields become `None` or a sentinel.
    pub fn to_ticket(&self, id: usize) -> Ticket {
        let mut scores = KpiScores::default();
        for (kpi, raw) in [
            (Kpi::Csat, &self.csat),
            (Kpi::Cres, &self.cres),
            (Kpi::Fcr, &self.fcr),
            (Kpi::Rcr, &self.rcr),
            (Kpi::Hangup, &self.hangup),
        ] {
            scores.set(kpi, parse_percentage(raw));
        }

        Ticket {
            id,
            agent_name: or_sentinel(&self.agent_name, DEFAULT_AGENT),
            driver_level1: or_sentinel(&self.driver_level1, UNDEFINED_DRIVER),
            driver: or_sentinel(&self.driver_level2, UNDEFINED_DRIVER),
            next_step: or_sentinel(&self.next_step_reason, UNDEFINED_NEXT_STEP),
            contact_date: parse_contact_date(&self.contact_date),
            scores,
            aht: parse_decimal(&self.aht).map(|v| (v * 100.0).round() / 100.0),
        }
    }
}

fn or_sentinel(value: &str, sentinel: &str) -> String {
    if value.trim().is_empty() {
        sentinel.to_string()
    } else {
        value.to_string()
    }
}

/// Parse a KPI cell: "87,5%", "0.875", "87.5" all read as 87.5.
///
/// Values in `[0, 1]` are fractions and get scaled to percent.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let value = parse_decimal(raw)?;
    if (0.0..=1.0).contains(&value) {
        Some(value * 100.0)
    } else {
        Some(value)
    }
}

/// Lenient decimal parse: strips '%', accepts a decimal comma and ignores
/// trailing garbage after the leading number.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.replacen('%', "", 1).replacen(',', ".", 1);
    let normalized = normalized.trim();
    if normalized.is_empty() {
        return None;
    }
    leading_number(normalized).filter(|v| v.is_finite())
}

fn leading_number(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        let frac_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        digits += end - frac_start;
    }
    if digits == 0 {
        return None;
    }
    // exponent only counts when digits follow it
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// Parse the contact date: ISO date, ISO datetime (with or without offset)
/// or `dd/mm/yyyy`.
pub fn parse_contact_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].trim().parse().ok()?;
    let month: u32 = parts[1].trim().parse().ok()?;
    let year: i32 = parts[2].trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
}
