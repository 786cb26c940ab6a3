use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::models::{CsvRecord, Ticket};

/// Loaded tickets plus a version that changes whenever the rows are replaced
#[derive(Debug, Clone, Default)]
pub struct TicketSet {
    tickets: Vec<Ticket>,
    version: u64,
}

impl TicketSet {
    pub fn new(tickets: Vec<Ticket>) -> Self {
        Self { tickets, version: 1 }
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn replace(&mut self, tickets: Vec<Ticket>) {
        self.tickets = tickets;
        self.version += 1;
    }

    /// Distinct agent names in order of first appearance
    pub fn agents(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tickets
            .iter()
            .map(|t| t.agent_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Agent selected when none is given: the first one in the export
    pub fn default_agent(&self) -> Option<&str> {
        self.tickets.first().map(|t| t.agent_name.as_str())
    }

    /// Earliest and latest contact date
    pub fn date_bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut dates = self.tickets.iter().filter_map(|t| t.contact_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(min, max), d| (min.min(d), max.max(d))))
    }

    pub fn drivers(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.tickets.iter().map(|t| t.driver.as_str()).collect();
        set.into_iter().collect()
    }

    pub fn next_steps(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.tickets.iter().map(|t| t.next_step.as_str()).collect();
        set.into_iter().collect()
    }
}

/// Read and normalize the ticket export at `path`
pub async fn load_tickets(path: impl AsRef<Path>) -> Result<TicketSet> {
    let path = path.as_ref();
    info!("Reading tickets from {:?}", path);
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read ticket export {:?}", path))?;
    let tickets = tickets_from_reader(bytes.as_slice())
        .with_context(|| format!("failed to parse ticket export {:?}", path))?;
    Ok(TicketSet::new(tickets))
}

/// Parse CSV rows from any reader. Rows that cannot be read are skipped.
pub fn tickets_from_reader<R: Read>(mut reader: R) -> Result<Vec<Ticket>> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .context("failed to read ticket export")?;
    let text = decode_export(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    reader.headers().context("ticket export has no header row")?;

    let mut tickets = Vec::new();
    let mut error_count = 0;
    for (i, row) in reader.deserialize::<CsvRecord>().enumerate() {
        match row {
            Ok(record) => {
                if is_blank(&record) {
                    continue;
                }
                let id = tickets.len() + 1;
                tickets.push(record.to_ticket(id));
            }
            Err(e) => {
                if error_count < 5 {
                    warn!("Failed to parse row {}: {}", i + 1, e);
                }
                error_count += 1;
            }
        }
    }

    info!("Parsed {} tickets ({} rows skipped)", tickets.len(), error_count);
    Ok(tickets)
}

/// Spreadsheet exports from Windows are often Latin-1 ("Não", "Cobrança").
/// Anything that is not valid UTF-8 is read byte-per-char as Latin-1.
fn decode_export(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("Ticket export is not UTF-8, reading it as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

// Trailing empty lines in spreadsheet exports come through as all-empty rows
fn is_blank(record: &CsvRecord) -> bool {
    [
        &record.agent_name,
        &record.driver_level1,
        &record.driver_level2,
        &record.next_step_reason,
        &record.contact_date,
        &record.csat,
        &record.cres,
        &record.fcr,
        &record.rcr,
        &record.hangup,
        &record.aht,
    ]
    .iter()
    .all(|field| field.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::Kpi;
    use crate::models::UNDEFINED_DRIVER;

    const EXPORT: &str = "\
Agent Name,Driver Level1,Driver Level2,Next Steps - Reason (L2),Day(Contact Date),% CSAT,% CRES,% FCR,% RCR,% Hangup,AHT
Ana,Billing,Refund,Escalated,2024-10-02,0.8,90%,,25,85,300
Bruno,Billing,,Closed,03/10/2024,95,80,92,10,79,410.5
Ana,Access,Password,Closed,2024-10-01,100,100,100,0,100,
,,,,,,,,,,
";

    #[test]
    fn test_parse_export() {
        let tickets = tickets_from_reader(EXPORT.as_bytes()).unwrap();
        assert_eq!(tickets.len(), 3);
        assert_eq!(tickets[0].id, 1);
        assert_eq!(tickets[0].score(Kpi::Csat), Some(80.0));
        assert_eq!(tickets[0].score(Kpi::Cres), Some(90.0));
        assert_eq!(tickets[0].score(Kpi::Fcr), None);
        assert_eq!(tickets[1].driver, UNDEFINED_DRIVER);
        assert!(tickets[1].contact_date.is_some());
        // "0" is a fraction and stays 0 after scaling
        assert_eq!(tickets[2].score(Kpi::Rcr), Some(0.0));
        assert_eq!(tickets[2].aht, None);
    }

    #[test]
    fn test_agents_in_first_seen_order() {
        let set = TicketSet::new(tickets_from_reader(EXPORT.as_bytes()).unwrap());
        assert_eq!(set.agents(), vec!["Ana", "Bruno"]);
        assert_eq!(set.default_agent(), Some("Ana"));
        assert_eq!(set.drivers(), vec!["Indefinido", "Password", "Refund"]);
    }

    #[test]
    fn test_date_bounds() {
        let set = TicketSet::new(tickets_from_reader(EXPORT.as_bytes()).unwrap());
        let (min, max) = set.date_bounds().unwrap();
        assert_eq!(min.format("%Y-%m-%d").to_string(), "2024-10-01");
        assert_eq!(max.format("%Y-%m-%d").to_string(), "2024-10-03");
    }

    #[test]
    fn test_replace_bumps_version() {
        let mut set = TicketSet::new(Vec::new());
        let before = set.version();
        set.replace(Vec::new());
        assert!(set.version() > before);
    }

    #[tokio::test]
    async fn test_load_sample_export() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/tickets.csv");
        let set = load_tickets(&path).await.unwrap();
        assert_eq!(set.len(), 60);
        assert_eq!(set.agents().len(), 3);
        assert!(set.date_bounds().is_some());
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let err = load_tickets("data/no_such_export.csv").await.unwrap_err();
        assert!(err.to_string().contains("failed to read ticket export"));
    }

    #[test]
    fn test_latin1_rows_are_kept() {
        let mut export = b"Agent Name,Driver Level2,Next Steps - Reason (L2),% CSAT\n".to_vec();
        export.extend_from_slice(b"Ana,Refund,Closed,90\n");
        export.extend_from_slice(b"Ana,Cobran\xE7a,N\xE3o resolvido,70\n");

        let tickets = tickets_from_reader(export.as_slice()).unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(tickets[1].driver, "Cobrança");
        assert_eq!(tickets[1].next_step, "Não resolvido");
        assert_eq!(tickets[1].score(Kpi::Csat), Some(70.0));
    }

    #[test]
    fn test_missing_columns_read_as_empty() {
        let tickets = tickets_from_reader("Agent Name,% CSAT\nAna,70\n".as_bytes()).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].score(Kpi::Csat), Some(70.0));
        assert_eq!(tickets[0].contact_date, None);
    }
}
