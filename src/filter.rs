//! Ticket selection: agent, inclusive date window, driver and next step

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::Ticket;

/// Inclusive range of contact days. The end day counts up to 23:59:59.999.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Tickets without a contact date never fall inside a window.
    pub fn contains(&self, contact_date: Option<NaiveDateTime>) -> bool {
        let Some(at) = contact_date else {
            return false;
        };
        if let Some(start) = self.start {
            if at < start.and_time(NaiveTime::MIN) {
                return false;
            }
        }
        if let Some(end) = self.end {
            if at > end_of_day(end) {
                return false;
            }
        }
        true
    }
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    // 23:59:59.999 is always a valid time
    day.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN))
}

/// Selection applied before any aggregation. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TicketFilter {
    pub agent: Option<String>,
    pub window: Option<DateWindow>,
    pub driver: Option<String>,
    pub next_step: Option<String>,
}

impl TicketFilter {
    pub fn for_agent(agent: impl Into<String>) -> Self {
        Self { agent: Some(agent.into()), ..Default::default() }
    }

    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_driver(mut self, driver: Option<String>) -> Self {
        self.driver = driver;
        self
    }

    pub fn with_next_step(mut self, next_step: Option<String>) -> Self {
        self.next_step = next_step;
        self
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        if let Some(agent) = &self.agent {
            if &ticket.agent_name != agent {
                return false;
            }
        }
        if let Some(window) = &self.window {
            if !window.contains(ticket.contact_date) {
                return false;
            }
        }
        if let Some(driver) = &self.driver {
            if &ticket.driver != driver {
                return false;
            }
        }
        if let Some(next_step) = &self.next_step {
            if &ticket.next_step != next_step {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, tickets: &'a [Ticket]) -> Vec<&'a Ticket> {
        tickets.iter().filter(|t| self.matches(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiScores;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ticket(agent: &str, at: Option<NaiveDateTime>) -> Ticket {
        Ticket {
            id: 1,
            agent_name: agent.to_string(),
            driver_level1: "Billing".to_string(),
            driver: "Refund".to_string(),
            next_step: "Escalated".to_string(),
            contact_date: at,
            scores: KpiScores::default(),
            aht: None,
        }
    }

    #[test]
    fn test_end_day_is_inclusive() {
        let window = DateWindow::new(Some(day(2024, 10, 1)), Some(day(2024, 10, 31)));
        assert!(window.contains(day(2024, 10, 31).and_hms_opt(0, 0, 0)));
        assert!(window.contains(day(2024, 10, 31).and_hms_milli_opt(23, 59, 59, 999)));
        assert!(!window.contains(day(2024, 11, 1).and_hms_opt(0, 0, 0)));
        assert!(window.contains(day(2024, 10, 1).and_hms_opt(0, 0, 0)));
        assert!(!window.contains(day(2024, 9, 30).and_hms_opt(23, 59, 59)));
    }

    #[test]
    fn test_missing_date_excluded() {
        assert!(!DateWindow::unbounded().contains(None));
        assert!(DateWindow::unbounded().contains(day(2024, 1, 1).and_hms_opt(0, 0, 0)));
    }

    #[test]
    fn test_agent_is_exact_match() {
        let filter = TicketFilter::for_agent("Ana");
        assert!(filter.matches(&ticket("Ana", None)));
        assert!(!filter.matches(&ticket("ana", None)));
        assert!(!filter.matches(&ticket("Ana Paula", None)));
    }

    #[test]
    fn test_driver_and_next_step() {
        let t = ticket("Ana", None);
        let filter = TicketFilter::default().with_driver(Some("Refund".to_string()));
        assert!(filter.matches(&t));
        let filter = filter.with_next_step(Some("Closed".to_string()));
        assert!(!filter.matches(&t));
    }
}
