//! Daily trend of one indicator against its goal

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::filter::TicketFilter;
use crate::kpi::{Goal, GoalTable, Kpi};
use crate::models::Ticket;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: NaiveDate,
    pub average: f64,
    /// Tickets with a value for the indicator on this day
    pub samples: usize,
    pub meets_goal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub kpi: Kpi,
    pub goal: Goal,
    pub points: Vec<TrendPoint>,
}

impl Trend {
    /// Average of the daily averages, as drawn by the summary line
    pub fn mean(&self) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        Some(self.points.iter().map(|p| p.average).sum::<f64>() / self.points.len() as f64)
    }

    pub fn days_missing_goal(&self) -> usize {
        self.points.iter().filter(|p| !p.meets_goal).count()
    }
}

/// Average `kpi` per contact day over the tickets matching `filter`.
/// Tickets without a date or without a value are left out; days ascend.
pub fn daily_trend(tickets: &[Ticket], filter: &TicketFilter, kpi: Kpi, goals: &GoalTable) -> Trend {
    let goal = goals.get(kpi);
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();

    for ticket in tickets.iter().filter(|t| filter.matches(t)) {
        let (Some(at), Some(value)) = (ticket.contact_date, ticket.score(kpi)) else {
            continue;
        };
        if !value.is_finite() {
            continue;
        }
        let (mean, samples) = by_day.entry(at.date()).or_insert((0.0, 0));
        *samples += 1;
        *mean += (value - *mean) / *samples as f64;
    }

    let points = by_day
        .into_iter()
        .map(|(day, (average, samples))| TrendPoint {
            day,
            average,
            samples,
            meets_goal: !goal.is_violated_by(average),
        })
        .collect();

    Trend { kpi, goal, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DateWindow;
    use crate::models::KpiScores;

    fn ticket(agent: &str, day: u32, rcr: Option<f64>) -> Ticket {
        Ticket {
            id: day as usize,
            agent_name: agent.to_string(),
            driver_level1: "L1".to_string(),
            driver: "Refund".to_string(),
            next_step: "Escalated".to_string(),
            contact_date: NaiveDate::from_ymd_opt(2024, 10, day).and_then(|d| d.and_hms_opt(9, 30, 0)),
            scores: KpiScores { rcr, ..Default::default() },
            aht: None,
        }
    }

    #[test]
    fn test_daily_average_ascending() {
        let tickets = vec![
            ticket("Ana", 3, Some(10.0)),
            ticket("Ana", 1, Some(30.0)),
            ticket("Bruno", 1, Some(10.0)),
            ticket("Ana", 3, Some(20.0)),
            ticket("Ana", 2, None),
        ];
        let trend = daily_trend(&tickets, &TicketFilter::default(), Kpi::Rcr, &GoalTable::standard());

        assert_eq!(trend.points.len(), 2);
        assert_eq!(trend.points[0].day, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        assert_eq!(trend.points[0].average, 20.0);
        assert_eq!(trend.points[0].samples, 2);
        assert!(!trend.points[0].meets_goal);
        assert_eq!(trend.points[1].average, 15.0);
        assert!(trend.points[1].meets_goal);
        assert_eq!(trend.days_missing_goal(), 1);
        assert_eq!(trend.mean(), Some(17.5));
    }

    #[test]
    fn test_filtered_by_agent_and_window() {
        let tickets = vec![
            ticket("Ana", 1, Some(30.0)),
            ticket("Bruno", 2, Some(10.0)),
            ticket("Ana", 20, Some(5.0)),
        ];
        let filter = TicketFilter::for_agent("Ana").with_window(DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 10, 1),
            NaiveDate::from_ymd_opt(2024, 10, 10),
        ));
        let trend = daily_trend(&tickets, &filter, Kpi::Rcr, &GoalTable::standard());
        assert_eq!(trend.points.len(), 1);
        assert_eq!(trend.points[0].average, 30.0);
    }

    #[test]
    fn test_empty_trend() {
        let trend = daily_trend(&[], &TicketFilter::default(), Kpi::Csat, &GoalTable::standard());
        assert!(trend.points.is_empty());
        assert_eq!(trend.mean(), None);
        assert_eq!(trend.goal, Goal::higher(93.5));
    }
}
