//! KPI deviation by driver × next-step combination
//!
//! For one agent and date window, tickets are grouped by (driver, next step).
//! Every group gets a per-KPI average and its gap to the goal. Groups that
//! miss at least one goal are ranked by volume, and the gaps of each ranked
//! group are redistributed over its volume so they can be drawn as stacked
//! bars. The worst KPI of the biggest group drives the review sample.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::filter::{DateWindow, TicketFilter};
use crate::kpi::{Goal, GoalTable, Kpi};
use crate::models::Ticket;
use crate::sampling::TicketSampler;

pub const DEFAULT_TOP_COMBINATIONS: usize = 10;
pub const DEFAULT_REVIEW_SAMPLE: usize = 3;

/// Outcome of comparing one group's average against a goal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "gap", rename_all = "snake_case")]
pub enum KpiStatus {
    /// No ticket in the group carried a value for this KPI
    NoData,
    Met,
    /// Positive gap to the goal
    Deviation(f64),
}

impl KpiStatus {
    pub fn evaluate(average: Option<f64>, goal: Goal) -> Self {
        match average {
            None => KpiStatus::NoData,
            Some(avg) => {
                let gap = goal.gap(avg);
                if gap > 0.0 {
                    KpiStatus::Deviation(gap)
                } else {
                    KpiStatus::Met
                }
            }
        }
    }

    pub fn deviation(&self) -> Option<f64> {
        match self {
            KpiStatus::Deviation(gap) => Some(*gap),
            _ => None,
        }
    }
}

/// Tickets sharing a driver and next step, in order of first appearance
#[derive(Debug, Clone)]
pub struct Combination<'a> {
    pub driver: &'a str,
    pub next_step: &'a str,
    pub tickets: Vec<&'a Ticket>,
}

/// Group tickets by (driver, next step). Group order follows the first
/// ticket of each pair.
pub fn group_by_combination<'a>(tickets: &[&'a Ticket]) -> Vec<Combination<'a>> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<Combination<'a>> = Vec::new();

    for &ticket in tickets {
        let key = (ticket.driver.as_str(), ticket.next_step.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Combination {
                driver: ticket.driver.as_str(),
                next_step: ticket.next_step.as_str(),
                tickets: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].tickets.push(ticket);
    }

    groups
}

/// Mean over the tickets that have a finite value for `kpi`
pub fn kpi_average(tickets: &[&Ticket], kpi: Kpi) -> Option<f64> {
    // Running mean: stays finite where a plain sum of large values would not
    let (mean, count) = tickets
        .iter()
        .filter_map(|t| t.score(kpi))
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(mean, count), v| {
            let count = count + 1;
            (mean + (v - mean) / count as f64, count)
        });
    (count > 0).then_some(mean)
}

/// Aggregates for one driver × next-step combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationStats {
    pub driver: String,
    pub next_step: String,
    pub volume: usize,
    pub averages: BTreeMap<Kpi, Option<f64>>,
    pub statuses: BTreeMap<Kpi, KpiStatus>,
    /// Only KPIs that miss their goal
    pub deviations: BTreeMap<Kpi, f64>,
    pub total_deviation: f64,
    /// Share of the volume attributed to each deviating KPI
    pub proportions: BTreeMap<Kpi, f64>,
}

impl CombinationStats {
    fn compute(group: &Combination<'_>, goals: &GoalTable) -> Self {
        let volume = group.tickets.len();
        let mut averages = BTreeMap::new();
        let mut statuses = BTreeMap::new();
        let mut deviations = BTreeMap::new();

        for kpi in Kpi::ALL {
            let average = kpi_average(&group.tickets, kpi);
            let status = KpiStatus::evaluate(average, goals.get(kpi));
            if let Some(gap) = status.deviation() {
                deviations.insert(kpi, gap);
            }
            averages.insert(kpi, average);
            statuses.insert(kpi, status);
        }

        let total_deviation: f64 = deviations.values().sum();
        let proportions = if total_deviation > 0.0 {
            deviations
                .iter()
                .map(|(kpi, gap)| (*kpi, gap / total_deviation * volume as f64))
                .collect()
        } else {
            BTreeMap::new()
        };

        Self {
            driver: group.driver.to_string(),
            next_step: group.next_step.to_string(),
            volume,
            averages,
            statuses,
            deviations,
            total_deviation,
            proportions,
        }
    }

    /// Chart category label, driver over next step
    pub fn label(&self) -> String {
        format!("{}\n{}", self.driver, self.next_step)
    }

    /// KPI with the largest gap; the first one in display order wins ties
    pub fn worst_kpi(&self) -> Option<Kpi> {
        let mut worst: Option<(Kpi, f64)> = None;
        for (&kpi, &gap) in &self.deviations {
            match worst {
                Some((_, best)) if gap <= best => {}
                _ => worst = Some((kpi, gap)),
            }
        }
        worst.map(|(kpi, _)| kpi)
    }

    /// KPIs with zero observations, shown as "insufficient data"
    pub fn missing_data(&self) -> Vec<Kpi> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status == KpiStatus::NoData)
            .map(|(kpi, _)| *kpi)
            .collect()
    }
}

/// One stacked-bar series: a KPI's proportion in each top combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub kpi: Kpi,
    pub categories: Vec<String>,
    pub values: Vec<f64>,
}

/// Tickets chosen for manual review from the top combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSample {
    pub driver: String,
    pub next_step: String,
    pub kpi: Kpi,
    pub goal: Goal,
    pub tickets: Vec<Ticket>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviationReport {
    pub agent: String,
    pub window: DateWindow,
    /// Tickets left after the agent and window filter
    pub ticket_count: usize,
    /// Distinct combinations before discarding those meeting every goal
    pub combination_count: usize,
    /// Combinations missing at least one goal
    pub deviating_count: usize,
    /// Highest-volume deviating combinations, at most `top_n`
    pub top: Vec<CombinationStats>,
    pub series: Vec<ChartSeries>,
    pub review: Option<ReviewSample>,
}

impl DeviationReport {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }

    /// True when no combination misses a goal, however many are charted
    pub fn meets_all_goals(&self) -> bool {
        self.deviating_count == 0
    }
}

/// Computes [`DeviationReport`]s against an injected goal table
#[derive(Debug, Clone)]
pub struct DeviationAggregator {
    goals: GoalTable,
    top_n: usize,
    sample_size: usize,
}

impl Default for DeviationAggregator {
    fn default() -> Self {
        Self::new(GoalTable::standard())
    }
}

impl DeviationAggregator {
    pub fn new(goals: GoalTable) -> Self {
        Self {
            goals,
            top_n: DEFAULT_TOP_COMBINATIONS,
            sample_size: DEFAULT_REVIEW_SAMPLE,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn goals(&self) -> &GoalTable {
        &self.goals
    }

    pub fn analyze(
        &self,
        tickets: &[Ticket],
        agent: &str,
        window: DateWindow,
        sampler: &mut dyn TicketSampler,
    ) -> DeviationReport {
        let filter = TicketFilter::for_agent(agent).with_window(window);
        let selected = filter.apply(tickets);
        let groups = group_by_combination(&selected);

        let mut ranked: Vec<(CombinationStats, &Combination<'_>)> = groups
            .iter()
            .map(|group| (CombinationStats::compute(group, &self.goals), group))
            .filter(|(stats, _)| stats.total_deviation > 0.0)
            .collect();
        // sort_by is stable: equal volumes keep first-seen order
        ranked.sort_by(|(a, _), (b, _)| b.volume.cmp(&a.volume));

        let deviating_count = ranked.len();
        let review = ranked
            .first()
            .and_then(|(stats, group)| self.review_sample(stats, group, sampler));

        let top: Vec<CombinationStats> = ranked
            .into_iter()
            .take(self.top_n)
            .map(|(stats, _)| stats)
            .collect();
        let series = build_series(&top);

        debug!(
            agent,
            tickets = selected.len(),
            combinations = groups.len(),
            deviating = deviating_count,
            "deviation analysis complete"
        );

        DeviationReport {
            agent: agent.to_string(),
            window,
            ticket_count: selected.len(),
            combination_count: groups.len(),
            deviating_count,
            top,
            series,
            review,
        }
    }

    fn review_sample(
        &self,
        stats: &CombinationStats,
        group: &Combination<'_>,
        sampler: &mut dyn TicketSampler,
    ) -> Option<ReviewSample> {
        let kpi = stats.worst_kpi()?;
        let goal = self.goals.get(kpi);
        let candidates: Vec<&Ticket> = group
            .tickets
            .iter()
            .copied()
            .filter(|t| t.score(kpi).is_some_and(|v| goal.is_violated_by(v)))
            .collect();

        let tickets = sampler
            .sample(candidates, kpi, goal, self.sample_size)
            .into_iter()
            .take(self.sample_size)
            .cloned()
            .collect();

        Some(ReviewSample {
            driver: stats.driver.clone(),
            next_step: stats.next_step.clone(),
            kpi,
            goal,
            tickets,
        })
    }
}

fn build_series(top: &[CombinationStats]) -> Vec<ChartSeries> {
    let categories: Vec<String> = top.iter().map(|c| c.label()).collect();
    Kpi::ALL
        .into_iter()
        .map(|kpi| ChartSeries {
            kpi,
            categories: categories.clone(),
            values: top
                .iter()
                .map(|c| c.proportions.get(&kpi).copied().unwrap_or(0.0))
                .collect(),
        })
        .collect()
}
