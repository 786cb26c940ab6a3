use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::deviation::{DeviationAggregator, DeviationReport};
use crate::filter::DateWindow;
use crate::loader::TicketSet;
use crate::sampling::TicketSampler;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    agent: String,
    window: DateWindow,
}

/// Memoizes deviation reports per (ticket set version, agent, window).
///
/// A report computed once keeps its review sample until the ticket set
/// changes, so the same selection always shows the same tickets. The cache
/// owns the aggregator its reports were computed with; replacing it drops
/// every entry.
#[derive(Debug)]
pub struct DeviationCache {
    aggregator: DeviationAggregator,
    version: Option<u64>,
    entries: HashMap<CacheKey, Arc<DeviationReport>>,
    hits: u64,
    misses: u64,
}

impl DeviationCache {
    pub fn new(aggregator: DeviationAggregator) -> Self {
        Self {
            aggregator,
            version: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn aggregator(&self) -> &DeviationAggregator {
        &self.aggregator
    }

    /// Swap in different goals or limits. Cached reports are discarded.
    pub fn set_aggregator(&mut self, aggregator: DeviationAggregator) {
        if !self.entries.is_empty() {
            debug!(stale = self.entries.len(), "aggregator changed, dropping cached reports");
        }
        self.entries.clear();
        self.aggregator = aggregator;
    }

    pub fn get_or_compute(
        &mut self,
        set: &TicketSet,
        agent: &str,
        window: DateWindow,
        sampler: &mut dyn TicketSampler,
    ) -> Arc<DeviationReport> {
        if self.version != Some(set.version()) {
            if !self.entries.is_empty() {
                debug!(
                    stale = self.entries.len(),
                    version = set.version(),
                    "ticket set changed, dropping cached reports"
                );
            }
            self.entries.clear();
            self.version = Some(set.version());
        }

        let key = CacheKey { agent: agent.to_string(), window };
        if let Some(report) = self.entries.get(&key) {
            self.hits += 1;
            debug!(agent, "deviation cache hit");
            return Arc::clone(report);
        }

        self.misses += 1;
        debug!(agent, "deviation cache miss");
        let report = Arc::new(self.aggregator.analyze(set.tickets(), agent, window, sampler));
        self.entries.insert(key, Arc::clone(&report));
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::{Goal, GoalTable, Kpi};
    use crate::loader::tickets_from_reader;
    use crate::sampling::WorstFirstSampler;
    use chrono::NaiveDate;

    const EXPORT: &str = "\
Agent Name,Driver Level2,Next Steps - Reason (L2),Day(Contact Date),% CSAT
Ana,Refund,Escalated,2024-10-02,50
Ana,Refund,Escalated,2024-10-05,60
Bruno,Password,Closed,2024-10-03,70
";

    fn ticket_set() -> TicketSet {
        TicketSet::new(tickets_from_reader(EXPORT.as_bytes()).unwrap())
    }

    #[test]
    fn test_repeated_selection_hits() {
        let set = ticket_set();
        let mut cache = DeviationCache::new(DeviationAggregator::default());

        let first = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        let second = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_key_includes_agent_and_window() {
        let set = ticket_set();
        let mut cache = DeviationCache::new(DeviationAggregator::default());

        cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        cache.get_or_compute(&set, "Bruno", DateWindow::unbounded(), &mut WorstFirstSampler);
        let window = DateWindow::new(None, NaiveDate::from_ymd_opt(2024, 10, 2));
        let narrowed = cache.get_or_compute(&set, "Ana", window, &mut WorstFirstSampler);

        assert_eq!(cache.len(), 3);
        assert_eq!(narrowed.ticket_count, 1);
    }

    #[test]
    fn test_new_version_invalidates() {
        let mut set = ticket_set();
        let mut cache = DeviationCache::new(DeviationAggregator::default());

        let before = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        assert_eq!(before.ticket_count, 2);

        set.replace(Vec::new());
        let after = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        assert_eq!(after.ticket_count, 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), (0, 2));
    }

    #[test]
    fn test_new_goals_invalidate() {
        let set = ticket_set();
        let mut cache = DeviationCache::new(DeviationAggregator::default());

        let strict = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        assert_eq!(strict.top.len(), 1);

        let mut lax = GoalTable::standard();
        lax.set(Kpi::Csat, Goal::higher(10.0));
        cache.set_aggregator(DeviationAggregator::new(lax));
        assert!(cache.is_empty());

        let relaxed = cache.get_or_compute(&set, "Ana", DateWindow::unbounded(), &mut WorstFirstSampler);
        assert!(relaxed.top.is_empty());
        assert_eq!(relaxed.deviating_count, 0);
        assert_eq!(cache.stats(), (0, 2));
    }
}
