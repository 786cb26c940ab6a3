//! Picking representative tickets for review
//!
//! The dashboard shows a few tickets from the worst combination so a
//! supervisor can read actual cases. Candidates are already known to violate
//! the goal; the sampler only decides which ones to show.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;

use crate::kpi::{Goal, Kpi};
use crate::models::Ticket;

pub trait TicketSampler {
    /// Return at most `limit` tickets out of `candidates`.
    fn sample<'a>(
        &mut self,
        candidates: Vec<&'a Ticket>,
        kpi: Kpi,
        goal: Goal,
        limit: usize,
    ) -> Vec<&'a Ticket>;
}

/// Shuffle and truncate. Unseeded by default; seed it for reproducible runs.
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl TicketSampler for RandomSampler {
    fn sample<'a>(
        &mut self,
        mut candidates: Vec<&'a Ticket>,
        _kpi: Kpi,
        _goal: Goal,
        limit: usize,
    ) -> Vec<&'a Ticket> {
        candidates.shuffle(&mut self.rng);
        candidates.truncate(limit);
        candidates
    }
}

/// Deterministic: largest gap to the goal first, ties by ticket id.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstFirstSampler;

impl TicketSampler for WorstFirstSampler {
    fn sample<'a>(
        &mut self,
        mut candidates: Vec<&'a Ticket>,
        kpi: Kpi,
        goal: Goal,
        limit: usize,
    ) -> Vec<&'a Ticket> {
        let gap = |t: &Ticket| t.score(kpi).map(|v| goal.gap(v)).unwrap_or(0.0);
        candidates.sort_by(|a, b| {
            gap(b)
                .partial_cmp(&gap(a))
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(limit);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiScores;

    fn ticket(id: usize, csat: f64) -> Ticket {
        Ticket {
            id,
            agent_name: "Ana".to_string(),
            driver_level1: "Billing".to_string(),
            driver: "Refund".to_string(),
            next_step: "Escalated".to_string(),
            contact_date: None,
            scores: KpiScores { csat: Some(csat), ..Default::default() },
            aht: None,
        }
    }

    #[test]
    fn test_worst_first_is_deterministic() {
        let tickets = vec![ticket(1, 90.0), ticket(2, 40.0), ticket(3, 70.0), ticket(4, 40.0)];
        let picked = WorstFirstSampler.sample(
            tickets.iter().collect(),
            Kpi::Csat,
            Goal::higher(93.5),
            3,
        );
        let ids: Vec<usize> = picked.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 4, 3]);
    }

    #[test]
    fn test_seeded_sampler_repeats() {
        let tickets: Vec<Ticket> = (1..=10).map(|i| ticket(i, 50.0)).collect();
        let run = |seed| {
            RandomSampler::seeded(seed)
                .sample(tickets.iter().collect(), Kpi::Csat, Goal::higher(93.5), 3)
                .iter()
                .map(|t| t.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
        assert_eq!(run(42).len(), 3);
    }

    #[test]
    fn test_limit_larger_than_candidates() {
        let tickets = vec![ticket(1, 10.0)];
        let picked = RandomSampler::seeded(7).sample(
            tickets.iter().collect(),
            Kpi::Csat,
            Goal::higher(93.5),
            3,
        );
        assert_eq!(picked.len(), 1);
    }
}
