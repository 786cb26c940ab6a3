//! KPI identifiers and goal thresholds
//!
//! Each KPI is a percentage measured per ticket. The goal table maps every
//! KPI to a target and the direction in which the target counts as met.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Tracked quality metric. Declaration order is the display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kpi {
    #[serde(rename = "CSAT")]
    Csat,
    #[serde(rename = "CRES")]
    Cres,
    #[serde(rename = "FCR")]
    Fcr,
    #[serde(rename = "RCR")]
    Rcr,
    #[serde(rename = "Hangup")]
    Hangup,
}

impl Kpi {
    pub const ALL: [Kpi; 5] = [Kpi::Csat, Kpi::Cres, Kpi::Fcr, Kpi::Rcr, Kpi::Hangup];

    /// Short display name ("CSAT", "Hangup", ...)
    pub fn label(self) -> &'static str {
        match self {
            Kpi::Csat => "CSAT",
            Kpi::Cres => "CRES",
            Kpi::Fcr => "FCR",
            Kpi::Rcr => "RCR",
            Kpi::Hangup => "Hangup",
        }
    }

    /// CSV header of the column holding this KPI
    pub fn column(self) -> &'static str {
        match self {
            Kpi::Csat => "% CSAT",
            Kpi::Cres => "% CRES",
            Kpi::Fcr => "% FCR",
            Kpi::Rcr => "% RCR",
            Kpi::Hangup => "% Hangup",
        }
    }

    /// Accepts the label ("CSAT") or the column header ("% CSAT"), case-insensitive.
    pub fn parse(s: &str) -> Option<Kpi> {
        let key = s.trim().trim_start_matches('%').trim();
        Kpi::ALL
            .into_iter()
            .find(|kpi| kpi.label().eq_ignore_ascii_case(key))
    }
}

impl fmt::Display for Kpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Which side of the target counts as meeting the goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Target for one KPI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub target: f64,
    pub direction: Direction,
}

impl Goal {
    pub const fn higher(target: f64) -> Self {
        Self { target, direction: Direction::HigherIsBetter }
    }

    pub const fn lower(target: f64) -> Self {
        Self { target, direction: Direction::LowerIsBetter }
    }

    /// Shortfall (or excess, for lower-is-better) of `value` against the target.
    /// Never negative.
    pub fn gap(&self, value: f64) -> f64 {
        let gap = match self.direction {
            Direction::HigherIsBetter => self.target - value,
            Direction::LowerIsBetter => value - self.target,
        };
        gap.max(0.0)
    }

    /// Strict violation: a value exactly on target meets the goal.
    pub fn is_violated_by(&self, value: f64) -> bool {
        match self.direction {
            Direction::HigherIsBetter => value < self.target,
            Direction::LowerIsBetter => value > self.target,
        }
    }
}

/// Goal per KPI. Always holds an entry for every KPI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalTable {
    goals: BTreeMap<Kpi, Goal>,
}

impl Default for GoalTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl GoalTable {
    /// Operation targets used by the support team
    pub fn standard() -> Self {
        let goals = BTreeMap::from([
            (Kpi::Csat, Goal::higher(93.5)),
            (Kpi::Cres, Goal::higher(83.0)),
            (Kpi::Fcr, Goal::higher(93.5)),
            (Kpi::Rcr, Goal::lower(18.2)),
            (Kpi::Hangup, Goal::higher(80.0)),
        ]);
        Self { goals }
    }

    pub fn get(&self, kpi: Kpi) -> Goal {
        self.goals[&kpi]
    }

    pub fn set(&mut self, kpi: Kpi, goal: Goal) {
        self.goals.insert(kpi, goal);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Kpi, Goal)> + '_ {
        self.goals.iter().map(|(kpi, goal)| (*kpi, *goal))
    }

    /// Apply overrides from a JSON document on top of the standard targets.
    ///
    /// Each key is a KPI label; the value is either a bare target (keeping the
    /// KPI's default direction) or `{ "target": .., "direction": .. }`.
    pub fn from_json(json: &str) -> Result<Self> {
        let overrides: BTreeMap<String, GoalOverride> =
            serde_json::from_str(json).context("goal file is not a JSON object of KPI targets")?;

        let mut table = Self::standard();
        for (key, value) in overrides {
            let Some(kpi) = Kpi::parse(&key) else {
                bail!("unknown KPI '{}' in goal file", key);
            };
            let goal = match value {
                GoalOverride::Target(target) => Goal { target, ..table.get(kpi) },
                GoalOverride::Full(goal) => goal,
            };
            if !goal.target.is_finite() {
                bail!("goal for {} must be a finite number", kpi);
            }
            table.set(kpi, goal);
        }
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read goal file {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("invalid goal file {:?}", path))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GoalOverride {
    Target(f64),
    Full(Goal),
}
