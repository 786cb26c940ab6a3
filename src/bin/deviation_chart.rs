//! KPI deviation chart - where is the agent missing goals?
//! Ranks driver × next-step combinations by volume and shows how each
//! combination's gap splits across KPIs, plus tickets to review.
//!
//! Run: ./target/release/deviation_chart --agent "Ana Souza" [--agent "Bruno Lima"] [--start 2024-10-01] [--end 2024-10-31]

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use ticket_kpi::cache::DeviationCache;
use ticket_kpi::deviation::{DeviationAggregator, DeviationReport, KpiStatus};
use ticket_kpi::filter::DateWindow;
use ticket_kpi::kpi::{GoalTable, Kpi};
use ticket_kpi::loader::load_tickets;
use ticket_kpi::report::{
    format_optional, legend, print_section_header, print_subsection, stacked_bar, truncate,
};
use ticket_kpi::sampling::{RandomSampler, TicketSampler, WorstFirstSampler};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn parse_top(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("'{}' is not a positive number of combinations", s)),
    }
}

#[derive(Parser, Debug)]
#[command(name = "deviation_chart")]
#[command(about = "Driver × next-step combinations missing KPI goals for one agent")]
struct Args {
    /// Ticket CSV export
    #[arg(long, default_value = "data/tickets.csv")]
    input: PathBuf,

    /// JSON file overriding KPI goals
    #[arg(long)]
    goals: Option<PathBuf>,

    /// Agent name (exact match), repeatable; defaults to the first agent in the export
    #[arg(long)]
    agent: Vec<String>,

    /// First contact day (YYYY-MM-DD); defaults to the earliest in the export
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last contact day, inclusive (YYYY-MM-DD); defaults to the latest
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Number of combinations charted
    #[arg(long, default_value = "10", value_parser = parse_top)]
    top: usize,

    /// Number of tickets picked for review
    #[arg(long, default_value = "3")]
    sample: usize,

    /// Random seed for the review sample
    #[arg(long)]
    seed: Option<u64>,

    /// Pick review tickets by largest gap instead of at random
    #[arg(long)]
    worst_first: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let goals = match &args.goals {
        Some(path) => GoalTable::load(path)?,
        None => GoalTable::standard(),
    };

    let set = load_tickets(&args.input).await?;
    let agents = if args.agent.is_empty() {
        match set.default_agent() {
            Some(agent) => vec![agent.to_string()],
            None => bail!("ticket export {:?} is empty", args.input),
        }
    } else {
        args.agent.clone()
    };
    let known = set.agents();
    for agent in agents.iter().filter(|a| !known.contains(&a.as_str())) {
        warn!("Agent {:?} has no tickets in the export", agent);
    }

    let bounds = set.date_bounds();
    let window = DateWindow::new(
        args.start.or(bounds.map(|(min, _)| min.date())),
        args.end.or(bounds.map(|(_, max)| max.date())),
    );

    let mut sampler: Box<dyn TicketSampler> = if args.worst_first {
        Box::new(WorstFirstSampler)
    } else {
        match args.seed {
            Some(seed) => Box::new(RandomSampler::seeded(seed)),
            None => Box::new(RandomSampler::from_entropy()),
        }
    };

    let mut cache = DeviationCache::new(
        DeviationAggregator::new(goals)
            .with_top_n(args.top)
            .with_sample_size(args.sample),
    );
    let reports: Vec<_> = agents
        .iter()
        .map(|agent| cache.get_or_compute(&set, agent, window, sampler.as_mut()))
        .collect();
    for report in &reports {
        info!(
            "{}: {} tickets, {} of {} combinations miss a goal",
            report.agent, report.ticket_count, report.deviating_count, report.combination_count
        );
    }

    if args.json {
        let reports: Vec<&DeviationReport> = reports.iter().map(|r| r.as_ref()).collect();
        match reports.as_slice() {
            [single] => println!("{}", serde_json::to_string_pretty(single)?),
            many => println!("{}", serde_json::to_string_pretty(many)?),
        }
        return Ok(());
    }

    for report in &reports {
        print_report(report, cache.aggregator().goals());
    }
    Ok(())
}

fn print_report(report: &DeviationReport, goals: &GoalTable) {
    println!("\n{}", "█".repeat(85));
    println!("{}  KPI DEVIATION - Where is the Agent Missing Goals?  {}", "█".repeat(15), "█".repeat(16));
    println!("{}\n", "█".repeat(85));

    let fmt_day = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
    println!("  Agent:  {}", report.agent);
    println!("  Period: {} to {}", fmt_day(report.window.start), fmt_day(report.window.end));
    println!("  Tickets in period: {}", report.ticket_count);

    if report.meets_all_goals() {
        println!("\n  Every combination meets its goals (or there are no tickets in the period).");
        return;
    }

    print_section_header("1. TOP COMBINATIONS BY VOLUME (stacked by KPI gap)");
    println!("  {}\n", legend());

    let max_volume = report.top.iter().map(|c| c.volume).max().unwrap_or(1);
    let units_per_char = (max_volume as f64 / 40.0).max(1.0);
    for (i, comb) in report.top.iter().enumerate() {
        let label = format!("{} / {}", comb.driver, comb.next_step);
        println!(
            "  {:>2}. {:40} {:>5} {}",
            i + 1,
            truncate(&label, 40),
            comb.volume,
            stacked_bar(&comb.proportions, units_per_char)
        );
    }
    if report.deviating_count > report.top.len() {
        println!(
            "\n  ({} more combinations miss a goal and are not charted)",
            report.deviating_count - report.top.len()
        );
    }

    print_section_header("2. KPI AVERAGES AND GAPS");
    print!("  {:40} {:>6}", "Combination", "Vol");
    for kpi in Kpi::ALL {
        print!(" {:>8}", kpi.label());
    }
    println!("  {:>8}", "Gap");
    print!("  {:40} {:>6}", "", "goal");
    for kpi in Kpi::ALL {
        print!(" {:>8.1}", goals.get(kpi).target);
    }
    println!();
    println!("  {}", "─".repeat(40 + 7 + 9 * 5 + 10));

    for comb in &report.top {
        let label = format!("{} / {}", comb.driver, comb.next_step);
        print!("  {:40} {:>6}", truncate(&label, 40), comb.volume);
        for kpi in Kpi::ALL {
            let cell = match comb.statuses[&kpi] {
                KpiStatus::NoData => "n/a".to_string(),
                KpiStatus::Met => format_optional(comb.averages[&kpi]),
                KpiStatus::Deviation(_) => format!("{}*", format_optional(comb.averages[&kpi])),
            };
            print!(" {:>8}", cell);
        }
        println!("  {:>8.2}", comb.total_deviation);
    }
    println!("\n  * misses goal   n/a insufficient data");

    if let Some(review) = &report.review {
        print_subsection(&format!(
            "TICKETS TO REVIEW: {} / {} (worst KPI: {}, goal {:.1})",
            review.driver, review.next_step, review.kpi, review.goal.target
        ));
        if review.tickets.is_empty() {
            println!("  No individual ticket misses the {} goal", review.kpi);
        }
        for ticket in &review.tickets {
            let day = ticket
                .contact_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            println!(
                "  #{:<6} {:10} {:>6} {:>8}  AHT {}",
                ticket.id,
                day,
                review.kpi.label(),
                format_optional(ticket.score(review.kpi)),
                format_optional(ticket.aht)
            );
        }
    }

    println!("\n{}", "█".repeat(85));
}
