//! Daily KPI trend against the goal
//!
//! Run: ./target/release/kpi_trend --indicator RCR [--agent "Ana Souza"] [--start 2024-10-01] [--end 2024-10-31]

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use ticket_kpi::filter::{DateWindow, TicketFilter};
use ticket_kpi::kpi::{Direction, GoalTable, Kpi};
use ticket_kpi::loader::load_tickets;
use ticket_kpi::report::{print_section_header, print_subsection};
use ticket_kpi::trend::daily_trend;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_indicator(s: &str) -> Result<Kpi, String> {
    Kpi::parse(s).ok_or_else(|| format!("unknown indicator '{}' (CSAT, CRES, FCR, RCR, Hangup)", s))
}

#[derive(Parser, Debug)]
#[command(name = "kpi_trend")]
#[command(about = "Daily average of one KPI compared with its goal")]
struct Args {
    /// Ticket CSV export
    #[arg(long, default_value = "data/tickets.csv")]
    input: PathBuf,

    /// JSON file overriding KPI goals
    #[arg(long)]
    goals: Option<PathBuf>,

    /// KPI to plot
    #[arg(long, default_value = "CSAT", value_parser = parse_indicator)]
    indicator: Kpi,

    /// Agent name (exact match); all agents when omitted
    #[arg(long)]
    agent: Option<String>,

    #[arg(long)]
    start: Option<NaiveDate>,

    /// Inclusive
    #[arg(long)]
    end: Option<NaiveDate>,

    #[arg(long)]
    driver: Option<String>,

    #[arg(long)]
    next_step: Option<String>,
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
    let filter = TicketFilter {
        agent: args.agent.clone(),
        window: Some(DateWindow::new(args.start, args.end)),
        driver: args.driver.clone(),
        next_step: args.next_step.clone(),
    };
    let trend = daily_trend(set.tickets(), &filter, args.indicator, &goals);
    info!("{} days with {} values", trend.points.len(), trend.kpi);

    let scope = args.agent.as_deref().unwrap_or("all agents");
    print_section_header(&format!("{} TREND - {}", trend.kpi.column(), scope));

    let comparison = match trend.goal.direction {
        Direction::HigherIsBetter => "at or above",
        Direction::LowerIsBetter => "at or below",
    };
    println!("  Goal: {} {:.1}%", comparison, trend.goal.target);

    if trend.points.is_empty() {
        println!("\n  No tickets with a {} value match the selection", trend.kpi);
        return Ok(());
    }

    print_subsection("DAILY AVERAGE");
    println!("  {:>10}  {:>8}  {:>8}  {:>8}", "Day", "Tickets", "Average", "vs Goal");
    println!("  {}", "-".repeat(40));
    for point in &trend.points {
        let delta = point.average - trend.goal.target;
        let delta_str = if delta > 0.0 { format!("+{:.2}", delta) } else { format!("{:.2}", delta) };
        let marker = if point.meets_goal { "" } else { "  ⚠" };
        let bar = "#".repeat((point.average.clamp(0.0, 100.0) / 2.5) as usize);
        println!(
            "  {:>10}  {:>8}  {:>7.2}%  {:>8}{}  {}",
            point.day, point.samples, point.average, delta_str, marker, bar
        );
    }

    if let Some(mean) = trend.mean() {
        println!("\n  Mean of daily averages: {:.2}%", mean);
    }
    println!(
        "  Days missing goal: {} of {}",
        trend.days_missing_goal(),
        trend.points.len()
    );

    Ok(())
}
