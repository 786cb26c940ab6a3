//! Ticket export overview
//! Run: ./target/release/ticket_kpi [--input data/tickets.csv]

use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use ticket_kpi::kpi::{GoalTable, Kpi};
use ticket_kpi::loader::load_tickets;
use ticket_kpi::report::{print_section_header, print_subsection, truncate};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ticket_kpi")]
#[command(about = "Summarize a customer-service ticket export")]
struct Args {
    /// Ticket CSV export
    #[arg(long, default_value = "data/tickets.csv")]
    input: PathBuf,

    /// JSON file overriding KPI goals
    #[arg(long)]
    goals: Option<PathBuf>,
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
    info!("Loaded {} tickets", set.len());

    print_section_header("TICKET EXPORT OVERVIEW");

    println!("  Tickets:      {:>10}", set.len());
    println!("  Agents:       {:>10}", set.agents().len());
    println!("  Drivers:      {:>10}", set.drivers().len());
    println!("  Next steps:   {:>10}", set.next_steps().len());

    print_subsection("DATE RANGE");
    match set.date_bounds() {
        Some((min, max)) => {
            println!("  From: {}", min.format("%Y-%m-%d"));
            println!("  To:   {}", max.format("%Y-%m-%d"));
        }
        None => println!("  No ticket carries a contact date"),
    }
    let undated = set.tickets().iter().filter(|t| t.contact_date.is_none()).count();
    if undated > 0 {
        println!("  Undated tickets (excluded from date filters): {}", undated);
    }

    print_subsection("GOALS");
    for (kpi, goal) in goals.iter() {
        println!("  {:8} {:>6.1}%  ({:?})", kpi, goal.target, goal.direction);
    }

    print_subsection("TICKETS PER AGENT");
    let mut volume: HashMap<&str, usize> = HashMap::new();
    for ticket in set.tickets() {
        *volume.entry(ticket.agent_name.as_str()).or_insert(0) += 1;
    }
    let total = set.len().max(1);
    println!("  {:30} {:>8} {:>8}", "Agent", "Tickets", "Share");
    println!("  {}", "-".repeat(48));
    for agent in set.agents() {
        let count = volume.get(agent).copied().unwrap_or(0);
        let pct = count as f64 / total as f64 * 100.0;
        println!("  {:30} {:>8} {:>7.1}%", truncate(agent, 30), count, pct);
    }

    print_subsection("KPI COVERAGE");
    for kpi in Kpi::ALL {
        let with_value = set.tickets().iter().filter(|t| t.score(kpi).is_some()).count();
        let pct = with_value as f64 / total as f64 * 100.0;
        let bar = "#".repeat((pct / 2.0) as usize);
        println!("  {:8} {:>8} ({:>5.1}%) {}", kpi, with_value, pct, bar);
    }

    println!("\n{}", "=".repeat(60));
    println!();

    Ok(())
}
