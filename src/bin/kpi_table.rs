//! KPI table per driver × next-step combination
//!
//! Run: ./target/release/kpi_table --agent "Ana Souza" [--sort csat_deviation --desc] [--page 2]
//! Sort columns: driver, next_step, volume, csat, cres, fcr, rcr, hangup,
//!               csat_deviation, cres_deviation, fcr_deviation, rcr_deviation, hangup_deviation

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use ticket_kpi::filter::TicketFilter;
use ticket_kpi::kpi::{GoalTable, Kpi};
use ticket_kpi::loader::load_tickets;
use ticket_kpi::report::{print_section_header, truncate};
use ticket_kpi::table::{
    build_rows, deviation_color, format_percent, paginate, sort_rows, SortColumn, SortDirection,
    DEFAULT_ROWS_PER_PAGE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_sort_column(s: &str) -> Result<SortColumn, String> {
    SortColumn::parse(s).ok_or_else(|| format!("unknown column '{}'", s))
}

#[derive(Parser, Debug)]
#[command(name = "kpi_table")]
#[command(about = "Average KPIs and goal gaps per driver and next step for one agent")]
struct Args {
    /// Ticket CSV export
    #[arg(long, default_value = "data/tickets.csv")]
    input: PathBuf,

    /// JSON file overriding KPI goals
    #[arg(long)]
    goals: Option<PathBuf>,

    /// Agent name (exact match); defaults to the first agent in the export
    #[arg(long)]
    agent: Option<String>,

    /// Only this driver
    #[arg(long)]
    driver: Option<String>,

    /// Only this next step
    #[arg(long)]
    next_step: Option<String>,

    /// Column to sort by
    #[arg(long, value_parser = parse_sort_column)]
    sort: Option<SortColumn>,

    /// Sort descending
    #[arg(long)]
    desc: bool,

    /// Page to show (1-based)
    #[arg(long, default_value = "1")]
    page: usize,

    #[arg(long, default_value_t = DEFAULT_ROWS_PER_PAGE)]
    rows_per_page: usize,

    /// Show the deviation cell colours used by the web table
    #[arg(long)]
    colors: bool,
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
    let agent = match args.agent.as_deref().or(set.default_agent()) {
        Some(agent) => agent.to_string(),
        None => bail!("ticket export {:?} is empty", args.input),
    };

    let filter = TicketFilter::for_agent(agent.clone())
        .with_driver(args.driver.clone())
        .with_next_step(args.next_step.clone());
    let mut rows = build_rows(set.tickets(), &filter, &goals);
    if let Some(column) = args.sort {
        let direction = if args.desc { SortDirection::Descending } else { SortDirection::Ascending };
        sort_rows(&mut rows, column, direction);
    }
    info!("{} combinations for {}", rows.len(), agent);

    print_section_header(&format!("KPI TABLE - {}", agent));

    if rows.is_empty() {
        println!("  No tickets match the selection");
        return Ok(());
    }

    let page = paginate(&rows, args.page, args.rows_per_page);

    print!("  {:24} {:24} {:>6}", "Driver", "Next Step", "Vol");
    for kpi in Kpi::ALL {
        print!(" {:>8} {:>7}", kpi.label(), "gap");
    }
    println!();
    println!("  {}", "─".repeat(24 + 25 + 7 + 17 * 5));

    for row in page.rows {
        print!(
            "  {:24} {:24} {:>6}",
            truncate(&row.driver, 24),
            truncate(&row.next_step, 24),
            row.volume
        );
        for kpi in Kpi::ALL {
            print!(
                " {:>8} {:>7}",
                format_percent(row.average(kpi)),
                format_percent(row.deviation(kpi))
            );
        }
        println!();

        if args.colors {
            let colors: Vec<String> = Kpi::ALL
                .iter()
                .map(|kpi| {
                    let color = deviation_color(row.deviation(*kpi)).unwrap_or_else(|| "-".to_string());
                    format!("{}={}", kpi, color)
                })
                .collect();
            println!("  {:>56} {}", "", colors.join("  "));
        }
    }

    println!(
        "\n  Page {} of {} ({} rows){}{}",
        page.number,
        page.total_pages,
        page.total_rows,
        if page.has_previous() { "  [--page N-1 for previous]" } else { "" },
        if page.has_next() { "  [--page N+1 for next]" } else { "" },
    );

    Ok(())
}
