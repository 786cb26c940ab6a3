//! Customer-service ticket KPI analytics
//!
//! Loads a ticket CSV export and reports, per agent, which driver × next-step
//! combinations miss their CSAT, CRES, FCR, RCR and Hangup goals.

pub mod cache;
pub mod deviation;
pub mod filter;
pub mod kpi;
pub mod loader;
pub mod models;
pub mod report;
pub mod sampling;
pub mod table;
pub mod trend;

pub use deviation::{DeviationAggregator, DeviationReport};
pub use kpi::{GoalTable, Kpi};
pub use loader::{load_tickets, TicketSet};
