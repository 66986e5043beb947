pub mod args;
pub mod config;
pub mod csv;
pub mod error;
pub mod github;
pub mod insights;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use config::Config;
pub use csv::{CsvStore, StatsStore};
pub use error::InsightsError;
pub use github::{GithubClient, TrafficSource, UnavailableSource};
pub use insights::{collect_insights, RunReport, Stage, StageOutcome};
pub use stats::{Record, StatsTable, TrafficEntry, TrafficKind};
