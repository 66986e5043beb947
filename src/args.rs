use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "traffic-insights",
    about = "Collect GitHub clone and view traffic into a date-keyed CSV table",
    version,
    long_about = None
)]
pub struct Args {
    /// Repository to collect traffic for, as owner/name
    #[arg(short, long, env = "REPOSITORY_NAME")]
    pub repository: Option<String>,

    /// Repository of the running workflow, used when --repository is not set
    #[arg(long, env = "GITHUB_REPOSITORY", hide = true)]
    pub github_repository: Option<String>,

    /// Directory holding insights.csv
    #[arg(short, long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Token with push access to the repository
    #[arg(long, env = "TRAFFIC_ACTION_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Request timeout in seconds (no limit when unset)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
