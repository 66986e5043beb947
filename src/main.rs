use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use traffic_insights::{
    collect_insights, utils, Args, Config, CsvStore, GithubClient, UnavailableSource,
};

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(action = "configure", component = "main", error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        action = "start",
        component = "main",
        repository = %config.repository,
        table = ?config.table_path(),
        "Collecting repository traffic"
    );

    let store = CsvStore::new(config.table_path());
    let report = match GithubClient::new(&config) {
        Ok(source) => collect_insights(&source, &store),
        Err(e) => {
            let reason = format!("{e:#}");
            error!(action = "configure", component = "github_client", error = %reason, "HTTP client unavailable, fetches will fail");
            collect_insights(&UnavailableSource::new(reason), &store)
        }
    };

    for (stage, err) in report.failures() {
        warn!(action = "summary", component = "main", stage = %stage, error = %err, "Stage did not complete");
    }

    Ok(())
}
