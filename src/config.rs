use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::args::Args;
use crate::csv::FILE_NAME;

/// Validated runtime settings, resolved once at startup.
#[derive(Clone)]
pub struct Config {
    pub repository: String,
    pub workspace: PathBuf,
    pub token: String,
    pub api_url: Url,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let repository = args
            .repository
            .as_deref()
            .or(args.github_repository.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .context("No repository given; set --repository, REPOSITORY_NAME or GITHUB_REPOSITORY")?;
        validate_repository(repository)?;

        let token = args
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .context("No token given; set --token or TRAFFIC_ACTION_TOKEN")?;

        let api_url = Url::parse(&args.api_url)
            .with_context(|| format!("Invalid API URL '{}'", args.api_url))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("Invalid API URL '{}'", args.api_url);
        }

        if args.timeout == Some(0) {
            anyhow::bail!("--timeout must be greater than 0");
        }

        Ok(Self {
            repository: repository.to_string(),
            workspace: args.workspace.clone(),
            token: token.to_string(),
            api_url,
            timeout: args.timeout.map(Duration::from_secs),
        })
    }

    pub fn table_path(&self) -> PathBuf {
        self.workspace.join(FILE_NAME)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("repository", &self.repository)
            .field("workspace", &self.workspace)
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub fn validate_repository(repository: &str) -> Result<()> {
    let pattern = Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$")?;
    let dot_segment = repository
        .split('/')
        .any(|part| part.chars().all(|c| c == '.'));
    if !pattern.is_match(repository) || dot_segment {
        anyhow::bail!("Repository must look like owner/name, got '{}'", repository);
    }
    Ok(())
}
