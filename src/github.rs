use std::time::Instant;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::{debug, info};
use url::Url;

use crate::config::Config;
use crate::error::InsightsError;
use crate::stats::{TrafficEntry, TrafficKind};

pub const API_VERSION: &str = "2022-11-28";

/// Longest slice of an error response body kept in the error message.
const BODY_EXCERPT_LEN: usize = 200;

/// Something that can report daily traffic for one repository.
pub trait TrafficSource {
    fn fetch(&self, kind: TrafficKind) -> Result<Vec<TrafficEntry>, InsightsError>;
}

/// Reads `/repos/{owner}/{name}/traffic/{clones,views}` from the GitHub REST API.
#[derive(Clone)]
pub struct GithubClient {
    client: Client,
    clones_url: Url,
    views_url: Url,
    token: String,
}

impl GithubClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));

        // The blocking client defaults to a 30s timeout; `None` here means no limit.
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let traffic_url = traffic_base(&config.api_url, &config.repository)?;
        info!(action = "configure", component = "github_client", url = %traffic_url, timeout = ?config.timeout, "Traffic endpoint resolved");

        Ok(Self {
            client,
            clones_url: traffic_url.join(TrafficKind::Clones.as_str())?,
            views_url: traffic_url.join(TrafficKind::Views.as_str())?,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, kind: TrafficKind) -> &Url {
        match kind {
            TrafficKind::Clones => &self.clones_url,
            TrafficKind::Views => &self.views_url,
        }
    }
}

impl TrafficSource for GithubClient {
    fn fetch(&self, kind: TrafficKind) -> Result<Vec<TrafficEntry>, InsightsError> {
        let start_time = Instant::now();
        let url = self.endpoint(kind);
        debug!(action = "request", component = "github_client", kind = %kind, url = %url, "Requesting traffic");

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.token)
            .send()
            .map_err(|source| InsightsError::Request { kind, source })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|source| InsightsError::Request { kind, source })?;

        if !status.is_success() {
            return Err(InsightsError::Status {
                kind,
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let entries = decode_report(kind, &body)?;
        info!(
            action = "fetched",
            component = "github_client",
            kind = %kind,
            entry_count = entries.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Traffic report received"
        );
        Ok(entries)
    }
}

/// Stands in for a client that could not be built, so each fetch stage fails
/// on its own and the stored table is still rewritten.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TrafficSource for UnavailableSource {
    fn fetch(&self, kind: TrafficKind) -> Result<Vec<TrafficEntry>, InsightsError> {
        Err(InsightsError::Unavailable {
            kind,
            message: self.reason.clone(),
        })
    }
}

/// `{api}/repos/{owner}/{name}/traffic/`, with the trailing slash that
/// `Url::join` needs to append the report name.
fn traffic_base(api_url: &Url, repository: &str) -> Result<Url> {
    let mut base = api_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("repos/{repository}/traffic/"))
        .with_context(|| format!("Invalid repository path '{repository}'"))
}

/// Pulls the entry list out of a report body. Clones arrive as
/// `{"count", "uniques", "clones": [...]}` and views as `{..., "views": [...]}`.
pub fn decode_report(kind: TrafficKind, body: &str) -> Result<Vec<TrafficEntry>, InsightsError> {
    let decode_err = |message: String| InsightsError::Decode { kind, message };

    let mut report: serde_json::Value =
        serde_json::from_str(body).map_err(|e| decode_err(e.to_string()))?;
    let entries = report
        .get_mut(kind.as_str())
        .map(serde_json::Value::take)
        .ok_or_else(|| decode_err(format!("missing `{}` array", kind.as_str())))?;

    serde_json::from_value(entries).map_err(|e| decode_err(e.to_string()))
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}
