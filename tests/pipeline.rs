use std::fs;
use std::path::Path;

use mockito::{Mock, ServerGuard};
use tempfile::TempDir;
use traffic_insights::{
    collect_insights, Config, CsvStore, GithubClient, Stage, StageOutcome,
};
use url::Url;

const HEADER: &str = "date,totalClones,uniqueClones,totalViews,uniqueViews";

fn config(server: &ServerGuard, workspace: &Path) -> Config {
    Config {
        repository: "octo/demo".to_string(),
        workspace: workspace.to_path_buf(),
        token: "secret".to_string(),
        api_url: Url::parse(&server.url()).unwrap(),
        timeout: None,
    }
}

fn mock_report(server: &mut ServerGuard, kind: &str, entries: &str) -> Mock {
    server
        .mock("GET", format!("/repos/octo/demo/traffic/{kind}").as_str())
        .match_header("authorization", "Bearer secret")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"count": 0, "uniques": 0, "{kind}": [{entries}]}}"#))
        .create()
}

fn run(server: &ServerGuard, workspace: &Path) -> traffic_insights::RunReport {
    let config = config(server, workspace);
    let source = GithubClient::new(&config).unwrap();
    let store = CsvStore::new(config.table_path());
    collect_insights(&source, &store)
}

fn rows(path: &Path) -> Vec<String> {
    let mut rows: Vec<String> = fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    rows[1..].sort();
    rows
}

#[test]
fn test_fresh_workspace_gets_single_merged_row() {
    let mut server = mockito::Server::new();
    let clones = mock_report(
        &mut server,
        "clones",
        r#"{"timestamp": "2024-01-01T00:00:00Z", "count": 10, "uniques": 3}"#,
    );
    let views = mock_report(
        &mut server,
        "views",
        r#"{"timestamp": "2024-01-01T12:00:00Z", "count": 20, "uniques": 7}"#,
    );
    let dir = TempDir::new().unwrap();

    let report = run(&server, dir.path());

    clones.assert();
    views.assert();
    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(dir.path().join("insights.csv")).unwrap(),
        format!("{HEADER}\n1/1/2024,10,3,20,7\n")
    );
}

#[test]
fn test_existing_rows_are_kept_and_not_overwritten() {
    let mut server = mockito::Server::new();
    let _clones = mock_report(
        &mut server,
        "clones",
        r#"{"timestamp": "2024-01-01T00:00:00Z", "count": 99, "uniques": 99},
           {"timestamp": "2024-01-02T00:00:00Z", "count": 4, "uniques": 2}"#,
    );
    let _views = mock_report(&mut server, "views", "");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("insights.csv");
    fs::write(
        &path,
        format!("{HEADER}\n12/31/2023,1,1,8,2\n1/1/2024,5,1,,\n"),
    )
    .unwrap();

    let report = run(&server, dir.path());

    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!("{HEADER}\n12/31/2023,1,1,8,2\n1/1/2024,5,1,,\n1/2/2024,4,2,,\n")
    );
}

#[test]
fn test_views_outage_still_writes_clones() {
    let mut server = mockito::Server::new();
    let _clones = mock_report(
        &mut server,
        "clones",
        r#"{"timestamp": "2024-03-10T00:00:00Z", "count": 6, "uniques": 4}"#,
    );
    let _views = server
        .mock("GET", "/repos/octo/demo/traffic/views")
        .with_status(502)
        .with_body("Bad Gateway")
        .create();
    let dir = TempDir::new().unwrap();

    let report = run(&server, dir.path());

    assert!(report.outcome(Stage::FetchViews).unwrap().is_failed());
    assert!(matches!(report.outcome(Stage::Persist), Some(StageOutcome::Completed)));
    assert_eq!(
        fs::read_to_string(dir.path().join("insights.csv")).unwrap(),
        format!("{HEADER}\n3/10/2024,6,4,,\n")
    );
}

#[test]
fn test_bad_count_cell_keeps_later_history() {
    let mut server = mockito::Server::new();
    let _clones = mock_report(
        &mut server,
        "clones",
        r#"{"timestamp": "2024-01-05T00:00:00Z", "count": 2, "uniques": 1}"#,
    );
    let _views = mock_report(&mut server, "views", "");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("insights.csv");
    fs::write(
        &path,
        format!("{HEADER}\n1/4/2024,3,3,,\n1/5/2024,many,,,\n1/6/2024,6,6,6,6\n"),
    )
    .unwrap();

    let report = run(&server, dir.path());

    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!("{HEADER}\n1/4/2024,3,3,,\n1/5/2024,2,1,,\n1/6/2024,6,6,6,6\n")
    );
}

#[test]
fn test_unreadable_table_does_not_stop_the_run() {
    let mut server = mockito::Server::new();
    let _clones = mock_report(
        &mut server,
        "clones",
        r#"{"timestamp": "2024-01-05T00:00:00Z", "count": 2, "uniques": 1}"#,
    );
    let _views = mock_report(&mut server, "views", "");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("insights.csv");
    fs::write(&path, "day,clones\n1/4/2024,3\n").unwrap();

    let report = run(&server, dir.path());

    assert!(report.outcome(Stage::Load).unwrap().is_failed());
    assert!(matches!(report.outcome(Stage::Persist), Some(StageOutcome::Completed)));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        format!("{HEADER}\n1/5/2024,2,1,,\n")
    );
}

#[test]
fn test_rerun_without_new_data_round_trips() {
    let mut server = mockito::Server::new();
    let _clones = mock_report(&mut server, "clones", "");
    let _views = mock_report(&mut server, "views", "");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("insights.csv");
    // Hand-edited files may be out of order; the row set must survive.
    let original = format!("{HEADER}\n2/1/2024,1,1,1,1\n1/15/2024,0,0,3,2\n1/16/2024,,,9,4\n");
    fs::write(&path, &original).unwrap();

    let report = run(&server, dir.path());

    assert!(report.is_clean());
    let mut expected: Vec<String> = original.lines().map(str::to_string).collect();
    expected[1..].sort();
    assert_eq!(rows(&path), expected);
}
