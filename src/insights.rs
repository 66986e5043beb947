use std::fmt;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::csv::StatsStore;
use crate::error::InsightsError;
use crate::github::TrafficSource;
use crate::stats::{StatsTable, TrafficKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    FetchClones,
    FetchViews,
    Persist,
}

impl Stage {
    fn fetch(kind: TrafficKind) -> Self {
        match kind {
            TrafficKind::Clones => Stage::FetchClones,
            TrafficKind::Views => Stage::FetchViews,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::FetchClones => "fetch_clones",
            Stage::FetchViews => "fetch_views",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage ended. A failed stage still hands its (possibly partial)
/// table to the next one.
#[derive(Debug)]
pub enum StageOutcome {
    Completed,
    Failed(InsightsError),
}

impl StageOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&InsightsError> {
        match self {
            StageOutcome::Completed => None,
            StageOutcome::Failed(err) => Some(err),
        }
    }

    fn log(result: Result<usize, InsightsError>, stage: Stage, start_time: Instant) -> Self {
        let duration_ms = start_time.elapsed().as_millis();
        match result {
            Ok(count) => {
                info!(action = "complete", component = "pipeline", stage = %stage, count, duration_ms, "Stage completed");
                StageOutcome::Completed
            }
            Err(err) => {
                error!(action = "failed", component = "pipeline", stage = %stage, error = %err, duration_ms, "Stage failed, continuing");
                StageOutcome::Failed(err)
            }
        }
    }
}

/// Everything a run produced: the final table and how each stage went.
#[derive(Debug)]
pub struct RunReport {
    pub table: StatsTable,
    pub stages: Vec<(Stage, StageOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> Vec<(Stage, &InsightsError)> {
        self.stages
            .iter()
            .filter_map(|(stage, outcome)| outcome.error().map(|err| (*stage, err)))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.stages.iter().all(|(_, outcome)| !outcome.is_failed())
    }
}

/// Seeds `table` from storage. Rows read before a failure are kept.
pub fn load_stage(store: &impl StatsStore, mut table: StatsTable) -> (StatsTable, StageOutcome) {
    let start_time = Instant::now();
    info!(action = "start", component = "pipeline", stage = %Stage::Load, "Loading stored table");

    let result = store.load(&mut table);
    (table, StageOutcome::log(result, Stage::Load, start_time))
}

/// Fetches one report and folds it into `table`. A failed fetch leaves the
/// table untouched.
pub fn fetch_stage(
    source: &impl TrafficSource,
    kind: TrafficKind,
    mut table: StatsTable,
) -> (StatsTable, StageOutcome) {
    let stage = Stage::fetch(kind);
    let start_time = Instant::now();
    info!(action = "start", component = "pipeline", stage = %stage, "Fetching traffic");

    let result = source
        .fetch(kind)
        .map(|entries| table.fold(kind, &entries));
    (table, StageOutcome::log(result, stage, start_time))
}

pub fn persist_stage(store: &impl StatsStore, table: &StatsTable) -> StageOutcome {
    let start_time = Instant::now();
    info!(action = "start", component = "pipeline", stage = %Stage::Persist, record_count = table.len(), "Writing table");

    for record in table.sorted_records() {
        debug!(action = "persist", component = "pipeline", record = ?record, "Record");
    }

    let result = store.save(table);
    StageOutcome::log(result, Stage::Persist, start_time)
}

/// Runs load, fetch clones, fetch views and persist, in that order. Every
/// stage runs regardless of how the earlier ones went.
pub fn collect_insights(source: &impl TrafficSource, store: &impl StatsStore) -> RunReport {
    let total_start_time = Instant::now();
    let mut stages = Vec::with_capacity(4);

    let (table, outcome) = load_stage(store, StatsTable::new());
    stages.push((Stage::Load, outcome));

    let mut table = table;
    for kind in [TrafficKind::Clones, TrafficKind::Views] {
        let (next, outcome) = fetch_stage(source, kind, table);
        stages.push((Stage::fetch(kind), outcome));
        table = next;
    }

    stages.push((Stage::Persist, persist_stage(store, &table)));

    let report = RunReport { table, stages };
    info!(
        action = "complete",
        component = "pipeline",
        record_count = report.table.len(),
        failed_stages = report.failures().len(),
        duration_ms = total_start_time.elapsed().as_millis(),
        "Traffic collection finished"
    );
    report
}
