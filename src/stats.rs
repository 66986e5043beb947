use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

/// Format used for the merge key. Pinned to UTC so the same instant always
/// lands in the same row no matter where the job runs.
pub const DATE_KEY_FORMAT: &str = "%-m/%-d/%Y";

pub fn date_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(DATE_KEY_FORMAT).to_string()
}

/// Parses a merge key back into a calendar date, for ordering rows on disk.
pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, "%m/%d/%Y").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrafficKind {
    Clones,
    Views,
}

impl TrafficKind {
    /// Path segment under `/repos/{owner}/{name}/traffic/`, which is also the
    /// name of the array in the response body.
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficKind::Clones => "clones",
            TrafficKind::Views => "views",
        }
    }
}

impl fmt::Display for TrafficKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrafficEntry {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub uniques: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub date: String,
    pub total_clones: Option<u64>,
    pub unique_clones: Option<u64>,
    pub total_views: Option<u64>,
    pub unique_views: Option<u64>,
}

impl Record {
    pub fn new(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            ..Self::default()
        }
    }

    /// Fills the field pair for `kind`. Fields that already hold a value keep it.
    pub fn merge(&mut self, kind: TrafficKind, count: u64, uniques: u64) {
        let (total, unique) = match kind {
            TrafficKind::Clones => (&mut self.total_clones, &mut self.unique_clones),
            TrafficKind::Views => (&mut self.total_views, &mut self.unique_views),
        };
        total.get_or_insert(count);
        unique.get_or_insert(uniques);
    }
}

/// Date-keyed traffic records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsTable {
    records: HashMap<String, Record>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, date: &str) -> Option<&Record> {
        self.records.get(date)
    }

    /// Inserts a record as-is, replacing any record with the same date.
    pub fn insert(&mut self, record: Record) {
        self.records.insert(record.date.clone(), record);
    }

    /// Folds one traffic report into the table and returns the number of
    /// entries merged.
    pub fn fold(&mut self, kind: TrafficKind, entries: &[TrafficEntry]) -> usize {
        for entry in entries {
            let key = date_key(&entry.timestamp);
            let record = self
                .records
                .entry(key.clone())
                .or_insert_with(|| Record::new(key.clone()));
            record.date = key;
            record.merge(kind, entry.count, entry.uniques);
        }
        entries.len()
    }

    /// Records in calendar order. Keys that are not dates go last, sorted as text.
    pub fn sorted_records(&self) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.records.values().collect();
        records.sort_by_cached_key(|record| {
            let date = parse_date_key(&record.date);
            (date.is_none(), date, record.date.clone())
        });
        records
    }
}

impl FromIterator<Record> for StatsTable {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}
