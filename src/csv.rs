use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::mem::take;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::InsightsError;
use crate::stats::{Record, StatsTable};

pub const FILE_NAME: &str = "insights.csv";

pub const HEADER: [&str; 5] = [
    "date",
    "totalClones",
    "uniqueClones",
    "totalViews",
    "uniqueViews",
];

/// Where the stats table lives between runs.
pub trait StatsStore {
    /// Loads persisted records into `table` and returns how many were read.
    /// Records inserted before a failure stay in `table`.
    fn load(&self, table: &mut StatsTable) -> Result<usize, InsightsError>;

    /// Replaces the persisted table with `table` and returns the row count.
    fn save(&self, table: &StatsTable) -> Result<usize, InsightsError>;
}

/// A comma-separated table on disk.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `insights.csv` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_table(&self, table: &StatsTable) -> io::Result<usize> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("csv.tmp");
        let records = table.sorted_records();
        {
            let mut w = BufWriter::new(File::create(&tmp_path)?);
            write_row(&mut w, &HEADER)?;
            for record in &records {
                write_row(&mut w, &record_cells(record))?;
            }
            w.flush()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(records.len())
    }
}

impl StatsStore for CsvStore {
    fn load(&self, table: &mut StatsTable) -> Result<usize, InsightsError> {
        if !self.path.exists() {
            info!(action = "skip", component = "csv_load", path = ?self.path, "No existing table, starting empty");
            return Ok(0);
        }

        let text = fs::read_to_string(&self.path).map_err(|source| InsightsError::Read {
            path: self.path.clone(),
            source,
        })?;
        read_records(&text, table)
    }

    fn save(&self, table: &StatsTable) -> Result<usize, InsightsError> {
        self.write_table(table).map_err(|source| InsightsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/* ---------------- Parsing ---------------- */

/// Splits CSV text into rows, each tagged with the 1-based line it starts on.
/// Handles quoted fields, `""` escapes and CRLF. Blank lines are dropped.
pub fn parse_rows(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push((row_line, take(&mut row)));
                } else {
                    row.clear();
                }
                line += 1;
                row_line = line;
            }
            '\n' => {
                line += 1;
                field.push(ch);
            }
            _ => field.push(ch),
        }
    }

    // Trailing row without a final newline; unterminated quotes are kept as-is.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push((row_line, row));
    }

    rows
}

/// Parses a whole table into `table`, returning the number of records read.
/// Only a structurally broken table is an error; a bad count cell is logged
/// and loaded as empty so the rest of the history survives.
pub fn read_records(text: &str, table: &mut StatsTable) -> Result<usize, InsightsError> {
    let mut rows = parse_rows(text).into_iter();
    let Some((header_line, header)) = rows.next() else {
        return Ok(0);
    };

    let columns = Columns::locate(&header, header_line)?;
    let mut loaded = 0;

    for (line, cells) in rows {
        let date = cells.get(columns.date).map(String::as_str).unwrap_or("");
        if date.trim().is_empty() {
            warn!(action = "skip", component = "csv_load", line, "Row without a date");
            continue;
        }

        let record = Record {
            date: date.to_string(),
            total_clones: count(&cells, columns.total_clones, HEADER[1], line),
            unique_clones: count(&cells, columns.unique_clones, HEADER[2], line),
            total_views: count(&cells, columns.total_views, HEADER[3], line),
            unique_views: count(&cells, columns.unique_views, HEADER[4], line),
        };
        debug!(action = "load", component = "csv_load", line, date = %record.date, "Loaded record");
        table.insert(record);
        loaded += 1;
    }

    Ok(loaded)
}

/// Column positions resolved from the header row, so existing files may
/// order their columns freely.
struct Columns {
    date: usize,
    total_clones: Option<usize>,
    unique_clones: Option<usize>,
    total_views: Option<usize>,
    unique_views: Option<usize>,
}

impl Columns {
    fn locate(header: &[String], line: usize) -> Result<Self, InsightsError> {
        let find = |name: &str| header.iter().position(|h| h.trim() == name);
        let date = find(HEADER[0])
            .ok_or_else(|| InsightsError::parse(line, "header has no `date` column"))?;
        Ok(Self {
            date,
            total_clones: find(HEADER[1]),
            unique_clones: find(HEADER[2]),
            total_views: find(HEADER[3]),
            unique_views: find(HEADER[4]),
        })
    }
}

fn count(cells: &[String], index: Option<usize>, column: &str, line: usize) -> Option<u64> {
    let value = index
        .and_then(|i| cells.get(i))
        .map(|c| c.trim())
        .unwrap_or("");
    if value.is_empty() {
        return None;
    }
    match value.parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(action = "skip", component = "csv_load", line, column, value, "Invalid count, treating as empty");
            None
        }
    }
}

/* ---------------- Writing ---------------- */

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV row to any writer.
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        let cell = cell.as_ref();
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

fn record_cells(record: &Record) -> [String; 5] {
    let number = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();
    [
        record.date.clone(),
        number(record.total_clones),
        number(record.unique_clones),
        number(record.total_views),
        number(record.unique_views),
    ]
}
