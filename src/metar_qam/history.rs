// metar_qam - METAR poller that keeps a change history and renders QAM weather bulletins
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::parse::ParsedRecord;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::{error, fmt, io};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const ROUND_MINUTES: u32 = 30;

#[derive(Debug)]
pub enum HistoryError {
    Io(io::Error),
    Csv(csv::Error),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "history io error: {}", e),
            Self::Csv(e) => write!(f, "history csv error: {}", e),
        }
    }
}

impl error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
        }
    }
}

impl From<io::Error> for HistoryError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for HistoryError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

/// One distinct observation, as stored in the history log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub station: String,
    #[serde(rename = "time")]
    pub observed_time: String,
    #[serde(rename = "metar")]
    pub raw_report: String,
}

/// Append-only log of observations, partitioned by station.
///
/// Implementations are responsible for serializing appends for a station.
pub trait HistoryStore {
    /// Most recent entry for the station, if there is one.
    fn latest(&self, station: &str) -> Result<Option<HistoryEntry>, HistoryError>;

    /// Persist a new entry after all existing ones.
    fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError>;

    /// Up to `limit` of the most recent entries for the station, oldest first.
    fn recent(&self, station: &str, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError>;
}

/// History kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: HashMap<String, Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, station: &str) -> usize {
        self.entries.get(station).map(|v| v.len()).unwrap_or(0)
    }
}

impl HistoryStore for MemoryHistory {
    fn latest(&self, station: &str) -> Result<Option<HistoryEntry>, HistoryError> {
        Ok(self.entries.get(station).and_then(|v| v.last()).cloned())
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        self.entries.entry(entry.station.clone()).or_default().push(entry);
        Ok(())
    }

    fn recent(&self, station: &str, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.entries.get(station).map(|v| v.as_slice()).unwrap_or(&[]);
        Ok(tail(entries, limit).to_vec())
    }
}

/// History kept in a CSV file with a `station,time,metar` header.
///
/// The file is created, along with the header, on the first append.
#[derive(Debug)]
pub struct CsvHistory {
    path: PathBuf,
}

impl CsvHistory {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CsvHistory { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_station(&self, station: &str) -> Result<Vec<HistoryEntry>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut out = Vec::new();
        for row in rdr.deserialize::<HistoryEntry>() {
            let entry = row?;
            if entry.station == station {
                out.push(entry);
            }
        }

        Ok(out)
    }
}

impl HistoryStore for CsvHistory {
    fn latest(&self, station: &str) -> Result<Option<HistoryEntry>, HistoryError> {
        Ok(self.read_station(station)?.pop())
    }

    fn append(&mut self, entry: HistoryEntry) -> Result<(), HistoryError> {
        let needs_header = match self.path.metadata() {
            Ok(m) => m.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new().has_headers(needs_header).from_writer(file);
        wtr.serialize(&entry)?;
        wtr.flush()?;
        Ok(())
    }

    fn recent(&self, station: &str, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let entries = self.read_station(station)?;
        Ok(tail(&entries, limit).to_vec())
    }
}

fn tail(entries: &[HistoryEntry], limit: usize) -> &[HistoryEntry] {
    &entries[entries.len().saturating_sub(limit)..]
}

/// Decide whether a freshly fetched report is a new observation.
///
/// Returns the entry to append when there is no history for the station or
/// the latest stored report differs from `raw` (exact string comparison).
pub fn detect_change(
    latest: Option<&HistoryEntry>,
    station: &str,
    raw: &str,
    record: &ParsedRecord,
    now: DateTime<Utc>,
) -> Option<HistoryEntry> {
    match latest {
        Some(prev) if prev.raw_report == raw => None,
        _ => Some(HistoryEntry {
            station: station.to_owned(),
            observed_time: observation_time(record, now).format(TIME_FORMAT).to_string(),
            raw_report: raw.to_owned(),
        }),
    }
}

/// Time of an observation: the report's own day and time in the current UTC
/// year and month, or `now` rounded down to the half hour when the report
/// time is missing or doesn't form a valid date.
pub fn observation_time(record: &ParsedRecord, now: DateTime<Utc>) -> DateTime<Utc> {
    report_time(record, now).unwrap_or_else(|| round_down(now))
}

fn report_time(record: &ParsedRecord, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let day = record.day.as_deref()?.parse::<u32>().ok()?;
    let hour = record.hour.as_deref()?.parse::<u32>().ok()?;
    let minute = record.minute.as_deref()?.parse::<u32>().ok()?;

    Utc.with_ymd_and_hms(now.year(), now.month(), day, hour, minute, 0).single()
}

fn round_down(now: DateTime<Utc>) -> DateTime<Utc> {
    let minute = now.minute() - now.minute() % ROUND_MINUTES;
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), now.hour(), minute, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::{detect_change, observation_time, CsvHistory, HistoryEntry, HistoryStore, MemoryHistory};
    use crate::parse::parse_report;
    use chrono::{TimeZone, Utc};

    fn entry(station: &str, raw: &str) -> HistoryEntry {
        HistoryEntry {
            station: station.to_owned(),
            observed_time: "2026-10-23 05:30 UTC".to_owned(),
            raw_report: raw.to_owned(),
        }
    }

    #[test]
    fn test_detect_change_empty_history() {
        let now = Utc.with_ymd_and_hms(2026, 10, 23, 5, 41, 12).unwrap();
        let raw = "WARR 230530Z 09005KT 8000 FEW018 31/24 Q1010 NOSIG";
        let new = detect_change(None, "WARR", raw, &parse_report(raw), now).unwrap();

        assert_eq!("WARR", new.station);
        assert_eq!("2026-10-23 05:30 UTC", new.observed_time);
        assert_eq!(raw, new.raw_report);
    }

    #[test]
    fn test_detect_change_same_report() {
        let now = Utc.with_ymd_and_hms(2026, 10, 23, 5, 41, 12).unwrap();
        let raw = "WARR 230530Z 09005KT 8000 FEW018 31/24 Q1010 NOSIG";
        let prev = entry("WARR", raw);

        assert_eq!(None, detect_change(Some(&prev), "WARR", raw, &parse_report(raw), now));
    }

    #[test]
    fn test_detect_change_no_normalization() {
        let now = Utc.with_ymd_and_hms(2026, 10, 23, 5, 41, 12).unwrap();
        let prev = entry("WARR", "WARR 230530Z 09005KT");
        let raw = "WARR 230530Z  09005KT";

        assert!(detect_change(Some(&prev), "WARR", raw, &parse_report(raw), now).is_some());
    }

    #[test]
    fn test_observation_time_from_report() {
        let now = Utc.with_ymd_and_hms(2026, 10, 23, 6, 2, 0).unwrap();
        let rec = parse_report("WARR 230530Z 09005KT");
        assert_eq!(
            Utc.with_ymd_and_hms(2026, 10, 23, 5, 30, 0).unwrap(),
            observation_time(&rec, now)
        );
    }

    #[test]
    fn test_observation_time_fallback_rounds_down() {
        let now = Utc.with_ymd_and_hms(2026, 10, 23, 6, 47, 33).unwrap();
        let rec = parse_report("WARR 09005KT");
        assert_eq!(
            Utc.with_ymd_and_hms(2026, 10, 23, 6, 30, 0).unwrap(),
            observation_time(&rec, now)
        );

        let now = Utc.with_ymd_and_hms(2026, 10, 23, 6, 12, 0).unwrap();
        assert_eq!(
            Utc.with_ymd_and_hms(2026, 10, 23, 6, 0, 0).unwrap(),
            observation_time(&rec, now)
        );
    }

    #[test]
    fn test_observation_time_invalid_day_falls_back() {
        let now = Utc.with_ymd_and_hms(2026, 11, 1, 0, 5, 0).unwrap();
        let rec = parse_report("WARR 312330Z 09005KT");
        assert_eq!(
            Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap(),
            observation_time(&rec, now)
        );
    }

    #[test]
    fn test_memory_history_partitioned() {
        let mut history = MemoryHistory::new();
        history.append(entry("WARR", "a")).unwrap();
        history.append(entry("WIII", "b")).unwrap();
        history.append(entry("WARR", "c")).unwrap();

        assert_eq!(Some("c"), history.latest("WARR").unwrap().map(|e| e.raw_report).as_deref());
        assert_eq!(Some("b"), history.latest("WIII").unwrap().map(|e| e.raw_report).as_deref());
        assert_eq!(None, history.latest("WADD").unwrap());
        assert_eq!(2, history.len("WARR"));
    }

    #[test]
    fn test_memory_history_recent() {
        let mut history = MemoryHistory::new();
        for raw in ["a", "b", "c"] {
            history.append(entry("WARR", raw)).unwrap();
        }

        let recent: Vec<String> = history.recent("WARR", 2).unwrap().into_iter().map(|e| e.raw_report).collect();
        assert_eq!(vec!["b", "c"], recent);
        assert_eq!(3, history.recent("WARR", 20).unwrap().len());
        assert!(history.recent("WIII", 20).unwrap().is_empty());
    }

    #[test]
    fn test_csv_history_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let history = CsvHistory::new(dir.path().join("metar_history.csv"));

        assert_eq!(None, history.latest("WARR").unwrap());
        assert!(history.recent("WARR", 20).unwrap().is_empty());
    }

    #[test]
    fn test_csv_history_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metar_history.csv");
        let mut history = CsvHistory::new(&path);

        history.append(entry("WARR", "WARR 230530Z 09005KT 8000")).unwrap();
        history.append(entry("WIII", "WIII 230530Z 27010KT 9999")).unwrap();
        history.append(entry("WARR", "WARR 230600Z 10006KT 8000")).unwrap();

        let latest = history.latest("WARR").unwrap().unwrap();
        assert_eq!("WARR 230600Z 10006KT 8000", latest.raw_report);
        assert_eq!(2, history.recent("WARR", 20).unwrap().len());

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(Some("station,time,metar"), lines.next());
        assert_eq!(Some("WARR,2026-10-23 05:30 UTC,WARR 230530Z 09005KT 8000"), lines.next());
        assert_eq!(2, lines.count());
    }
}
