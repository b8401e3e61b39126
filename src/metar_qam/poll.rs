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

use crate::history::{detect_change, HistoryEntry, HistoryError, HistoryStore};
use crate::parse::{parse_report, parse_trend, ParsedRecord, TrendSection};
use crate::render::Report;
use chrono::{DateTime, Utc};

/// A report that was different from the last one stored for the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub entry: HistoryEntry,
    pub record: ParsedRecord,
    pub trend: Option<TrendSection>,
    pub report: Report,
}

/// Result of processing one fetched report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Same report as the latest stored one, nothing appended.
    Unchanged,
    /// New observation, appended to the history.
    Updated(Box<Update>),
}

/// Run one poll cycle for an already fetched report: detect whether it's new,
/// append it to the history if so, and render it.
pub fn process_report<H: HistoryStore>(
    history: &mut H,
    station: &str,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<PollOutcome, HistoryError> {
    let latest = history.latest(station)?;
    let record = parse_report(raw);

    let entry = match detect_change(latest.as_ref(), station, raw, &record, now) {
        Some(e) => e,
        None => {
            tracing::debug!(message = "report unchanged", station = %station);
            return Ok(PollOutcome::Unchanged);
        }
    };

    history.append(entry.clone())?;
    tracing::info!(message = "appended new observation", station = %station, time = %entry.observed_time);

    let trend = parse_trend(raw);
    let report = Report::new(&record, trend.as_ref(), now);

    Ok(PollOutcome::Updated(Box::new(Update {
        entry,
        record,
        trend,
        report,
    })))
}
