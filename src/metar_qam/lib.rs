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

//! METAR poller that keeps a change history and renders QAM weather bulletins
//!
//! ## Features
//!
//! `metar_qam` fetches the latest [METAR] for a single aerodrome from the [NOAA station files],
//! appends it to a CSV history log when it differs from the last stored report, and renders it
//! as a QAM bulletin plus a short narrative in Indonesian. For example, the report
//!
//! ```text
//! WARR 230530Z 09005KT 8000 FEW018 31/24 Q1010 NOSIG
//! ```
//!
//! is rendered as
//!
//! ```text
//! MET REPORT (QAM)
//! BANDARA JUANDA WARR
//! DATE : 23/10/2026
//! TIME : 05.30 UTC
//! ========================
//! WIND : 090°/05 KT
//! VIS : 8 KM
//! WEATHER : NIL
//! CLOUD : FEW 1800FT
//! TT/TD : 31/24
//! QNH : 1010 MB
//! QFE : 1010 MB
//! REMARKS : NIL
//! TREND : NOSIG
//! ```
//!
//! The following metrics are emitted when available.
//!
//! * `metar_polls_total{station=$STATION}` - Number of poll cycles run.
//! * `metar_fetch_errors_total{station=$STATION}` - Number of failed report fetches.
//! * `metar_observations_total{station=$STATION}` - Number of new observations appended to the history.
//! * `metar_temperature_degrees{station=$STATION}` - Temperature, in degrees celsius.
//! * `metar_dewpoint_degrees{station=$STATION}` - Dewpoint, in degrees celsius.
//! * `metar_pressure_hectopascals{station=$STATION}` - QNH pressure, in hectopascals.
//! * `metar_visibility_meters{station=$STATION}` - Visibility, in meters.
//! * `metar_wind_direction_degrees{station=$STATION}` - Wind direction, in degrees.
//! * `metar_wind_speed_knots{station=$STATION}` - Wind speed, in knots.
//!
//! [METAR]: https://en.wikipedia.org/wiki/METAR
//! [NOAA station files]: https://tgftp.nws.noaa.gov/data/observations/metar/stations/
//!
//! ## Build
//!
//! `metar_qam` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/metar_qam.git && cd metar_qam
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! Run `metar_qam` for a station to poll it every minute, keep the history in
//! `metar_history.csv`, and serve metrics on port `9783` at `/metrics` and the
//! latest bulletin at `/report`. The last 20 stored observations are served at
//! `/history`.
//!
//! ```text
//! ./metar_qam --station WARR
//! ```
//!
//! To run a single poll cycle from cron instead, use `--once`. The update message is
//! printed to stdout only when a new observation was appended.
//!
//! ```text
//! ./metar_qam --station WARR --once
//! ```
//!
//! ## Limitations
//!
//! Groups are matched by shape rather than position, and when several groups have the
//! same shape the last one wins. For example, the visibility of a `TEMPO` section
//! replaces the visibility of the main report. Station codes are recognized only as
//! four letter groups, so a four letter weather code after the station (`TSRA`,
//! `SHRA`, `VCSH`) replaces the station.

pub mod client;
pub mod history;
pub mod http;
pub mod metrics;
pub mod parse;
pub mod poll;
pub mod render;
