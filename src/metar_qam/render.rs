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

//! Rendering of parsed reports as a QAM bulletin and an Indonesian narrative.
//!
//! Both renderings take the current time as an argument so that the same
//! record always produces the same text.

use crate::parse::{ParsedRecord, TrendSection, WeatherCode};
use chrono::{DateTime, Utc};
use std::fmt;

const NIL: &str = "NIL";
const NO_CLOUD: &str = "-";
const INVALID_DATA: &str = "Data METAR tidak valid.";
const SEPARATOR: &str = "========================";

const AERODROMES: [(&str, &str); 4] = [
    ("WAAA", "BANDARA SULTAN HASANUDDIN"),
    ("WADD", "BANDARA I GUSTI NGURAH RAI"),
    ("WARR", "BANDARA JUANDA"),
    ("WIII", "BANDARA SOEKARNO-HATTA"),
];

/// Name of a known aerodrome for the bulletin header.
pub fn aerodrome_name(station: &str) -> Option<&'static str> {
    AERODROMES.iter().find(|(code, _)| *code == station).map(|(_, name)| *name)
}

/// Fixed layout QAM bulletin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bulletin(String);

impl Bulletin {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bulletin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plain language description of a report, one sentence per field group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative(Vec<String>);

impl Narrative {
    pub fn sentences(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Narrative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Bulletin and narrative for a single report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub bulletin: Bulletin,
    pub narrative: Narrative,
}

impl Report {
    pub fn new(record: &ParsedRecord, trend: Option<&TrendSection>, now: DateTime<Utc>) -> Self {
        Report {
            bulletin: bulletin(record, trend, now),
            narrative: narrative(record, trend),
        }
    }

    /// Full text of an update notification.
    pub fn message(&self) -> String {
        format!(
            "📡 METAR UPDATE\n\n{}\n\n🧠 Interpretasi:\n{}\n",
            self.bulletin, self.narrative
        )
    }
}

/// Render the QAM bulletin. Missing fields are shown as `NIL` (or `-` for clouds).
///
/// A record without a station is still rendered, with `NIL` in the header.
pub fn bulletin(record: &ParsedRecord, trend: Option<&TrendSection>, now: DateTime<Utc>) -> Bulletin {
    let station = record.station.as_deref().unwrap_or(NIL);
    let header = match aerodrome_name(station) {
        Some(name) => format!("{} {}", name, station),
        None => station.to_owned(),
    };

    let date = match record.day.as_deref() {
        Some(day) => format!("{}/{}", day, now.format("%m/%Y")),
        None => NIL.to_owned(),
    };

    let time = match (record.hour.as_deref(), record.minute.as_deref()) {
        (Some(h), Some(m)) => format!("{}.{} UTC", h, m),
        _ => NIL.to_owned(),
    };

    let wind = match record.wind_direction_deg.as_deref() {
        Some(dir) => format!("{}°/{} KT", dir, record.wind_speed_kt.as_deref().unwrap_or(NIL)),
        None => NIL.to_owned(),
    };

    let vis = record
        .visibility_m
        .map(|m| format!("{} KM", m / 1000))
        .unwrap_or_else(|| NIL.to_owned());

    let weather = record.weather_phenomenon.map(|w| w.code()).unwrap_or(NIL);

    let cloud = match &record.cloud_layer {
        Some(layer) => match layer.height_ft() {
            Some(h) => format!("{} {}FT", layer.amount(), h),
            None => layer.amount().to_owned(),
        },
        None => NO_CLOUD.to_owned(),
    };

    let temp_dew = match (record.temperature_c.as_deref(), record.dewpoint_c.as_deref()) {
        (Some(t), Some(d)) => format!("{}/{}", t, d),
        _ => NIL.to_owned(),
    };

    let pressure = record
        .pressure_hpa
        .as_deref()
        .map(|p| format!("{} MB", p))
        .unwrap_or_else(|| NIL.to_owned());

    let trend = match trend {
        Some(t) => trend_line(t),
        None if record.trend_flag => "NOSIG".to_owned(),
        None => NIL.to_owned(),
    };

    let lines = [
        "MET REPORT (QAM)".to_owned(),
        header,
        format!("DATE : {}", date),
        format!("TIME : {}", time),
        SEPARATOR.to_owned(),
        format!("WIND : {}", wind),
        format!("VIS : {}", vis),
        format!("WEATHER : {}", weather),
        format!("CLOUD : {}", cloud),
        format!("TT/TD : {}", temp_dew),
        format!("QNH : {}", pressure),
        format!("QFE : {}", pressure),
        format!("REMARKS : {}", NIL),
        format!("TREND : {}", trend),
    ];

    Bulletin(lines.join("\n"))
}

fn trend_line(trend: &TrendSection) -> String {
    let mut parts = vec!["TEMPO".to_owned()];
    if let Some(until) = &trend.valid_until {
        parts.push(format!("TL{}", until));
    }
    if let Some(vis) = &trend.visibility {
        parts.push(vis.clone());
    }
    if let Some(w) = trend.weather_phenomenon {
        parts.push(w.code().to_owned());
    }

    parts.join(" ")
}

/// Render the narrative. A record without a station produces only the
/// invalid data sentence.
pub fn narrative(record: &ParsedRecord, trend: Option<&TrendSection>) -> Narrative {
    if !record.is_valid() {
        return Narrative(vec![INVALID_DATA.to_owned()]);
    }

    let station = record.station.as_deref().unwrap_or(NIL);

    let mut out = Vec::new();

    out.push(match (&record.day, &record.hour, &record.minute) {
        (Some(d), Some(h), Some(m)) => format!("Laporan METAR {} tanggal {} pukul {}.{} UTC.", station, d, h, m),
        _ => format!("Laporan METAR {}.", station),
    });

    if let (Some(dir), Some(speed)) = (&record.wind_direction_deg, &record.wind_speed_kt) {
        out.push(format!("Angin dari arah {} derajat dengan kecepatan {} knot.", dir, speed));
    }

    if let Some(m) = record.visibility_m {
        out.push(format!("Jarak pandang {:.1} km.", f64::from(m) / 1000.0));
    }

    if let Some(w) = record.weather_phenomenon {
        out.push(format!("Cuaca saat ini {}.", weather_phrase(w)));
    }

    if let Some(layer) = &record.cloud_layer {
        out.push(match layer.height_ft() {
            Some(h) => format!("Awan {} pada ketinggian {} kaki.", cloud_phrase(layer.amount()), h),
            None => format!("Awan {}.", cloud_phrase(layer.amount())),
        });
    }

    if let (Some(t), Some(d)) = (&record.temperature_c, &record.dewpoint_c) {
        out.push(format!("Suhu udara {}°C dengan titik embun {}°C.", t, d));
    }

    if let Some(p) = &record.pressure_hpa {
        out.push(format!("Tekanan udara {} hPa.", p));
    }

    if let Some(t) = trend {
        out.push(trend_sentence(t));
    } else if record.trend_flag {
        out.push("Tidak ada perubahan cuaca yang signifikan (NOSIG).".to_owned());
    }

    Narrative(out)
}

fn trend_sentence(trend: &TrendSection) -> String {
    let mut s = match &trend.valid_until {
        Some(until) => format!("Perubahan sementara (TEMPO) hingga pukul {} UTC", until),
        None => "Perubahan sementara (TEMPO)".to_owned(),
    };

    if let Some(vis) = &trend.visibility {
        s.push_str(&format!(", jarak pandang {} meter", vis));
    }
    if let Some(w) = trend.weather_phenomenon {
        s.push_str(&format!(", {}", weather_phrase(w)));
    }

    s.push('.');
    s
}

/// Readable phrase for a weather code, falling back to the code itself.
pub fn weather_phrase(code: WeatherCode) -> &'static str {
    match code {
        WeatherCode::LightRain => "hujan ringan",
        WeatherCode::Rain => "hujan sedang",
        WeatherCode::HeavyRain => "hujan lebat",
        WeatherCode::LightThunderstormRain => "badai guntur disertai hujan ringan",
        WeatherCode::ThunderstormRain => "badai guntur disertai hujan",
        WeatherCode::HeavyThunderstormRain => "badai guntur disertai hujan lebat",
        WeatherCode::Thunderstorm => "badai guntur",
        WeatherCode::Haze => "udara kabur (haze)",
        WeatherCode::Mist => "udara berkabut tipis",
        WeatherCode::Fog => "kabut",
        other => other.code(),
    }
}

fn cloud_phrase(amount: &str) -> &str {
    match amount {
        "FEW" => "sedikit (FEW)",
        "SCT" => "tersebar (SCT)",
        "BKN" => "banyak (BKN)",
        "OVC" => "menutupi langit (OVC)",
        other => other,
    }
}
