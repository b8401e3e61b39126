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

//! Extraction of structured fields from raw METAR text.
//!
//! The grammar handled here is deliberately loose: every whitespace-delimited
//! group is tested against each shape predicate and the last group matching a
//! predicate wins. There is no positional state machine, so a group in a trend
//! section (`TEMPO ... 4000`) will overwrite the value from the main body,
//! and a four letter weather code such as `TSRA` also sets the station.

use std::fmt;

/// Marks the end of a report in the station files.
const TERMINATOR: char = '=';
const TREND_MARKER: &str = " TEMPO ";
const NO_SIGNIFICANT_CHANGE: &str = "NOSIG";
const TIME_LIMIT_PREFIX: &str = "TL";
const PRESSURE_PREFIX: &str = "Q";
const CLOUD_AMOUNTS: [&str; 4] = ["FEW", "SCT", "BKN", "OVC"];

/// Present weather codes recognized in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherCode {
    LightRain,
    Rain,
    HeavyRain,
    LightThunderstormRain,
    ThunderstormRain,
    HeavyThunderstormRain,
    Thunderstorm,
    LightShowerRain,
    ShowerRain,
    HeavyShowerRain,
    Drizzle,
    Mist,
    Fog,
    Haze,
    Smoke,
}

impl WeatherCode {
    const ALL: [WeatherCode; 15] = [
        WeatherCode::LightRain,
        WeatherCode::Rain,
        WeatherCode::HeavyRain,
        WeatherCode::LightThunderstormRain,
        WeatherCode::ThunderstormRain,
        WeatherCode::HeavyThunderstormRain,
        WeatherCode::Thunderstorm,
        WeatherCode::LightShowerRain,
        WeatherCode::ShowerRain,
        WeatherCode::HeavyShowerRain,
        WeatherCode::Drizzle,
        WeatherCode::Mist,
        WeatherCode::Fog,
        WeatherCode::Haze,
        WeatherCode::Smoke,
    ];

    /// Match a group against the closed set of codes, exactly.
    pub fn from_group(group: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == group)
    }

    /// Coded form, as it appears in a report.
    pub fn code(&self) -> &'static str {
        match self {
            Self::LightRain => "-RA",
            Self::Rain => "RA",
            Self::HeavyRain => "+RA",
            Self::LightThunderstormRain => "-TSRA",
            Self::ThunderstormRain => "TSRA",
            Self::HeavyThunderstormRain => "+TSRA",
            Self::Thunderstorm => "TS",
            Self::LightShowerRain => "-SHRA",
            Self::ShowerRain => "SHRA",
            Self::HeavyShowerRain => "+SHRA",
            Self::Drizzle => "DZ",
            Self::Mist => "BR",
            Self::Fog => "FG",
            Self::Haze => "HZ",
            Self::Smoke => "FU",
        }
    }
}

impl fmt::Display for WeatherCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Cloud amount and base height, kept in coded form (e.g. `FEW018`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudLayer(String);

impl CloudLayer {
    pub fn new<S: Into<String>>(group: S) -> Self {
        CloudLayer(group.into())
    }

    /// Amount prefix: one of `FEW`, `SCT`, `BKN`, `OVC`.
    pub fn amount(&self) -> &str {
        self.0.get(0..3).unwrap_or(&self.0)
    }

    /// Base height in feet, from the three digits after the amount (hundreds of feet).
    pub fn height_ft(&self) -> Option<u32> {
        self.0.get(3..6).and_then(|h| h.parse::<u32>().ok()).map(|h| h * 100)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fields extracted from one raw report. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub station: Option<String>,
    pub day: Option<String>,
    pub hour: Option<String>,
    pub minute: Option<String>,
    pub wind_direction_deg: Option<String>,
    pub wind_speed_kt: Option<String>,
    pub visibility_m: Option<u32>,
    pub weather_phenomenon: Option<WeatherCode>,
    pub cloud_layer: Option<CloudLayer>,
    pub temperature_c: Option<String>,
    pub dewpoint_c: Option<String>,
    pub pressure_hpa: Option<String>,
    pub trend_flag: bool,
}

impl ParsedRecord {
    /// A record without a station can't be described meaningfully.
    pub fn is_valid(&self) -> bool {
        self.station.is_some()
    }
}

/// Temporary change section following ` TEMPO ` in a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendSection {
    pub valid_until: Option<String>,
    pub visibility: Option<String>,
    pub weather_phenomenon: Option<WeatherCode>,
}

/// Remove the report terminator, if any.
pub fn strip_terminator(raw: &str) -> &str {
    let trimmed = raw.trim_end();
    trimmed.strip_suffix(TERMINATOR).unwrap_or(trimmed)
}

/// Split a report into groups after removing the terminator.
pub fn tokenize(raw: &str) -> Vec<&str> {
    strip_terminator(raw).split_whitespace().collect()
}

/// Parse all fields from a raw report. Never fails; unknown groups are ignored.
pub fn parse_report(raw: &str) -> ParsedRecord {
    extract_fields(&tokenize(raw))
}

/// Populate a record from groups. Each predicate is tested for every group
/// and a later match overwrites an earlier one.
pub fn extract_fields(groups: &[&str]) -> ParsedRecord {
    let mut rec = ParsedRecord::default();

    for &group in groups {
        let weather = WeatherCode::from_group(group);

        if group.len() == 4 && group.chars().all(|c| c.is_ascii_alphabetic()) {
            rec.station = Some(group.to_owned());
        }

        if group.len() == 7 && group.ends_with('Z') {
            if let (Some(day), Some(hour), Some(minute)) = (group.get(0..2), group.get(2..4), group.get(4..6)) {
                rec.day = Some(day.to_owned());
                rec.hour = Some(hour.to_owned());
                rec.minute = Some(minute.to_owned());
            }
        }

        if group.len() >= 7 && group.ends_with("KT") {
            if let (Some(dir), Some(speed)) = (group.get(0..3), group.get(3..5)) {
                rec.wind_direction_deg = Some(dir.to_owned());
                rec.wind_speed_kt = Some(speed.to_owned());
            }
        }

        if is_four_digits(group) {
            if let Ok(v) = group.parse::<u32>() {
                rec.visibility_m = Some(v);
            }
        }

        if weather.is_some() {
            rec.weather_phenomenon = weather;
        }

        if CLOUD_AMOUNTS.iter().any(|a| group.starts_with(a)) {
            rec.cloud_layer = Some(CloudLayer::new(group));
        }

        if group.len() == 5 && group.matches('/').count() == 1 {
            if let Some((temp, dew)) = group.split_once('/') {
                rec.temperature_c = Some(temp.to_owned());
                rec.dewpoint_c = Some(dew.to_owned());
            }
        }

        if let Some(pressure) = group.strip_prefix(PRESSURE_PREFIX) {
            rec.pressure_hpa = Some(pressure.to_owned());
        }

        if group == NO_SIGNIFICANT_CHANGE {
            rec.trend_flag = true;
        }
    }

    rec
}

/// Parse the section after the first ` TEMPO ` marker, or `None` if the
/// report doesn't have one.
pub fn parse_trend(raw: &str) -> Option<TrendSection> {
    let body = strip_terminator(raw);
    let (_, rest) = body.split_once(TREND_MARKER)?;
    let mut trend = TrendSection::default();

    for group in rest.split_whitespace() {
        if let Some(until) = group.strip_prefix(TIME_LIMIT_PREFIX) {
            trend.valid_until = Some(until.to_owned());
        }

        if is_four_digits(group) {
            trend.visibility = Some(group.to_owned());
        }

        if let Some(code) = WeatherCode::from_group(group) {
            trend.weather_phenomenon = Some(code);
        }
    }

    Some(trend)
}

fn is_four_digits(group: &str) -> bool {
    group.len() == 4 && group.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::{extract_fields, parse_report, parse_trend, tokenize, CloudLayer, WeatherCode};

    const SAMPLE: &str = "WARR 230530Z 09005KT 8000 FEW018 31/24 Q1010 NOSIG=";

    #[test]
    fn test_tokenize_strips_terminator() {
        assert_eq!(
            vec!["WARR", "230530Z", "09005KT", "8000", "FEW018", "31/24", "Q1010", "NOSIG"],
            tokenize(SAMPLE)
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   =").is_empty());
    }

    #[test]
    fn test_tokenize_irregular_whitespace() {
        assert_eq!(vec!["WARR", "230530Z", "09005KT"], tokenize("  WARR \t230530Z   09005KT \n"));
    }

    #[test]
    fn test_parse_full_report() {
        let rec = parse_report(SAMPLE);

        assert_eq!(Some("WARR"), rec.station.as_deref());
        assert_eq!(Some("23"), rec.day.as_deref());
        assert_eq!(Some("05"), rec.hour.as_deref());
        assert_eq!(Some("30"), rec.minute.as_deref());
        assert_eq!(Some("090"), rec.wind_direction_deg.as_deref());
        assert_eq!(Some("05"), rec.wind_speed_kt.as_deref());
        assert_eq!(Some(8000), rec.visibility_m);
        assert_eq!(Some(CloudLayer::new("FEW018")), rec.cloud_layer);
        assert_eq!(Some("31"), rec.temperature_c.as_deref());
        assert_eq!(Some("24"), rec.dewpoint_c.as_deref());
        assert_eq!(Some("1010"), rec.pressure_hpa.as_deref());
        assert!(rec.trend_flag);
        assert_eq!(None, rec.weather_phenomenon);
        assert!(rec.is_valid());
    }

    #[test]
    fn test_wind_group() {
        let rec = extract_fields(&["09012KT"]);
        assert_eq!(Some("090"), rec.wind_direction_deg.as_deref());
        assert_eq!(Some("12"), rec.wind_speed_kt.as_deref());
    }

    #[test]
    fn test_wind_group_with_gust() {
        let rec = extract_fields(&["27015G25KT"]);
        assert_eq!(Some("270"), rec.wind_direction_deg.as_deref());
        assert_eq!(Some("15"), rec.wind_speed_kt.as_deref());
    }

    #[test]
    fn test_visibility_last_group_wins() {
        let rec = extract_fields(&["8000"]);
        assert_eq!(Some(8000), rec.visibility_m);

        let rec = extract_fields(&["8000", "FEW018", "4000"]);
        assert_eq!(Some(4000), rec.visibility_m);
    }

    #[test]
    fn test_weather_codes() {
        for code in ["RA", "+RA", "-RA", "TSRA", "+TSRA", "HZ"] {
            let rec = extract_fields(&["WARR", code]);
            assert_eq!(Some(code), rec.weather_phenomenon.map(|c| c.code()));
        }
    }

    #[test]
    fn test_four_letter_weather_code_overwrites_station() {
        let rec = extract_fields(&["WARR", "230530Z", "TSRA"]);
        assert_eq!(Some("TSRA"), rec.station.as_deref());
        assert_eq!(Some(WeatherCode::ThunderstormRain), rec.weather_phenomenon);

        let rec = extract_fields(&["WARR", "VCSH"]);
        assert_eq!(Some("VCSH"), rec.station.as_deref());

        let rec = parse_report("230530Z 09005KT 8000 TSRA 31/24 Q1010");
        assert_eq!(Some("TSRA"), rec.station.as_deref());
    }

    #[test]
    fn test_unknown_weather_code_ignored() {
        let rec = extract_fields(&["WARR", "VCSH"]);
        assert_eq!(None, rec.weather_phenomenon);
    }

    #[test]
    fn test_cloud_layer() {
        let layer = CloudLayer::new("BKN025");
        assert_eq!("BKN", layer.amount());
        assert_eq!(Some(2500), layer.height_ft());

        let layer = CloudLayer::new("OVC");
        assert_eq!("OVC", layer.amount());
        assert_eq!(None, layer.height_ft());
    }

    #[test]
    fn test_temperature_dewpoint() {
        let rec = extract_fields(&["31/24"]);
        assert_eq!(Some("31"), rec.temperature_c.as_deref());
        assert_eq!(Some("24"), rec.dewpoint_c.as_deref());
    }

    #[test]
    fn test_temperature_wrong_shape_ignored() {
        let rec = extract_fields(&["M01/M02", "1/2/3"]);
        assert_eq!(None, rec.temperature_c);
        assert_eq!(None, rec.dewpoint_c);
    }

    #[test]
    fn test_missing_station() {
        let rec = parse_report("230530Z 09005KT 8000 31/24 Q1010");
        assert_eq!(None, rec.station);
        assert!(!rec.is_valid());
    }

    #[test]
    fn test_unmatched_groups_ignored() {
        let rec = parse_report("?? ### 12 ABCDE");
        assert_eq!(super::ParsedRecord::default(), rec);
    }

    #[test]
    fn test_trend_section() {
        let trend = parse_trend("WARR 230530Z 09005KT 8000 FEW018 31/24 Q1010 NOSIG TEMPO TL0630 4000 RA=").unwrap();
        assert_eq!(Some("0630"), trend.valid_until.as_deref());
        assert_eq!(Some("4000"), trend.visibility.as_deref());
        assert_eq!(Some(WeatherCode::Rain), trend.weather_phenomenon);
    }

    #[test]
    fn test_trend_section_absent() {
        assert_eq!(None, parse_trend(SAMPLE));
        assert_eq!(None, parse_trend("WARR 230530Z TEMPO"));
    }

    #[test]
    fn test_trend_section_empty() {
        let trend = parse_trend("WARR 230530Z TEMPO =").unwrap();
        assert_eq!(super::TrendSection::default(), trend);
    }
}
