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
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct StationLabels {
    station: String,
}

impl StationLabels {
    fn new(station: &str) -> Self {
        StationLabels {
            station: station.to_owned(),
        }
    }
}

type FloatGauge = Family<StationLabels, Gauge<f64, AtomicU64>>;

#[derive(Debug)]
pub struct ReportMetrics {
    polls: Family<StationLabels, Counter>,
    fetch_errors: Family<StationLabels, Counter>,
    observations: Family<StationLabels, Counter>,
    temperature: FloatGauge,
    dewpoint: FloatGauge,
    pressure: FloatGauge,
    visibility: FloatGauge,
    wind_direction: FloatGauge,
    wind_speed: FloatGauge,
}

impl ReportMetrics {
    /// Create a new `ReportMetrics` and register each metric with the provided `Registry`.
    pub fn new(reg: &mut Registry) -> Self {
        let polls = Family::<StationLabels, Counter>::default();
        let fetch_errors = Family::<StationLabels, Counter>::default();
        let observations = Family::<StationLabels, Counter>::default();
        let temperature = FloatGauge::default();
        let dewpoint = FloatGauge::default();
        let pressure = FloatGauge::default();
        let visibility = FloatGauge::default();
        let wind_direction = FloatGauge::default();
        let wind_speed = FloatGauge::default();

        reg.register("metar_polls", "Number of poll cycles run", polls.clone());
        reg.register("metar_fetch_errors", "Number of failed report fetches", fetch_errors.clone());
        reg.register(
            "metar_observations",
            "Number of new observations appended to the history",
            observations.clone(),
        );
        reg.register("metar_temperature_degrees", "Temperature in celsius", temperature.clone());
        reg.register("metar_dewpoint_degrees", "Dewpoint in celsius", dewpoint.clone());
        reg.register("metar_pressure_hectopascals", "QNH pressure in hectopascals", pressure.clone());
        reg.register("metar_visibility_meters", "Visibility in meters", visibility.clone());
        reg.register("metar_wind_direction_degrees", "Wind direction in degrees", wind_direction.clone());
        reg.register("metar_wind_speed_knots", "Wind speed in knots", wind_speed.clone());

        Self {
            polls,
            fetch_errors,
            observations,
            temperature,
            dewpoint,
            pressure,
            visibility,
            wind_direction,
            wind_speed,
        }
    }

    pub fn poll(&self, station: &str) {
        self.polls.get_or_create(&StationLabels::new(station)).inc();
    }

    pub fn fetch_error(&self, station: &str) {
        self.fetch_errors.get_or_create(&StationLabels::new(station)).inc();
    }

    /// Count a new observation and set gauges from its parsed fields.
    ///
    /// Fields that are missing or not numeric leave the gauge unchanged.
    pub fn observation(&self, station: &str, record: &ParsedRecord) {
        let labels = StationLabels::new(station);
        self.observations.get_or_create(&labels).inc();

        self.set_from_field(&labels, &self.temperature, record.temperature_c.as_deref());
        self.set_from_field(&labels, &self.dewpoint, record.dewpoint_c.as_deref());
        self.set_from_field(&labels, &self.pressure, record.pressure_hpa.as_deref());
        self.set_from_field(&labels, &self.wind_direction, record.wind_direction_deg.as_deref());
        self.set_from_field(&labels, &self.wind_speed, record.wind_speed_kt.as_deref());

        if let Some(v) = record.visibility_m {
            self.visibility.get_or_create(&labels).set(f64::from(v));
        }
    }

    fn set_from_field(&self, labels: &StationLabels, gauge: &FloatGauge, field: Option<&str>) {
        if let Some(v) = field.and_then(|f| f.parse::<f64>().ok()) {
            gauge.get_or_create(labels).set(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReportMetrics;
    use crate::parse::parse_report;
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;

    #[test]
    fn test_observation_metrics() {
        let mut registry = Registry::default();
        let metrics = ReportMetrics::new(&mut registry);

        metrics.poll("WARR");
        metrics.poll("WARR");
        metrics.observation("WARR", &parse_report("WARR 230530Z VRB03KT 8000 31/24 Q1010"));

        let mut buf = String::new();
        encode(&mut buf, &registry).unwrap();

        assert!(buf.contains("metar_polls_total{station=\"WARR\"} 2"));
        assert!(buf.contains("metar_observations_total{station=\"WARR\"} 1"));
        assert!(buf.contains("metar_temperature_degrees{station=\"WARR\"} 31.0"));
        assert!(buf.contains("metar_visibility_meters{station=\"WARR\"} 8000.0"));
        assert!(buf.contains("metar_wind_speed_knots{station=\"WARR\"} 3.0"));
        assert!(!buf.contains("metar_wind_direction_degrees{"));
    }
}
