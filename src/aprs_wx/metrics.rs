// aprs_wx - Distance-weighted CWOP weather aggregate from an APRS-IS feed
//
// Copyright 2023 Nick Pillitteri
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

use crate::aggregate::AggregateSnapshot;
use crate::fields::Quantity;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

const DEW_POINT: &str = "DewPt";
const HUMIDEX: &str = "Humidex";
const WIND_CHILL: &str = "WindChill";

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct QuantityLabels {
    quantity: String,
}

/// Holder for metrics about the APRS-IS feed and the aggregate computed from it.
///
/// All metrics are registered upon call to `FeedMetrics::new()`. Clones share the
/// same underlying values so they can be handed to export tasks.
#[derive(Clone, Debug, Default)]
pub struct FeedMetrics {
    pub connections: Counter,
    pub connection_errors: Counter,
    pub lines: Counter,
    pub comments: Counter,
    pub weather_packets: Counter,
    pub decode_errors: Counter,
    pub exports: Counter,
    pub export_errors: Counter,
    stations: Gauge,
    aggregate: Family<QuantityLabels, Gauge<f64, AtomicU64>>,
}

impl FeedMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let metrics = Self::default();

        reg.register(
            "connections",
            "Connections accepted by APRS-IS servers",
            metrics.connections.clone(),
        );
        reg.register(
            "connection_errors",
            "Failed attempts to connect to an APRS-IS server",
            metrics.connection_errors.clone(),
        );
        reg.register("lines", "Lines read from the feed", metrics.lines.clone());
        reg.register("comments", "Server comment and keep-alive lines", metrics.comments.clone());
        reg.register(
            "weather_packets",
            "Weather reports decoded from the feed",
            metrics.weather_packets.clone(),
        );
        reg.register(
            "decode_errors",
            "Lines that could not be decoded",
            metrics.decode_errors.clone(),
        );
        reg.register("exports", "Aggregates written to the database", metrics.exports.clone());
        reg.register(
            "export_errors",
            "Failed writes of the aggregate to the database",
            metrics.export_errors.clone(),
        );
        reg.register(
            "stations",
            "Stations inside the filter radius contributing to the aggregate",
            metrics.stations.clone(),
        );
        reg.register(
            "aggregate",
            "Distance weighted aggregate of station values in metric units",
            metrics.aggregate.clone(),
        );

        metrics
    }

    /// Set aggregate gauges from the snapshot. Quantities without a value are set to NaN.
    pub fn observe(&self, snapshot: &AggregateSnapshot) {
        self.stations.set(snapshot.stations as i64);
        for q in Quantity::ALL {
            self.set_aggregate(q.spec().name, snapshot.value(q));
        }

        self.set_aggregate(DEW_POINT, snapshot.dew_point);
        self.set_aggregate(HUMIDEX, snapshot.humidex);
        self.set_aggregate(WIND_CHILL, snapshot.wind_chill);
    }

    fn set_aggregate(&self, name: &str, value: Option<f64>) {
        self.aggregate
            .get_or_create(&QuantityLabels {
                quantity: name.to_owned(),
            })
            .set(value.unwrap_or(f64::NAN));
    }
}

#[cfg(test)]
mod tests {
    use super::FeedMetrics;
    use crate::aggregate::AggregateSnapshot;
    use crate::fields::Quantity;
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;

    #[test]
    fn test_observe_encodes_aggregate() {
        let mut registry = Registry::with_prefix("aprs_wx");
        let metrics = FeedMetrics::new(&mut registry);

        let mut snapshot = AggregateSnapshot {
            stations: 3,
            ..AggregateSnapshot::default()
        };
        snapshot.values[Quantity::Pressure.index()] = Some(1013.2);
        metrics.observe(&snapshot);
        metrics.lines.inc();

        let mut buf = String::new();
        encode(&mut buf, &registry).unwrap();

        assert!(buf.contains("aprs_wx_stations 3"), "{}", buf);
        assert!(buf.contains("aprs_wx_aggregate{quantity=\"BaroP\"} 1013.2"), "{}", buf);
        assert!(buf.contains("aprs_wx_lines_total 1"), "{}", buf);
    }
}
