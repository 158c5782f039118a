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

//! Distance-weighted aggregate of the latest report from each nearby station.

use crate::decode::WeatherReport;
use crate::fields::{Quantity, WeatherValues};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Reports older than this no longer contribute to the aggregate.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Weighted mean of every live station's values, normalized to metric units
/// (degrees, km/h, Celsius, percent, mm, hPa, W/m2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSnapshot {
    pub values: WeatherValues,
    pub dew_point: Option<f64>,
    pub humidex: Option<f64>,
    pub wind_chill: Option<f64>,
    pub stations: usize,
}

impl AggregateSnapshot {
    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        self.values[quantity.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(|v| v.is_none())
    }

    fn derive(&mut self) {
        let temperature = self.value(Quantity::Temperature);

        if let (Some(t), Some(rh)) = (temperature, self.value(Quantity::Humidity)) {
            let dew_point = t - (100.0 - rh) / 5.0;
            let e = 6.11 * (5417.7530 * ((1.0 / 273.16) - (1.0 / (dew_point + 273.15)))).exp();
            self.dew_point = Some(dew_point);
            self.humidex = Some(t + 0.5555 * (e - 10.0));
        }

        if let (Some(t), Some(gust)) = (temperature, self.value(Quantity::WindGust)) {
            let v = gust.powf(0.16);
            self.wind_chill = Some(13.12 + 0.6215 * t - 11.37 * v + 0.3965 * t * v);
        }
    }
}

/// Latest report per station and the aggregate computed from them.
///
/// A station only contributes if its report carries a proximity weight, meaning it
/// was located inside the filter radius around the reference point.
#[derive(Debug)]
pub struct StationAggregator {
    reports: HashMap<String, WeatherReport>,
    max_age: Duration,
    snapshot: AggregateSnapshot,
}

impl StationAggregator {
    pub fn new(max_age: Duration) -> Self {
        StationAggregator {
            reports: HashMap::new(),
            max_age,
            snapshot: AggregateSnapshot::default(),
        }
    }

    /// Replace any previous report from the same station and recompute the aggregate.
    pub fn ingest(&mut self, report: WeatherReport, now: Instant) -> &AggregateSnapshot {
        self.reports.insert(report.name.clone(), report);
        self.recompute(now)
    }

    /// Remove reports captured more than the max age before `now`, returning how many were removed.
    pub fn evict_stale(&mut self, now: Instant) -> usize {
        let before = self.reports.len();
        let max_age = self.max_age;
        self.reports.retain(|name, report| {
            let keep = now.saturating_duration_since(report.captured) <= max_age;
            if !keep {
                tracing::debug!(message = "evicting stale station", station = %name);
            }
            keep
        });

        before - self.reports.len()
    }

    /// Rebuild the snapshot from scratch using every unexpired report.
    pub fn recompute(&mut self, now: Instant) -> &AggregateSnapshot {
        self.evict_stale(now);

        let mut sums = [0.0_f64; Quantity::COUNT];
        let mut weights = [0.0_f64; Quantity::COUNT];
        let mut stations = 0;

        for report in self.reports.values() {
            let weight = match report.position.weight {
                Some(w) if w.is_finite() && w >= 0.0 => w,
                _ => continue,
            };

            stations += 1;
            for q in Quantity::ALL {
                if let Some(v) = report.value(q) {
                    let i = q.index();
                    sums[i] += q.spec().unit.normalize(v) * weight;
                    weights[i] += weight;
                }
            }
        }

        let mut snapshot = AggregateSnapshot {
            stations,
            ..AggregateSnapshot::default()
        };

        for i in 0..Quantity::COUNT {
            if weights[i] > 0.0 {
                snapshot.values[i] = Some(sums[i] / weights[i]);
            }
        }

        snapshot.derive();
        tracing::debug!(
            message = "recomputed aggregate",
            reports = self.reports.len(),
            stations = stations,
        );

        self.snapshot = snapshot;
        &self.snapshot
    }

    pub fn snapshot(&self) -> &AggregateSnapshot {
        &self.snapshot
    }

    pub fn get(&self, station: &str) -> Option<&WeatherReport> {
        self.reports.get(station)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl Default for StationAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}
