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

use haversine::{Location, Units};
use std::f64::consts::PI;
use std::fmt;

/// A point on the earth in decimal degrees.
///
/// Southern latitudes and western longitudes are negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinates { lat, lon }
    }
}

impl From<Coordinates> for Location {
    fn from(c: Coordinates) -> Self {
        Location {
            latitude: c.lat,
            longitude: c.lon,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// Great-circle distance between two points in kilometers using the haversine formula.
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    haversine::distance(a.into(), b.into(), Units::Kilometers)
}

/// Initial bearing in degrees `[0, 360)` when travelling from `from` to `to`.
pub fn bearing_deg(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = to.lon.to_radians() - from.lon.to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    let mut bearing = y.atan2(x).to_degrees();
    if bearing < 0.0 {
        bearing += 360.0;
    }

    // Adding 360 to a tiny negative angle can round up to exactly 360
    if bearing >= 360.0 {
        bearing - 360.0
    } else {
        bearing
    }
}

/// Raised-cosine ("Hann") weight of a station `distance_km` away inside a filter
/// of `radius_km`: `1.0` at the center falling to `0.0` at the edge.
///
/// Distances past the radius still produce a value here (the curve keeps going),
/// so callers must check the radius before using the weight. Returns `None` when
/// the radius is not a positive number.
pub fn proximity_weight(distance_km: f64, radius_km: f64) -> Option<f64> {
    if radius_km.is_nan() || radius_km <= 0.0 {
        return None;
    }

    let s = (PI * (radius_km - distance_km) / (2.0 * radius_km)).sin();
    Some(s * s)
}

/// APRS-IS server-side range filter, `r/lat/lon/dist`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusFilter {
    pub center: Coordinates,
    pub radius_km: f64,
}

impl RadiusFilter {
    pub fn new(center: Coordinates, radius_km: f64) -> Self {
        RadiusFilter { center, radius_km }
    }

    /// True if `distance_km` from the center is inside the filter.
    pub fn contains(&self, distance_km: f64) -> bool {
        distance_km <= self.radius_km
    }
}

impl fmt::Display for RadiusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r/{}/{}/{}", self.center.lat, self.center.lon, self.radius_km)
    }
}

#[cfg(test)]
mod tests {
    use super::{bearing_deg, distance_km, proximity_weight, Coordinates, RadiusFilter};

    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_distance_same_point() {
        let p = Coordinates::new(45.4215, -75.6972);
        assert!(distance_km(p, p).abs() < EPSILON);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let a = Coordinates::new(10.0, 20.0);
        let b = Coordinates::new(11.0, 20.0);
        let expected = 6371.0 * std::f64::consts::PI / 180.0;
        assert!((distance_km(a, b) - expected).abs() < 0.01);
        assert!((distance_km(b, a) - expected).abs() < 0.01);
    }

    #[test]
    fn test_distance_ottawa_montreal() {
        let ottawa = Coordinates::new(45.4215, -75.6972);
        let montreal = Coordinates::new(45.5017, -73.5673);
        let d = distance_km(ottawa, montreal);
        assert!(d > 160.0 && d < 170.0, "distance {}", d);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinates::new(0.0, 0.0);
        assert!((bearing_deg(origin, Coordinates::new(1.0, 0.0)) - 0.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(0.0, 1.0)) - 90.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(-1.0, 0.0)) - 180.0).abs() < 1e-6);
        assert!((bearing_deg(origin, Coordinates::new(0.0, -1.0)) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_always_in_range() {
        let from = Coordinates::new(49.0, -72.0);
        for (lat, lon) in [(48.0, -73.0), (50.0, -71.0), (49.0, -72.5), (48.9, -71.9)] {
            let b = bearing_deg(from, Coordinates::new(lat, lon));
            assert!((0.0..360.0).contains(&b), "bearing {}", b);
        }
    }

    #[test]
    fn test_proximity_weight_edges() {
        for radius in [1.0, 25.0, 50.0, 133.7] {
            assert!((proximity_weight(0.0, radius).unwrap() - 1.0).abs() < EPSILON);
            assert!(proximity_weight(radius, radius).unwrap().abs() < EPSILON);
        }
    }

    #[test]
    fn test_proximity_weight_halfway() {
        // sin^2(pi / 4) == 0.5
        let w = proximity_weight(25.0, 50.0).unwrap();
        assert!((w - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_proximity_weight_invalid_radius() {
        assert_eq!(None, proximity_weight(1.0, 0.0));
        assert_eq!(None, proximity_weight(1.0, -5.0));
        assert_eq!(None, proximity_weight(1.0, f64::NAN));
    }

    #[test]
    fn test_radius_filter() {
        let filter = RadiusFilter::new(Coordinates::new(49.0583, -72.0292), 50.0);
        assert_eq!("r/49.0583/-72.0292/50", filter.to_string());
        assert!(filter.contains(50.0));
        assert!(!filter.contains(50.1));
    }
}
