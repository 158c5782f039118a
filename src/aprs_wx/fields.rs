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

//! Static table of the weather fields carried in a CWOP report.
//!
//! Each entry ties the single character flag used on the wire to the quantity it
//! measures, the fixed number of characters holding its value, and how to turn
//! those characters into a number in a known unit. Decoding, unit normalization
//! and export naming all read from [`FIELDS`].

/// Weather quantities tracked per station. Discriminants are indexes into
/// [`WeatherValues`] and into the primary entries of [`FIELDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    WindDirection = 0,
    WindSpeed = 1,
    WindGust = 2,
    Temperature = 3,
    Humidity = 4,
    RainHour = 5,
    RainDay = 6,
    RainMidnight = 7,
    Pressure = 8,
    Luminosity = 9,
}

impl Quantity {
    pub const COUNT: usize = 10;

    pub const ALL: [Quantity; Quantity::COUNT] = [
        Quantity::WindDirection,
        Quantity::WindSpeed,
        Quantity::WindGust,
        Quantity::Temperature,
        Quantity::Humidity,
        Quantity::RainHour,
        Quantity::RainDay,
        Quantity::RainMidnight,
        Quantity::Pressure,
        Quantity::Luminosity,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Primary table entry for this quantity, the one that defines its unit and export name.
    pub fn spec(self) -> &'static FieldSpec {
        &FIELDS[self.index()]
    }
}

/// One optional value per [`Quantity`], `None` meaning the station didn't report it.
pub type WeatherValues = [Option<f64>; Quantity::COUNT];

/// Unit of a value after scaling but before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Degrees,
    Mph,
    Fahrenheit,
    Percent,
    Inch,
    HectoPascal,
    WattsPerSquareMeter,
}

impl Unit {
    const KPH_PER_MPH: f64 = 1.60934;
    const MM_PER_INCH: f64 = 25.4;

    /// Smallest magnitude, in this unit, that is treated as a real reading.
    pub fn noise_floor(self) -> f64 {
        match self {
            Unit::Inch => 0.01,
            _ => 0.0,
        }
    }

    /// Convert a value in this unit to the metric unit used for aggregation, clamping
    /// sensor noise below [`Unit::noise_floor`] to zero.
    pub fn normalize(self, value: f64) -> f64 {
        let value = if value.abs() < self.noise_floor() { 0.0 } else { value };
        match self {
            Unit::Mph => value * Self::KPH_PER_MPH,
            Unit::Fahrenheit => (value - 32.0) * (5.0 / 9.0),
            Unit::Inch => value * Self::MM_PER_INCH,
            Unit::Degrees | Unit::Percent | Unit::HectoPascal | Unit::WattsPerSquareMeter => value,
        }
    }

    /// Symbol of the unit a value is in after [`Unit::normalize`].
    pub fn normalized_symbol(self) -> &'static str {
        match self {
            Unit::Degrees => "deg",
            Unit::Mph => "km/h",
            Unit::Fahrenheit => "C",
            Unit::Percent => "%",
            Unit::Inch => "mm",
            Unit::HectoPascal => "hPa",
            Unit::WattsPerSquareMeter => "W/m2",
        }
    }
}

/// How to decode and present a single flagged weather value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub quantity: Quantity,
    pub flag: u8,
    pub width: usize,
    pub unit: Unit,
    pub scale: f64,
    pub offset: f64,
    pub name: &'static str,
    pub precision: usize,
}

impl FieldSpec {
    /// Apply scale and offset to a raw number parsed from the wire.
    pub fn apply(&self, raw: f64) -> f64 {
        // Two digits can't hold 100% humidity, stations send it as `h00`
        if self.quantity == Quantity::Humidity && raw == 0.0 {
            return 100.0;
        }

        raw * self.scale + self.offset
    }
}

const fn field(
    quantity: Quantity,
    flag: u8,
    width: usize,
    unit: Unit,
    scale: f64,
    name: &'static str,
    precision: usize,
) -> FieldSpec {
    FieldSpec {
        quantity,
        flag,
        width,
        unit,
        scale,
        offset: 0.0,
        name,
        precision,
    }
}

/// Every flag understood in the weather portion of a report. The first
/// [`Quantity::COUNT`] entries are in [`Quantity`] order; alternate flags for an
/// already listed quantity follow them.
pub static FIELDS: [FieldSpec; 11] = [
    field(Quantity::WindDirection, b'c', 3, Unit::Degrees, 1.0, "WDir", 1),
    field(Quantity::WindSpeed, b's', 3, Unit::Mph, 1.0, "WSpeed", 1),
    field(Quantity::WindGust, b'g', 3, Unit::Mph, 1.0, "WGust", 1),
    field(Quantity::Temperature, b't', 3, Unit::Fahrenheit, 1.0, "Temp", 1),
    field(Quantity::Humidity, b'h', 2, Unit::Percent, 1.0, "RelHum", 1),
    field(Quantity::RainHour, b'r', 3, Unit::Inch, 0.01, "RHour", 2),
    field(Quantity::RainDay, b'p', 3, Unit::Inch, 0.01, "RDay", 2),
    field(Quantity::RainMidnight, b'P', 3, Unit::Inch, 0.01, "RainMid", 2),
    field(Quantity::Pressure, b'b', 5, Unit::HectoPascal, 0.1, "BaroP", 1),
    field(Quantity::Luminosity, b'L', 3, Unit::WattsPerSquareMeter, 1.0, "Lumin", 1),
    // High range luminosity, 1000 W/m2 and up
    FieldSpec {
        offset: 1000.0,
        ..field(Quantity::Luminosity, b'l', 3, Unit::WattsPerSquareMeter, 1.0, "Lumin", 1)
    },
];

/// Find the table entry introduced by `flag`, if any.
pub fn lookup(flag: u8) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.flag == flag)
}

#[cfg(test)]
mod tests {
    use super::{lookup, Quantity, Unit, FIELDS};

    #[test]
    fn test_primary_entries_in_quantity_order() {
        for q in Quantity::ALL {
            assert_eq!(q, FIELDS[q.index()].quantity);
            assert_eq!(q, q.spec().quantity);
        }
    }

    #[test]
    fn test_flags_are_unique() {
        for (i, a) in FIELDS.iter().enumerate() {
            for b in FIELDS.iter().skip(i + 1) {
                assert_ne!(a.flag, b.flag, "duplicate flag {}", a.flag as char);
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Quantity::Temperature, lookup(b't').unwrap().quantity);
        assert_eq!(Quantity::RainMidnight, lookup(b'P').unwrap().quantity);
        assert_eq!(Quantity::RainDay, lookup(b'p').unwrap().quantity);
        assert!(lookup(b'x').is_none());
        assert!(lookup(b'\n').is_none());
    }

    #[test]
    fn test_high_range_luminosity() {
        let spec = lookup(b'l').unwrap();
        assert_eq!(Quantity::Luminosity, spec.quantity);
        assert_eq!(1250.0, spec.apply(250.0));
        assert_eq!(250.0, lookup(b'L').unwrap().apply(250.0));
    }

    #[test]
    fn test_humidity_zero_is_saturated() {
        let spec = lookup(b'h').unwrap();
        assert_eq!(100.0, spec.apply(0.0));
        assert_eq!(1.0, spec.apply(1.0));
        assert_eq!(87.0, spec.apply(87.0));
    }

    #[test]
    fn test_aggregated_values_keep_a_decimal() {
        for spec in FIELDS.iter() {
            assert!(spec.precision >= 1, "{} has precision {}", spec.name, spec.precision);
        }
    }

    #[test]
    fn test_pressure_scale() {
        let spec = lookup(b'b').unwrap();
        assert!((spec.apply(10132.0) - 1013.2).abs() < 1e-9);
    }

    #[test]
    fn test_normalize() {
        assert!((Unit::Fahrenheit.normalize(212.0) - 100.0).abs() < 1e-9);
        assert!((Unit::Fahrenheit.normalize(32.0)).abs() < 1e-9);
        assert!((Unit::Mph.normalize(10.0) - 16.0934).abs() < 1e-9);
        assert!((Unit::Inch.normalize(1.0) - 25.4).abs() < 1e-9);
        assert_eq!(1013.2, Unit::HectoPascal.normalize(1013.2));
    }

    #[test]
    fn test_normalize_clamps_noise() {
        assert_eq!(0.0, Unit::Inch.normalize(0.004));
        assert!((Unit::Inch.normalize(0.01) - 0.254).abs() < 1e-9);
        assert_eq!(0.004, Unit::Percent.normalize(0.004));
    }
}
