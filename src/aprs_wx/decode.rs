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

//! Decoder for the CWOP subset of APRS position reports.
//!
//! Decoding never keeps a reference to the line it reads from. All state lives in a
//! [`Cursor`] that each parsing step takes by value and hands back advanced, so the
//! same line can be decoded any number of times and from any thread.

use crate::fields::{self, FieldSpec, Quantity, WeatherValues};
use crate::geo::{self, Coordinates};
use std::error;
use std::fmt;
use std::time::Instant;

/// APRS data type identifiers that are valid packets but carry no weather we decode.
const NON_WEATHER_TYPES: &[u8] = b">:;)`'T<?}$_{#*%,[";

/// Read position within a single line of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Self {
        Cursor { line, pos: 0 }
    }

    pub fn line(&self) -> &'a str {
        self.line
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a str {
        self.line.get(self.pos..).unwrap_or("")
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.line.len()
    }

    /// Consume one byte.
    pub fn next_byte(self) -> Option<(u8, Cursor<'a>)> {
        self.line.as_bytes().get(self.pos).map(|b| (*b, self.advance(1)))
    }

    /// Consume exactly `n` bytes, or nothing if fewer remain.
    pub fn take(self, n: usize) -> Option<(&'a str, Cursor<'a>)> {
        let end = self.pos.checked_add(n)?;
        self.line.get(self.pos..end).map(|s| (s, Cursor { pos: end, ..self }))
    }

    /// Move forward `n` bytes, stopping at the end of the line.
    pub fn advance(self, n: usize) -> Cursor<'a> {
        Cursor {
            pos: self.pos.saturating_add(n).min(self.line.len()),
            ..self
        }
    }

    /// Text from here up to (not including) the next `b`, with the cursor left on `b`.
    pub fn until(self, b: u8) -> Option<(&'a str, Cursor<'a>)> {
        let offset = self.remaining().bytes().position(|c| c == b)?;
        self.take(offset)
    }

    /// Cursor positioned just past the next `b`.
    pub fn after(self, b: u8) -> Option<Cursor<'a>> {
        self.until(b).map(|(_, c)| c.advance(1))
    }
}

/// Decoded position along with where it sits relative to the reference point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub distance_km: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub weight: Option<f64>,
}

impl Position {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }
}

/// Latest conditions reported by one station.
///
/// Values are kept as decoded from the wire, scaled but in the units the station
/// sent (Fahrenheit, mph, inches). Normalization happens during aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub name: String,
    pub timestamp: Option<String>,
    pub symbol_table: Option<char>,
    pub symbol_code: Option<char>,
    pub position: Position,
    pub values: WeatherValues,
    pub captured: Instant,
}

impl WeatherReport {
    pub fn new<S: Into<String>>(name: S, captured: Instant) -> Self {
        WeatherReport {
            name: name.into(),
            timestamp: None,
            symbol_table: None,
            symbol_code: None,
            position: Position::default(),
            values: [None; Quantity::COUNT],
            captured,
        }
    }

    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        self.values[quantity.index()]
    }

    pub fn set_value(&mut self, quantity: Quantity, value: f64) {
        self.values[quantity.index()] = Some(value);
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(c) = self.position.coordinates() {
            write!(f, " {}", c)?;
        }
        if let (Some(d), Some(b)) = (self.position.distance_km, self.position.bearing_deg) {
            write!(f, " {:.1}km @ {:.0}deg", d, b)?;
        }
        if let Some(w) = self.position.weight {
            write!(f, " weight {:.3}", w)?;
        }
        for q in Quantity::ALL {
            if let Some(v) = self.value(q) {
                write!(f, " {}={:.*}", q.spec().name, q.spec().precision, v)?;
            }
        }
        Ok(())
    }
}

/// Reasons a line could not be turned into a weather report.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    MissingName,
    MissingInformation,
    Discriminator { found: Option<char>, position: usize },
    Latitude(Box<WeatherReport>),
    Longitude(Box<WeatherReport>),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingName => write!(f, "no station name before '>'"),
            Self::MissingInformation => write!(f, "no information field after ':'"),
            Self::Discriminator { found: Some(c), position } => {
                write!(f, "unhandled discriminator {:?} at {}", c, position)
            }
            Self::Discriminator { found: None, position } => write!(f, "missing discriminator at {}", position),
            Self::Latitude(r) => write!(f, "invalid latitude for {}", r.name),
            Self::Longitude(r) => write!(f, "invalid longitude for {}", r.name),
        }
    }
}

impl error::Error for DecodeError {}

/// Result of decoding a single line.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Weather(WeatherReport),
    NotWeather(char),
    Error(DecodeError),
}

/// Which half of a position is being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateKind {
    Latitude,
    Longitude,
}

impl CoordinateKind {
    const MINUTES_WIDTH: usize = 5;

    fn degrees_width(self) -> usize {
        match self {
            Self::Latitude => 2,
            Self::Longitude => 3,
        }
    }

    fn hemispheres(self) -> (u8, u8) {
        match self {
            Self::Latitude => (b'N', b'S'),
            Self::Longitude => (b'E', b'W'),
        }
    }

    fn max(self) -> f64 {
        match self {
            Self::Latitude => 90.0,
            Self::Longitude => 180.0,
        }
    }
}

/// Decode a `DDMM.mmH` latitude or `DDDMM.mmH` longitude.
///
/// The cursor is advanced past the whole coordinate even when it's invalid.
pub fn decode_coordinate(cursor: Cursor<'_>, kind: CoordinateKind) -> (Option<f64>, Cursor<'_>) {
    let (degrees, cursor) = take_field(cursor, kind.degrees_width());
    let (minutes, cursor) = take_field(cursor, CoordinateKind::MINUTES_WIDTH);
    let (hemisphere, cursor) = match cursor.next_byte() {
        Some((b, c)) => (Some(b.to_ascii_uppercase()), c),
        None => (None, cursor),
    };

    let degrees = degrees
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|d| d.parse::<u32>().ok());
    let minutes = match parse_field(minutes) {
        FieldValue::Value(m) if (0.0..60.0).contains(&m) => Some(m),
        _ => None,
    };

    let magnitude = match (degrees, minutes) {
        (Some(d), Some(m)) => f64::from(d) + m / 60.0,
        _ => return (None, cursor),
    };

    if magnitude > kind.max() {
        return (None, cursor);
    }

    let (positive, negative) = kind.hemispheres();
    match hemisphere {
        Some(h) if h == positive => (Some(magnitude), cursor),
        Some(h) if h == negative => (Some(-magnitude), cursor),
        _ => (None, cursor),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldValue {
    Value(f64),
    Missing,
    Invalid,
}

/// Consume a fixed width field, or whatever is left of the line if it's shorter.
fn take_field(cursor: Cursor<'_>, width: usize) -> (Option<&str>, Cursor<'_>) {
    match cursor.take(width) {
        Some((text, c)) => (Some(text), c),
        None => (None, cursor.advance(width)),
    }
}

/// Strictly parse a fixed width number: an optional sign then digits and at most
/// one decimal point, using every character. Stations fill unknown values with
/// dots or spaces.
fn parse_field(text: Option<&str>) -> FieldValue {
    let text = match text {
        Some(t) => t,
        None => return FieldValue::Invalid,
    };

    if text.bytes().all(|b| b == b'.' || b == b' ') {
        return FieldValue::Missing;
    }

    let unsigned = text.strip_prefix('-').unwrap_or(text);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return FieldValue::Invalid;
    }

    match text.parse::<f64>() {
        Ok(v) => FieldValue::Value(v),
        Err(_) => FieldValue::Invalid,
    }
}

/// Turns lines from the feed into [`Packet`]s, locating weather reports relative
/// to an optional reference point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    reference: Option<Coordinates>,
    radius_km: Option<f64>,
}

impl Decoder {
    pub fn new(reference: Option<Coordinates>, radius_km: Option<f64>) -> Self {
        Decoder { reference, radius_km }
    }

    pub fn from_filter(filter: geo::RadiusFilter) -> Self {
        Self::new(Some(filter.center), Some(filter.radius_km))
    }

    /// Decode the line under `cursor`, returning the packet and where decoding stopped.
    pub fn decode<'a>(&self, cursor: Cursor<'a>) -> (Packet, Cursor<'a>) {
        let (name, cursor) = match cursor.until(b'>') {
            Some((name, c)) if !name.is_empty() => (name, c),
            _ => return (Packet::Error(DecodeError::MissingName), cursor),
        };

        let cursor = match cursor.after(b':') {
            Some(c) => c,
            None => return (Packet::Error(DecodeError::MissingInformation), cursor),
        };

        match cursor.next_byte() {
            Some((d @ (b'!' | b'=' | b'@' | b'/'), next)) => self.decode_weather(name, d, next),
            Some((d, next)) if NON_WEATHER_TYPES.contains(&d) => (Packet::NotWeather(d as char), next),
            Some((d, next)) => (
                Packet::Error(DecodeError::Discriminator {
                    found: Some(d as char),
                    position: cursor.position(),
                }),
                next,
            ),
            None => (
                Packet::Error(DecodeError::Discriminator {
                    found: None,
                    position: cursor.position(),
                }),
                cursor,
            ),
        }
    }

    fn decode_weather<'a>(&self, name: &str, discriminator: u8, cursor: Cursor<'a>) -> (Packet, Cursor<'a>) {
        let mut report = WeatherReport::new(name, Instant::now());
        let mut cursor = cursor;

        if discriminator == b'@' || discriminator == b'/' {
            let (timestamp, c) = take_field(cursor, 7);
            report.timestamp = timestamp.map(String::from);
            cursor = c;
        }

        let (lat, c) = decode_coordinate(cursor, CoordinateKind::Latitude);
        cursor = c;
        match lat {
            Some(v) => report.position.lat = Some(v),
            None => return (Packet::Error(DecodeError::Latitude(Box::new(report))), cursor),
        }

        if let Some((b, c)) = cursor.next_byte() {
            report.symbol_table = Some(b as char);
            cursor = c;
        }

        let (lon, c) = decode_coordinate(cursor, CoordinateKind::Longitude);
        cursor = c;
        match lon {
            Some(v) => report.position.lon = Some(v),
            None => return (Packet::Error(DecodeError::Longitude(Box::new(report))), cursor),
        }

        if let Some((b, c)) = cursor.next_byte() {
            report.symbol_code = Some(b as char);
            cursor = c;
        }

        cursor = decode_wind(&mut report, cursor);
        cursor = decode_flagged(&mut report, cursor);
        self.locate(&mut report);

        (Packet::Weather(report), cursor)
    }

    fn locate(&self, report: &mut WeatherReport) {
        let (reference, here) = match (self.reference, report.position.coordinates()) {
            (Some(r), Some(h)) => (r, h),
            _ => return,
        };

        let distance = geo::distance_km(reference, here);
        report.position.distance_km = Some(distance);
        report.position.bearing_deg = Some(geo::bearing_deg(reference, here));

        if let Some(radius) = self.radius_km {
            if distance <= radius {
                report.position.weight = geo::proximity_weight(distance, radius);
            } else {
                tracing::debug!(
                    message = "station outside filter radius",
                    station = %report.name,
                    distance_km = distance,
                    radius_km = radius,
                );
            }
        }
    }
}

/// Unflagged wind direction and speed that follow the symbol code, `DDD/SSS`.
///
/// A direction that isn't a number means the position carries no wind section
/// (a plain position report or one with a PHG extension) and nothing is consumed.
fn decode_wind<'a>(report: &mut WeatherReport, cursor: Cursor<'a>) -> Cursor<'a> {
    let direction = Quantity::WindDirection.spec();
    let (text, after_direction) = take_field(cursor, direction.width);
    match parse_field(text) {
        FieldValue::Value(v) => report.set_value(direction.quantity, direction.apply(v)),
        FieldValue::Missing => {}
        FieldValue::Invalid => return cursor,
    }

    let speed = Quantity::WindSpeed.spec();
    let (text, after_speed) = take_field(after_direction.advance(1), speed.width);
    if let FieldValue::Value(v) = parse_field(text) {
        report.set_value(speed.quantity, speed.apply(v));
    }

    after_speed
}

/// Flag/value pairs until a flag that isn't in the field table. The returned cursor
/// sits on the first character that wasn't used.
fn decode_flagged<'a>(report: &mut WeatherReport, mut cursor: Cursor<'a>) -> Cursor<'a> {
    while let Some((flag, value_start)) = cursor.next_byte() {
        let spec: &FieldSpec = match fields::lookup(flag) {
            Some(s) => s,
            None => break,
        };

        let (text, next) = take_field(value_start, spec.width);
        match parse_field(text) {
            FieldValue::Value(v) => report.set_value(spec.quantity, spec.apply(v)),
            FieldValue::Missing => {}
            FieldValue::Invalid => {
                // Lenient: a bad value ends the weather data but what was decoded so far is kept
                let flag = flag as char;
                tracing::warn!(
                    message = "weather value decoding error",
                    flag = %flag,
                    index = value_start.position(),
                    line = %cursor.line(),
                );
                break;
            }
        }

        cursor = next;
    }

    cursor
}

#[cfg(test)]
mod tests {
    use super::{decode_coordinate, CoordinateKind, Cursor, DecodeError, Decoder, Packet, WeatherReport};
    use crate::fields::Quantity;
    use crate::geo::Coordinates;

    const EXAMPLE: &str = "STATION>APRS,TCPIP*:@092345z4903.50N/07201.75Wc220s004g005t077r000p000P000h50b10132";

    fn decode(line: &str) -> (Packet, usize) {
        let (packet, cursor) = Decoder::default().decode(Cursor::new(line));
        (packet, cursor.position())
    }

    fn weather(line: &str) -> WeatherReport {
        match decode(line).0 {
            Packet::Weather(r) => r,
            other => panic!("expected weather report, got {:?}", other),
        }
    }

    fn assert_close(expected: f64, actual: Option<f64>) {
        let actual = actual.expect("expected a value");
        assert!((expected - actual).abs() < 1e-6, "expected {} got {}", expected, actual);
    }

    #[test]
    fn test_cursor_take_and_advance() {
        let c = Cursor::new("abc>def");
        let (name, c) = c.until(b'>').unwrap();
        assert_eq!("abc", name);
        assert_eq!(3, c.position());
        assert!(c.take(5).is_none());
        assert_eq!(7, c.advance(100).position());
        assert!(c.advance(100).is_at_end());
        assert_eq!("def", c.after(b'>').unwrap().remaining());
    }

    #[test]
    fn test_decode_example_report() {
        let (packet, position) = decode(EXAMPLE);
        let report = match packet {
            Packet::Weather(r) => r,
            other => panic!("expected weather report, got {:?}", other),
        };

        assert_eq!("STATION", report.name);
        assert_eq!(Some("092345z"), report.timestamp.as_deref());
        assert_eq!(Some('/'), report.symbol_table);
        assert_eq!(Some('c'), report.symbol_code);
        assert_close(49.058333, report.position.lat);
        assert_close(-72.029167, report.position.lon);
        assert_close(220.0, report.value(Quantity::WindDirection));
        assert_close(4.0, report.value(Quantity::WindSpeed));
        assert_close(5.0, report.value(Quantity::WindGust));
        assert_close(77.0, report.value(Quantity::Temperature));
        assert_close(50.0, report.value(Quantity::Humidity));
        assert_close(1013.2, report.value(Quantity::Pressure));
        assert_close(0.0, report.value(Quantity::RainHour));
        assert_close(0.0, report.value(Quantity::RainDay));
        assert_close(0.0, report.value(Quantity::RainMidnight));
        assert_eq!(None, report.value(Quantity::Luminosity));
        assert_eq!(EXAMPLE.len(), position);
    }

    #[test]
    fn test_decode_round_trip_synthetic() {
        let line = format!(
            "N0CALL-13>APRS,TCPXX*,qAX,CWOP-5:!{}{}{}{}{}/{}g{}t{}r{}p{}P{}h{}b{}L{}eCumulusDsVP",
            "4530.00N", '/', "07530.00W", '_', "180", "010", "025", "-07", "012", "034", "056", "87", "10050", "512",
        );
        let report = weather(&line);

        assert_eq!("N0CALL-13", report.name);
        assert_eq!(None, report.timestamp);
        assert_close(45.5, report.position.lat);
        assert_close(-75.5, report.position.lon);
        assert_close(180.0, report.value(Quantity::WindDirection));
        assert_close(10.0, report.value(Quantity::WindSpeed));
        assert_close(25.0, report.value(Quantity::WindGust));
        assert_close(-7.0, report.value(Quantity::Temperature));
        assert_close(0.12, report.value(Quantity::RainHour));
        assert_close(0.34, report.value(Quantity::RainDay));
        assert_close(0.56, report.value(Quantity::RainMidnight));
        assert_close(87.0, report.value(Quantity::Humidity));
        assert_close(1005.0, report.value(Quantity::Pressure));
        assert_close(512.0, report.value(Quantity::Luminosity));
    }

    #[test]
    fn test_decode_high_range_luminosity() {
        let report = weather("CW1234>APRS:=4530.00N/07530.00W_000/000l123");
        assert_close(1123.0, report.value(Quantity::Luminosity));
    }

    #[test]
    fn test_decode_humidity_h00_is_100_percent() {
        let report = weather("CW1234>APRS:=4530.00N/07530.00W_000/000t045h00b10132");
        assert_close(100.0, report.value(Quantity::Humidity));
        assert_close(1013.2, report.value(Quantity::Pressure));
    }

    #[test]
    fn test_decode_placeholder_values_are_missing() {
        let report = weather("CW1234>APRS:=4530.00N/07530.00W_.../...g...t045h..b.....");
        assert_eq!(None, report.value(Quantity::WindDirection));
        assert_eq!(None, report.value(Quantity::WindSpeed));
        assert_eq!(None, report.value(Quantity::WindGust));
        assert_close(45.0, report.value(Quantity::Temperature));
        assert_eq!(None, report.value(Quantity::Humidity));
        assert_eq!(None, report.value(Quantity::Pressure));
    }

    #[test]
    fn test_decode_missing_name() {
        let (packet, _) = decode("STATION APRS,TCPIP*:@092345z4903.50N/07201.75W");
        assert_eq!(Packet::Error(DecodeError::MissingName), packet);

        let (packet, _) = decode(">APRS:@092345z4903.50N/07201.75W");
        assert_eq!(Packet::Error(DecodeError::MissingName), packet);
    }

    #[test]
    fn test_decode_missing_information_field() {
        let (packet, _) = decode("STATION>APRS,TCPIP*");
        assert_eq!(Packet::Error(DecodeError::MissingInformation), packet);
    }

    #[test]
    fn test_decode_newline_discriminator_is_error() {
        let (packet, _) = decode("STATION>APRS:\n");
        assert_eq!(
            Packet::Error(DecodeError::Discriminator {
                found: Some('\n'),
                position: 13,
            }),
            packet
        );
    }

    #[test]
    fn test_decode_end_of_line_discriminator_is_error() {
        let (packet, _) = decode("STATION>APRS:");
        assert_eq!(
            Packet::Error(DecodeError::Discriminator {
                found: None,
                position: 13,
            }),
            packet
        );
    }

    #[test]
    fn test_decode_unknown_discriminator_is_error() {
        let (packet, _) = decode("STATION>APRS:Zfoo");
        assert!(matches!(
            packet,
            Packet::Error(DecodeError::Discriminator { found: Some('Z'), .. })
        ));
    }

    #[test]
    fn test_decode_not_weather() {
        let (packet, _) = decode("STATION>APRS::BLN1     :Net tonight");
        assert_eq!(Packet::NotWeather(':'), packet);

        let (packet, _) = decode("STATION>APRS:>Status text");
        assert_eq!(Packet::NotWeather('>'), packet);
    }

    #[test]
    fn test_decode_bad_latitude_keeps_partial_report() {
        let (packet, _) = decode("STATION>APRS:@092345z4903.50X/07201.75W_220/004");
        match packet {
            Packet::Error(DecodeError::Latitude(report)) => {
                assert_eq!("STATION", report.name);
                assert_eq!(Some("092345z"), report.timestamp.as_deref());
                assert_eq!(None, report.position.lat);
            }
            other => panic!("expected latitude error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_bad_longitude_keeps_partial_report() {
        let (packet, _) = decode("STATION>APRS:!4903.50N/0720A.75W_220/004");
        match packet {
            Packet::Error(DecodeError::Longitude(report)) => {
                assert_close(49.058333, report.position.lat);
                assert_eq!(None, report.position.lon);
            }
            other => panic!("expected longitude error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unrecognized_flag_rewinds_cursor() {
        let line = "STATION>APRS:!4903.50N/07201.75W_220/004g005t077xyz";
        let (packet, position) = decode(line);
        assert!(matches!(packet, Packet::Weather(_)));
        assert_eq!(line.rfind('x').unwrap(), position);
    }

    // A malformed value ends the weather fields like a clean end of record would,
    // even though later fields may have been fine. This matches how noisy feeds
    // are handled but can hide a corrupt trailing field.
    #[test]
    fn test_decode_malformed_value_ends_fields_leniently() {
        let line = "STATION>APRS:!4903.50N/07201.75W_220/004g005t0A7h50";
        let (packet, position) = decode(line);
        let report = match packet {
            Packet::Weather(r) => r,
            other => panic!("expected weather report, got {:?}", other),
        };

        assert_close(5.0, report.value(Quantity::WindGust));
        assert_eq!(None, report.value(Quantity::Temperature));
        assert_eq!(None, report.value(Quantity::Humidity));
        assert_eq!(line.find("t0A7").unwrap(), position);
    }

    #[test]
    fn test_decode_truncated_value_ends_fields() {
        let report = weather("STATION>APRS:!4903.50N/07201.75W_220/004t07");
        assert_close(4.0, report.value(Quantity::WindSpeed));
        assert_eq!(None, report.value(Quantity::Temperature));
    }

    #[test]
    fn test_decode_position_without_wind() {
        let report = weather("STATION>APRS:!4903.50N/07201.75W-PHG2360/A=000300");
        assert_close(49.058333, report.position.lat);
        assert!(report.values.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_decode_coordinate_signs() {
        for (text, kind, expected) in [
            ("4903.50N", CoordinateKind::Latitude, 49.0 + 3.5 / 60.0),
            ("4903.50S", CoordinateKind::Latitude, -(49.0 + 3.5 / 60.0)),
            ("0000.00n", CoordinateKind::Latitude, 0.0),
            ("8959.99N", CoordinateKind::Latitude, 89.0 + 59.99 / 60.0),
            ("07201.75W", CoordinateKind::Longitude, -(72.0 + 1.75 / 60.0)),
            ("07201.75E", CoordinateKind::Longitude, 72.0 + 1.75 / 60.0),
            ("17930.00w", CoordinateKind::Longitude, -179.5),
        ] {
            let (value, cursor) = decode_coordinate(Cursor::new(text), kind);
            assert_close(expected, value);
            assert!(cursor.is_at_end());
        }
    }

    #[test]
    fn test_decode_coordinate_errors() {
        for (text, kind) in [
            ("4903.50E", CoordinateKind::Latitude),
            ("49 3.50N", CoordinateKind::Latitude),
            ("4903.5", CoordinateKind::Latitude),
            ("9100.00N", CoordinateKind::Latitude),
            ("4963.00N", CoordinateKind::Latitude),
            ("07201.75N", CoordinateKind::Longitude),
            ("7201.75W", CoordinateKind::Longitude),
        ] {
            let (value, _) = decode_coordinate(Cursor::new(text), kind);
            assert_eq!(None, value, "{}", text);
        }
    }

    #[test]
    fn test_decode_locates_relative_to_reference() {
        let reference = Coordinates::new(49.0 + 3.5 / 60.0, -(72.0 + 1.75 / 60.0));
        let decoder = Decoder::new(Some(reference), Some(50.0));
        let report = match decoder.decode(Cursor::new(EXAMPLE)).0 {
            Packet::Weather(r) => r,
            other => panic!("expected weather report, got {:?}", other),
        };

        assert_close(0.0, report.position.distance_km);
        assert!(report.position.bearing_deg.is_some());
        assert_close(1.0, report.position.weight);
    }

    #[test]
    fn test_decode_outside_radius_has_no_weight() {
        let decoder = Decoder::new(Some(Coordinates::new(45.0, -75.0)), Some(50.0));
        let report = match decoder.decode(Cursor::new(EXAMPLE)).0 {
            Packet::Weather(r) => r,
            other => panic!("expected weather report, got {:?}", other),
        };

        assert!(report.position.distance_km.unwrap() > 50.0);
        assert_eq!(None, report.position.weight);
    }

    #[test]
    fn test_decode_without_reference_has_no_distance() {
        let report = weather(EXAMPLE);
        assert_eq!(None, report.position.distance_km);
        assert_eq!(None, report.position.bearing_deg);
        assert_eq!(None, report.position.weight);
    }
}
