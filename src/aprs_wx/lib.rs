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

//! Distance-weighted CWOP weather aggregate from an APRS-IS feed
//!
//! ## Features
//!
//! `aprs_wx` connects to the [APRS-IS] network with a range filter around your station, decodes
//! the [CWOP] weather reports of every station inside that range and keeps a weighted average of
//! their latest conditions. Stations close to you count more than those near the edge of the range,
//! and reports older than an hour are dropped. The following values are computed when at least one
//! station reports them (all in metric units):
//!
//! * `WDir` - Wind direction, in degrees.
//! * `WSpeed` - Wind speed, in km/h.
//! * `WGust` - Wind gust, in km/h.
//! * `Temp` - Temperature, in degrees celsius.
//! * `RelHum` - Relative humidity (0-100).
//! * `RHour`, `RDay`, `RainMid` - Rain in the last hour, last 24 hours, and since midnight, in mm.
//! * `BaroP` - Barometric pressure, in hPa.
//! * `Lumin` - Luminosity, in W/m2.
//! * `DewPt`, `Humidex`, `WindChill` - Derived from the values above, in degrees celsius.
//!
//! Each time the aggregate changes it is written to an [InfluxDB] database, if one is configured,
//! and it's always available as Prometheus metrics.
//!
//! [APRS-IS]: https://www.aprs-is.net/
//! [CWOP]: https://weather.gladstonefamily.net/
//! [InfluxDB]: https://docs.influxdata.com/influxdb/v1/
//!
//! ## Build
//!
//! `aprs_wx` is a Rust program and must be built from source using a [Rust toolchain](https://rustup.rs/).
//!
//! ```text
//! git clone git@github.com:56quarters/aprs_wx.git && cd aprs_wx
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! You'll need a callsign and APRS-IS passcode along with the location to aggregate weather around
//! and how far out (in kilometers) to include stations.
//!
//! ```text
//! ./aprs_wx --callsign VE3XYZ --passcode 12345 --latitude 45.42 --longitude -75.70 --radius 25
//! ```
//!
//! To also write the aggregate to InfluxDB:
//!
//! ```text
//! ./aprs_wx --callsign VE3XYZ --passcode 12345 --latitude 45.42 --longitude -75.70 --radius 25 \
//!     --influx-host localhost --influx-port 8086 --influx-db weather
//! ```
//!
//! ### Prometheus
//!
//! Prometheus metrics are exposed on port `9783` at `/metrics`. The aggregate is the
//! `aprs_wx_aggregate` gauge with a `quantity` label using the names above.
//!

pub mod aggregate;
pub mod decode;
pub mod export;
pub mod feed;
pub mod fields;
pub mod geo;
pub mod http;
pub mod metrics;
pub mod session;
