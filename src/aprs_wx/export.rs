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
use crate::metrics::FeedMetrics;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use std::error;
use std::fmt;

const DERIVED_PRECISION: usize = 1;

/// Renders an aggregate snapshot as InfluxDB line protocol, one field per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineProtocol {
    prefix: String,
}

impl LineProtocol {
    /// `prefix` is everything before the field, usually `measurement,tag=value `.
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        LineProtocol { prefix: prefix.into() }
    }

    pub fn format(&self, snapshot: &AggregateSnapshot) -> String {
        let mut lines = Vec::new();

        for q in Quantity::ALL {
            let spec = q.spec();
            if let Some(v) = snapshot.value(q) {
                lines.push(self.line(spec.name, spec.precision, v));
            }
        }

        for (name, value) in [
            ("DewPt", snapshot.dew_point),
            ("Humidex", snapshot.humidex),
            ("WindChill", snapshot.wind_chill),
        ] {
            if let Some(v) = value {
                lines.push(self.line(name, DERIVED_PRECISION, v));
            }
        }

        lines.join("\n")
    }

    fn line(&self, name: &str, precision: usize, value: f64) -> String {
        format!("{}{}={:.*}", self.prefix, name, precision, value)
    }
}

#[derive(Debug)]
pub enum ExportError {
    Internal(reqwest::Error),
    InvalidSink(String),
    Unexpected(StatusCode, Url),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal(e) => write!(f, "{}", e),
            Self::InvalidSink(s) => write!(f, "invalid database {}", s),
            Self::Unexpected(status, url) => write!(f, "unexpected status {} for {}", status, url),
        }
    }
}

impl error::Error for ExportError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Internal(e) => Some(e),
            _ => None,
        }
    }
}

/// Location of the InfluxDB database the aggregate is written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sink {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub database: String,
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: Client,
    write_url: Url,
}

impl InfluxClient {
    const USER_AGENT: &'static str = "aprs_wx (https://github.com/56quarters/aprs_wx)";
    const TEXT_BODY: &'static str = "text/plain; charset=utf-8";

    pub fn new(client: Client, sink: &Sink) -> Result<Self, ExportError> {
        Ok(InfluxClient {
            client,
            write_url: Self::write_url(sink)?,
        })
    }

    pub async fn write(&self, body: String) -> Result<(), ExportError> {
        tracing::debug!(message = "making database write request", url = %self.write_url);

        let res = self
            .client
            .post(self.write_url.clone())
            .header(USER_AGENT, Self::USER_AGENT)
            .header(CONTENT_TYPE, Self::TEXT_BODY)
            .body(body)
            .send()
            .await
            .map_err(ExportError::Internal)?;

        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Unexpected(status, self.write_url.clone()))
        }
    }

    fn write_url(sink: &Sink) -> Result<Url, ExportError> {
        let scheme = if sink.tls { "https" } else { "http" };
        let encoded_db = utf8_percent_encode(&sink.database, NON_ALPHANUMERIC);
        let url = format!("{}://{}:{}/write?db={}", scheme, sink.host, sink.port, encoded_db);

        Url::parse(&url).map_err(|e| ExportError::InvalidSink(format!("{}: {}", sink, e)))
    }
}

/// Pushes the aggregate to the database in the background each time it changes.
#[derive(Debug, Clone)]
pub struct Exporter {
    client: InfluxClient,
    format: LineProtocol,
    metrics: FeedMetrics,
}

impl Exporter {
    pub fn new(client: InfluxClient, format: LineProtocol, metrics: FeedMetrics) -> Self {
        Exporter { client, format, metrics }
    }

    /// Render the snapshot now and write it from a separate task. Failures are
    /// logged and counted, never retried.
    pub fn publish(&self, snapshot: &AggregateSnapshot) {
        if snapshot.is_empty() {
            return;
        }

        let body = self.format.format(snapshot);
        let client = self.client.clone();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            match client.write(body).await {
                Ok(_) => {
                    metrics.exports.inc();
                }
                Err(e) => {
                    metrics.export_errors.inc();
                    tracing::error!(message = "failed to write aggregate", error = %e);
                }
            }
        });
    }
}
