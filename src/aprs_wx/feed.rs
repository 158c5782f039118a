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

//! Read, decode, aggregate and export loop for a single connection.

use crate::aggregate::StationAggregator;
use crate::decode::{Cursor, DecodeError, Decoder, Packet};
use crate::export::Exporter;
use crate::metrics::FeedMetrics;
use crate::session::{self, LineSource, SessionError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_IDLE: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_IDLE_READS: u32 = 300;
pub const DEFAULT_CYCLE_RATE: u64 = 100;

/// Limits that decide when a connection has been used long enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    /// How long to wait for data on each read.
    pub idle: Duration,
    /// Consecutive reads with no data before the connection is considered dead.
    pub max_idle_reads: u32,
    /// Lines to read before reconnecting, `0` for no limit.
    pub cycle_rate: u64,
    /// Export the current aggregate again whenever the server sends a keep-alive.
    pub export_on_keepalive: bool,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings {
            idle: DEFAULT_IDLE,
            max_idle_reads: DEFAULT_MAX_IDLE_READS,
            cycle_rate: DEFAULT_CYCLE_RATE,
            export_on_keepalive: false,
        }
    }
}

/// What happened with a single line from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Comment,
    Ignored,
    Updated,
    Rejected(DecodeError),
}

/// Why reading from a connection stopped.
#[derive(Debug)]
pub enum EpochEnd {
    Shutdown,
    CycleComplete(u64),
    Idle(u32),
    Failed(SessionError),
}

#[derive(Debug)]
pub struct FeedProcessor {
    decoder: Decoder,
    aggregator: StationAggregator,
    settings: FeedSettings,
    metrics: FeedMetrics,
    exporter: Option<Exporter>,
}

impl FeedProcessor {
    pub fn new(
        decoder: Decoder,
        aggregator: StationAggregator,
        settings: FeedSettings,
        metrics: FeedMetrics,
        exporter: Option<Exporter>,
    ) -> Self {
        FeedProcessor {
            decoder,
            aggregator,
            settings,
            metrics,
            exporter,
        }
    }

    pub fn aggregator(&self) -> &StationAggregator {
        &self.aggregator
    }

    /// Decode one line and fold any weather report it holds into the aggregate.
    pub fn handle_line(&mut self, cursor: Cursor<'_>, now: Instant) -> LineOutcome {
        let line = cursor.line();
        self.metrics.lines.inc();
        tracing::trace!(message = "received line", line = %line);

        if session::is_comment(line) {
            self.metrics.comments.inc();
            self.expire(now);
            return LineOutcome::Comment;
        }

        if line.trim().is_empty() {
            return LineOutcome::Ignored;
        }

        let (packet, end) = self.decoder.decode(cursor);
        match packet {
            Packet::Weather(report) => {
                tracing::debug!(message = "decoded weather report", report = %report);
                self.metrics.weather_packets.inc();
                let snapshot = self.aggregator.ingest(report, now);
                self.metrics.observe(snapshot);
                LineOutcome::Updated
            }
            Packet::NotWeather(kind) => {
                tracing::trace!(message = "ignoring non-weather packet", kind = %kind);
                LineOutcome::Ignored
            }
            Packet::Error(e) => {
                tracing::warn!(
                    message = "packet decoding error",
                    error = %e,
                    position = end.position(),
                    line = %line,
                );
                self.metrics.decode_errors.inc();
                LineOutcome::Rejected(e)
            }
        }
    }

    /// Read lines from `source` until the shutdown flag is set, the connection fails,
    /// stays idle too long, or the cycle budget is used up.
    pub async fn run_epoch<L: LineSource>(&mut self, source: &mut L, shutdown: &AtomicBool) -> EpochEnd {
        let mut lines = 0;
        let mut idle_reads = 0;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return EpochEnd::Shutdown;
            }

            if self.settings.cycle_rate > 0 && lines >= self.settings.cycle_rate {
                return EpochEnd::CycleComplete(lines);
            }

            match source.next_line(self.settings.idle).await {
                Ok(true) => idle_reads = 0,
                Ok(false) => {
                    self.expire(Instant::now());
                    idle_reads += 1;
                    if idle_reads >= self.settings.max_idle_reads {
                        return EpochEnd::Idle(idle_reads);
                    }
                    continue;
                }
                Err(e) => return EpochEnd::Failed(e),
            }

            lines += 1;
            match self.handle_line(source.cursor(), Instant::now()) {
                LineOutcome::Updated => self.export(),
                LineOutcome::Comment if self.settings.export_on_keepalive => self.export(),
                _ => {}
            }
        }
    }

    /// Drop stations older than the max age, updating the aggregate gauges if any were removed.
    fn expire(&mut self, now: Instant) {
        if self.aggregator.evict_stale(now) > 0 {
            let snapshot = self.aggregator.recompute(now);
            self.metrics.observe(snapshot);
        }
    }

    fn export(&self) {
        if let Some(exporter) = &self.exporter {
            exporter.publish(self.aggregator.snapshot());
        }
    }
}
