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

use aprs_wx::aggregate::StationAggregator;
use aprs_wx::decode::Decoder;
use aprs_wx::export::{Exporter, InfluxClient, LineProtocol, Sink};
use aprs_wx::feed::{self, EpochEnd, FeedProcessor, FeedSettings};
use aprs_wx::geo::{Coordinates, RadiusFilter};
use aprs_wx::http::RequestContext;
use aprs_wx::metrics::FeedMetrics;
use aprs_wx::session::{self, Endpoint, LineSession, Login};
use clap::Parser;
use prometheus_client::registry::Registry;
use reqwest::Client;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::{Instrument, Level};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9783);
const DEFAULT_RETRY_SECS: u64 = 30;
const DEFAULT_MAX_AGE_SECS: u64 = 3600;
const DEFAULT_INFLUX_PORT: u16 = 8086;
const DEFAULT_TIMEOUT_MILLIS: u64 = 5000;
const SERVER_WAIT: Duration = Duration::from_secs(30);
const PLACEHOLDER_CALLSIGN: &str = "N0CALL";

#[derive(Debug, Parser)]
#[clap(name = "aprs_wx", version = clap::crate_version!())]
struct AprsWxApplication {
    /// Callsign to log in to APRS-IS with
    #[clap(long)]
    callsign: String,

    /// APRS-IS passcode for the callsign
    #[clap(long, allow_hyphen_values = true)]
    passcode: String,

    /// Latitude to aggregate weather around, in decimal degrees (south is negative)
    #[clap(long, allow_negative_numbers = true)]
    latitude: f64,

    /// Longitude to aggregate weather around, in decimal degrees (west is negative)
    #[clap(long, allow_negative_numbers = true)]
    longitude: f64,

    /// Include stations up to this many kilometers away
    #[clap(long)]
    radius: f64,

    /// APRS-IS server or rotation to connect to
    #[clap(long, default_value_t = session::DEFAULT_SERVER.into())]
    server: String,

    /// APRS-IS port. The default port accepts server-side filters
    #[clap(long, default_value_t = session::DEFAULT_PORT)]
    port: u16,

    /// Wait this long for data on each read from the server, in seconds
    #[clap(long, default_value_t = feed::DEFAULT_IDLE.as_secs())]
    idle_secs: u64,

    /// Reconnect after this many consecutive reads without data
    #[clap(long, default_value_t = feed::DEFAULT_MAX_IDLE_READS)]
    max_idle_reads: u32,

    /// Reconnect after reading this many lines from a server, 0 to never reconnect
    #[clap(long, default_value_t = feed::DEFAULT_CYCLE_RATE)]
    cycle_rate: u64,

    /// Wait this long before reconnecting after a connection failure, in seconds
    #[clap(long, default_value_t = DEFAULT_RETRY_SECS)]
    retry_secs: u64,

    /// Drop station reports older than this from the aggregate, in seconds
    #[clap(long, default_value_t = DEFAULT_MAX_AGE_SECS)]
    max_age_secs: u64,

    /// InfluxDB host to write the aggregate to. The aggregate is only written when
    /// both this and --influx-db are set
    #[clap(long)]
    influx_host: Option<String>,

    /// InfluxDB port
    #[clap(long, default_value_t = DEFAULT_INFLUX_PORT)]
    influx_port: u16,

    /// Use HTTPS for InfluxDB
    #[clap(long)]
    influx_tls: bool,

    /// InfluxDB database to write the aggregate to
    #[clap(long)]
    influx_db: Option<String>,

    /// Write the aggregate again each time the server sends a keep-alive
    #[clap(long)]
    influx_repeats: bool,

    /// Timeout for writing to InfluxDB, in milliseconds
    #[clap(long, default_value_t = DEFAULT_TIMEOUT_MILLIS)]
    influx_timeout_millis: u64,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Address to bind to. By default, aprs_wx will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = AprsWxApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let callsign = opts.callsign.to_uppercase();
    if callsign.starts_with(PLACEHOLDER_CALLSIGN) {
        tracing::error!(message = "a real callsign is required", callsign = %callsign);
        process::exit(1);
    }

    if opts.radius.is_nan() || opts.radius <= 0.0 {
        tracing::error!(message = "radius must be greater than zero", radius = opts.radius);
        process::exit(1);
    }

    let filter = RadiusFilter::new(Coordinates::new(opts.latitude, opts.longitude), opts.radius);
    let endpoint = Endpoint::new(opts.server.clone(), opts.port);
    let login = Login {
        callsign: callsign.clone(),
        passcode: opts.passcode.clone(),
        filter: Some(filter.to_string()),
    };

    let mut registry = Registry::with_prefix("aprs_wx");
    let metrics = FeedMetrics::new(&mut registry);

    let exporter = match (&opts.influx_host, &opts.influx_db) {
        (Some(host), Some(database)) => {
            let sink = Sink {
                host: host.clone(),
                port: opts.influx_port,
                tls: opts.influx_tls,
                database: database.clone(),
            };

            let timeout = Duration::from_millis(opts.influx_timeout_millis);
            let http_client = Client::builder().timeout(timeout).build().unwrap_or_else(|e| {
                tracing::error!(message = "unable to initialize HTTP client", error = %e);
                process::exit(1)
            });

            let client = InfluxClient::new(http_client, &sink).unwrap_or_else(|e| {
                tracing::error!(message = "invalid database settings", error = %e);
                process::exit(1)
            });

            tracing::info!(message = "writing aggregate to database", database = %sink);
            let format = LineProtocol::new(format!("aprs_wx,call={} ", callsign));
            Some(Exporter::new(client, format, metrics.clone()))
        }
        _ => {
            tracing::warn!(message = "database not configured, aggregate will not be stored");
            None
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_flag = shutdown.clone();
    tokio::spawn(async move {
        // Wait for either SIGTERM, SIGINT, or SIGHUP to shutdown
        tokio::select! {
            _ = sigterm() => {}
            _ = sigint() => {}
            _ = sighup() => {}
        }

        tracing::info!("shutdown requested");
        signal_flag.store(true, Ordering::Relaxed);
    });

    let context = Arc::new(RequestContext::new(registry));
    let handler = aprs_wx::http::text_metrics(context);
    let server = axum::Server::try_bind(&opts.bind).unwrap_or_else(|e| {
        tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
        process::exit(1)
    });

    tokio::spawn(async move {
        if let Err(e) = server.serve(handler.into_make_service()).await {
            tracing::error!(message = "metrics server failed", error = %e);
        }
    });

    tracing::info!(message = "server started", address = %opts.bind);

    let settings = FeedSettings {
        idle: Duration::from_secs(opts.idle_secs),
        max_idle_reads: opts.max_idle_reads,
        cycle_rate: opts.cycle_rate,
        export_on_keepalive: opts.influx_repeats,
    };

    let mut processor = FeedProcessor::new(
        Decoder::from_filter(filter),
        StationAggregator::new(Duration::from_secs(opts.max_age_secs)),
        settings,
        metrics.clone(),
        exporter,
    );

    let retry = Duration::from_secs(opts.retry_secs);
    tracing::info!(message = "feed started", server = %endpoint, callsign = %callsign, filter = %filter);

    while !shutdown.load(Ordering::Relaxed) {
        let mut session = match LineSession::connect(&endpoint, SERVER_WAIT).await {
            Ok(s) => s,
            Err(e) => {
                metrics.connection_errors.inc();
                tracing::error!(message = "connection failed", server = %endpoint, error = %e);
                pause(retry, &shutdown).await;
                continue;
            }
        };

        metrics.connections.inc();
        if let Err(e) = session.login(&login, SERVER_WAIT).await {
            tracing::error!(message = "login failed", peer = %session.peer(), error = %e);
            session.close().await;
            pause(retry, &shutdown).await;
            continue;
        }

        let span = tracing::span!(Level::DEBUG, "aprs_feed", peer = %session.peer());
        match processor.run_epoch(&mut session, &shutdown).instrument(span).await {
            EpochEnd::Shutdown => {}
            EpochEnd::CycleComplete(lines) => {
                tracing::info!(message = "cycle complete, reconnecting", peer = %session.peer(), lines = lines);
            }
            EpochEnd::Idle(reads) => {
                tracing::warn!(message = "no data from server, reconnecting", peer = %session.peer(), reads = reads);
            }
            EpochEnd::Failed(e) => {
                tracing::warn!(message = "connection lost, reconnecting", peer = %session.peer(), error = %e);
            }
        }

        session.close().await;
    }

    tracing::info!("feed shutdown");
    Ok(())
}

/// Sleep for `duration` or until shutdown is requested, whichever is first.
async fn pause(duration: Duration, shutdown: &AtomicBool) {
    let step = Duration::from_secs(1);
    let mut waited = Duration::ZERO;
    while waited < duration && !shutdown.load(Ordering::Relaxed) {
        tokio::time::sleep(step).await;
        waited += step;
    }
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}

/// Return after the first SIGHUP signal received by this process
async fn sighup() -> io::Result<()> {
    unix::signal(SignalKind::hangup())?.recv().await;
    Ok(())
}
