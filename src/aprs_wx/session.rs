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

//! Connection to an APRS-IS server.
//!
//! A [`LineSession`] only exists once the server's banner has been accepted. From
//! there it's logged in with [`LineSession::login`] and read one line at a time
//! through the [`LineSource`] trait until the connection fails.

use crate::decode::Cursor;
use std::error;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{self, TcpStream};
use tokio::time;

pub const DEFAULT_SERVER: &str = "cwop.aprs2.net";
pub const DEFAULT_PORT: u16 = 14580;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest line accepted from a server. APRS-IS servers drop packets well short of this.
const MAX_LINE_LENGTH: usize = 1024;

/// Banner prefixes of server software we know how to talk to.
const ACCEPTED_SERVERS: &[&str] = &["# aprsc", "# javAPRSSrvr"];

/// Server versions that misbehave with CWOP clients.
const REJECTED_SERVERS: &[&str] = &[
    "# javAPRSSrvr 4.3.0b22",
    "# javAPRSSrvr 4.3.0b17",
    "# javAPRSSrvr 4.2.0b09",
];

#[derive(Debug)]
pub enum SessionError {
    Resolve(String, io::Error),
    Connect(String),
    Rejected { peer: String, banner: String },
    BannerTimeout(String),
    Read(io::Error),
    Write(io::Error),
    Closed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve(host, e) => write!(f, "unable to resolve {}: {}", host, e),
            Self::Connect(host) => write!(f, "unable to connect to any address for {}", host),
            Self::Rejected { peer, banner } => write!(f, "rejected server {} version {}", peer, banner),
            Self::BannerTimeout(peer) => write!(f, "no banner from {}", peer),
            Self::Read(e) => write!(f, "read failed: {}", e),
            Self::Write(e) => write!(f, "write failed: {}", e),
            Self::Closed => write!(f, "connection closed by server"),
        }
    }
}

impl error::Error for SessionError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Resolve(_, e) => Some(e),
            Self::Read(e) => Some(e),
            Self::Write(e) => Some(e),
            _ => None,
        }
    }
}

/// Host and port of an APRS-IS server or rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Endpoint { host: host.into(), port }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Credentials and optional server-side filter sent after connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub callsign: String,
    pub passcode: String,
    pub filter: Option<String>,
}

impl Login {
    /// The `user ... pass ... [filter ...]` command line, including CRLF.
    pub fn command(&self) -> String {
        let mut cmd = format!("user {} pass {}", self.callsign, self.passcode);
        if let Some(filter) = self.filter.as_ref().filter(|f| !f.is_empty()) {
            cmd.push_str(" filter ");
            cmd.push_str(filter);
        }
        cmd.push_str("\r\n");
        cmd
    }
}

/// Server comments and keep-alives start with `#` and are never packets.
pub fn is_comment(line: &str) -> bool {
    line.starts_with('#')
}

/// True if a server banner belongs to software we accept.
pub fn is_accepted_banner(banner: &str) -> bool {
    ACCEPTED_SERVERS.iter().any(|p| banner.starts_with(p)) && !REJECTED_SERVERS.iter().any(|p| banner.starts_with(p))
}

/// Something that yields lines of the feed one at a time.
pub trait LineSource {
    /// Wait for the next complete line.
    ///
    /// Resolves to `Ok(false)` if nothing arrived within `idle`. That isn't an error
    /// and the source remains usable. Errors mean the source is finished.
    fn next_line(&mut self, idle: Duration) -> impl Future<Output = Result<bool, SessionError>>;

    /// Cursor at the start of the most recent line.
    fn cursor(&self) -> Cursor<'_>;
}

/// Open connection to an APRS-IS server with an accepted banner.
#[derive(Debug)]
pub struct LineSession<S> {
    stream: BufReader<S>,
    peer: String,
    banner: String,
    line: String,
    pending: Vec<u8>,
}

impl LineSession<TcpStream> {
    /// Connect to `endpoint`, reconnecting until a server with an acceptable banner is found.
    ///
    /// Each attempt resolves the host again so that DNS rotations can hand out a
    /// different server after a rejection.
    pub async fn connect(endpoint: &Endpoint, wait: Duration) -> Result<Self, SessionError> {
        loop {
            let (stream, addr) = open(endpoint).await?;
            match Self::negotiate(stream, addr.to_string(), wait).await {
                Ok(session) => {
                    tracing::info!(
                        message = "accepted server",
                        peer = %session.peer,
                        version = %session.banner,
                    );
                    return Ok(session);
                }
                Err(SessionError::Rejected { peer, banner }) => {
                    tracing::warn!(message = "rejected server", peer = %peer, version = %banner);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Try every address of the endpoint, IPv6 first, returning the first that connects.
async fn open(endpoint: &Endpoint) -> Result<(TcpStream, SocketAddr), SessionError> {
    let addrs: Vec<SocketAddr> = net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|e| SessionError::Resolve(endpoint.to_string(), e))?
        .collect();

    for addr in dial_order(&addrs) {
        match time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok((stream, addr)),
            Ok(Err(e)) => {
                tracing::debug!(message = "connection attempt failed", address = %addr, error = %e);
            }
            Err(_) => {
                tracing::debug!(message = "connection attempt timed out", address = %addr);
            }
        }
    }

    Err(SessionError::Connect(endpoint.to_string()))
}

/// IPv6 addresses before IPv4, otherwise in resolver order.
fn dial_order(addrs: &[SocketAddr]) -> Vec<SocketAddr> {
    addrs
        .iter()
        .filter(|a| a.is_ipv6())
        .chain(addrs.iter().filter(|a| a.is_ipv4()))
        .copied()
        .collect()
}

impl<S> LineSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream without reading the banner.
    pub fn new<P: Into<String>>(stream: S, peer: P) -> Self {
        LineSession {
            stream: BufReader::new(stream),
            peer: peer.into(),
            banner: String::new(),
            line: String::new(),
            pending: Vec::new(),
        }
    }

    /// Read the server banner from a fresh connection and check it against the
    /// accepted server versions, closing the stream if it's rejected.
    pub async fn negotiate(stream: S, peer: String, wait: Duration) -> Result<Self, SessionError> {
        let mut session = Self::new(stream, peer);
        if !session.read_line(wait).await? {
            return Err(SessionError::BannerTimeout(session.peer));
        }

        if is_accepted_banner(&session.line) {
            session.banner = session.line.clone();
            Ok(session)
        } else {
            let peer = session.peer.clone();
            let banner = session.line.clone();
            session.close().await;
            Err(SessionError::Rejected { peer, banner })
        }
    }

    /// Send the login command and wait up to `wait` for the server's response.
    pub async fn login(&mut self, login: &Login, wait: Duration) -> Result<(), SessionError> {
        let command = login.command();
        tracing::debug!(message = "sending login", callsign = %login.callsign, filter = ?login.filter);

        self.stream
            .write_all(command.as_bytes())
            .await
            .map_err(SessionError::Write)?;
        self.stream.flush().await.map_err(SessionError::Write)?;

        if self.read_line(wait).await? {
            tracing::info!(message = "login response", peer = %self.peer, response = %self.line);
        } else {
            tracing::warn!(message = "no login response", peer = %self.peer);
        }

        Ok(())
    }

    /// Read one byte at a time until a newline, dropping carriage returns.
    ///
    /// Gives up with `Ok(false)` if no byte arrives within `idle`. Bytes of an
    /// unfinished line are kept and completed by the next call. A line longer than
    /// the server could legitimately send is a read error.
    pub async fn read_line(&mut self, idle: Duration) -> Result<bool, SessionError> {
        loop {
            let byte = match time::timeout(idle, self.stream.read_u8()).await {
                Err(_) => return Ok(false),
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(SessionError::Closed),
                Ok(Err(e)) => return Err(SessionError::Read(e)),
                Ok(Ok(b)) => b,
            };

            match byte {
                b'\r' => {}
                b'\n' => {
                    self.line = String::from_utf8_lossy(&self.pending).into_owned();
                    self.pending.clear();
                    return Ok(true);
                }
                b => {
                    if self.pending.len() >= MAX_LINE_LENGTH {
                        self.pending.clear();
                        return Err(SessionError::Read(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("line longer than {} bytes", MAX_LINE_LENGTH),
                        )));
                    }

                    self.pending.push(b);
                }
            }
        }
    }

    /// Most recently completed line, without its line ending.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Banner sent by the server when the connection was accepted.
    pub fn banner(&self) -> &str {
        &self.banner
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(message = "error closing connection", peer = %self.peer, error = %e);
        }
    }
}

impl<S> LineSource for LineSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn next_line(&mut self, idle: Duration) -> impl Future<Output = Result<bool, SessionError>> {
        self.read_line(idle)
    }

    fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.line)
    }
}
