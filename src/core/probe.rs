//! TCP reachability probe.
//!
//! A probe opens a connection to the resource's `host:port` and closes it
//! immediately. Every failure is folded into `false`; the category only
//! decides the log severity.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::resource::Resource;

/// Answers whether a resource is reachable right now.
pub trait ReachabilityProbe: Send + Sync {
    /// Probe once. Must not panic or block past its own connect timeout.
    fn probe(&self, resource: &Resource) -> bool;
}

impl<F> ReachabilityProbe for F
where
    F: Fn(&Resource) -> bool + Send + Sync,
{
    fn probe(&self, resource: &Resource) -> bool {
        self(resource)
    }
}

/// Why a connection attempt failed.
#[derive(Debug)]
pub enum ProbeFailure {
    /// Name resolution failed or yielded no address.
    UnknownHost(String),
    /// The endpoint actively refused the connection.
    Refused(io::Error),
    /// No answer within the connect timeout.
    TimedOut(io::Error),
    /// Any other I/O failure.
    Io(io::Error),
}

impl ProbeFailure {
    fn from_connect(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused(err),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut(err),
            _ => Self::Io(err),
        }
    }
}

/// Probe that connects over TCP.
#[derive(Debug, Clone, Default)]
pub struct TcpProbe {
    connect_timeout: Option<Duration>,
}

impl TcpProbe {
    /// Probe using the platform's default connect timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each connection attempt by `timeout` per resolved address.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout).filter(|t| !t.is_zero());
        self
    }

    /// Configured connect timeout, if any.
    pub const fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Connect and immediately close, reporting the failure category.
    ///
    /// # Errors
    ///
    /// Returns the category of the last failed attempt.
    pub fn check(&self, host: &str, port: u16) -> Result<(), ProbeFailure> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| ProbeFailure::UnknownHost(e.to_string()))?
            .collect();
        if addrs.is_empty() {
            return Err(ProbeFailure::UnknownHost(format!("{host} resolved to no address")));
        }

        let mut last = None;
        for addr in addrs {
            let attempt = match self.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    let _ = stream.shutdown(Shutdown::Both);
                    return Ok(());
                }
                Err(e) => last = Some(ProbeFailure::from_connect(e)),
            }
        }
        Err(last.unwrap_or_else(|| ProbeFailure::UnknownHost(host.to_string())))
    }
}

impl ReachabilityProbe for TcpProbe {
    fn probe(&self, resource: &Resource) -> bool {
        match self.check(resource.host(), resource.port()) {
            Ok(()) => true,
            Err(ProbeFailure::UnknownHost(reason)) => {
                warn!(resource = %resource.name(), host = %resource.host(), %reason, "unknown host");
                false
            }
            Err(ProbeFailure::Refused(e)) => {
                debug!(resource = %resource.name(), address = %resource.address(), error = %e, "connection refused");
                false
            }
            Err(ProbeFailure::TimedOut(e)) => {
                info!(resource = %resource.name(), address = %resource.address(), error = %e, "connection timed out");
                false
            }
            Err(ProbeFailure::Io(e)) => {
                info!(resource = %resource.name(), address = %resource.address(), error = %e, "connection failed");
                false
            }
        }
    }
}
