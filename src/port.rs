use std::error::Error;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

pub const DEFAULT_START_PORT: u16 = 8000;
pub const DEFAULT_SEARCH_LIMIT: u16 = 50;

/// How long a single probe waits for a connection before the port counts as free.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Returned when every candidate in the searched range is occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoFreePortError {
    pub start: u16,
    pub limit: u16,
}

impl NoFreePortError {
    /// Last port that was part of the search, if any was searched at all.
    pub fn last(&self) -> Option<u16> {
        let end = u32::from(self.start) + u32::from(self.limit);
        if self.limit == 0 {
            None
        } else {
            Some(u16::try_from(end - 1).unwrap_or(u16::MAX))
        }
    }
}

impl Error for NoFreePortError {}

impl fmt::Display for NoFreePortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last() {
            Some(last) => write!(f, "No free port found in range {}-{}", self.start, last),
            None => write!(f, "No free port found: empty search range at {}", self.start),
        }
    }
}

/// Returns `true` if something accepts connections on `port`.
pub fn probe_port(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    TcpStream::connect_timeout(&addr, PROBE_TIMEOUT).is_ok()
}

/// Finds the lowest port in `[start, start + limit)` that nobody is listening on.
///
/// This is a best-effort check: nothing is reserved, so another process may
/// grab the port before the caller binds it. The bind is what decides.
pub fn find_free_port(start: u16, limit: u16) -> Result<u16, NoFreePortError> {
    let end = (u32::from(start) + u32::from(limit)).min(u32::from(u16::MAX) + 1);

    (u32::from(start)..end)
        .filter_map(|candidate| u16::try_from(candidate).ok())
        .find(|&candidate| !probe_port(candidate))
        .ok_or(NoFreePortError { start, limit })
}
