use std::error::Error;
use std::fmt;
use std::io;
use std::net::SocketAddr;

use crate::port::NoFreePortError;

/// Fatal startup errors. Per-request failures never end up here.
#[derive(Debug)]
pub enum ServeError {
    NoFreePort(NoFreePortError),
    Bind { addr: SocketAddr, source: io::Error },
    Io(io::Error),
}

impl Error for ServeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoFreePort(err) => Some(err),
            Self::Bind { source, .. } => Some(source),
            Self::Io(err) => Some(err),
        }
    }
}

impl fmt::Display for ServeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFreePort(err) => write!(f, "{err}"),
            Self::Bind { addr, source } => write!(f, "Failed to bind {addr}: {source}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<NoFreePortError> for ServeError {
    fn from(error: NoFreePortError) -> Self {
        Self::NoFreePort(error)
    }
}

impl From<io::Error> for ServeError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn bind_error_names_the_address() {
        let err = ServeError::Bind {
            addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 9000)),
            source: io::ErrorKind::AddrInUse.into(),
        };

        assert!(err.to_string().starts_with("Failed to bind 0.0.0.0:9000: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn exhaustion_keeps_range() {
        let err: ServeError = NoFreePortError {
            start: 8000,
            limit: 50,
        }
        .into();

        assert_eq!(err.to_string(), "No free port found in range 8000-8049");
    }
}
