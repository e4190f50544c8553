//! Command line and environment configuration.
//!
//! ```bash
//! PORT=9000 servedir            # bind exactly 9000, fail if taken
//! servedir                      # first free port from 8000 on
//! servedir --root dist --log-file access.log
//! ```

use std::env;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::port::{DEFAULT_SEARCH_LIMIT, DEFAULT_START_PORT, NoFreePortError, find_free_port};

#[derive(Debug, Clone, Parser)]
#[command(name = "servedir")]
#[command(about = "Serve a directory over plain HTTP for local development")]
#[command(version)]
pub struct Config {
    /// Port to bind; 0 or empty searches for a free one
    #[arg(short, long, default_value = "0", env = "PORT", value_parser = parse_port)]
    pub port: u16,

    /// First port tried when searching
    #[arg(long = "start-port", default_value_t = DEFAULT_START_PORT)]
    pub start_port: u16,

    /// How many consecutive ports to try
    #[arg(
        long = "search-limit",
        default_value_t = DEFAULT_SEARCH_LIMIT,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub search_limit: u16,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Directory to serve (defaults to the current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Append access logs to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

fn parse_port(value: &str) -> Result<u16, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| format!("`{value}` is not a valid port number"))
}

impl Config {
    pub fn new() -> Self {
        Self::parse()
    }

    /// An explicit port is used as is, without probing. Otherwise the first
    /// free port of the search range is returned.
    pub fn resolve_port(&self) -> Result<u16, NoFreePortError> {
        if self.port != 0 {
            return Ok(self.port);
        }
        find_free_port(self.start_port, self.search_limit)
    }

    pub fn address(&self, port: u16) -> SocketAddr {
        SocketAddr::new(self.host, port)
    }

    pub fn root_dir(&self) -> io::Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => env::current_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 0,
            start_port: DEFAULT_START_PORT,
            search_limit: DEFAULT_SEARCH_LIMIT,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            root: None,
            log_file: None,
        }
    }
}
