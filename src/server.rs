use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::ServeError;
use crate::files::StaticFiles;
use crate::http::{HttpRequest, HttpResponse, HttpStatus};
use crate::logger::Logger;

/// Read/write timeout applied to every accepted connection.
pub const IO_TIMEOUT: Duration = Duration::from_secs(10);

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Line printed once the socket is bound.
pub fn serving_message(addr: SocketAddr) -> String {
    format!(
        "Serving HTTP on {ip} port {port} (http://{addr}/) ...",
        ip = addr.ip(),
        port = addr.port()
    )
}

/// Stops a running [`HttpFileServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Idempotent. The accept loop exits before handling another request.
    pub fn shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            return;
        }
        // unblock accept(); the connection itself is discarded
        let _ = TcpStream::connect_timeout(&self.wake_addr, WAKE_TIMEOUT);
    }

    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

pub struct HttpFileServer<T: Logger> {
    listener: TcpListener,
    local_addr: SocketAddr,
    responder: StaticFiles,
    logger: T,
    shutdown: Arc<AtomicBool>,
}

impl<T: Logger> HttpFileServer<T> {
    /// Binds the listening socket. The bind result is final: no other port is tried.
    pub fn bind(addr: SocketAddr, responder: StaticFiles, logger: T) -> Result<Self, ServeError> {
        let listener = TcpListener::bind(addr).map_err(|source| ServeError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            responder,
            logger,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        let wake_ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };

        ShutdownHandle {
            requested: Arc::clone(&self.shutdown),
            wake_addr: SocketAddr::new(wake_ip, self.local_addr.port()),
        }
    }

    /// Accepts connections one at a time until a shutdown is requested.
    ///
    /// The loop only stops through a [`ShutdownHandle`]. The `servedir` binary
    /// never takes one and runs until the process is killed; the handle is for
    /// embedders and tests.
    pub fn run(&self) {
        for stream in self.listener.incoming() {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => self.handle_connection(&stream),
                Err(err) => self.log_error(&format!("Failed to accept connection: {err}")),
            }
        }
    }

    fn handle_connection(&self, stream: &TcpStream) {
        let peer_addr = stream
            .peer_addr()
            .map_or("unknown".to_string(), |addr| addr.ip().to_string());

        if let Err(err) = stream
            .set_read_timeout(Some(IO_TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(IO_TIMEOUT)))
        {
            self.log_error(&format!("Failed to set timeouts for {peer_addr}: {err}"));
        }

        let request = match HttpRequest::from_reader(BufReader::new(stream)) {
            Ok(Some(request)) => request,
            Ok(None) => return,
            Err(e) => {
                self.log_error(&format!("Bad request from {peer_addr}: {e}"));
                let status: HttpStatus = e.into();
                return self.send_response(stream, &HttpResponse::error(status));
            }
        };

        let response = self.responder.respond(&request);

        self.send_response(stream, &response);

        let _ = self
            .logger
            .write_request_log(&request, &response, &peer_addr)
            .inspect_err(|e| eprintln!("Failed to write request log: {e}"));
    }

    fn send_response(&self, stream: &TcpStream, response: &HttpResponse) {
        if let Err(err) = response.write_to(stream) {
            self.log_error(&format!("Failed to send response: {err}"));
        }
    }

    fn log_error(&self, message: &str) {
        let _ = self
            .logger
            .log_error(message)
            .inspect_err(|e| eprintln!("Failed to write error log: {e}"));
    }
}
