use std::error::Error;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use jiff::Zoned;

use crate::http::{HttpRequest, HttpResponse};

enum LogFormat {
    Combined,
}

#[allow(clippy::too_many_arguments)]
impl LogFormat {
    fn format(
        &self,
        remote_addr: &str,
        remote_user: &str,
        time_local: &str,
        request_line: &str,
        status: u16,
        body_bytes_sent: u64,
        referer: &str,
        user_agent: &str,
    ) -> String {
        match self {
            Self::Combined => format!(
                "{remote_addr} - {remote_user} [{time_local}] \"{request_line}\" {status} {body_bytes_sent} \"{referer}\" \"{user_agent}\"",
            ),
        }
    }
}

fn time_local() -> String {
    Zoned::now().strftime("%d/%b/%Y:%H:%M:%S %z").to_string()
}

// logs conform to the same format as Nginxs standard combined logs
fn combined_line(request: &HttpRequest, response: &HttpResponse, remote_addr: &str) -> String {
    LogFormat::Combined.format(
        remote_addr,
        "-",
        &time_local(),
        &request.request_line(),
        response.status.code(),
        response.body_len(),
        request.header("Referer").unwrap_or("-"),
        request.header("User-Agent").unwrap_or("-"),
    ) + "\n"
}

fn error_line(message: &str) -> String {
    format!("[{}] error: {message}\n", time_local())
}

pub trait Logger: Send + Sync {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        addr: &str,
    ) -> Result<(), Box<dyn Error>>;

    /// Server-side problems that don't belong to a parsed request.
    fn log_error(&self, message: &str) -> Result<(), Box<dyn Error>>;
}

impl<L: Logger + ?Sized> Logger for Box<L> {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        addr: &str,
    ) -> Result<(), Box<dyn Error>> {
        (**self).write_request_log(request, response, addr)
    }

    fn log_error(&self, message: &str) -> Result<(), Box<dyn Error>> {
        (**self).log_error(message)
    }
}

/// Appends combined-format lines to a file.
pub struct FileLogger {
    writer: Mutex<BufWriter<File>>,
}

impl FileLogger {
    pub fn new(log_path: &Path) -> io::Result<Self> {
        let log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(log_file)),
        })
    }

    fn write_line(&self, line: &str) -> Result<(), Box<dyn Error>> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| "log writer mutex poisoned")?;
        writer.write_all(line.as_bytes())?;
        writer.flush()?;

        Ok(())
    }
}

impl Logger for FileLogger {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        remote_addr: &str,
    ) -> Result<(), Box<dyn Error>> {
        self.write_line(&combined_line(request, response, remote_addr))
    }

    fn log_error(&self, message: &str) -> Result<(), Box<dyn Error>> {
        self.write_line(&error_line(message))
    }
}

/// Writes combined-format lines to stderr.
pub struct StderrLogger;

impl Logger for StderrLogger {
    fn write_request_log(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        remote_addr: &str,
    ) -> Result<(), Box<dyn Error>> {
        io::stderr()
            .lock()
            .write_all(combined_line(request, response, remote_addr).as_bytes())?;
        Ok(())
    }

    fn log_error(&self, message: &str) -> Result<(), Box<dyn Error>> {
        io::stderr().lock().write_all(error_line(message).as_bytes())?;
        Ok(())
    }
}

/// Discards everything.
pub struct NullLogger;

impl Logger for NullLogger {
    fn write_request_log(
        &self,
        _request: &HttpRequest,
        _response: &HttpResponse,
        _remote_addr: &str,
    ) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    fn log_error(&self, _message: &str) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, HttpStatus, HttpVersion};
    use std::fs;

    #[test]
    fn combined_line_fields() {
        let request = HttpRequest::new(HttpMethod::Get, "/app.js", HttpVersion::HTTP1_1)
            .with_header("User-Agent", "curl/8.0")
            .with_header("Referer", "http://localhost/");
        let response = HttpResponse::new(HttpStatus::Ok, None, Some(b"hello".to_vec().into()));

        let line = combined_line(&request, &response, "127.0.0.1:5000");

        assert!(line.starts_with("127.0.0.1:5000 - - ["));
        assert!(line.ends_with("\"GET /app.js HTTP/1.1\" 200 5 \"http://localhost/\" \"curl/8.0\"\n"));
    }

    #[test]
    fn missing_headers_are_dashes() {
        let request = HttpRequest::new(HttpMethod::Head, "/", HttpVersion::HTTP1_0);
        let response = HttpResponse::error(HttpStatus::NotFound).without_body();

        let line = combined_line(&request, &response, "peer");
        assert!(line.ends_with("\"HEAD / HTTP/1.0\" 404 0 \"-\" \"-\"\n"));
    }

    #[test]
    fn file_logger_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let logger = FileLogger::new(&path).unwrap();

        let request = HttpRequest::new(HttpMethod::Get, "/", HttpVersion::HTTP1_0);
        let response = HttpResponse::error(HttpStatus::NotFound);
        logger.write_request_log(&request, &response, "a").unwrap();
        logger.log_error("accept failed").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"GET / HTTP/1.0\" 404"));
        assert!(lines[1].ends_with("error: accept failed"));
    }
}
