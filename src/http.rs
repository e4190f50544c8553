use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, Read, Write};
use std::str::FromStr;

use jiff::Timestamp;
use jiff::fmt::strtime;
use jiff::tz::TimeZone;

/// Value of the `Server` header.
pub const SERVER_NAME: &str = concat!("servedir/", env!("CARGO_PKG_VERSION"));

/// Longest accepted request or header line, terminator included.
pub const MAX_LINE_LENGTH: usize = 65536;

/// Most header lines accepted in one request.
pub const MAX_HEADERS: usize = 100;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats `ts` as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(ts: Timestamp) -> String {
    ts.strftime(HTTP_DATE_FORMAT).to_string()
}

/// Parses an IMF-fixdate; anything else yields `None`.
pub fn parse_http_date(value: &str) -> Option<Timestamp> {
    let tm = strtime::parse(HTTP_DATE_FORMAT, value.trim()).ok()?;
    let zoned = tm.to_datetime().ok()?.to_zoned(TimeZone::UTC).ok()?;
    Some(zoned.timestamp())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    HTTP1_0,
    HTTP1_1,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = match self {
            Self::HTTP1_0 => "HTTP/1.0",
            Self::HTTP1_1 => "HTTP/1.1",
        };
        write!(f, "{version}")
    }
}

impl FromStr for HttpVersion {
    type Err = ParseRequestError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP/1.0" => Ok(Self::HTTP1_0),
            "HTTP/1.1" => Ok(Self::HTTP1_1),
            _ if s.starts_with("HTTP/") => Err(ParseRequestError::UnsupportedHttpVersion),
            _ => Err(ParseRequestError::MalformedRequest(format!(
                "Bad request version: {s}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    /// Syntactically valid but not served; answered with 501.
    Other(String),
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Head => f.write_str("HEAD"),
            Self::Other(method) => f.write_str(method),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            _ if !s.is_empty() && s.bytes().all(|b| b.is_ascii_uppercase()) => {
                Ok(Self::Other(s.to_string()))
            }
            _ => Err(ParseRequestError::InvalidMethod),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok,
    MovedPermanently,
    NotModified,
    BadRequest,
    Forbidden,
    NotFound,
    UriTooLong,
    RequestHeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
    HttpVersionNotSupported,
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_text = match self {
            Self::Ok => "OK",
            Self::MovedPermanently => "Moved Permanently",
            Self::NotModified => "Not Modified",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::UriTooLong => "URI Too Long",
            Self::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            Self::InternalServerError => "Internal Server Error",
            Self::NotImplemented => "Not Implemented",
            Self::HttpVersionNotSupported => "HTTP Version Not Supported",
        };
        write!(f, "{status_text}")
    }
}

impl From<ParseRequestError> for HttpStatus {
    fn from(error: ParseRequestError) -> Self {
        match error {
            ParseRequestError::UnsupportedHttpVersion => Self::HttpVersionNotSupported,
            ParseRequestError::MalformedRequest(_) | ParseRequestError::InvalidMethod => {
                Self::BadRequest
            }
            ParseRequestError::RequestLineTooLong => Self::UriTooLong,
            ParseRequestError::HeaderTooLong | ParseRequestError::TooManyHeaders => {
                Self::RequestHeaderFieldsTooLarge
            }
            ParseRequestError::IoError(_) => Self::InternalServerError,
        }
    }
}

impl HttpStatus {
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::MovedPermanently => 301,
            Self::NotModified => 304,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::UriTooLong => 414,
            Self::RequestHeaderFieldsTooLarge => 431,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::HttpVersionNotSupported => 505,
        }
    }
}

/// HTTP headers defined as a type alias to `HashMap<String, String>`
pub type HttpHeaders = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub uri: String,
    pub version: HttpVersion,
    pub headers: HttpHeaders,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>, version: HttpVersion) -> Self {
        Self {
            method,
            uri: uri.into(),
            version,
            headers: HttpHeaders::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field_name, _)| field_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Reads the request line and headers. `Ok(None)` means the peer sent nothing.
    ///
    /// Lines are capped at [`MAX_LINE_LENGTH`] bytes and must be valid UTF-8.
    pub fn from_reader<R: BufRead>(mut reader: R) -> Result<Option<Self>, ParseRequestError> {
        let request_line = match read_line(&mut reader) {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(None),
            Err(LineError::TooLong) => return Err(ParseRequestError::RequestLineTooLong),
            Err(LineError::Parse(err)) => return Err(err),
        };

        let [method_str, target, version_str] = request_line
            .split_whitespace()
            .collect::<Vec<&str>>()
            .try_into()
            .map_err(|_| {
                ParseRequestError::MalformedRequest(format!(
                    "Malformed request line: {request_line}"
                ))
            })?;

        let version = version_str.parse()?;
        let method = method_str.parse()?;
        let headers = Self::parse_headers(&mut reader)?;

        Ok(Some(Self {
            method,
            uri: target.to_string(),
            version,
            headers,
        }))
    }

    fn parse_headers<R: BufRead>(reader: &mut R) -> Result<HttpHeaders, ParseRequestError> {
        let mut headers = HttpHeaders::new();

        loop {
            let line = match read_line(reader) {
                Ok(Some(line)) => line,
                // end of stream also ends the headers
                Ok(None) => break,
                Err(LineError::TooLong) => return Err(ParseRequestError::HeaderTooLong),
                Err(LineError::Parse(err)) => return Err(err),
            };

            // end of headers
            if line.is_empty() {
                break;
            }

            if headers.len() == MAX_HEADERS {
                return Err(ParseRequestError::TooManyHeaders);
            }

            let (field_name, field_value) = line
                .split_once(':')
                .map(|(f1, f2)| (f1.trim(), f2.trim()))
                .filter(|(f1, _)| !f1.is_empty())
                .ok_or_else(|| {
                    ParseRequestError::MalformedRequest(format!("Malformed header: {line}"))
                })?;

            headers.insert(field_name.to_owned(), field_value.to_owned());
        }

        Ok(headers)
    }

    /// `METHOD URI VERSION`, as it appears in access logs.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.uri, self.version)
    }
}

enum LineError {
    TooLong,
    Parse(ParseRequestError),
}

impl From<io::Error> for LineError {
    fn from(error: io::Error) -> Self {
        Self::Parse(error.into())
    }
}

/// One CRLF- or LF-terminated line without its terminator; `None` at end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, LineError> {
    let mut buf = Vec::new();
    let limit = MAX_LINE_LENGTH as u64 + 1;
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;

    if read == 0 {
        return Ok(None);
    }
    if buf.len() > MAX_LINE_LENGTH {
        return Err(LineError::TooLong);
    }

    if buf.ends_with(b"\n") {
        buf.pop();
        if buf.ends_with(b"\r") {
            buf.pop();
        }
    }

    String::from_utf8(buf).map(Some).map_err(|_| {
        LineError::Parse(ParseRequestError::MalformedRequest(
            "Request is not valid UTF-8".to_string(),
        ))
    })
}

#[derive(Debug)]
pub enum ParseRequestError {
    UnsupportedHttpVersion,
    MalformedRequest(String),
    InvalidMethod,
    RequestLineTooLong,
    HeaderTooLong,
    TooManyHeaders,
    IoError(io::Error),
}

impl Error for ParseRequestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for ParseRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedHttpVersion => f.write_str("Unsupported HTTP version"),
            Self::MalformedRequest(msg) => write!(f, "Malformed request: {msg}"),
            Self::InvalidMethod => f.write_str("Invalid method"),
            Self::RequestLineTooLong => f.write_str("Request line too long"),
            Self::HeaderTooLong => f.write_str("Header line too long"),
            Self::TooManyHeaders => f.write_str("Too many headers"),
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<io::Error> for ParseRequestError {
    fn from(error: io::Error) -> Self {
        Self::IoError(error)
    }
}

/// Response payload. Files are copied to the socket as they are read.
#[derive(Debug)]
pub enum Body {
    Bytes(Vec<u8>),
    File { file: File, len: u64 },
}

impl Body {
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Self::Bytes(bytes) => writer.write_all(bytes),
            Self::File { file, len } => {
                let mut reader = file.take(*len);
                io::copy(&mut reader, writer).map(|_| ())
            }
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// Always written as HTTP/1.0; the connection closes after it.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: HttpStatus,
    pub headers: HttpHeaders,
    pub body: Option<Body>,
}

impl HttpResponse {
    pub fn new(status: HttpStatus, headers: Option<HttpHeaders>, body: Option<Body>) -> Self {
        let mut headers = headers.unwrap_or_default();

        headers
            .entry("Server".to_string())
            .or_insert_with(|| SERVER_NAME.to_string());
        headers
            .entry("Date".to_string())
            .or_insert_with(|| http_date(Timestamp::now()));

        if let Some(ref body) = body {
            headers
                .entry("Content-Length".to_string())
                .or_insert_with(|| body.len().to_string());
            headers
                .entry("Content-Type".to_string())
                .or_insert_with(|| "text/plain".to_string());
        }

        Self {
            status,
            headers,
            body,
        }
    }

    /// A small HTML page describing `status`.
    pub fn error(status: HttpStatus) -> Self {
        let body = format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{code} {status}</title></head>\n\
             <body><h1>{code} {status}</h1></body>\n</html>\n",
            code = status.code(),
        );
        let mut headers = HttpHeaders::new();
        headers.insert(
            "Content-Type".to_string(),
            "text/html; charset=utf-8".to_string(),
        );

        Self::new(status, Some(headers), Some(body.into_bytes().into()))
    }

    /// Drops the body but keeps every header, `Content-Length` included.
    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field_name, _)| field_name.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_len(&self) -> u64 {
        self.body.as_ref().map_or(0, Body::len)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write!(writer, "{self}")?;
        if let Some(body) = &self.body {
            body.write_to(&mut writer)?;
        }
        writer.flush()
    }
}

/// Status line and headers, terminated by the empty line.
impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // status line
        write!(
            f,
            "{} {} {}\r\n",
            HttpVersion::HTTP1_0,
            self.status.code(),
            self.status
        )?;

        for (field_name, field_value) in &self.headers {
            write!(f, "{field_name}: {field_value}\r\n")?;
        }
        write!(f, "Connection: close\r\n")?;

        // empty line
        write!(f, "\r\n")
    }
}
