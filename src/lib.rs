#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod logger;
pub mod mime;
pub mod port;
pub mod server;

pub use config::Config;
pub use error::ServeError;
pub use files::StaticFiles;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse, HttpStatus, HttpVersion};
pub use logger::{FileLogger, Logger, NullLogger, StderrLogger};
pub use mime::{DEFAULT_CONTENT_TYPE, ExtensionTable, Mime};
pub use port::{NoFreePortError, find_free_port};
pub use server::{HttpFileServer, ShutdownHandle, serving_message};
