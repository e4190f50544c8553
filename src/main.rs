use std::process::ExitCode;
use std::sync::Arc;

use servedir::{
    Config, ExtensionTable, FileLogger, HttpFileServer, Logger, ServeError, StaticFiles,
    StderrLogger, serving_message,
};

fn run(config: &Config) -> Result<(), ServeError> {
    let port = config.resolve_port()?;
    let responder = StaticFiles::new(config.root_dir()?, Arc::new(ExtensionTable::dev_server()));

    let logger: Box<dyn Logger> = match &config.log_file {
        Some(path) => Box::new(FileLogger::new(path)?),
        None => Box::new(StderrLogger),
    };

    let server = HttpFileServer::bind(config.address(port), responder, logger)?;
    println!("{}", serving_message(server.local_addr()));

    server.run();

    Ok(())
}

fn main() -> ExitCode {
    let config = Config::new();

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("servedir: {err}");
            ExitCode::FAILURE
        }
    }
}
