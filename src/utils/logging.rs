use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Discard,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// `""` discards output, `stdout` and `stderr` name the standard
    /// streams, anything else is a file path.
    pub fn parse(path: &str) -> Self {
        match path.trim() {
            "" => LogTarget::Discard,
            "stdout" => LogTarget::Stdout,
            "stderr" => LogTarget::Stderr,
            file => LogTarget::File(PathBuf::from(file)),
        }
    }

    /// Files are created if missing and always appended to.
    pub fn make_writer(&self) -> io::Result<BoxMakeWriter> {
        Ok(match self {
            LogTarget::Discard => BoxMakeWriter::new(io::sink),
            LogTarget::Stdout => BoxMakeWriter::new(io::stdout),
            LogTarget::Stderr => BoxMakeWriter::new(io::stderr),
            LogTarget::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                BoxMakeWriter::new(Arc::new(file))
            }
        })
    }
}

/// Initialize tracing/logging for the application.
///
/// Accepts the level names used in configuration files. `silent` and `off`
/// disable output entirely; unknown names fall back to `info`. Fails only
/// if a log file cannot be opened.
pub fn init(level: &str, path: &str) -> io::Result<()> {
    let lvl = parse_level(level);
    let writer = LogTarget::parse(path).make_writer()?;

    // Use try_init so tests and libraries can call this multiple times without panicking
    let _ = tracing_subscriber::fmt()
        .with_max_level(lvl)
        .with_target(false)
        .with_writer(writer)
        .try_init();
    Ok(())
}

pub(crate) fn parse_level(name: &str) -> LevelFilter {
    match name.trim().to_lowercase().as_str() {
        "silent" | "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}
