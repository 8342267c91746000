use std::path::Path;

use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Console logging through `env_logger`, filtered by `RUST_LOG`.
pub fn init_logger() {
    env_logger::try_init().ok();
}

/// JSON logs to a daily rolling file instead of the console.
///
/// `log` records are forwarded into the tracing subscriber, so library
/// messages end up in the file too.
pub fn init_tracing_to_file(path: &Path) {
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map_or_else(|| "chatmgr.log".into(), |n| n.to_string_lossy().into_owned());

    let file_appender = RollingFileAppender::new(Rotation::DAILY, directory, file_name);
    tracing_subscriber::fmt()
        .with_writer(file_appender)
        .with_max_level(Level::DEBUG)
        .json()
        .try_init()
        .ok();
}
