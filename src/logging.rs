use log::{debug, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// The default filter is `info`; set `RUST_LOG=debug` to see every frame on the wire.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Initializes the logger for tests, capturing output per test.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}

/// Logs raw wire bytes at debug level as printable text plus a hex dump.
pub fn log_frame_hex(label: &str, data: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!(
            "{label}: {:?} [{}]",
            String::from_utf8_lossy(data),
            crate::util::hex::format_hex_compact(data)
        );
    }
}
