//! Session logger for hosts embedding the tile surface.
//!
//! All crate diagnostics go through `tracing`.  [`init`] installs a
//! `tracing-subscriber` that writes to a single file in the OS data
//! directory, **truncated at each launch** so it only ever holds the most
//! recent session.  Hosts with their own subscriber simply skip `init`.
//!
//! Log location:
//!   Windows:  `%APPDATA%\TileSurface\tilesurface.log`
//!   Linux:    `~/.local/share/TileSurface/tilesurface.log`
//!   macOS:    `~/Library/Application Support/TileSurface/tilesurface.log`
//!
//! Inside the crate use the `log_info!` / `log_warn!` / `log_err!` macros.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use tracing_subscriber::EnvFilter;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Returns the path to the current session log file.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::__tracing::error!($($arg)*)
    };
}

/// Initialise the session logger.  Call once, before any surface is built.
///
/// * Creates (or truncates) the log file.
/// * Installs a global `tracing` subscriber writing to it.  The level comes
///   from `RUST_LOG`, defaulting to `info`.
/// * Installs a panic hook that logs the panic before running the previous
///   handler.
pub fn init() {
    let path = log_file_path();

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(f) => f,
        Err(e) => {
            // Not fatal, the host just runs without a session log.
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    };

    let installed = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_env_filter(env_filter())
        .try_init();
    if let Err(e) = installed {
        eprintln!("[logger] A global subscriber is already set: {}", e);
        return;
    }
    let _ = LOG_PATH.set(path.clone());

    log_info!("=== TileSurface session started ===");
    log_info!("Log file: {}", path.display());

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_err!("PANIC: {}", info);
        prev(info);
    }));
}

/// Route logs to the test harness' captured output.  Safe to call from
/// every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(env_filter())
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn log_file_path() -> PathBuf {
    data_dir().join("TileSurface").join("tilesurface.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_lives_under_the_app_folder() {
        let path = log_file_path();
        assert!(path.ends_with("TileSurface/tilesurface.log"));
    }

    #[test]
    fn macros_accept_format_args() {
        init_for_tests();
        log_info!("tiles: {}", 3);
        log_warn!("offset {:?}", (1, 2));
        log_err!("plain message");
    }
}
