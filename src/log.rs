//! File-backed logging for marshal.
//!
//! Every invocation truncates `~/.marshal/marshal.log` and appends one line
//! per event, so the file always reads as the trace of the latest session.
//! Three levels are enough here: WARN for degraded paths (failed
//! provisioning, dangling workspaces), INFO for operations (dispatch,
//! collection, snapshots), DEBUG for traces. Debug lines are dropped unless
//! enabled via `--debug` or `MARSHAL_DEBUG=1`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Info,
    Debug,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

fn env_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Initialize logging, truncating any previous log file.
///
/// Debug mode is on when either the flag or `MARSHAL_DEBUG` says so.
/// Failures to set up the file are swallowed; marshal runs unlogged
/// rather than not at all.
pub fn init_with_debug(debug: bool) {
    let env_debug = std::env::var("MARSHAL_DEBUG")
        .map(|v| env_truthy(&v))
        .unwrap_or(false);
    DEBUG.store(debug || env_debug, Ordering::SeqCst);

    if let Some(dir) = dirs::home_dir().map(|home| home.join(".marshal")) {
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("marshal.log");
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

/// Append one log line. No-op before `init_with_debug`, and for DEBUG
/// lines when debug mode is off.
pub fn write(level: Level, msg: &str) {
    if level == Level::Debug && !DEBUG.load(Ordering::Relaxed) {
        return;
    }
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let stamp = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(file, "[{}] [{}] {}", stamp, level.tag(), msg);
    }
}

/// Log at INFO level.
#[macro_export]
macro_rules! mlog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Info, &format!($($arg)*))
    };
}

/// Log at WARN level.
#[macro_export]
macro_rules! mlog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Warn, &format!($($arg)*))
    };
}

/// Log at DEBUG level. Dropped unless debug mode is on.
#[macro_export]
macro_rules! mlog_debug {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::Level::Debug, &format!($($arg)*))
    };
}
