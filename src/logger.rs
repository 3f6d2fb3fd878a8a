use std::fs::create_dir_all;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tklog::{Format, LEVEL, LOG};

const LOG_FILE_ENV: &str = "MANUAL_VIEWER_LOG_FILE";

static LOG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
static LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);
static FILE_HANDLER_INITIALIZED: AtomicBool = AtomicBool::new(false);

fn resolve_log_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(LOG_FILE_ENV)
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }

    #[cfg(target_os = "windows")]
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return Some(
            PathBuf::from(app_data)
                .join("manual-viewer")
                .join("logs")
                .join("viewer.log"),
        );
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Some(
            PathBuf::from(home)
                .join(".manual-viewer")
                .join("logs")
                .join("viewer.log"),
        );
    }

    Some(std::env::temp_dir().join("manual-viewer.log"))
}

pub fn log_file_path() -> Option<PathBuf> {
    LOG_PATH.get_or_init(resolve_log_path).clone()
}

/// Whether `debug_log!` output reaches tklog at all.
pub fn logging_enabled() -> bool {
    LOGGING_ENABLED.load(Ordering::Relaxed)
}

pub fn enable_file_logging() -> bool {
    let Some(path) = log_file_path() else {
        eprintln!("[log] cannot enable file logging: no writable path");
        return false;
    };

    if let Some(parent) = path.parent()
        && let Err(err) = create_dir_all(parent)
    {
        eprintln!(
            "[log] failed to create log dir: {} | {}",
            parent.display(),
            err
        );
        return false;
    }

    if !FILE_HANDLER_INITIALIZED.swap(true, Ordering::Relaxed) {
        let path_string = path.to_string_lossy().to_string();
        LOG.set_cutmode_by_size(&path_string, 10 * 1024 * 1024, 5, true);
    }

    LOGGING_ENABLED.store(true, Ordering::Relaxed);
    true
}

/// Configures the global tklog instance. Output stays off unless the log
/// file variable is set or the host calls [`enable_file_logging`].
pub fn initialize() {
    LOG.set_level(LEVEL::Debug)
        .set_console(true)
        .set_format(Format::LevelFlag | Format::Date | Format::Time | Format::ShortFileName)
        .set_formatter("{level}{time} {file}:{message}\n");

    if std::env::var_os(LOG_FILE_ENV).is_some_and(|path| !path.is_empty()) {
        let _ = enable_file_logging();
    } else {
        LOGGING_ENABLED.store(false, Ordering::Relaxed);
    }
}

#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        if $crate::logger::logging_enabled() {
            tklog::debug!(format!($($arg)*));
        }
    }};
}
