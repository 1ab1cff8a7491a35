use crate::validate::{validate, PathKind};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Initialize the global logger.
///
/// `RUST_LOG` wins over `level`. With a `log_dir`, output goes to a fresh
/// `salvage_<unix>.log` inside it; an invalid or unwritable directory falls back to
/// stderr. Returns the log file in use, if any.
pub fn init(log_dir: Option<&Path>, level: log::LevelFilter) -> Option<PathBuf> {
    use env_logger::{Builder, Env, Target};

    let opened = log_dir.and_then(|dir| match open_log_file(dir) {
        Ok(opened) => Some(opened),
        Err(reason) => {
            eprintln!("salvage: logging to stderr ({})", reason);
            None
        }
    });

    let (target, log_file) = match opened {
        Some((file, path)) => (Target::Pipe(Box::new(file)), Some(path)),
        None => (Target::Stderr, None),
    };

    let default_filter = level.to_string().to_ascii_lowercase();
    let result = Builder::from_env(Env::default().default_filter_or(default_filter))
        .target(target)
        .try_init();
    if result.is_err() {
        // Already initialized (tests, or an embedding caller).
        return None;
    }
    if let Some(path) = &log_file {
        log::info!("logging to {}", path.display());
    }
    log_file
}

fn open_log_file(dir: &Path) -> Result<(std::fs::File, PathBuf), String> {
    let dir_str = dir.to_string_lossy();
    validate(&dir_str, PathKind::Log).map_err(|e| e.to_string())?;
    std::fs::create_dir_all(dir).map_err(|e| format!("{}: {}", dir.display(), e))?;
    let path = dir.join(log_file_name(unix_now_secs()));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok((file, path))
}

fn log_file_name(unix_secs: u64) -> String {
    format!("salvage_{}.log", unix_secs)
}

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_file_is_created_in_valid_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");
        let (_file, path) = open_log_file(&logs).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&logs));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("salvage_") && name.ends_with(".log"));
    }

    #[test]
    fn suspicious_log_directory_is_refused() {
        let err = open_log_file(Path::new("/tmp/logs;rm")).unwrap_err();
        assert!(err.contains("shell metacharacter"));
        let err = open_log_file(Path::new("/tmp/../etc")).unwrap_err();
        assert!(err.contains("path traversal"));
    }

    #[test]
    fn file_name_uses_timestamp() {
        assert_eq!(log_file_name(1_700_000_000), "salvage_1700000000.log");
    }
}
