//! Platform-specific directory resolution.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application name used for every per-user directory.
pub const APP_NAME: &str = "framecap";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Returns the directory holding `config.json`.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_CONFIG_HOME/framecap` or `~/.config/framecap` |
/// | macOS | `~/Library/Application Support/framecap` |
/// | Windows | `%APPDATA%\framecap\config` |
///
/// Returns `None` when no home directory can be determined.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the full path of the configuration file.
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.json"))
}

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/framecap/logs` or `~/.local/state/framecap/logs` |
/// | macOS | `~/Library/Logs/framecap` |
/// | Windows | `%LOCALAPPDATA%\framecap\logs` |
///
/// Falls back to a directory under the system temp dir when no home
/// directory can be determined.
pub fn log_dir() -> PathBuf {
    let Some(base) = project_dirs() else {
        return std::env::temp_dir().join(APP_NAME).join("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .unwrap_or_else(|| base.data_local_dir())
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/framecap, two levels
        // below ~/Library.
        base.data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|library| library.join("Logs").join(APP_NAME))
            .unwrap_or_else(|| base.data_local_dir().join("logs"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_ends_with_app_component() {
        let dir = log_dir();
        let rendered = dir.to_string_lossy().to_lowercase();
        assert!(rendered.contains(APP_NAME), "unexpected log dir: {:?}", dir);
    }

    #[test]
    fn test_config_file_is_json_in_config_dir() {
        if let (Some(dir), Some(file)) = (config_dir(), config_file()) {
            assert_eq!(file.parent(), Some(dir.as_path()));
            assert_eq!(file.extension().and_then(|e| e.to_str()), Some("json"));
        }
    }
}
