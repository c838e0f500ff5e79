use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use super::venv;
use crate::config::AppConfig;
use crate::error::AppError;

/// A Python installation found on the system.
#[derive(Debug, Clone)]
pub struct PythonInfo {
    pub path: PathBuf,
    pub version: String,
}

/// Find the first Python 3.8+ among the platform's usual launcher names.
pub fn detect_python() -> Result<PythonInfo, AppError> {
    for candidate in candidates() {
        match probe(candidate) {
            Ok(info) if is_version_compatible(&info.version) => {
                debug!(candidate, version = %info.version, path = %info.path.display(), "python found");
                return Ok(info);
            }
            Ok(info) => debug!(candidate, version = %info.version, "python too old"),
            Err(_) => debug!(candidate, "python candidate unavailable"),
        }
    }
    Err(AppError::PythonNotFound)
}

/// Interpreter to run charts with: the configured path, then the managed
/// venv, then whatever `detect_python` finds.
pub fn resolve_interpreter(config: &AppConfig) -> Result<PathBuf, AppError> {
    if let Some(path) = &config.python_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(AppError::ConfigError(format!(
            "configured python_path {} does not exist",
            path.display()
        )));
    }

    if let Ok(venv_dir) = venv::get_venv_dir() {
        if venv::venv_exists(&venv_dir) {
            return Ok(venv::get_venv_python(&venv_dir));
        }
    }

    detect_python().map(|info| info.path)
}

fn candidates() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["py", "python", "python3"]
    } else {
        &["python3", "python"]
    }
}

fn launcher_args(candidate: &str) -> Vec<&'static str> {
    if cfg!(target_os = "windows") && candidate == "py" {
        vec!["-3"]
    } else {
        Vec::new()
    }
}

fn probe(candidate: &str) -> Result<PythonInfo, AppError> {
    let output = Command::new(candidate)
        .args(launcher_args(candidate))
        .args([
            "-c",
            "import sys, platform; print(platform.python_version()); print(sys.executable)",
        ])
        .output()
        .map_err(|_| AppError::PythonNotFound)?;

    if !output.status.success() {
        return Err(AppError::PythonNotFound);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines().map(str::trim);
    let version = lines.next().unwrap_or_default().to_string();
    let path = lines.next().filter(|p| !p.is_empty()).unwrap_or(candidate);

    Ok(PythonInfo {
        path: PathBuf::from(path),
        version,
    })
}

/// "3.11.5" is compatible, "3.7.9" and "2.7.18" are not.
pub fn is_version_compatible(version: &str) -> bool {
    let mut parts = version.split('.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    major == 3 && minor >= 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_compatibility() {
        assert!(is_version_compatible("3.8.0"));
        assert!(is_version_compatible("3.12.1"));
        assert!(!is_version_compatible("3.7.9"));
        assert!(!is_version_compatible("2.7.18"));
        assert!(!is_version_compatible("garbage"));
    }

    #[test]
    fn test_configured_path_must_exist() {
        let config = AppConfig {
            python_path: Some(PathBuf::from("/nonexistent/chartgen/python")),
            ..AppConfig::default()
        };
        assert!(matches!(
            resolve_interpreter(&config),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_configured_path_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = AppConfig {
            python_path: Some(file.path().to_path_buf()),
            ..AppConfig::default()
        };
        assert_eq!(resolve_interpreter(&config).unwrap(), file.path().to_path_buf());
    }

    #[test]
    fn test_detected_python_reports_version() {
        let Ok(info) = detect_python() else {
            eprintln!("skipping: no python interpreter found");
            return;
        };
        assert!(is_version_compatible(&info.version));
        assert!(!info.path.as_os_str().is_empty());
    }
}
