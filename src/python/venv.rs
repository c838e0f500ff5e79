use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::info;

use crate::error::AppError;

/// Managed venv location under the user's data directory.
pub fn get_venv_dir() -> Result<PathBuf, AppError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::ConfigError("Cannot find app data directory".into()))?;
    Ok(data_dir.join("chartgen-studio").join("venv"))
}

pub fn venv_exists(venv_dir: &Path) -> bool {
    get_venv_python(venv_dir).exists()
}

pub fn get_venv_python(venv_dir: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        venv_dir.join("Scripts").join("python.exe")
    } else {
        venv_dir.join("bin").join("python")
    }
}

pub fn get_venv_pip(venv_dir: &Path) -> PathBuf {
    if cfg!(target_os = "windows") {
        venv_dir.join("Scripts").join("pip.exe")
    } else {
        venv_dir.join("bin").join("pip")
    }
}

/// Create a venv at `venv_dir` using `python_path`.
pub fn create_venv(python_path: &Path, venv_dir: &Path) -> Result<(), AppError> {
    if let Some(parent) = venv_dir.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(venv = %venv_dir.display(), python = %python_path.display(), "creating venv");
    let output = Command::new(python_path)
        .args(["-m", "venv"])
        .arg(venv_dir)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Execution(format!("Failed to create venv: {}", stderr)));
    }

    Ok(())
}
