use std::path::Path;
use std::process::Command;

use tracing::{info, warn};

use super::venv;
use crate::error::AppError;

/// Oldest matplotlib whose `subplots`/`bar_label` API the templates rely on.
pub const MIN_MATPLOTLIB_VERSION: &str = "3.4";

const PLOTTING_PACKAGES: &[&str] = &["matplotlib", "numpy"];

/// Install the plotting stack into the managed venv.
pub fn install_plotting_stack(venv_dir: &Path) -> Result<(), AppError> {
    let python = venv::get_venv_python(venv_dir);

    let pip_upgrade = Command::new(&python)
        .args(["-m", "pip", "install", "--upgrade", "pip"])
        .output()?;
    if !pip_upgrade.status.success() {
        // pip itself still works; keep going
        warn!(
            stderr = %String::from_utf8_lossy(&pip_upgrade.stderr),
            "pip upgrade failed"
        );
    }

    info!(packages = ?PLOTTING_PACKAGES, "installing plotting stack");
    let output = Command::new(venv::get_venv_pip(venv_dir))
        .arg("install")
        .args(PLOTTING_PACKAGES)
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::Execution(format!(
            "Failed to install {}: {}",
            PLOTTING_PACKAGES.join(" "),
            stderr
        )));
    }

    Ok(())
}

fn version_probe(module: &str) -> String {
    format!(
        "import {m}; print(getattr({m}, '__version__', '0'))",
        m = module
    )
}

pub fn is_package_installed(python: &Path, module: &str) -> bool {
    Command::new(python)
        .args(["-c", &version_probe(module)])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn detect_package_version(python: &Path, module: &str) -> Option<String> {
    let output = Command::new(python)
        .args(["-c", &version_probe(module)])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// Parse "3.8.2" → (3, 8, 2). Returns None if unparseable.
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let major = parts[0].parse().ok()?;
    let minor = parts[1].parse().ok()?;
    // "3.9.0rc1" → patch 0
    let patch = parts
        .get(2)
        .and_then(|p| {
            let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(0);
    Some((major, minor, patch))
}

/// Check if `installed` >= `required`.
pub fn version_gte(installed: &str, required: &str) -> bool {
    match (parse_version(installed), parse_version(required)) {
        (Some(i), Some(r)) => i >= r,
        _ => true, // if can't parse, assume compatible
    }
}
