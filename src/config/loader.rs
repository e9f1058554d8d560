//! Settings file loader.

use crate::config::Settings;
use crate::error::{AuditError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the global settings path: ~/.config/jobboard-audit/settings.json
pub fn get_global_settings_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| {
        AuditError::InvalidConfig("Cannot determine home directory".to_string())
    })?;

    Ok(home.join(".config/jobboard-audit").join("settings.json"))
}

/// Load the global settings file if it exists.
pub fn load_global_settings() -> Result<Option<Settings>> {
    let path = get_global_settings_path()?;
    if !path.is_file() {
        log::debug!("[Config] No global settings at {}", path.display());
        return Ok(None);
    }
    load_settings_from_file(&path).map(Some)
}

/// Load settings from a JSON file.
pub fn load_settings_from_file(path: &Path) -> Result<Settings> {
    validate_settings_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AuditError::InvalidConfig(format!(
                "Settings file not found at: {}",
                path.display()
            ))
        } else {
            AuditError::Io(e)
        }
    })?;

    let settings: Settings = serde_json::from_str(&content)?;
    log::debug!("[Config] Loaded settings from {}", path.display());
    Ok(settings)
}

/// Validate settings path (.json extension required).
pub fn validate_settings_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(AuditError::InvalidConfig(
            "Settings path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => Ok(()),
        Some(ext) => Err(AuditError::InvalidConfig(format!(
            "Settings file must have .json extension, got .{}",
            ext.to_string_lossy()
        ))),
        None => Err(AuditError::InvalidConfig(
            "Settings file must have .json extension".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_global_settings_path_layout() {
        if let Ok(path) = get_global_settings_path() {
            assert!(path.ends_with(".config/jobboard-audit/settings.json"));
        }
    }

    #[test]
    fn test_validate_settings_path() {
        assert!(validate_settings_path(Path::new("settings.json")).is_ok());
        assert!(validate_settings_path(Path::new("/tmp/audit/settings.json")).is_ok());
        assert!(validate_settings_path(Path::new("settings.toml")).is_err());
        assert!(validate_settings_path(Path::new("settings")).is_err());
        assert!(validate_settings_path(Path::new("")).is_err());
    }

    #[test]
    fn test_load_settings_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "endpoint": "https://db.example.test", "row_sample_limit": 25, "log_dir": "logs" }"#,
        )
        .unwrap();

        let settings = load_settings_from_file(&path).unwrap();
        assert_eq!(settings.endpoint.as_deref(), Some("https://db.example.test"));
        assert_eq!(settings.row_sample_limit, Some(25));
        assert_eq!(settings.log_dir, Some(PathBuf::from("logs")));
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_settings_from_file(Path::new("/nonexistent/path/settings.json"));
        assert!(matches!(result, Err(AuditError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.json");
        fs::write(&path, "{ invalid json }").unwrap();
        assert!(matches!(
            load_settings_from_file(&path),
            Err(AuditError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{ "endpiont": "https://db.example.test" }"#).unwrap();
        assert!(load_settings_from_file(&path).is_err());
    }
}
