pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{DatabaseSettings, NetworkSettings, RegistrySettings, Settings};

use std::path::PathBuf;

const CANDIDATES: [&str; 4] = [
    "stackwire.local.yaml",
    ".stackwire.local.yaml",
    "stackwire.yaml",
    ".stackwire.yaml",
];

/// Locate the project's settings file
///
/// Search order:
/// 1. `STACKWIRE_CONFIG_PATH` (direct path)
/// 2. current directory: stackwire.local.yaml, .stackwire.local.yaml, stackwire.yaml, .stackwire.yaml
/// 3. `./.stackwire/` with the same order
/// 4. `~/.config/stackwire/stackwire.yaml`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("STACKWIRE_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(".stackwire");
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("stackwire").join("stackwire.yaml");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Load settings from the discovered file, falling back to defaults when
/// no file exists. Environment overrides are applied last.
pub fn load_settings() -> Result<Settings> {
    let settings = match find_settings_file() {
        Ok(path) => Settings::from_path(path)?,
        Err(ConfigError::SettingsFileNotFound) => {
            tracing::debug!("No settings file found, using defaults");
            Settings::default()
        }
        Err(e) => return Err(e),
    };
    let settings = settings.with_env_overrides();
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_settings_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("stackwire.yaml"), "region: us-west-2\n").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("stackwire.yaml"));
    }

    #[test]
    #[serial]
    fn test_local_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("stackwire.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("stackwire.local.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with("stackwire.local.yaml"));
    }

    #[test]
    #[serial]
    fn test_find_settings_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".stackwire");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("stackwire.yaml"), "").unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_settings_file();
        std::env::set_current_dir(original_dir).unwrap();

        assert!(result.unwrap().ends_with(".stackwire/stackwire.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "stack_name: Custom\n").unwrap();

        temp_env::with_var("STACKWIRE_CONFIG_PATH", Some(&config_path), || {
            assert_eq!(find_settings_file().unwrap(), config_path);
            assert_eq!(load_settings().unwrap().stack_name, "Custom");
        });
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = find_settings_file();
        let loaded = temp_env::with_vars(
            [
                ("STACKWIRE_CONFIG_PATH", None::<&str>),
                ("STACKWIRE_REGION", None),
                ("CDK_DEFAULT_REGION", None),
            ],
            load_settings,
        );
        std::env::set_current_dir(original_dir).unwrap();

        // A global settings file on the host would also satisfy the lookup.
        if matches!(found, Err(ConfigError::SettingsFileNotFound)) {
            assert_eq!(loaded.unwrap(), Settings::default());
        }
    }
}
