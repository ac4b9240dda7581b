use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Settings file not found. Looked in:\n\
        - current directory: stackwire.local.yaml, .stackwire.local.yaml, stackwire.yaml, .stackwire.yaml\n\
        - ./.stackwire/ directory\n\
        - ~/.config/stackwire/stackwire.yaml\n\
        A path can also be given with the STACKWIRE_CONFIG_PATH environment variable"
    )]
    SettingsFileNotFound,

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
