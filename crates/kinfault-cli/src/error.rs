//! Errors surfaced by the `kinfault` binary.

use std::io;
use std::path::PathBuf;

use kinfault_types::FaultError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse settings {}: {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("settings file {} does not exist", .0.display())]
    MissingSettings(PathBuf),

    #[error("failed to serialize settings: {0}")]
    SettingsSerialize(#[from] toml::ser::Error),

    #[error("failed to serialize output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("unknown link '{0}' in --select")]
    UnknownLink(String),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Fault(#[from] FaultError),
}
