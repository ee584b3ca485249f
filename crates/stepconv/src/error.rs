//! Error types for conversion, batches, and configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::kernel::{KernelError, ReadError, WriteError};

/// Why one file failed to convert. The batch carries on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    /// Import failed.
    #[error(transparent)]
    Read(#[from] ReadError),
    /// Unit scaling failed.
    #[error("scaling failed: {0}")]
    Transform(#[source] KernelError),
    /// Meshing failed.
    #[error("meshing failed: {0}")]
    Mesh(#[source] KernelError),
    /// Export failed.
    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Failures that stop a whole run.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The input directory exists but could not be listed.
    #[error("failed to list input directory {path}: {source}")]
    InputDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// A diagnostic line could not be written.
    #[error("failed to write progress output: {0}")]
    Diagnostics(#[from] io::Error),
}

/// Configuration problems found at start-up.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
    /// The config file is not valid TOML for the schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
