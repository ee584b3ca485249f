//! Capabilities the pipeline needs from a geometry kernel.
//!
//! The driver only sees these four traits, so any kernel (or a test stub)
//! can stand behind it. The shape type is opaque to the driver.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kernel could not import a file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Failed to read STEP file {}: {message}", path.display())]
pub struct ReadError {
    /// File that failed.
    pub path: PathBuf,
    /// Kernel's reason.
    pub message: String,
}

impl ReadError {
    /// Create a read error for `path`.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The kernel could not export a file.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Failed to write STL to {}: {message}", path.display())]
pub struct WriteError {
    /// Target that failed.
    pub path: PathBuf,
    /// Kernel's reason.
    pub message: String,
}

impl WriteError {
    /// Create a write error for `path`.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Any other kernel failure (scaling, meshing), carried as its message.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct KernelError(pub String);

impl KernelError {
    /// Wrap a kernel message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Tessellation tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshSettings {
    /// Maximum chordal deviation.
    pub linear_deflection: f64,
    /// Maximum angular deviation, radians.
    pub angular_deflection: f64,
    /// Scale the linear deflection by the size of each feature.
    pub relative: bool,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            linear_deflection: 0.5,
            angular_deflection: 0.5,
            relative: true,
        }
    }
}

/// Imports a shape from a file.
pub trait ShapeReader {
    /// In-memory shape handle.
    type Shape;

    /// Read the shape stored at `path`.
    fn read(&self, path: &Path) -> Result<Self::Shape, ReadError>;
}

/// Produces transformed copies of shapes.
pub trait ShapeTransformer<S> {
    /// A new shape uniformly scaled about the origin by `factor`.
    fn scale(&self, shape: &S, factor: f64) -> Result<S, KernelError>;
}

/// Attaches a triangulation to a shape.
pub trait Mesher<S> {
    /// Mesh `shape` in place.
    fn mesh(&self, shape: &mut S, settings: &MeshSettings) -> Result<(), KernelError>;
}

/// Exports a meshed shape.
pub trait ShapeWriter<S> {
    /// Write `shape` to `target`, replacing any existing file.
    fn write(&self, shape: &S, target: &Path) -> Result<(), WriteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let err = ReadError::new("_input/neu/part.STP", "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "Failed to read STEP file _input/neu/part.STP: unexpected end of file"
        );
        let err = WriteError::new("out/part.stl", "permission denied");
        assert_eq!(err.to_string(), "Failed to write STL to out/part.stl: permission denied");
        assert_eq!(KernelError::new("no face could be meshed").to_string(), "no face could be meshed");
    }

    #[test]
    fn mesh_settings_defaults() {
        let settings = MeshSettings::default();
        assert_eq!(settings.linear_deflection, 0.5);
        assert_eq!(settings.angular_deflection, 0.5);
        assert!(settings.relative);
    }
}
