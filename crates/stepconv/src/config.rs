//! Conversion settings, loadable from TOML.
//!
//! Every key is optional; unknown keys are rejected so typos surface early.
//!
//! ```toml
//! input_dir = "_input/neu"
//! output_dir = "public/3d/converted"
//! keep_millimetres = false
//! stl_format = "binary"
//!
//! [mesh]
//! linear_deflection = 0.1
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use stepconv_kernel_stl::StlFormat;

use crate::error::ConfigError;
use crate::kernel::MeshSettings;
use crate::slug::{slugify_with_fallback, DEFAULT_FALLBACK};

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "STEPCONV_CONFIG";
/// Config file picked up from the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stepconv.toml";

/// Settings for one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Directory scanned for inputs (not recursive).
    pub input_dir: PathBuf,
    /// Directory receiving the meshes; created when missing.
    pub output_dir: PathBuf,
    /// Case-sensitive input extension, without the dot.
    pub input_extension: String,
    /// Output extension, without the dot.
    pub output_extension: String,
    /// Factor applied unless `keep_millimetres` is set.
    pub scale_factor: f64,
    /// Skip the unit conversion.
    pub keep_millimetres: bool,
    /// Output stem for names that sanitize to nothing.
    pub fallback_name: String,
    /// Suffix `-2`, `-3`, … onto names already written in this run instead
    /// of overwriting them.
    pub disambiguate_collisions: bool,
    /// Log filter (`RUST_LOG` syntax) used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    /// Tessellation tolerances.
    pub mesh: MeshSettings,
    /// STL encoding.
    pub stl_format: StlFormat,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("_input/neu"),
            output_dir: PathBuf::from("public/3d/converted"),
            input_extension: "STP".into(),
            output_extension: "stl".into(),
            scale_factor: 0.001,
            keep_millimetres: false,
            fallback_name: DEFAULT_FALLBACK.into(),
            disambiguate_collisions: true,
            log_level: None,
            mesh: MeshSettings::default(),
            stl_format: StlFormat::default(),
        }
    }
}

impl ConvertConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, Path::new("<inline>"))
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&text, path)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Config from `$STEPCONV_CONFIG`, else `./stepconv.toml` when present,
    /// else the defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Self::discover_in(Path::new(".")),
        }
    }

    /// `dir/stepconv.toml` when present, else the defaults.
    pub fn discover_in(dir: &Path) -> Result<Self, ConfigError> {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return invalid(format!("scale_factor must be positive, got {}", self.scale_factor));
        }
        for (key, value) in [
            ("mesh.linear_deflection", self.mesh.linear_deflection),
            ("mesh.angular_deflection", self.mesh.angular_deflection),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{key} must be positive, got {value}"));
            }
        }
        for (key, value) in [
            ("input_extension", &self.input_extension),
            ("output_extension", &self.output_extension),
        ] {
            if value.is_empty() || value.contains(['.', '/', '\\']) {
                return invalid(format!("{key} must be a bare extension, got {value:?}"));
            }
        }
        if self.fallback_name.is_empty()
            || slugify_with_fallback(&self.fallback_name, "") != self.fallback_name
        {
            return invalid(format!(
                "fallback_name must already be a slug, got {:?}",
                self.fallback_name
            ));
        }
        Ok(())
    }

    /// Scale factor to apply, if any.
    pub fn effective_scale(&self) -> Option<f64> {
        (!self.keep_millimetres).then_some(self.scale_factor)
    }
}
