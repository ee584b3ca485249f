//! The batch driver: discover inputs, convert each one, report per file.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::ConvertConfig;
use crate::error::{BatchError, ConvertError};
use crate::kernel::{Mesher, ShapeReader, ShapeTransformer, ShapeWriter};
use crate::slug::slugify_with_fallback;

/// Regular files directly inside `dir` named `*.{extension}`, sorted.
///
/// The extension match is case-sensitive and dot-files are ignored. A
/// missing directory has no inputs.
pub fn discover_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, BatchError> {
    let input_dir = |source| BatchError::InputDir {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("input directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(input_dir(e)),
    };

    let suffix = format!(".{extension}");
    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry.map_err(input_dir)?.path();
        let name = path.file_name().map(OsStr::to_string_lossy).unwrap_or_default();
        if name.starts_with('.') || !name.ends_with(&suffix) || !path.is_file() {
            continue;
        }
        inputs.push(path);
    }
    inputs.sort();
    Ok(inputs)
}

/// Output file names handed out during one run.
#[derive(Debug, Clone)]
pub struct OutputNames {
    extension: String,
    fallback: String,
    disambiguate: bool,
    written: HashSet<String>,
}

impl OutputNames {
    /// Names ending in `.{extension}`, with `fallback` for stems that
    /// sanitize to nothing.
    pub fn new(extension: impl Into<String>, fallback: impl Into<String>, disambiguate: bool) -> Self {
        Self {
            extension: extension.into(),
            fallback: fallback.into(),
            disambiguate,
            written: HashSet::new(),
        }
    }

    /// Naming rules from a config.
    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(
            config.output_extension.clone(),
            config.fallback_name.clone(),
            config.disambiguate_collisions,
        )
    }

    /// File name for an input stem: the slug plus extension, suffixed `-2`,
    /// `-3`, … past any name already written in this run.
    pub fn candidate(&self, stem: &str) -> String {
        let slug = slugify_with_fallback(stem, &self.fallback);
        let plain = format!("{slug}.{}", self.extension);
        if !self.disambiguate || !self.written.contains(&plain) {
            return plain;
        }
        (2u32..)
            .map(|n| format!("{slug}-{n}.{}", self.extension))
            .find(|name| !self.written.contains(name))
            .unwrap_or(plain)
    }

    /// Record a name as written.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.written.insert(name.into());
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// `(input, output)` for each converted file.
    pub converted: Vec<(PathBuf, PathBuf)>,
    /// `(input, message)` for each failure.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    /// Number of inputs seen.
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }
}

/// Runs the read → scale → mesh → write pipeline over a directory.
pub struct Converter<R, T, M, W> {
    config: ConvertConfig,
    reader: R,
    transformer: T,
    mesher: M,
    writer: W,
}

impl<R, T, M, W> Converter<R, T, M, W>
where
    R: ShapeReader,
    T: ShapeTransformer<R::Shape>,
    M: Mesher<R::Shape>,
    W: ShapeWriter<R::Shape>,
{
    /// Assemble a converter from its kernel capabilities.
    pub fn new(config: ConvertConfig, reader: R, transformer: T, mesher: M, writer: W) -> Self {
        Self {
            config,
            reader,
            transformer,
            mesher,
            writer,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Convert one file to `target`.
    pub fn convert_file(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        let mut shape = self.reader.read(source)?;
        if let Some(factor) = self.config.effective_scale() {
            shape = self
                .transformer
                .scale(&shape, factor)
                .map_err(ConvertError::Transform)?;
        }
        self.mesher
            .mesh(&mut shape, &self.config.mesh)
            .map_err(ConvertError::Mesh)?;
        self.writer.write(&shape, target)?;
        Ok(())
    }

    /// Convert every input, writing one line per file to `out`.
    ///
    /// Only setup failures and a broken `out` abort the run; per-file
    /// errors land in the report.
    pub fn run<O: Write>(&self, out: &mut O) -> Result<BatchReport, BatchError> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let mut report = BatchReport::default();
        let inputs = discover_inputs(&self.config.input_dir, &self.config.input_extension)?;
        if inputs.is_empty() {
            writeln!(out, "No STEP files found in {}", self.config.input_dir.display())?;
            return Ok(report);
        }
        info!(
            "converting {} file(s) from {}",
            inputs.len(),
            self.config.input_dir.display()
        );

        let mut names = OutputNames::from_config(&self.config);
        for source in inputs {
            let display = source
                .file_name()
                .map(OsStr::to_string_lossy)
                .unwrap_or_default()
                .into_owned();
            let stem = source
                .file_stem()
                .map(OsStr::to_string_lossy)
                .unwrap_or_default();
            let file_name = names.candidate(&stem);
            let target = output_dir.join(&file_name);

            match self.convert_file(&source, &target) {
                Ok(()) => {
                    writeln!(out, "Converted {display} → {}", target.display())?;
                    info!("{} -> {}", source.display(), target.display());
                    names.reserve(file_name);
                    report.converted.push((source, target));
                }
                Err(e) => {
                    writeln!(out, "[ERROR] {display}: {e}")?;
                    warn!("{}: {e}", source.display());
                    report.failed.push((source, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}
