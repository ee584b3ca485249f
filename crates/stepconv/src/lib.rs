#![warn(missing_docs)]

//! stepconv: batch conversion of STEP CAD files to STL meshes.
//!
//! The [`Converter`] walks an input directory, and for each `*.STP` file
//! reads the shape, rescales it from millimetres to metres (unless told to
//! keep millimetres), meshes it, and writes an STL named after a slug of the
//! file stem. One bad file never stops the batch.
//!
//! The geometry work goes through the capability traits in [`kernel`];
//! [`NativeKernel`] implements them with the pure-Rust `stepconv-kernel-*`
//! crates.
//!
//! # Example
//!
//! ```rust,no_run
//! use stepconv::{ConvertConfig, Converter};
//!
//! let config = ConvertConfig::default();
//! let report = Converter::native(config).run(&mut std::io::stdout()).unwrap();
//! println!("{} converted, {} failed", report.converted.len(), report.failed.len());
//! ```

pub mod config;
pub mod error;
pub mod kernel;
pub mod native;
pub mod pipeline;
pub mod slug;

pub use config::ConvertConfig;
pub use error::{BatchError, ConfigError, ConvertError};
pub use kernel::{
    KernelError, MeshSettings, Mesher, ReadError, ShapeReader, ShapeTransformer, ShapeWriter,
    WriteError,
};
pub use native::{NativeConverter, NativeKernel};
pub use pipeline::{discover_inputs, BatchReport, Converter, OutputNames};
pub use slug::{slugify, slugify_with_fallback, DEFAULT_FALLBACK};
pub use stepconv_kernel_stl::StlFormat;
