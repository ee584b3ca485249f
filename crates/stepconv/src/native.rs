//! Pure-Rust kernel backend over the `stepconv-kernel-*` crates.

use std::path::Path;

use log::debug;
use stepconv_kernel_brep::{Shape, Similarity};
use stepconv_kernel_step::read_step;
use stepconv_kernel_stl::{write_stl, StlFormat};
use stepconv_kernel_tessellate::{tessellate_shape, MeshParams};

use crate::config::ConvertConfig;
use crate::kernel::{
    KernelError, MeshSettings, Mesher, ReadError, ShapeReader, ShapeTransformer, ShapeWriter,
    WriteError,
};
use crate::pipeline::Converter;

/// Reads STEP, scales, meshes, and writes STL in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKernel {
    /// Encoding used when writing.
    pub stl_format: StlFormat,
}

impl NativeKernel {
    /// Backend writing `stl_format`.
    pub fn new(stl_format: StlFormat) -> Self {
        Self { stl_format }
    }
}

impl ShapeReader for NativeKernel {
    type Shape = Shape;

    fn read(&self, path: &Path) -> Result<Shape, ReadError> {
        let shape = read_step(path).map_err(|e| ReadError::new(path, e.to_string()))?;
        debug!(
            "{}: {} face(s) in {} body(ies)",
            path.display(),
            shape.face_count(),
            shape.bodies.len()
        );
        Ok(shape)
    }
}

impl ShapeTransformer<Shape> for NativeKernel {
    fn scale(&self, shape: &Shape, factor: f64) -> Result<Shape, KernelError> {
        shape
            .transformed(&Similarity::uniform_scale(factor))
            .map_err(|e| KernelError::new(e.to_string()))
    }
}

impl Mesher<Shape> for NativeKernel {
    fn mesh(&self, shape: &mut Shape, settings: &MeshSettings) -> Result<(), KernelError> {
        let params = MeshParams {
            linear_deflection: settings.linear_deflection,
            angular_deflection: settings.angular_deflection,
            relative: settings.relative,
        };
        tessellate_shape(shape, &params)
            .map(|_| ())
            .map_err(|e| KernelError::new(e.to_string()))
    }
}

impl ShapeWriter<Shape> for NativeKernel {
    fn write(&self, shape: &Shape, target: &Path) -> Result<(), WriteError> {
        write_stl(shape, target, self.stl_format).map_err(|e| WriteError::new(target, e.to_string()))
    }
}

/// Converter backed by [`NativeKernel`] for every capability.
pub type NativeConverter = Converter<NativeKernel, NativeKernel, NativeKernel, NativeKernel>;

impl NativeConverter {
    /// Converter using the native kernel with the configured STL format.
    pub fn native(config: ConvertConfig) -> Self {
        let kernel = NativeKernel::new(config.stl_format);
        Converter::new(config, kernel, kernel, kernel, kernel)
    }
}
