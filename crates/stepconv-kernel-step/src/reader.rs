//! Entry points: bytes or path in, [`Shape`] out.

use std::path::Path;

use log::debug;
use stepconv_kernel_brep::Shape;

use crate::entities::Entities;
use crate::error::StepError;
use crate::parser::Parser;

/// Read a STEP file from disk.
///
/// The shape is named after the first named body, falling back to the file
/// stem.
pub fn read_step(path: impl AsRef<Path>) -> Result<Shape, StepError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let mut shape = read_step_from_buffer(&data)?;
    if shape.name.is_empty() {
        if let Some(stem) = path.file_stem() {
            shape.name = stem.to_string_lossy().into_owned();
        }
    }
    Ok(shape)
}

/// Read STEP data from a byte buffer.
///
/// Every solid and surface model in the file becomes a body of the returned
/// shape. A file without any is [`StepError::NoShapes`].
pub fn read_step_from_buffer(data: &[u8]) -> Result<Shape, StepError> {
    let file = Parser::parse(data)?;
    let entities = Entities::new(&file);
    let bodies = entities.bodies()?;
    if bodies.is_empty() {
        return Err(StepError::NoShapes);
    }
    let name = bodies
        .iter()
        .map(|b| b.name.trim())
        .find(|n| !n.is_empty())
        .unwrap_or_default()
        .to_string();
    let shape = Shape::new(name, bodies);
    debug!(
        "read {} bodies, {} faces (schemas {:?}, {} mm per unit)",
        shape.bodies.len(),
        shape.face_count(),
        file.schemas(),
        entities.units().length_mm
    );
    Ok(shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const BLOCK: &str = include_str!("../tests/fixtures/block.stp");
    const CYLINDER: &str = include_str!("../tests/fixtures/cylinder.stp");
    const ASSEMBLY: &str = include_str!("../tests/fixtures/assembly.stp");

    #[test]
    fn reads_each_placed_instance() {
        let shape = read_step_from_buffer(ASSEMBLY.as_bytes()).unwrap();
        assert_eq!(shape.bodies.len(), 2);
        assert_eq!(shape.face_count(), 12);

        // The second block sits at x = 50, turned a quarter about z.
        let (min, max) = shape.bounding_box().unwrap();
        assert_relative_eq!(min.coords.norm(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(max.x, 50.0, epsilon = 1e-9);
        assert_relative_eq!(max.y, 20.0, epsilon = 1e-9);
        assert_relative_eq!(max.z, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn reads_block() {
        let shape = read_step_from_buffer(BLOCK.as_bytes()).unwrap();
        assert_eq!(shape.name, "Block");
        assert_eq!(shape.bodies.len(), 1);
        assert!(shape.bodies[0].closed);
        assert_eq!(shape.face_count(), 6);
        assert!(shape.faces().all(|f| f.wires.len() == 1 && f.outer == Some(0)));

        let (min, max) = shape.bounding_box().unwrap();
        assert_relative_eq!(min.coords.norm(), 0.0);
        assert_relative_eq!(max.x, 20.0);
        assert_relative_eq!(max.y, 10.0);
        assert_relative_eq!(max.z, 5.0);
    }

    #[test]
    fn inch_files_are_normalized_to_millimetres() {
        let inches = BLOCK.replace(
            "( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) )",
            "( CONVERSION_BASED_UNIT('INCH',#9000) LENGTH_UNIT() NAMED_UNIT(*) );\n\
             #9000 = LENGTH_MEASURE_WITH_UNIT(LENGTH_MEASURE(25.4),#9001);\n\
             #9001 = ( LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.) )",
        );
        let shape = read_step_from_buffer(inches.as_bytes()).unwrap();
        let (_, max) = shape.bounding_box().unwrap();
        assert_relative_eq!(max.x, 508.0, epsilon = 1e-9);
    }

    #[test]
    fn reads_cylinder_with_circular_edges() {
        let shape = read_step_from_buffer(CYLINDER.as_bytes()).unwrap();
        assert_eq!(shape.name, "Pin");
        let kinds: Vec<&str> = shape.faces().map(|f| f.surface.kind()).collect();
        assert_eq!(kinds, ["cylinder", "plane", "plane"]);
        let side = shape.faces().next().unwrap();
        assert_eq!(side.wires[0].edges.len(), 4);
        assert!(side.wires[0].edges[0].curve.is_conic());
    }

    #[test]
    fn file_without_bodies_is_an_error() {
        let text = "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nENDSEC;\nDATA;\n\
                    #1 = CARTESIAN_POINT('', (0.0, 0.0, 0.0));\nENDSEC;\nEND-ISO-10303-21;\n";
        assert!(matches!(
            read_step_from_buffer(text.as_bytes()),
            Err(StepError::NoShapes)
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(read_step_from_buffer(b"solid cube\nendsolid cube\n").is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_step("/nonexistent/dir/part.STP").unwrap_err();
        assert!(matches!(err, StepError::Io(_)));
    }
}
