#![warn(missing_docs)]

//! STL export for meshed stepconv shapes.
//!
//! Collects the triangulation of every face and writes it as one solid,
//! either in the ASCII form (the default) or the 50-byte-per-facet binary
//! form. Facet normals are derived from the vertex winding.

use std::io::{self, Write};
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use stepconv_kernel_brep::{Point3, Shape, Triangulation, Vec3};
use thiserror::Error;

/// STL encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    /// `solid … endsolid` text.
    #[default]
    Ascii,
    /// 80-byte header, facet count, little-endian facets.
    Binary,
}

/// Errors from STL export.
#[derive(Debug, Error)]
pub enum StlError {
    /// The shape carries no triangles to write.
    #[error("shape has no triangulation; mesh it before writing")]
    NoTriangulation,
    /// Writing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Write the shape's triangulation to `path`, replacing any existing file.
///
/// Nothing is created when the shape has no triangles.
pub fn write_stl(shape: &Shape, path: impl AsRef<Path>, format: StlFormat) -> Result<(), StlError> {
    let data = stl_bytes(shape, format)?;
    std::fs::write(path.as_ref(), &data)?;
    debug!(
        "wrote {} ({} bytes, {:?})",
        path.as_ref().display(),
        data.len(),
        format
    );
    Ok(())
}

/// Encode the shape's triangulation in memory.
pub fn stl_bytes(shape: &Shape, format: StlFormat) -> Result<Vec<u8>, StlError> {
    let mesh = shape.combined_triangulation();
    if mesh.num_triangles() == 0 {
        return Err(StlError::NoTriangulation);
    }
    let mut data = Vec::new();
    match format {
        StlFormat::Ascii => write_ascii(&mesh, &shape.name, &mut data)?,
        StlFormat::Binary => write_binary(&mesh, &shape.name, &mut data)?,
    }
    Ok(data)
}

/// Unit normal of a triangle from its winding; `+Z` when degenerate.
pub fn facet_normal([a, b, c]: [Point3; 3]) -> Vec3 {
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 1e-300 {
        n / len
    } else {
        Vec3::z()
    }
}

/// Solid names are a single token.
fn solid_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// ASCII STL.
pub fn write_ascii<W: Write>(mesh: &Triangulation, name: &str, mut out: W) -> io::Result<()> {
    let name = solid_name(name);
    writeln!(out, "solid {name}")?;
    for corners in mesh.corners() {
        let n = facet_normal(corners);
        writeln!(out, "  facet normal {:.6e} {:.6e} {:.6e}", n.x, n.y, n.z)?;
        writeln!(out, "    outer loop")?;
        for v in corners {
            writeln!(out, "      vertex {:.6e} {:.6e} {:.6e}", v.x, v.y, v.z)?;
        }
        writeln!(out, "    endloop")?;
        writeln!(out, "  endfacet")?;
    }
    writeln!(out, "endsolid {name}")?;
    Ok(())
}

/// Binary STL. `name` goes into the header, which never starts with
/// `solid` so readers do not mistake the file for ASCII.
pub fn write_binary<W: Write>(mesh: &Triangulation, name: &str, mut out: W) -> io::Result<()> {
    let count = u32::try_from(mesh.num_triangles())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many triangles for STL"))?;

    let mut header = [b' '; 80];
    let text = format!("stepconv binary STL {}", solid_name(name));
    let len = text.len().min(80);
    header[..len].copy_from_slice(&text.as_bytes()[..len]);
    out.write_all(&header)?;
    out.write_all(&count.to_le_bytes())?;

    let mut facet = Vec::with_capacity(50);
    for corners in mesh.corners() {
        facet.clear();
        let n = facet_normal(corners);
        for value in [n.x, n.y, n.z] {
            facet.extend_from_slice(&(value as f32).to_le_bytes());
        }
        for v in corners {
            for value in [v.x, v.y, v.z] {
                facet.extend_from_slice(&(value as f32).to_le_bytes());
            }
        }
        // Attribute byte count
        facet.extend_from_slice(&0u16.to_le_bytes());
        out.write_all(&facet)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use stepconv_kernel_brep::{Body, Face, Surface, Wire};

    /// One face holding two triangles of the unit square in z = 0.
    fn square_shape(name: &str) -> Shape {
        let mut face = Face::new(Surface::Unsupported("test".into()), vec![Wire::default()], None, true);
        face.triangulation = Some(Triangulation {
            nodes: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
        });
        Shape::new(
            name,
            vec![Body {
                name: String::new(),
                faces: vec![face],
                closed: false,
            }],
        )
    }

    #[test]
    fn ascii_layout() {
        let data = stl_bytes(&square_shape("flat plate"), StlFormat::Ascii).unwrap();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("solid flat_plate\n"));
        assert!(text.ends_with("endsolid flat_plate\n"));
        assert_eq!(text.matches("facet normal").count(), 2);
        assert_eq!(text.matches("vertex").count(), 6);
        assert!(text.contains("facet normal 0.000000e0 0.000000e0 1.000000e0"));
    }

    #[test]
    fn binary_layout() {
        let data = stl_bytes(&square_shape("plate"), StlFormat::Binary).unwrap();
        assert_eq!(data.len(), 84 + 2 * 50);
        assert!(data.starts_with(b"stepconv binary STL plate"));
        assert_eq!(u32::from_le_bytes(data[80..84].try_into().unwrap()), 2);

        let f = |at: usize| f32::from_le_bytes(data[at..at + 4].try_into().unwrap());
        // Normal of the first facet, then its second vertex.
        assert_relative_eq!(f(84 + 8), 1.0);
        assert_relative_eq!(f(84 + 24), 1.0);
        assert_eq!(&data[132..134], &[0, 0]);
    }

    #[test]
    fn degenerate_facets_get_default_normal() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(facet_normal([p, p, p]), Vec3::z());
        let n = facet_normal([
            Point3::origin(),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        assert_relative_eq!(n.x, -1.0);
    }

    #[test]
    fn unmeshed_shape_is_rejected_without_creating_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.stl");
        let mut shape = square_shape("empty");
        shape.clear_triangulation();
        assert!(matches!(
            write_stl(&shape, &path, StlFormat::Ascii),
            Err(StlError::NoTriangulation)
        ));
        assert!(!path.exists());
    }

    #[test]
    fn write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.stl");
        std::fs::write(&path, "stale").unwrap();
        write_stl(&square_shape("plate"), &path, StlFormat::Binary).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 184);
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("plate.stl");
        assert!(matches!(
            write_stl(&square_shape("plate"), &path, StlFormat::Ascii),
            Err(StlError::Io(_))
        ));
    }

    #[test]
    fn ascii_is_the_default_format() {
        assert_eq!(StlFormat::default(), StlFormat::Ascii);
    }
}
