#![warn(missing_docs)]

//! STEP file import for the stepconv kernel.
//!
//! Reads ISO 10303-21 physical files (AP203/AP214/AP242 B-rep subsets) into a
//! [`Shape`](stepconv_kernel_brep::Shape). Geometry is normalized to
//! millimetres using the file's declared length unit.
//!
//! # Example
//!
//! ```no_run
//! use stepconv_kernel_step::read_step;
//!
//! let shape = read_step("bracket.STP").unwrap();
//! println!("{} faces", shape.face_count());
//! ```

mod entities;
mod error;
mod lexer;
mod parser;
mod reader;

pub use entities::Units;
pub use error::StepError;
pub use reader::{read_step, read_step_from_buffer};
