//! Interpretation of raw instances as geometry and topology.
//!
//! [`Entities`] wraps a parsed file together with its detected [`Units`];
//! the submodules add typed accessors for points and placements, edge
//! curves, surfaces, and the face/shell/body hierarchy.

mod assembly;
mod curves;
mod geometry;
mod surfaces;
mod topology;
mod units;

pub use geometry::Placement;
pub use units::Units;

use crate::error::StepError;
use crate::parser::{Record, StepFile, StepValue};

/// Typed view over a parsed STEP file.
pub struct Entities<'a> {
    file: &'a StepFile,
    units: Units,
}

impl<'a> Entities<'a> {
    /// Wrap a parsed file, detecting its units.
    pub fn new(file: &'a StepFile) -> Self {
        Self {
            file,
            units: Units::detect(file),
        }
    }

    /// Units in effect for this file.
    pub fn units(&self) -> Units {
        self.units
    }

    /// The underlying file.
    pub fn file(&self) -> &'a StepFile {
        self.file
    }

    /// Arguments of a simple instance whose type is one of `types`.
    pub fn instance(&self, id: u64, types: &[&str]) -> Result<Args<'a>, StepError> {
        let entity = self.file.require(id)?;
        match entity.type_name() {
            Some(name) if types.contains(&name) => Ok(Args {
                id,
                record: &entity.records[0],
            }),
            _ => Err(StepError::type_mismatch(id, types.join("|"), entity.describe())),
        }
    }

    /// Type name of a simple instance, or the record list of a complex one.
    pub fn type_of(&self, id: u64) -> Result<String, StepError> {
        Ok(self.file.require(id)?.describe())
    }
}

/// Argument accessors for one record, reporting errors against its entity.
#[derive(Clone, Copy)]
pub struct Args<'a> {
    id: u64,
    record: &'a Record,
}

impl<'a> Args<'a> {
    /// Wrap a record belonging to entity `id`.
    pub fn new(id: u64, record: &'a Record) -> Self {
        Self { id, record }
    }

    /// ID of the owning entity.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Type name of the record.
    pub fn type_name(&self) -> &'a str {
        &self.record.name
    }

    fn get(&self, index: usize, expected: &'static str) -> Result<&'a StepValue, StepError> {
        self.record.args.get(index).ok_or_else(|| self.bad(index, expected))
    }

    fn bad(&self, index: usize, expected: &'static str) -> StepError {
        StepError::Argument {
            entity_id: self.id,
            type_name: self.record.name.clone(),
            index,
            expected,
        }
    }

    /// Real (or integer) argument.
    pub fn real(&self, index: usize) -> Result<f64, StepError> {
        self.get(index, "real")?
            .as_real()
            .ok_or_else(|| self.bad(index, "real"))
    }

    /// Non-negative integer argument (degrees).
    pub fn count(&self, index: usize) -> Result<usize, StepError> {
        as_count(self.get(index, "integer")?).ok_or_else(|| self.bad(index, "integer"))
    }

    /// List of non-negative integers (knot multiplicities).
    pub fn counts(&self, index: usize) -> Result<Vec<usize>, StepError> {
        self.list(index, "list of integers")?
            .iter()
            .map(|v| as_count(v).ok_or_else(|| self.bad(index, "list of integers")))
            .collect()
    }

    /// Optional real (`$` yields `None`).
    pub fn optional_real(&self, index: usize) -> Result<Option<f64>, StepError> {
        match self.record.args.get(index) {
            None | Some(StepValue::Null) => Ok(None),
            Some(_) => self.real(index).map(Some),
        }
    }

    /// Entity reference argument.
    pub fn entity_ref(&self, index: usize) -> Result<u64, StepError> {
        self.get(index, "entity reference")?
            .as_entity_ref()
            .ok_or_else(|| self.bad(index, "entity reference"))
    }

    /// Optional entity reference (`$` yields `None`).
    pub fn optional_ref(&self, index: usize) -> Result<Option<u64>, StepError> {
        match self.record.args.get(index) {
            None | Some(StepValue::Null) => Ok(None),
            Some(_) => self.entity_ref(index).map(Some),
        }
    }

    /// `.T.` / `.F.` argument.
    pub fn logical(&self, index: usize) -> Result<bool, StepError> {
        self.get(index, "logical")?
            .as_bool()
            .ok_or_else(|| self.bad(index, "logical"))
    }

    /// String argument (`$` yields an empty string).
    pub fn string(&self, index: usize) -> Result<&'a str, StepError> {
        match self.get(index, "string")? {
            StepValue::Null => Ok(""),
            value => value.as_str().ok_or_else(|| self.bad(index, "string")),
        }
    }

    /// List of reals.
    pub fn reals(&self, index: usize) -> Result<Vec<f64>, StepError> {
        self.list(index, "list of reals")?
            .iter()
            .map(|v| v.as_real().ok_or_else(|| self.bad(index, "list of reals")))
            .collect()
    }

    /// List of entity references.
    pub fn refs(&self, index: usize) -> Result<Vec<u64>, StepError> {
        self.list(index, "list of references")?
            .iter()
            .map(|v| {
                v.as_entity_ref()
                    .ok_or_else(|| self.bad(index, "list of references"))
            })
            .collect()
    }

    /// List of lists of entity references, as in a control net.
    pub fn ref_grid(&self, index: usize) -> Result<Vec<Vec<u64>>, StepError> {
        const EXPECTED: &str = "list of lists of references";
        self.list(index, EXPECTED)?
            .iter()
            .map(|row| {
                row.as_list()
                    .and_then(|row| row.iter().map(StepValue::as_entity_ref).collect())
                    .ok_or_else(|| self.bad(index, EXPECTED))
            })
            .collect()
    }

    /// List of lists of reals, as in a weight net.
    pub fn real_grid(&self, index: usize) -> Result<Vec<Vec<f64>>, StepError> {
        const EXPECTED: &str = "list of lists of reals";
        self.list(index, EXPECTED)?
            .iter()
            .map(|row| {
                row.as_list()
                    .and_then(|row| row.iter().map(StepValue::as_real).collect())
                    .ok_or_else(|| self.bad(index, EXPECTED))
            })
            .collect()
    }

    fn list(&self, index: usize, expected: &'static str) -> Result<&'a [StepValue], StepError> {
        self.get(index, expected)?
            .as_list()
            .ok_or_else(|| self.bad(index, expected))
    }
}

fn as_count(value: &StepValue) -> Option<usize> {
    match value {
        StepValue::Integer(n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::parser::{Parser, StepFile};

    /// Parse a DATA section body wrapped in a minimal file.
    pub fn parse_data(data: &str) -> StepFile {
        let text = format!(
            "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION((''),'2;1');\nENDSEC;\nDATA;\n{data}\nENDSEC;\nEND-ISO-10303-21;\n"
        );
        Parser::parse(text.as_bytes()).unwrap()
    }
}
