//! Length and plane-angle unit detection.

use std::f64::consts::PI;

use log::debug;

use crate::parser::{StepEntity, StepFile};

/// Conversion factors from file units to millimetres and radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Units {
    /// Millimetres per file length unit.
    pub length_mm: f64,
    /// Radians per file plane-angle unit.
    pub angle_rad: f64,
}

impl Default for Units {
    fn default() -> Self {
        Self {
            length_mm: 1.0,
            angle_rad: 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Quantity {
    Length,
    Angle,
}

impl Quantity {
    fn record(self) -> &'static str {
        match self {
            Quantity::Length => "LENGTH_UNIT",
            Quantity::Angle => "PLANE_ANGLE_UNIT",
        }
    }
}

// Conversion chains are short in practice; the bound stops reference cycles.
const MAX_CONVERSION_DEPTH: usize = 4;

impl Units {
    /// Detect the units of a file.
    ///
    /// Units listed by a GLOBAL_UNIT_ASSIGNED_CONTEXT win; otherwise the first
    /// unit instance in id order is used. Undeclared units default to
    /// millimetres and radians.
    pub fn detect(file: &StepFile) -> Units {
        let mut candidates: Vec<u64> = file
            .entities
            .values()
            .filter_map(|e| e.record("GLOBAL_UNIT_ASSIGNED_CONTEXT"))
            .filter_map(|r| r.args.first()?.as_list())
            .flat_map(|list| list.iter().filter_map(|v| v.as_entity_ref()))
            .collect();
        if candidates.is_empty() {
            candidates = file
                .entities
                .values()
                .filter(|e| e.record("LENGTH_UNIT").is_some() || e.record("PLANE_ANGLE_UNIT").is_some())
                .map(|e| e.id)
                .collect();
        }

        let mut units = Units::default();
        let (mut length_set, mut angle_set) = (false, false);
        for id in candidates {
            let Some(entity) = file.get(id) else { continue };
            if !length_set && entity.record(Quantity::Length.record()).is_some() {
                if let Some(f) = unit_factor(file, entity, Quantity::Length, 0) {
                    units.length_mm = f;
                    length_set = true;
                }
            } else if !angle_set && entity.record(Quantity::Angle.record()).is_some() {
                if let Some(f) = unit_factor(file, entity, Quantity::Angle, 0) {
                    units.angle_rad = f;
                    angle_set = true;
                }
            }
        }
        debug!(
            "STEP units: {} mm per length unit, {} rad per angle unit",
            units.length_mm, units.angle_rad
        );
        units
    }
}

fn unit_factor(file: &StepFile, entity: &StepEntity, quantity: Quantity, depth: usize) -> Option<f64> {
    if let Some(si) = entity.record("SI_UNIT") {
        let prefix = match si.args.first() {
            Some(v) if v.is_null() => 1.0,
            Some(v) => si_prefix(v.as_enum()?)?,
            None => 1.0,
        };
        let base = match (quantity, si.args.get(1)?.as_enum()?) {
            (Quantity::Length, "METRE") => 1000.0,
            (Quantity::Angle, "RADIAN") => 1.0,
            _ => return None,
        };
        return Some(prefix * base);
    }

    let conversion = entity.record("CONVERSION_BASED_UNIT")?;
    let name = conversion.args.first()?.as_str().unwrap_or("");
    let converted = conversion
        .args
        .get(1)
        .and_then(|v| v.as_entity_ref())
        .filter(|_| depth < MAX_CONVERSION_DEPTH)
        .and_then(|measure_id| {
            let measure = file.get(measure_id)?;
            let record = measure.records.first()?;
            let value = record.args.first()?.as_real()?;
            let unit = file.get(record.args.get(1)?.as_entity_ref()?)?;
            Some(value * unit_factor(file, unit, quantity, depth + 1)?)
        });
    converted.or_else(|| named_unit(name, quantity))
}

fn named_unit(name: &str, quantity: Quantity) -> Option<f64> {
    match (quantity, name.to_ascii_uppercase().as_str()) {
        (Quantity::Length, "INCH") => Some(25.4),
        (Quantity::Length, "FOOT") => Some(304.8),
        (Quantity::Angle, "DEGREE") => Some(PI / 180.0),
        _ => None,
    }
}

fn si_prefix(name: &str) -> Option<f64> {
    Some(match name {
        "EXA" => 1e18,
        "PETA" => 1e15,
        "TERA" => 1e12,
        "GIGA" => 1e9,
        "MEGA" => 1e6,
        "KILO" => 1e3,
        "HECTO" => 1e2,
        "DECA" => 1e1,
        "DECI" => 1e-1,
        "CENTI" => 1e-2,
        "MILLI" => 1e-3,
        "MICRO" => 1e-6,
        "NANO" => 1e-9,
        "PICO" => 1e-12,
        "FEMTO" => 1e-15,
        "ATTO" => 1e-18,
        _ => return None,
    })
}
