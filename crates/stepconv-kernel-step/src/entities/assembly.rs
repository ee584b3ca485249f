//! Assembly placement.
//!
//! Representations are the nodes. A plain (shape) representation
//! relationship puts two representations in one coordinate frame; a
//! relationship carrying a transformation, or a MAPPED_ITEM, places a child
//! representation inside a parent. A body is instanced once per path from
//! the representations listing it up to a representation with no parent.

use std::collections::{BTreeMap, BTreeSet};

use stepconv_kernel_brep::{frame, Dir3, Point3, Similarity, Vec3};

use super::topology::BODY_TYPES;
use super::{Args, Entities};
use crate::error::StepError;
use crate::parser::StepEntity;

/// Deepest assembly nesting followed before a path is cut off.
const MAX_DEPTH: usize = 64;

/// Placement graph over the representations of one file.
#[derive(Debug, Default)]
pub struct Assembly {
    slots: BTreeMap<u64, usize>,
    /// Union-find parent per slot; linked slots share a frame.
    same_frame: Vec<usize>,
    /// (child slot, parent slot, child-to-parent map)
    links: Vec<(usize, usize, Similarity)>,
    /// Body id to the slots of the representations listing it.
    owners: BTreeMap<u64, Vec<usize>>,
}

impl Assembly {
    fn slot(&mut self, rep: u64) -> usize {
        let next = self.same_frame.len();
        let slot = *self.slots.entry(rep).or_insert(next);
        if slot == next {
            self.same_frame.push(next);
        }
        slot
    }

    fn find(&self, mut slot: usize) -> usize {
        while self.same_frame[slot] != slot {
            slot = self.same_frame[slot];
        }
        slot
    }

    fn join(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.same_frame[a.max(b)] = a.min(b);
        }
    }

    /// World placements of a body, one per instance. A body outside every
    /// representation is placed once, unmoved.
    pub fn placements(&self, body: u64) -> Vec<Similarity> {
        let frames: BTreeSet<usize> = self
            .owners
            .get(&body)
            .into_iter()
            .flatten()
            .map(|&slot| self.find(slot))
            .collect();
        if frames.is_empty() {
            return vec![Similarity::identity()];
        }
        let mut out = Vec::new();
        let mut path = Vec::new();
        for frame in frames {
            self.walk(frame, Similarity::identity(), &mut path, &mut out);
        }
        let mut unique: Vec<Similarity> = Vec::with_capacity(out.len());
        for sim in out {
            if !unique.iter().any(|kept| same_map(kept, &sim)) {
                unique.push(sim);
            }
        }
        unique
    }

    fn walk(&self, frame: usize, placed: Similarity, path: &mut Vec<usize>, out: &mut Vec<Similarity>) {
        path.push(frame);
        let parents: Vec<(usize, &Similarity)> = self
            .links
            .iter()
            .filter(|(child, _, _)| self.find(*child) == frame)
            .map(|(_, parent, map)| (self.find(*parent), map))
            .filter(|(parent, _)| !path.contains(parent))
            .collect();
        if parents.is_empty() || path.len() > MAX_DEPTH {
            out.push(placed);
        } else {
            for (parent, map) in parents {
                self.walk(parent, map.compose(&placed), path, out);
            }
        }
        path.pop();
    }
}

impl Entities<'_> {
    /// Collect representations, their body items, and the links between
    /// them.
    pub fn assembly(&self) -> Result<Assembly, StepError> {
        let mut assembly = Assembly::default();
        let mut mapped = Vec::new();

        for entity in self.file().entities.values() {
            let Some(items) = representation_items(entity) else {
                continue;
            };
            let slot = assembly.slot(entity.id);
            for item in items {
                match self.file().get(item).and_then(StepEntity::type_name) {
                    Some(t) if BODY_TYPES.contains(&t) => {
                        assembly.owners.entry(item).or_default().push(slot)
                    }
                    Some("MAPPED_ITEM") => mapped.push((item, slot)),
                    _ => {}
                }
            }
        }

        for (item, parent) in mapped {
            let args = self.instance(item, &["MAPPED_ITEM"])?;
            let source = self.instance(args.entity_ref(1)?, &["REPRESENTATION_MAP"])?;
            let origin = self.frame_map(source.entity_ref(0)?)?;
            let target = self.frame_map(args.entity_ref(2)?)?;
            let child = assembly.slot(source.entity_ref(1)?);
            assembly
                .links
                .push((child, parent, target.compose(&origin.inverse())));
        }

        for entity in self.file().entities.values() {
            let Some((child, parent, transform)) = relationship(entity)? else {
                continue;
            };
            let (child, parent) = (assembly.slot(child), assembly.slot(parent));
            match transform {
                Some(id) => {
                    let map = self.transformation(id)?;
                    assembly.links.push((child, parent, map));
                }
                None => assembly.join(child, parent),
            }
        }

        log::debug!(
            "assembly: {} representations, {} placements",
            assembly.slots.len(),
            assembly.links.len()
        );
        Ok(assembly)
    }

    /// ITEM_DEFINED_TRANSFORMATION, or a transformation operator used
    /// directly.
    fn transformation(&self, id: u64) -> Result<Similarity, StepError> {
        let entity = self.file().require(id)?;
        if entity.type_name() != Some("ITEM_DEFINED_TRANSFORMATION") {
            return self.frame_map(id);
        }
        let args = Args::new(id, &entity.records[0]);
        let from = self.frame_map(args.entity_ref(2)?)?;
        let to = self.frame_map(args.entity_ref(3)?)?;
        Ok(to.compose(&from.inverse()))
    }

    /// Map from local coordinates of a placement (or a cartesian
    /// transformation operator) into its parent coordinates.
    fn frame_map(&self, id: u64) -> Result<Similarity, StepError> {
        let entity = self.file().require(id)?;
        if entity.type_name() != Some("CARTESIAN_TRANSFORMATION_OPERATOR_3D") {
            let placement = self.placement(id)?;
            let (x, y, z) = placement.frame();
            return Ok(Similarity::from_frame(&placement.location, &x, &y, &z));
        }
        let args = Args::new(id, &entity.records[0]);
        let x = args
            .optional_ref(2)?
            .map(|d| self.direction(d).map(|d| d.into_inner()))
            .transpose()?;
        let z = match args.optional_ref(6)? {
            Some(d) => self.direction(d)?,
            None => Dir3::new_normalize(Vec3::z()),
        };
        let origin = self.point(args.entity_ref(4)?)?;
        let scale = args.optional_real(5)?.unwrap_or(1.0);
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(StepError::geometry(id, format!("invalid scale {scale}")));
        }
        let (x, y, z) = frame(z, x);
        Ok(Similarity::from_frame(&origin, &x, &y, &z).compose(&Similarity::uniform_scale(scale)))
    }
}

/// Whether two maps agree on the origin and the unit axes.
fn same_map(a: &Similarity, b: &Similarity) -> bool {
    let corners = [
        Point3::origin(),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
    ];
    corners
        .iter()
        .all(|p| (a.point(p) - b.point(p)).norm() <= 1e-9 * (1.0 + a.point(p).coords.norm()))
}

/// Item refs of a representation: any record named `*REPRESENTATION` whose
/// second argument is a list.
fn representation_items(entity: &StepEntity) -> Option<Vec<u64>> {
    let record = entity
        .records
        .iter()
        .find(|r| r.name.ends_with("REPRESENTATION"))?;
    let items = record.args.get(1)?.as_list()?;
    Some(items.iter().filter_map(|v| v.as_entity_ref()).collect())
}

/// `(child, parent, transformation)` of a representation relationship.
fn relationship(entity: &StepEntity) -> Result<Option<(u64, u64, Option<u64>)>, StepError> {
    let (record, transform) = match entity.type_name() {
        Some("SHAPE_REPRESENTATION_RELATIONSHIP" | "REPRESENTATION_RELATIONSHIP") => {
            (&entity.records[0], None)
        }
        Some("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION") => {
            let args = Args::new(entity.id, &entity.records[0]);
            (&entity.records[0], Some(args.entity_ref(4)?))
        }
        Some(_) => return Ok(None),
        None => {
            let Some(record) = entity.record("REPRESENTATION_RELATIONSHIP") else {
                return Ok(None);
            };
            let transform = entity
                .record("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION")
                .map(|r| Args::new(entity.id, r).entity_ref(0))
                .transpose()?;
            (record, transform)
        }
    };
    let args = Args::new(entity.id, record);
    Ok(Some((args.entity_ref(2)?, args.entity_ref(3)?, transform)))
}
