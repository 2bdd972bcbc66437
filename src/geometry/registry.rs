#![warn(missing_docs)]
//! The volume registry.
//!
//! The volume tree is stored as a directed graph: logical volumes are the nodes and physical
//! volumes (placements) are the edges pointing from the mother to the daughter volume. A logical
//! volume can therefore be placed many times while only being defined once. Solids, logical
//! volumes and physical volumes each live in their own unique-name namespace.
use std::collections::{HashMap, HashSet};

use petgraph::{
    algo::has_path_connecting,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use serde::{Deserialize, Serialize};
use uom::si::f64::Length;

use super::{
    envelope::Envelope,
    material::{Element, Isotope, Material},
    solid::{Solid, SolidId},
    surface::{BorderSurface, OpticalSurface, SkinSurface},
};
use crate::{
    det_utils::DetectorInfo,
    error::{GeomError, GeomResult},
    utils::{math_utils::length_bits, Isometry},
    vis_utils::VisColor,
};

/// Handle of a logical volume.
pub type LvId = NodeIndex;
/// Handle of a physical volume (placement).
pub type PvId = EdgeIndex;

/// A solid filled with a material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolume {
    name: String,
    solid: SolidId,
    material: String,
}
impl LogicalVolume {
    /// name of this volume
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// the solid shape of this volume
    #[must_use]
    pub const fn solid(&self) -> SolidId {
        self.solid
    }
    /// name of the material filling this volume
    #[must_use]
    pub fn material(&self) -> &str {
        &self.material
    }
}

/// Placement of a logical volume inside its mother.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalVolume {
    name: String,
    placement: Isometry,
}
impl PhysicalVolume {
    /// name of this placement
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
    /// position and rotation relative to the mother volume
    #[must_use]
    pub const fn placement(&self) -> &Isometry {
        &self.placement
    }
}

/// Structured cache key for volumes shared between many placements.
///
/// The key consists of a component tag plus the exact bit patterns of all numeric parameters that
/// influence the shape, so two requests only hit the same entry if all parameters are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    component: &'static str,
    params: Vec<u64>,
    flags: Vec<String>,
}
impl CacheKey {
    /// Start a key for the given component kind.
    #[must_use]
    pub const fn new(component: &'static str) -> Self {
        Self {
            component,
            params: Vec::new(),
            flags: Vec::new(),
        }
    }
    /// Add a length parameter.
    #[must_use]
    pub fn length(mut self, value: Length) -> Self {
        self.params.push(length_bits(value));
        self
    }
    /// Add a plain numeric parameter.
    #[must_use]
    pub fn value(mut self, value: f64) -> Self {
        self.params.push(value.to_bits());
        self
    }
    /// Add an integer parameter.
    #[must_use]
    pub fn count(mut self, value: usize) -> Self {
        self.params.push(value as u64);
        self
    }
    /// Add a textual parameter (e.g. a material or a variant name).
    #[must_use]
    pub fn flag(mut self, value: &str) -> Self {
        self.flags.push(value.to_owned());
        self
    }
}

/// Container for all geometry objects of one construction run.
///
/// The registry is the single mutable sink every builder writes into. It is not synchronized and
/// must only be used from one thread of control.
#[derive(Debug, Default)]
pub struct Registry {
    solids: Vec<(String, Solid)>,
    solid_names: HashMap<String, SolidId>,
    g: DiGraph<LogicalVolume, PhysicalVolume>,
    lv_names: HashMap<String, LvId>,
    pv_names: HashMap<String, PvId>,
    world: Option<LvId>,
    cache: HashMap<CacheKey, LvId>,
    detectors: HashMap<PvId, DetectorInfo>,
    colors: HashMap<LvId, VisColor>,
    envelopes: Vec<Envelope>,
    isotopes: Vec<Isotope>,
    elements: Vec<Element>,
    materials: Vec<Material>,
    optical_surfaces: Vec<OpticalSurface>,
    border_surfaces: Vec<BorderSurface>,
    skin_surfaces: Vec<SkinSurface>,
    surface_names: HashSet<String>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- solids ----

    /// Register a new solid.
    /// # Errors
    /// This function returns an error if the name is already used or a boolean operand does not
    /// exist.
    pub fn add_solid(&mut self, name: &str, solid: Solid) -> GeomResult<SolidId> {
        if self.solid_names.contains_key(name) {
            return Err(GeomError::Registry(format!(
                "solid with name {name} already exists"
            )));
        }
        for op in solid.operands() {
            if op.index() >= self.solids.len() {
                return Err(GeomError::Registry(format!(
                    "solid {name} references an unknown solid"
                )));
            }
        }
        let id = SolidId(self.solids.len());
        self.solids.push((name.to_owned(), solid));
        self.solid_names.insert(name.to_owned(), id);
        Ok(id)
    }
    /// Returns the solid with the given id.
    #[must_use]
    pub fn solid(&self, id: SolidId) -> Option<&Solid> {
        self.solids.get(id.index()).map(|(_, s)| s)
    }
    /// Returns the name of the solid with the given id.
    #[must_use]
    pub fn solid_name(&self, id: SolidId) -> Option<&str> {
        self.solids.get(id.index()).map(|(n, _)| n.as_str())
    }
    /// Look up a solid by name.
    #[must_use]
    pub fn solid_by_name(&self, name: &str) -> Option<SolidId> {
        self.solid_names.get(name).copied()
    }
    /// All solids in insertion order.
    pub fn solids(&self) -> impl Iterator<Item = (SolidId, &str, &Solid)> {
        self.solids
            .iter()
            .enumerate()
            .map(|(i, (n, s))| (SolidId(i), n.as_str(), s))
    }

    // ---- volumes ----

    /// Create a new logical volume from a registered solid and material.
    /// # Errors
    /// This function returns an error if the name is already used, the solid does not exist or the
    /// material has not been registered.
    pub fn add_logical_volume(
        &mut self,
        name: &str,
        solid: SolidId,
        material: &str,
    ) -> GeomResult<LvId> {
        if self.lv_names.contains_key(name) {
            return Err(GeomError::Registry(format!(
                "logical volume with name {name} already exists"
            )));
        }
        if self.solid(solid).is_none() {
            return Err(GeomError::Registry(format!(
                "logical volume {name} references an unknown solid"
            )));
        }
        if self.material(material).is_none() {
            return Err(GeomError::Registry(format!(
                "logical volume {name} uses unregistered material {material}"
            )));
        }
        let idx = self.g.add_node(LogicalVolume {
            name: name.to_owned(),
            solid,
            material: material.to_owned(),
        });
        self.lv_names.insert(name.to_owned(), idx);
        Ok(idx)
    }
    /// Shortcut: register a solid and a logical volume of the same name.
    /// # Errors
    /// see [`Registry::add_solid`] and [`Registry::add_logical_volume`]
    pub fn add_volume(&mut self, name: &str, solid: Solid, material: &str) -> GeomResult<LvId> {
        let solid = self.add_solid(name, solid)?;
        self.add_logical_volume(name, solid, material)
    }
    /// Returns the logical volume with the given id.
    #[must_use]
    pub fn logical_volume(&self, lv: LvId) -> Option<&LogicalVolume> {
        self.g.node_weight(lv)
    }
    /// Look up a logical volume by name.
    #[must_use]
    pub fn lv_by_name(&self, name: &str) -> Option<LvId> {
        self.lv_names.get(name).copied()
    }
    /// All logical volumes in insertion order.
    pub fn logical_volumes(&self) -> impl Iterator<Item = (LvId, &LogicalVolume)> {
        self.g.node_indices().map(|i| (i, &self.g[i]))
    }
    /// Number of logical volumes.
    #[must_use]
    pub fn n_logical_volumes(&self) -> usize {
        self.g.node_count()
    }
    /// Place `daughter` inside `mother`.
    /// # Errors
    /// This function returns an error if the placement name is already used, one of the volumes
    /// does not exist or the placement would make a volume (indirectly) contain itself.
    pub fn place(
        &mut self,
        name: &str,
        daughter: LvId,
        mother: LvId,
        placement: Isometry,
    ) -> GeomResult<PvId> {
        if self.pv_names.contains_key(name) {
            return Err(GeomError::Registry(format!(
                "physical volume with name {name} already exists"
            )));
        }
        if self.g.node_weight(daughter).is_none() || self.g.node_weight(mother).is_none() {
            return Err(GeomError::Registry(format!(
                "physical volume {name} references an unknown logical volume"
            )));
        }
        if has_path_connecting(&self.g, daughter, mother, None) {
            return Err(GeomError::Registry(format!(
                "placing {name} would create a cyclic volume tree"
            )));
        }
        let edge = self.g.add_edge(
            mother,
            daughter,
            PhysicalVolume {
                name: name.to_owned(),
                placement,
            },
        );
        self.pv_names.insert(name.to_owned(), edge);
        Ok(edge)
    }
    /// Returns the physical volume with the given id.
    #[must_use]
    pub fn physical_volume(&self, pv: PvId) -> Option<&PhysicalVolume> {
        self.g.edge_weight(pv)
    }
    /// Look up a physical volume by name.
    #[must_use]
    pub fn pv_by_name(&self, name: &str) -> Option<PvId> {
        self.pv_names.get(name).copied()
    }
    /// Returns `(mother, daughter)` of a placement.
    #[must_use]
    pub fn pv_endpoints(&self, pv: PvId) -> Option<(LvId, LvId)> {
        self.g.edge_endpoints(pv)
    }
    /// Number of physical volumes.
    #[must_use]
    pub fn n_physical_volumes(&self) -> usize {
        self.g.edge_count()
    }
    /// Placements inside `lv`, in insertion order.
    #[must_use]
    pub fn daughters(&self, lv: LvId) -> Vec<PvId> {
        let mut d: Vec<PvId> = self
            .g
            .edges_directed(lv, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        d.sort_unstable();
        d
    }
    /// Depth-first walk over all placements below `lv` (pre-order, insertion order).
    #[must_use]
    pub fn walk(&self, lv: LvId) -> Vec<PvId> {
        let mut result = Vec::new();
        let mut stack: Vec<PvId> = self.daughters(lv).into_iter().rev().collect();
        while let Some(pv) = stack.pop() {
            result.push(pv);
            if let Some((_, daughter)) = self.g.edge_endpoints(pv) {
                stack.extend(self.daughters(daughter).into_iter().rev());
            }
        }
        result
    }
    /// Mark the world (top level) volume.
    /// # Errors
    /// This function returns an error if the volume does not exist.
    pub fn set_world(&mut self, lv: LvId) -> GeomResult<()> {
        if self.g.node_weight(lv).is_none() {
            return Err(GeomError::Registry("unknown world volume".into()));
        }
        self.world = Some(lv);
        Ok(())
    }
    /// The world volume, if set.
    #[must_use]
    pub const fn world(&self) -> Option<LvId> {
        self.world
    }

    // ---- caching ----

    /// Return the cached volume for `key` or build it once with `builder`.
    ///
    /// Two calls with identical keys always return the same volume; the builder is only invoked
    /// on the first request.
    /// # Errors
    /// This function returns the errors of the `builder`.
    pub fn cached_volume<F>(&mut self, key: CacheKey, builder: F) -> GeomResult<LvId>
    where
        F: FnOnce(&mut Self) -> GeomResult<LvId>,
    {
        if let Some(lv) = self.cache.get(&key) {
            return Ok(*lv);
        }
        let lv = builder(self)?;
        self.cache.insert(key, lv);
        Ok(lv)
    }
    /// Number of cached volumes.
    #[must_use]
    pub fn n_cached(&self) -> usize {
        self.cache.len()
    }

    // ---- side tables ----

    /// Mark a placement as sensitive detector.
    /// # Errors
    /// This function returns an error if the placement does not exist or is already tagged.
    pub fn tag_detector(&mut self, pv: PvId, info: DetectorInfo) -> GeomResult<()> {
        let Some(p) = self.g.edge_weight(pv) else {
            return Err(GeomError::Registry("cannot tag unknown placement".into()));
        };
        if self.detectors.contains_key(&pv) {
            return Err(GeomError::Registry(format!(
                "placement {} is already tagged as detector",
                p.name
            )));
        }
        self.detectors.insert(pv, info);
        Ok(())
    }
    /// Returns the detector tag of a placement.
    #[must_use]
    pub fn detector(&self, pv: PvId) -> Option<&DetectorInfo> {
        self.detectors.get(&pv)
    }
    /// Set the visualization color of a logical volume.
    pub fn set_color(&mut self, lv: LvId, color: VisColor) {
        self.colors.insert(lv, color);
    }
    /// Returns the visualization color of a logical volume.
    #[must_use]
    pub fn color(&self, lv: LvId) -> Option<&VisColor> {
        self.colors.get(&lv)
    }
    /// Register the envelope of an assembly placed into the argon.
    pub fn add_envelope(&mut self, envelope: Envelope) {
        self.envelopes.push(envelope);
    }
    /// Envelopes in registration order.
    #[must_use]
    pub fn envelopes(&self) -> &[Envelope] {
        &self.envelopes
    }

    // ---- materials ----

    /// Register an isotope. Registering an identical isotope twice is a no-op.
    /// # Errors
    /// This function returns an error if a different isotope with the same name exists.
    pub fn add_isotope(&mut self, isotope: Isotope) -> GeomResult<()> {
        match self.isotopes.iter().find(|i| i.name == isotope.name) {
            Some(existing) if *existing == isotope => Ok(()),
            Some(_) => Err(GeomError::Registry(format!(
                "isotope {} already exists",
                isotope.name
            ))),
            None => {
                self.isotopes.push(isotope);
                Ok(())
            }
        }
    }
    /// Register an element.
    /// # Errors
    /// This function returns an error if the name is already used or a referenced isotope is
    /// unknown.
    pub fn add_element(&mut self, element: Element) -> GeomResult<()> {
        if self.element(&element.name).is_some() {
            return Err(GeomError::Registry(format!(
                "element {} already exists",
                element.name
            )));
        }
        if let super::material::ElementComposition::Isotopes(isos) = &element.composition {
            if let Some((missing, _)) = isos
                .iter()
                .find(|(n, _)| !self.isotopes.iter().any(|i| &i.name == n))
            {
                return Err(GeomError::Registry(format!(
                    "element {} references unknown isotope {missing}",
                    element.name
                )));
            }
        }
        self.elements.push(element);
        Ok(())
    }
    /// Look up an element by name.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }
    /// Register a material.
    /// # Errors
    /// This function returns an error if the name is already used or a referenced element is
    /// unknown.
    pub fn add_material(&mut self, material: Material) -> GeomResult<()> {
        if self.material(material.name()).is_some() {
            return Err(GeomError::Registry(format!(
                "material {} already exists",
                material.name()
            )));
        }
        if let Some(missing) = material
            .element_names()
            .into_iter()
            .find(|e| self.element(e).is_none())
        {
            return Err(GeomError::Registry(format!(
                "material {} references unknown element {missing}",
                material.name()
            )));
        }
        self.materials.push(material);
        Ok(())
    }
    /// Look up a material by name.
    #[must_use]
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name() == name)
    }
    /// All isotopes in insertion order.
    #[must_use]
    pub fn isotopes(&self) -> &[Isotope] {
        &self.isotopes
    }
    /// All elements in insertion order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
    /// All materials in insertion order.
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    // ---- optical surfaces ----

    /// Register an optical surface definition.
    /// # Errors
    /// This function returns an error if the name is already used.
    pub fn add_optical_surface(&mut self, surface: OpticalSurface) -> GeomResult<()> {
        if self.optical_surface(&surface.name).is_some() {
            return Err(GeomError::Registry(format!(
                "optical surface {} already exists",
                surface.name
            )));
        }
        self.optical_surfaces.push(surface);
        Ok(())
    }
    /// Look up an optical surface by name.
    #[must_use]
    pub fn optical_surface(&self, name: &str) -> Option<&OpticalSurface> {
        self.optical_surfaces.iter().find(|s| s.name == name)
    }
    /// All optical surfaces in insertion order.
    #[must_use]
    pub fn optical_surfaces(&self) -> &[OpticalSurface] {
        &self.optical_surfaces
    }
    fn check_surface_name(&self, name: &str, surface: &str) -> GeomResult<()> {
        if self.surface_names.contains(name) {
            return Err(GeomError::Registry(format!(
                "surface {name} already exists"
            )));
        }
        if self.optical_surface(surface).is_none() {
            return Err(GeomError::Registry(format!(
                "surface {name} uses unknown optical surface {surface}"
            )));
        }
        Ok(())
    }
    /// Attach an optical surface to the boundary from `pv1` to `pv2`.
    /// # Errors
    /// This function returns an error if the name is already used, the optical surface or one
    /// of the placements does not exist.
    pub fn add_border_surface(
        &mut self,
        name: &str,
        surface: &str,
        pv1: PvId,
        pv2: PvId,
    ) -> GeomResult<()> {
        self.check_surface_name(name, surface)?;
        if self.g.edge_weight(pv1).is_none() || self.g.edge_weight(pv2).is_none() {
            return Err(GeomError::Registry(format!(
                "border surface {name} references an unknown placement"
            )));
        }
        self.surface_names.insert(name.to_owned());
        self.border_surfaces.push(BorderSurface {
            name: name.to_owned(),
            surface: surface.to_owned(),
            pv1,
            pv2,
        });
        Ok(())
    }
    /// Attach an optical surface to all placements of `lv`.
    /// # Errors
    /// This function returns an error if the name is already used, the optical surface or the
    /// volume does not exist.
    pub fn add_skin_surface(&mut self, name: &str, surface: &str, lv: LvId) -> GeomResult<()> {
        self.check_surface_name(name, surface)?;
        if self.g.node_weight(lv).is_none() {
            return Err(GeomError::Registry(format!(
                "skin surface {name} references an unknown volume"
            )));
        }
        self.surface_names.insert(name.to_owned());
        self.skin_surfaces.push(SkinSurface {
            name: name.to_owned(),
            surface: surface.to_owned(),
            lv,
        });
        Ok(())
    }
    /// `true` if a border surface from `pv1` to `pv2` exists.
    #[must_use]
    pub fn has_border_surface(&self, pv1: PvId, pv2: PvId) -> bool {
        self.border_surfaces
            .iter()
            .any(|b| b.pv1 == pv1 && b.pv2 == pv2)
    }
    /// All border surfaces in insertion order.
    #[must_use]
    pub fn border_surfaces(&self) -> &[BorderSurface] {
        &self.border_surfaces
    }
    /// All skin surfaces in insertion order.
    #[must_use]
    pub fn skin_surfaces(&self) -> &[SkinSurface] {
        &self.skin_surfaces
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        det_utils::DetectorKind,
        geometry::{SurfaceFinish, SurfaceType},
        millimeter,
    };
    use assert_matches::assert_matches;

    fn registry_with_world() -> (Registry, LvId) {
        let mut reg = Registry::new();
        reg.add_material(Material::nist("G4_Galactic")).unwrap();
        let world = reg
            .add_volume(
                "world",
                Solid::cuboid(millimeter!(100.), millimeter!(100.), millimeter!(100.)).unwrap(),
                "G4_Galactic",
            )
            .unwrap();
        reg.set_world(world).unwrap();
        (reg, world)
    }
    fn small_box(reg: &mut Registry, name: &str) -> LvId {
        reg.add_volume(
            name,
            Solid::cuboid(millimeter!(1.), millimeter!(1.), millimeter!(1.)).unwrap(),
            "G4_Galactic",
        )
        .unwrap()
    }
    #[test]
    fn new() {
        let reg = Registry::new();
        assert!(reg.world().is_none());
        assert_eq!(reg.n_logical_volumes(), 0);
        assert_eq!(reg.n_physical_volumes(), 0);
    }
    #[test]
    fn duplicate_names() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        assert_matches!(
            reg.add_solid(
                "a",
                Solid::cuboid(millimeter!(1.), millimeter!(1.), millimeter!(1.)).unwrap()
            ),
            Err(GeomError::Registry(_))
        );
        reg.place("a_pv", a, world, Isometry::identity()).unwrap();
        assert_matches!(
            reg.place("a_pv", a, world, Isometry::identity()),
            Err(GeomError::Registry(_))
        );
    }
    #[test]
    fn unknown_material() {
        let mut reg = Registry::new();
        let s = reg
            .add_solid(
                "s",
                Solid::cuboid(millimeter!(1.), millimeter!(1.), millimeter!(1.)).unwrap(),
            )
            .unwrap();
        assert_matches!(
            reg.add_logical_volume("s", s, "unobtainium"),
            Err(GeomError::Registry(_))
        );
    }
    #[test]
    fn place_cyclic() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        let b = small_box(&mut reg, "b");
        reg.place("b_in_a", b, a, Isometry::identity()).unwrap();
        reg.place("a_in_world", a, world, Isometry::identity()).unwrap();
        assert!(reg.place("a_in_b", a, b, Isometry::identity()).is_err());
        assert!(reg.place("a_in_a", a, a, Isometry::identity()).is_err());
        assert_eq!(reg.n_physical_volumes(), 2);
    }
    #[test]
    fn multiple_placements() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        let p1 = reg.place("a1", a, world, Isometry::identity()).unwrap();
        let p2 = reg
            .place(
                "a2",
                a,
                world,
                Isometry::new_translation(millimeter!(5., 0., 0.)).unwrap(),
            )
            .unwrap();
        assert_eq!(reg.daughters(world), vec![p1, p2]);
        assert_eq!(reg.pv_endpoints(p2), Some((world, a)));
        assert_eq!(reg.pv_by_name("a2"), Some(p2));
        assert_eq!(reg.physical_volume(p1).unwrap().name(), "a1");
    }
    #[test]
    fn walk_order() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        let b = small_box(&mut reg, "b");
        let c = small_box(&mut reg, "c");
        let pa = reg.place("pa", a, world, Isometry::identity()).unwrap();
        let pc = reg.place("pc", c, world, Isometry::identity()).unwrap();
        let pb = reg.place("pb", b, a, Isometry::identity()).unwrap();
        assert_eq!(reg.walk(world), vec![pa, pb, pc]);
    }
    #[test]
    fn cached_volume() {
        let mut reg = Registry::new();
        reg.add_material(Material::nist("G4_Galactic")).unwrap();
        let key = CacheKey::new("rod").length(millimeter!(1.43)).count(3);
        let mut calls = 0;
        let first = reg
            .cached_volume(key.clone(), |r| {
                calls += 1;
                Ok(small_box(r, "rod_a"))
            })
            .unwrap();
        let second = reg
            .cached_volume(key, |r| {
                calls += 1;
                Ok(small_box(r, "rod_b"))
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        let other = reg
            .cached_volume(
                CacheKey::new("rod").length(millimeter!(1.5)).count(3),
                |r| Ok(small_box(r, "rod_c")),
            )
            .unwrap();
        assert_ne!(first, other);
        assert_eq!(reg.logical_volume(first).unwrap().name(), "rod_a");
        assert_eq!(reg.n_cached(), 2);
    }
    #[test]
    fn cached_volume_error_not_cached() {
        let mut reg = Registry::new();
        let key = CacheKey::new("broken");
        assert!(reg
            .cached_volume(key.clone(), |_| Err(GeomError::Other("fail".into())))
            .is_err());
        assert_eq!(reg.n_cached(), 0);
    }
    #[test]
    fn tag_detector() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        let pv = reg.place("a", a, world, Isometry::identity()).unwrap();
        let info = DetectorInfo::new(DetectorKind::Germanium, 1, None);
        reg.tag_detector(pv, info.clone()).unwrap();
        assert_eq!(reg.detector(pv), Some(&info));
        assert!(reg.tag_detector(pv, info).is_err());
    }
    #[test]
    fn surfaces() {
        let (mut reg, world) = registry_with_world();
        let a = small_box(&mut reg, "a");
        let b = small_box(&mut reg, "b");
        let pa = reg.place("a", a, world, Isometry::identity()).unwrap();
        let pb = reg.place("b", b, a, Isometry::identity()).unwrap();
        assert!(reg.add_border_surface("bs", "nope", pa, pb).is_err());
        reg.add_optical_surface(OpticalSurface::unified(
            "surf",
            SurfaceFinish::Ground,
            SurfaceType::DielectricMetal,
            0.5,
        ))
        .unwrap();
        reg.add_border_surface("bs", "surf", pa, pb).unwrap();
        assert!(reg.has_border_surface(pa, pb));
        assert!(!reg.has_border_surface(pb, pa));
        assert!(reg.add_border_surface("bs", "surf", pb, pa).is_err());
        reg.add_skin_surface("ss", "surf", b).unwrap();
        assert_eq!(reg.skin_surfaces().len(), 1);
    }
}
