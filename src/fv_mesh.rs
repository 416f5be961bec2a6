//! The finite volume mesh: a [`Mesh`] together with the state shared by all discretisation
//! operators.
use crate::cache::{GenerationCache, GenerationKey};
use crate::config::{SchemesConfig, SolutionConfig};
use crate::error::{ExchangeError, MeshError};
use crate::interpolation::SurfaceInterpolation;
use crate::mesh::{Mesh, PatchInfo, PatchKind};
use crate::parallel::exchange::{geometry_tag, ExchangePlan};
use crate::parallel::Transport;
use crate::schemes::FvSchemes;
use crate::time::Time;
use crate::Real;
use log::{debug, warn};
use nalgebra::{Point3, Vector3};
use numeric_literals::replace_float_literals;
use std::fmt;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Arc;

/// Geometry of the cells on the remote side of a processor patch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorGeometry<T: Real> {
    pub neighbour_cell_centres: Vec<Point3<T>>,
    pub neighbour_face_centres: Vec<Point3<T>>,
}

pub struct FvMesh<T: Real> {
    mesh: Mesh<T>,
    time: Time<T>,
    schemes: FvSchemes<T>,
    solution: SolutionConfig,
    transport: Option<Arc<dyn Transport<T>>>,
    processor_geometry: Vec<Option<ProcessorGeometry<T>>>,
    coupling_generation: u64,
    cache: GenerationCache,
}

impl<T: Real> Debug for FvMesh<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FvMesh")
            .field("mesh", &self.mesh)
            .field("time", &self.time)
            .field("schemes", &self.schemes.config())
            .field("solution", &self.solution)
            .field("transport", &self.transport)
            .field("coupling_generation", &self.coupling_generation)
            .finish()
    }
}

impl<T: Real> FvMesh<T> {
    /// A mesh with default time settings, no scheme entries and built-in scheme registries.
    pub fn new(mesh: Mesh<T>) -> Self {
        let num_patches = mesh.patches().len();
        Self {
            mesh,
            time: Time::default(),
            schemes: FvSchemes::new(SchemesConfig::default()),
            solution: SolutionConfig::default(),
            transport: None,
            processor_geometry: vec![None; num_patches],
            coupling_generation: 0,
            cache: GenerationCache::default(),
        }
    }

    pub fn with_time(mut self, time: Time<T>) -> Self {
        self.time = time;
        self
    }

    pub fn with_schemes(mut self, config: SchemesConfig) -> Self {
        self.schemes.set_config(config);
        self
    }

    pub fn with_solution(mut self, solution: SolutionConfig) -> Self {
        self.solution = solution;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport<T>>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn mesh(&self) -> &Mesh<T> {
        &self.mesh
    }

    pub fn time(&self) -> &Time<T> {
        &self.time
    }

    pub fn time_mut(&mut self) -> &mut Time<T> {
        &mut self.time
    }

    pub fn schemes(&self) -> &FvSchemes<T> {
        &self.schemes
    }

    pub fn schemes_mut(&mut self) -> &mut FvSchemes<T> {
        &mut self.schemes
    }

    pub fn solution(&self) -> &SolutionConfig {
        &self.solution
    }

    pub fn transport(&self) -> Option<&dyn Transport<T>> {
        self.transport.as_deref()
    }

    /// Moves the mesh points. Cached geometric quantities are recomputed on next access.
    ///
    /// Neighbour geometry received over processor patches is discarded, and must be exchanged
    /// again with [`exchange_processor_geometry`](Self::exchange_processor_geometry).
    pub fn move_points(&mut self, points: Vec<Point3<T>>) -> Result<(), MeshError> {
        self.mesh.move_points(points)?;
        self.discard_processor_geometry();
        Ok(())
    }

    pub fn update_topology(
        &mut self,
        points: Vec<Point3<T>>,
        faces: Vec<Vec<usize>>,
        owner: Vec<usize>,
        neighbour: Vec<usize>,
        patches: Vec<PatchInfo<T>>,
    ) -> Result<(), MeshError> {
        self.mesh
            .update_topology(points, faces, owner, neighbour, patches)?;
        self.processor_geometry = vec![None; self.mesh.patches().len()];
        self.discard_processor_geometry();
        Ok(())
    }

    fn discard_processor_geometry(&mut self) {
        for geometry in &mut self.processor_geometry {
            *geometry = None;
        }
        self.coupling_generation += 1;
    }

    pub(crate) fn generation_key(&self) -> GenerationKey {
        GenerationKey {
            topology: self.mesh.topology_generation(),
            geometry: self.mesh.geometry_generation(),
            coupling: self.coupling_generation,
        }
    }

    pub(crate) fn cache(&self) -> &GenerationCache {
        &self.cache
    }

    /// Interpolation weights, distance coefficients and non-orthogonal correction vectors.
    ///
    /// Computed on first access and whenever the mesh has changed since the last access.
    pub fn interpolation(&self) -> Rc<SurfaceInterpolation<T>> {
        self.cache.get_or_compute(self.generation_key(), || {
            debug!("Computing surface interpolation geometry");
            SurfaceInterpolation::new(self)
        })
    }

    /// Unit normals of the faces of a patch.
    pub fn patch_normals(&self, patch: usize) -> Vec<Vector3<T>> {
        self.mesh
            .patch(patch)
            .face_range()
            .map(|face| self.mesh.face_normal(face))
            .collect()
    }

    pub fn processor_geometry(&self, patch: usize) -> Option<&ProcessorGeometry<T>> {
        self.processor_geometry.get(patch)?.as_ref()
    }

    pub fn exchange_plan(&self, patch: usize) -> Option<ExchangePlan> {
        ExchangePlan::for_patch(&self.mesh, patch)
    }

    /// Centres of the cells across the faces of a coupled patch, or `None` for other patches.
    ///
    /// For cyclic patches these are the partner patch's face cells shifted by the separation.
    /// For processor patches they are the centres received from the neighbouring rank; if no
    /// geometry has been exchanged, the face cell centres mirrored about the faces are used.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn coupled_neighbour_centres(&self, patch: usize) -> Option<Vec<Point3<T>>> {
        let info = self.mesh.patch(patch);
        let centres = self.mesh.cell_centres();
        match info.kind() {
            PatchKind::Cyclic {
                neighbour_patch,
                separation,
            } => Some(
                self.mesh
                    .patch_face_cells(*neighbour_patch)
                    .iter()
                    .map(|&cell| centres[cell] + separation)
                    .collect(),
            ),
            PatchKind::Processor { .. } => match self.processor_geometry(patch) {
                Some(geometry) => Some(geometry.neighbour_cell_centres.clone()),
                None => {
                    warn!(
                        "No neighbour geometry for processor patch `{}`, mirroring face cells",
                        info.name()
                    );
                    let face_centres = &self.mesh.face_centres()[info.face_range()];
                    Some(
                        self.mesh
                            .patch_face_cells(patch)
                            .iter()
                            .zip(face_centres)
                            .map(|(&cell, cf)| Point3::from(cf.coords * 2.0 - centres[cell].coords))
                            .collect(),
                    )
                }
            },
            _ => None,
        }
    }

    /// First phase of the processor geometry exchange: sends the face cell centres and face
    /// centres of every processor patch to the neighbouring rank.
    pub fn init_exchange_processor_geometry(&self) -> Result<(), ExchangeError> {
        for patch in 0..self.mesh.patches().len() {
            if let Some(plan) = self.exchange_plan(patch) {
                let transport = self.require_transport(patch)?;
                let centres = self.mesh.cell_centres();
                let face_centres = &self.mesh.face_centres()[self.mesh.patch(patch).face_range()];
                let mut buffer = Vec::with_capacity(6 * plan.face_cells().len());
                for (&cell, cf) in plan.face_cells().iter().zip(face_centres) {
                    buffer.extend(centres[cell].iter().copied());
                    buffer.extend(cf.iter().copied());
                }
                transport.send(plan.neighbour_rank(), geometry_tag(plan.tag()), buffer)?;
            }
        }
        Ok(())
    }

    /// Second phase of the processor geometry exchange: receives the neighbour geometry and
    /// checks that paired faces coincide.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn finish_exchange_processor_geometry(&mut self) -> Result<(), ExchangeError> {
        for patch in 0..self.mesh.patches().len() {
            if let Some(plan) = self.exchange_plan(patch) {
                let transport = self.require_transport(patch)?;
                let buffer = transport.receive(plan.neighbour_rank(), geometry_tag(plan.tag()))?;
                let info = self.mesh.patch(patch);
                if buffer.len() != 6 * info.size() {
                    return Err(ExchangeError::BufferSizeMismatch {
                        patch: info.name().to_string(),
                        expected: 6 * info.size(),
                        actual: buffer.len(),
                    });
                }

                let mut geometry = ProcessorGeometry {
                    neighbour_cell_centres: Vec::with_capacity(info.size()),
                    neighbour_face_centres: Vec::with_capacity(info.size()),
                };
                for (i, chunk) in buffer.chunks_exact(6).enumerate() {
                    let face = info.start() + i;
                    let cell_centre = Point3::new(chunk[0], chunk[1], chunk[2]);
                    let face_centre = Point3::new(chunk[3], chunk[4], chunk[5]);
                    let distance = (face_centre - self.mesh.face_centres()[face]).norm();
                    let face_size = self.mesh.face_area_magnitudes()[face].sqrt();
                    let tolerance = 1e-4 * self.mesh.tolerances().floor_rootvsmall(face_size);
                    if distance > tolerance {
                        return Err(ExchangeError::GeometryMismatch {
                            patch: info.name().to_string(),
                            face: i,
                            distance: format!("{}", distance),
                        });
                    }
                    geometry.neighbour_cell_centres.push(cell_centre);
                    geometry.neighbour_face_centres.push(face_centre);
                }
                debug!("Received neighbour geometry for processor patch `{}`", info.name());
                self.processor_geometry[patch] = Some(geometry);
            }
        }
        self.coupling_generation += 1;
        Ok(())
    }

    /// Exchanges neighbour geometry over all processor patches.
    ///
    /// Every rank must call this at the same point of the computation.
    pub fn exchange_processor_geometry(&mut self) -> Result<(), ExchangeError> {
        self.init_exchange_processor_geometry()?;
        self.finish_exchange_processor_geometry()
    }

    pub(crate) fn require_transport(&self, patch: usize) -> Result<&dyn Transport<T>, ExchangeError> {
        self.transport().ok_or_else(|| ExchangeError::NoTransport {
            patch: self.mesh.patch(patch).name().to_string(),
        })
    }
}
