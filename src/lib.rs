//! Finite volume discretization on polyhedral meshes.
//!
//! The crate is organised around a face-based [`Mesh`](mesh::Mesh), wrapped by an
//! [`FvMesh`](fv_mesh::FvMesh) that adds time, scheme selection, cached interpolation
//! geometry and (for decomposed runs) a message transport. Cell-centred
//! [`VolField`](field::VolField)s carry one boundary condition per patch. Implicit
//! operators in [`fvm`] assemble [`FvMatrix`](matrix::FvMatrix) systems, explicit operators
//! in [`fvc`] evaluate fields directly.
pub mod boundary;
pub mod config;
pub mod convection;
pub mod ddt;
pub mod dimensions;
pub mod error;
pub mod field;
pub mod fv_mesh;
pub mod fvc;
pub mod fvm;
pub mod grad;
pub mod interpolation;
pub mod laplacian;
pub mod matrix;
pub mod mesh;
pub mod parallel;
pub mod schemes;
pub mod sn_grad;
pub mod time;

pub(crate) mod cache;

pub mod geometry {
    pub use finvol_geometry::*;
}

pub mod sparse {
    pub use finvol_sparse::*;
}

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub use finvol_traits::{Real, Tolerances};

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;
