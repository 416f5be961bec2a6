//! Mesh quality metrics.
use crate::mesh::Mesh;
use crate::Real;
use numeric_literals::replace_float_literals;

/// Summary of the quality of a mesh.
///
/// Non-orthogonality is the angle (in degrees) between the owner-neighbour vector and the
/// face normal of an internal face. Skewness is the distance between the face centre and
/// the point where the owner-neighbour line crosses the face, normalised by the size of the
/// face in that direction.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshQuality<T> {
    pub max_non_orthogonality: T,
    pub average_non_orthogonality: T,
    pub max_skewness: T,
    pub min_volume: T,
    pub max_volume: T,
    pub total_volume: T,
    pub num_non_positive_volumes: usize,
}

impl<T: Real> Mesh<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn check_quality(&self) -> MeshQuality<T> {
        let rootvsmall = self.tolerances().rootvsmall;
        let centres = self.cell_centres();
        let face_centres = self.face_centres();
        let areas = self.face_areas();

        let mut max_non_orthogonality = T::zero();
        let mut sum_non_orthogonality = T::zero();
        let mut max_skewness = T::zero();

        for (face, (&own, &nei)) in self.owner().iter().zip(self.neighbour()).enumerate() {
            let d = centres[nei] - centres[own];
            let sf = areas[face];
            let cos_angle = sf.dot(&d) / (sf.norm() * d.norm() + rootvsmall);
            let angle = cos_angle.min(1.0).max(-1.0).acos() * 180.0 / T::pi();
            max_non_orthogonality = max_non_orthogonality.max(angle);
            sum_non_orthogonality += angle;

            let cpf = face_centres[face] - centres[own];
            let skewness_vector = cpf - d * (sf.dot(&cpf) / (sf.dot(&d) + rootvsmall));
            let skewness_direction = skewness_vector / (skewness_vector.norm() + rootvsmall);
            let mut face_size = 0.2 * d.norm() + rootvsmall;
            for &vertex in self.face(face) {
                let offset = self.points()[vertex] - face_centres[face];
                face_size = face_size.max(skewness_direction.dot(&offset).abs());
            }
            max_skewness = max_skewness.max(skewness_vector.norm() / face_size);
        }

        let average_non_orthogonality = if self.num_internal_faces() > 0 {
            sum_non_orthogonality / T::from_usize(self.num_internal_faces()).expect("Must be able to fit usize in T")
        } else {
            T::zero()
        };

        let volumes = self.cell_volumes();
        let min_volume = volumes.iter().copied().fold(T::max_value().expect("Real types have a maximum value"), |a, b| a.min(b));
        let max_volume = volumes.iter().copied().fold(T::min_value().expect("Real types have a minimum value"), |a, b| a.max(b));

        MeshQuality {
            max_non_orthogonality,
            average_non_orthogonality,
            max_skewness,
            min_volume,
            max_volume,
            total_volume: volumes.iter().copied().fold(T::zero(), |a, b| a + b),
            num_non_positive_volumes: volumes.iter().filter(|&&v| v <= T::zero()).count(),
        }
    }
}
