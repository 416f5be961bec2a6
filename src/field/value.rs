//! Value types stored in fields: scalars, vectors and tensors.
use crate::Real;
use nalgebra::{Matrix3, Vector3};
use num::Zero;
use numeric_literals::replace_float_literals;
use serde_json::Value;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

/// A value that can be stored in a field.
///
/// Field values form a linear space over the scalar type `T` and expose their components,
/// so that coefficients can be applied and linear systems solved component by component.
pub trait FieldValue<T: Real>:
    Copy
    + Debug
    + PartialEq
    + Zero
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<T, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign<T>
{
    const NUM_COMPONENTS: usize;
    const TYPE_NAME: &'static str;

    /// A value with every component equal to `value`.
    fn splat(value: T) -> Self;

    fn component(&self, index: usize) -> T;

    fn set_component(&mut self, index: usize, value: T);

    fn from_components(components: &[T]) -> Self {
        assert_eq!(components.len(), Self::NUM_COMPONENTS, "Wrong number of components");
        let mut value = Self::zero();
        for (i, &c) in components.iter().enumerate() {
            value.set_component(i, c);
        }
        value
    }

    /// Mirror image with respect to the plane with unit normal `normal`.
    fn reflect(&self, normal: &Vector3<T>) -> Self;

    fn mag(&self) -> T;

    fn cmpt_min(&self, other: &Self) -> Self;

    fn cmpt_max(&self, other: &Self) -> Self;

    fn cmpt_multiply(&self, other: &Self) -> Self;

    /// Diagonal of the transformation between a value and the normal gradient of its
    /// reflection about a symmetry plane with unit normal `normal`.
    fn symmetry_transform_diag(normal: &Vector3<T>) -> Self;

    fn cmpt_sum(&self) -> T {
        (0..Self::NUM_COMPONENTS).fold(T::zero(), |sum, i| sum + self.component(i))
    }

    fn cmpt_av(&self) -> T {
        self.cmpt_sum() / T::from_usize(Self::NUM_COMPONENTS).expect("Must be able to fit usize in T")
    }

    fn cmpt_min_value(&self) -> T {
        (1..Self::NUM_COMPONENTS).fold(self.component(0), |m, i| m.min(self.component(i)))
    }

    fn cmpt_max_value(&self) -> T {
        (1..Self::NUM_COMPONENTS).fold(self.component(0), |m, i| m.max(self.component(i)))
    }

    fn cmpt_mag(&self) -> Self {
        let mut result = *self;
        for i in 0..Self::NUM_COMPONENTS {
            result.set_component(i, self.component(i).abs());
        }
        result
    }
}

/// Field values with a gradient of one rank higher.
///
/// Gradients follow the convention `grad(U)_ij = dU_j/dx_i`, so that column `j` of the
/// gradient of a vector is the gradient of component `j`.
pub trait Differentiable<T: Real>: FieldValue<T> {
    type Gradient: FieldValue<T>;

    /// The outer product `d ⊗ value`.
    fn outer(d: &Vector3<T>, value: &Self) -> Self::Gradient;

    /// The inner product `n · gradient`.
    fn grad_dot(n: &Vector3<T>, gradient: &Self::Gradient) -> Self;

    fn gradient_component(gradient: &Self::Gradient, component: usize) -> Vector3<T>;

    fn set_gradient_component(gradient: &mut Self::Gradient, component: usize, value: Vector3<T>);
}

impl<T: Real> FieldValue<T> for T {
    const NUM_COMPONENTS: usize = 1;
    const TYPE_NAME: &'static str = "scalar";

    fn splat(value: T) -> Self {
        value
    }

    fn component(&self, index: usize) -> T {
        assert_eq!(index, 0, "Scalars have a single component");
        *self
    }

    fn set_component(&mut self, index: usize, value: T) {
        assert_eq!(index, 0, "Scalars have a single component");
        *self = value;
    }

    fn reflect(&self, _normal: &Vector3<T>) -> Self {
        *self
    }

    fn mag(&self) -> T {
        self.abs()
    }

    fn cmpt_min(&self, other: &Self) -> Self {
        self.min(*other)
    }

    fn cmpt_max(&self, other: &Self) -> Self {
        self.max(*other)
    }

    fn cmpt_multiply(&self, other: &Self) -> Self {
        *self * *other
    }

    fn symmetry_transform_diag(_normal: &Vector3<T>) -> Self {
        T::zero()
    }
}

impl<T: Real> Differentiable<T> for T {
    type Gradient = Vector3<T>;

    fn outer(d: &Vector3<T>, value: &Self) -> Vector3<T> {
        d * *value
    }

    fn grad_dot(n: &Vector3<T>, gradient: &Vector3<T>) -> Self {
        n.dot(gradient)
    }

    fn gradient_component(gradient: &Vector3<T>, component: usize) -> Vector3<T> {
        assert_eq!(component, 0, "Scalars have a single component");
        *gradient
    }

    fn set_gradient_component(gradient: &mut Vector3<T>, component: usize, value: Vector3<T>) {
        assert_eq!(component, 0, "Scalars have a single component");
        *gradient = value;
    }
}

impl<T: Real> FieldValue<T> for Vector3<T> {
    const NUM_COMPONENTS: usize = 3;
    const TYPE_NAME: &'static str = "vector";

    fn splat(value: T) -> Self {
        Vector3::repeat(value)
    }

    fn component(&self, index: usize) -> T {
        self[index]
    }

    fn set_component(&mut self, index: usize, value: T) {
        self[index] = value;
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn reflect(&self, normal: &Vector3<T>) -> Self {
        self - normal * (2.0 * normal.dot(self))
    }

    fn mag(&self) -> T {
        self.norm()
    }

    fn cmpt_min(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.min(b))
    }

    fn cmpt_max(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.max(b))
    }

    fn cmpt_multiply(&self, other: &Self) -> Self {
        self.component_mul(other)
    }

    fn symmetry_transform_diag(normal: &Vector3<T>) -> Self {
        normal.map(|x| x.abs())
    }
}

impl<T: Real> Differentiable<T> for Vector3<T> {
    type Gradient = Matrix3<T>;

    fn outer(d: &Vector3<T>, value: &Self) -> Matrix3<T> {
        d * value.transpose()
    }

    fn grad_dot(n: &Vector3<T>, gradient: &Matrix3<T>) -> Self {
        gradient.tr_mul(n)
    }

    fn gradient_component(gradient: &Matrix3<T>, component: usize) -> Vector3<T> {
        gradient.column(component).into_owned()
    }

    fn set_gradient_component(gradient: &mut Matrix3<T>, component: usize, value: Vector3<T>) {
        gradient.set_column(component, &value);
    }
}

impl<T: Real> FieldValue<T> for Matrix3<T> {
    const NUM_COMPONENTS: usize = 9;
    const TYPE_NAME: &'static str = "tensor";

    fn splat(value: T) -> Self {
        Matrix3::repeat(value)
    }

    /// Components in row-major order, `xx, xy, xz, yx, ...`.
    fn component(&self, index: usize) -> T {
        self[(index / 3, index % 3)]
    }

    fn set_component(&mut self, index: usize, value: T) {
        self[(index / 3, index % 3)] = value;
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn reflect(&self, normal: &Vector3<T>) -> Self {
        let r = Matrix3::identity() - normal * normal.transpose() * 2.0;
        r * self * r
    }

    fn mag(&self) -> T {
        self.norm()
    }

    fn cmpt_min(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.min(b))
    }

    fn cmpt_max(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a.max(b))
    }

    fn cmpt_multiply(&self, other: &Self) -> Self {
        self.component_mul(other)
    }

    fn symmetry_transform_diag(normal: &Vector3<T>) -> Self {
        let d = normal.map(|x| x.abs());
        d * d.transpose()
    }
}

/// Reads a value from JSON: a number for scalars, or an array with one number per component.
pub fn value_from_json<T: Real, V: FieldValue<T>>(json: &Value) -> Option<V> {
    let to_real = |v: &Value| v.as_f64().and_then(T::from_f64);
    match json {
        Value::Number(_) if V::NUM_COMPONENTS == 1 => to_real(json).map(V::splat),
        Value::Array(items) if items.len() == V::NUM_COMPONENTS => {
            let components = items.iter().map(to_real).collect::<Option<Vec<_>>>()?;
            Some(V::from_components(&components))
        }
        _ => None,
    }
}
