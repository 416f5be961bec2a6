use crate::convection::{ConvectionScheme, InterpolationScheme};
use crate::ddt::DdtScheme;
use crate::error::SchemeError;
use crate::grad::GradScheme;
use crate::laplacian::LaplacianScheme;
use crate::schemes::{FvSchemes, SchemeStream, SchemeValue};
use crate::sn_grad::SnGradScheme;
use crate::Real;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Debug;

/// Builds a scheme from the tokens following its name.
pub type SchemeFactory<T, S> = Box<dyn Fn(&FvSchemes<T>, &mut SchemeStream<'_>) -> Result<S, SchemeError>>;

/// Factories of one family of schemes (e.g. gradient schemes), keyed by scheme name.
pub struct SchemeFamily<T: Real, S> {
    family: &'static str,
    factories: BTreeMap<String, SchemeFactory<T, S>>,
}

impl<T: Real, S> Debug for SchemeFamily<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeFamily")
            .field("family", &self.family)
            .field("schemes", &self.names())
            .finish()
    }
}

impl<T: Real, S> SchemeFamily<T, S> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: BTreeMap::new(),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Adds (or replaces) the factory for a scheme name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&FvSchemes<T>, &mut SchemeStream<'_>) -> Result<S, SchemeError> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Reads a scheme name from the stream and builds the scheme from the tokens that follow.
    pub fn parse(&self, schemes: &FvSchemes<T>, stream: &mut SchemeStream<'_>) -> Result<S, SchemeError> {
        let name = stream.next_word(self.family)?;
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchemeError::UnknownScheme {
                family: self.family,
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })?;
        factory(schemes, stream)
    }
}

/// All scheme families for fields with values of type `V`.
///
/// A registry is an ordinary value owned by [`FvSchemes`]: tests and applications can add
/// their own schemes without affecting other meshes.
#[derive(Debug)]
pub struct SchemeRegistry<T: Real, V: SchemeValue<T>> {
    pub interpolation: SchemeFamily<T, Box<dyn InterpolationScheme<T, V>>>,
    pub grad: SchemeFamily<T, Box<dyn GradScheme<T, V>>>,
    pub sn_grad: SchemeFamily<T, Box<dyn SnGradScheme<T, V>>>,
    pub convection: SchemeFamily<T, Box<dyn ConvectionScheme<T, V>>>,
    pub laplacian: SchemeFamily<T, Box<dyn LaplacianScheme<T, V>>>,
    pub ddt: SchemeFamily<T, Box<dyn DdtScheme<T, V>>>,
}

impl<T: Real, V: SchemeValue<T>> SchemeRegistry<T, V> {
    /// A registry without any schemes.
    pub fn empty() -> Self {
        Self {
            interpolation: SchemeFamily::new("interpolation"),
            grad: SchemeFamily::new("grad"),
            sn_grad: SchemeFamily::new("snGrad"),
            convection: SchemeFamily::new("convection"),
            laplacian: SchemeFamily::new("laplacian"),
            ddt: SchemeFamily::new("ddt"),
        }
    }

    /// A registry with all built-in schemes.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        crate::convection::register_interpolation_schemes(&mut registry.interpolation);
        crate::convection::register_convection_schemes(&mut registry.convection);
        crate::grad::register_grad_schemes(&mut registry.grad);
        crate::sn_grad::register_sn_grad_schemes(&mut registry.sn_grad);
        crate::laplacian::register_laplacian_schemes(&mut registry.laplacian);
        crate::ddt::register_ddt_schemes(&mut registry.ddt);
        registry
    }
}

impl<T: Real, V: SchemeValue<T>> Default for SchemeRegistry<T, V> {
    fn default() -> Self {
        Self::with_defaults()
    }
}
