//! Selection of discretisation schemes from configuration.
//!
//! Every operator looks up its scheme by a key such as `grad(T)` or `div(phi,U)` in the
//! corresponding table of the [`SchemesConfig`], falling back to the table's `default`
//! entry. The scheme string is tokenized into a [`SchemeStream`] and handed to the factories
//! of a [`SchemeRegistry`]. Factories may in turn parse nested schemes from the same stream,
//! e.g. `cellLimited Gauss linear 1`.
use crate::config::{lookup_scheme, SchemeTable, SchemesConfig};
use crate::convection::{ConvectionScheme, InterpolationScheme};
use crate::ddt::DdtScheme;
use crate::error::SchemeError;
use crate::field::Differentiable;
use crate::grad::GradScheme;
use crate::laplacian::LaplacianScheme;
use crate::sn_grad::SnGradScheme;
use crate::Real;
use log::debug;
use nalgebra::Vector3;

mod registry;
mod stream;

pub use registry::{SchemeFactory, SchemeFamily, SchemeRegistry};
pub use stream::SchemeStream;

/// Value types with their own scheme registry in [`FvSchemes`].
pub trait SchemeValue<T: Real>: Differentiable<T> {
    fn registry(schemes: &FvSchemes<T>) -> &SchemeRegistry<T, Self>;

    fn registry_mut(schemes: &mut FvSchemes<T>) -> &mut SchemeRegistry<T, Self>;
}

impl<T: Real> SchemeValue<T> for T {
    fn registry(schemes: &FvSchemes<T>) -> &SchemeRegistry<T, T> {
        &schemes.scalar
    }

    fn registry_mut(schemes: &mut FvSchemes<T>) -> &mut SchemeRegistry<T, T> {
        &mut schemes.scalar
    }
}

impl<T: Real> SchemeValue<T> for Vector3<T> {
    fn registry(schemes: &FvSchemes<T>) -> &SchemeRegistry<T, Vector3<T>> {
        &schemes.vector
    }

    fn registry_mut(schemes: &mut FvSchemes<T>) -> &mut SchemeRegistry<T, Vector3<T>> {
        &mut schemes.vector
    }
}

/// The scheme tables of a case together with the registries used to build schemes.
#[derive(Debug)]
pub struct FvSchemes<T: Real> {
    config: SchemesConfig,
    scalar: SchemeRegistry<T, T>,
    vector: SchemeRegistry<T, Vector3<T>>,
}

impl<T: Real> FvSchemes<T> {
    /// Scheme tables with the built-in registries.
    pub fn new(config: SchemesConfig) -> Self {
        Self::with_registries(config, SchemeRegistry::with_defaults(), SchemeRegistry::with_defaults())
    }

    pub fn with_registries(
        config: SchemesConfig,
        scalar: SchemeRegistry<T, T>,
        vector: SchemeRegistry<T, Vector3<T>>,
    ) -> Self {
        Self { config, scalar, vector }
    }

    pub fn config(&self) -> &SchemesConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SchemesConfig) {
        self.config = config;
    }

    pub fn registry<V: SchemeValue<T>>(&self) -> &SchemeRegistry<T, V> {
        V::registry(self)
    }

    pub fn registry_mut<V: SchemeValue<T>>(&mut self) -> &mut SchemeRegistry<T, V> {
        V::registry_mut(self)
    }

    pub fn scalar_registry(&self) -> &SchemeRegistry<T, T> {
        &self.scalar
    }

    fn select<S>(
        &self,
        table_name: &'static str,
        table: &SchemeTable,
        key: &str,
        parse: impl FnOnce(&mut SchemeStream<'_>) -> Result<S, SchemeError>,
    ) -> Result<S, SchemeError> {
        let scheme = lookup_scheme(table, key).ok_or_else(|| SchemeError::MissingEntry {
            table: table_name,
            key: key.to_string(),
        })?;
        debug!("Selecting {} entry `{}`: `{}`", table_name, key, scheme);
        let mut stream = SchemeStream::new(scheme);
        parse(&mut stream)
            .and_then(|selected| stream.finish().map(|_| selected))
            .map_err(|err| err.in_entry(key, scheme))
    }

    pub fn interpolation_scheme<V: SchemeValue<T>>(
        &self,
        key: &str,
    ) -> Result<Box<dyn InterpolationScheme<T, V>>, SchemeError> {
        self.select("interpolationSchemes", &self.config.interpolation_schemes, key, |stream| {
            V::registry(self).interpolation.parse(self, stream)
        })
    }

    pub fn grad_scheme<V: SchemeValue<T>>(&self, key: &str) -> Result<Box<dyn GradScheme<T, V>>, SchemeError> {
        self.select("gradSchemes", &self.config.grad_schemes, key, |stream| {
            V::registry(self).grad.parse(self, stream)
        })
    }

    pub fn sn_grad_scheme<V: SchemeValue<T>>(&self, key: &str) -> Result<Box<dyn SnGradScheme<T, V>>, SchemeError> {
        self.select("snGradSchemes", &self.config.sn_grad_schemes, key, |stream| {
            V::registry(self).sn_grad.parse(self, stream)
        })
    }

    pub fn div_scheme<V: SchemeValue<T>>(&self, key: &str) -> Result<Box<dyn ConvectionScheme<T, V>>, SchemeError> {
        self.select("divSchemes", &self.config.div_schemes, key, |stream| {
            V::registry(self).convection.parse(self, stream)
        })
    }

    pub fn laplacian_scheme<V: SchemeValue<T>>(
        &self,
        key: &str,
    ) -> Result<Box<dyn LaplacianScheme<T, V>>, SchemeError> {
        self.select("laplacianSchemes", &self.config.laplacian_schemes, key, |stream| {
            V::registry(self).laplacian.parse(self, stream)
        })
    }

    pub fn ddt_scheme<V: SchemeValue<T>>(&self, key: &str) -> Result<Box<dyn DdtScheme<T, V>>, SchemeError> {
        self.select("ddtSchemes", &self.config.ddt_schemes, key, |stream| {
            V::registry(self).ddt.parse(self, stream)
        })
    }

    /// The raw scheme string of a `divSchemes` entry, for schemes built outside the registry.
    pub fn div_scheme_string(&self, key: &str) -> Result<&str, SchemeError> {
        lookup_scheme(&self.config.div_schemes, key).ok_or_else(|| SchemeError::MissingEntry {
            table: "divSchemes",
            key: key.to_string(),
        })
    }
}

impl<T: Real> Default for FvSchemes<T> {
    fn default() -> Self {
        Self::new(SchemesConfig::default())
    }
}
