use super::models::StoresConfig;
use crate::storage::StoreKind;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Unknown application variant '{0}'")]
    UnknownVariant(String),
}

/// One store to mount and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSpec {
    pub name: String,
    pub kind: StoreKind,
}

/// Resolves the configured store tables into the set mounted for one run
pub struct StoreSetResolver<'a> {
    stores: &'a StoresConfig,
}

impl<'a> StoreSetResolver<'a> {
    pub fn new(stores: &'a StoresConfig) -> Self {
        Self { stores }
    }

    /// Core stores, the extras of the configured variant, and opaque stores,
    /// deduplicated and ordered by name
    pub fn resolve(&self) -> Result<Vec<StoreSpec>, ResolverError> {
        let mut specs: BTreeMap<&str, StoreKind> = BTreeMap::new();

        for name in &self.stores.core {
            specs.insert(name, StoreKind::Versioned);
        }
        for name in self.variant_extras()? {
            specs.insert(name, StoreKind::Versioned);
        }
        // Opaque overrides: a name listed there is never treated as versioned
        for name in &self.stores.opaque {
            specs.insert(name, StoreKind::Opaque);
        }

        Ok(specs
            .into_iter()
            .map(|(name, kind)| StoreSpec {
                name: name.to_string(),
                kind,
            })
            .collect())
    }

    fn variant_extras(&self) -> Result<&'a [String], ResolverError> {
        match self.stores.app.as_deref() {
            None => Ok(&[]),
            Some(app) => self
                .stores
                .variants
                .get(app)
                .map(Vec::as_slice)
                .ok_or_else(|| ResolverError::UnknownVariant(app.to_string())),
        }
    }
}
