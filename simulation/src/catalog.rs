use std::{collections::HashMap, sync::Arc};

use comms::specs::model::ModelSpec;

use crate::{error::LoadErr, model::Model, population};

/// Builds a model of one kind from a blob's version and parameters.
pub type Constructor = fn(u32, &serde_json::Value) -> Result<Arc<dyn Model>, LoadErr>;

/// The model kinds compiled into this binary.
///
/// Activating a model is a lookup in this table, no code is ever loaded from
/// the network.
#[derive(Clone)]
pub struct Catalog {
    kinds: HashMap<&'static str, Constructor>,
}

impl Catalog {
    /// A catalog without any kind.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// A catalog holding every kind shipped with this crate.
    pub fn builtin() -> Self {
        Self::empty().with(population::KIND, |version, params| {
            let model: Arc<dyn Model> =
                Arc::new(population::Population::from_params(version, params)?);
            Ok(model)
        })
    }

    /// Adds or replaces a kind.
    pub fn with(mut self, kind: &'static str, constructor: Constructor) -> Self {
        self.kinds.insert(kind, constructor);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Instantiates the model a spec describes.
    ///
    /// # Returns
    /// The model or `LoadErr::UnknownKind` if the kind isn't in the catalog.
    pub fn instantiate(&self, spec: &ModelSpec) -> Result<Arc<dyn Model>, LoadErr> {
        let constructor = self
            .kinds
            .get(spec.kind.as_str())
            .ok_or_else(|| LoadErr::UnknownKind(spec.kind.clone()))?;

        constructor(spec.version, &spec.params)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
