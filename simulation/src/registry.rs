use std::{
    collections::{HashMap, HashSet},
    env, fmt,
    sync::Arc,
};

use comms::specs::model::ModelSpec;
use log::{debug, info, warn};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::{catalog::Catalog, codec::SampleLayout, error::LoadErr, model::Model};

/// Which model blobs a registry accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Accept every blob whose kind is in the catalog.
    #[default]
    AcceptAll,
    /// Only accept blobs whose sha256 fingerprint is in the set.
    Pinned(HashSet<String>),
}

impl TrustPolicy {
    /// Parses a comma separated list of hex sha256 fingerprints.
    pub fn pinned<'a, I>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pins = fingerprints
            .into_iter()
            .map(|fp| fp.trim().to_ascii_lowercase())
            .filter(|fp| !fp.is_empty())
            .collect();

        Self::Pinned(pins)
    }

    /// Reads `TRUSTED_MODELS`, accepting everything when it isn't set.
    pub fn from_env() -> Self {
        match env::var("TRUSTED_MODELS") {
            Ok(pins) => Self::pinned(pins.split(',')),
            Err(_) => Self::AcceptAll,
        }
    }

    pub fn admits(&self, fingerprint: &str) -> bool {
        match self {
            TrustPolicy::AcceptAll => true,
            TrustPolicy::Pinned(pins) => pins.contains(fingerprint),
        }
    }
}

/// Computes the hex encoded sha256 of a model blob.
pub fn fingerprint(code: &[u8]) -> String {
    hex::encode(Sha256::digest(code))
}

/// A registered model, ready to run tasks.
pub struct ModelFactory {
    name: String,
    code: Vec<u8>,
    fingerprint: String,
    spec: ModelSpec,
    model: Arc<dyn Model>,
}

impl ModelFactory {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blob this model was registered from.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    pub fn layout(&self) -> SampleLayout {
        self.model.layout()
    }
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("name", &self.name)
            .field("kind", &self.spec.kind)
            .field("version", &self.spec.version)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// Models registered on a node, keyed by name.
///
/// Registering an existing name replaces the entry with a single insert under
/// the write lock, readers see either the old or the new factory.
pub struct ModelRegistry {
    catalog: Catalog,
    trust: TrustPolicy,
    models: RwLock<HashMap<String, Arc<ModelFactory>>>,
}

impl ModelRegistry {
    /// Creates a new empty `ModelRegistry`.
    ///
    /// # Arguments
    /// * `catalog` - The kinds that can be activated.
    /// * `trust` - The policy applied to every blob.
    pub fn new(catalog: Catalog, trust: TrustPolicy) -> Self {
        Self {
            catalog,
            trust,
            models: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a factory from a blob without registering it.
    ///
    /// # Arguments
    /// * `name` - The name the model will be known by.
    /// * `code` - The serialized `ModelSpec`.
    pub fn load(&self, name: &str, code: &[u8]) -> Result<ModelFactory, LoadErr> {
        let fingerprint = fingerprint(code);

        if !self.trust.admits(&fingerprint) {
            return Err(LoadErr::Untrusted {
                name: name.to_string(),
                fingerprint,
            });
        }

        let spec: ModelSpec = serde_json::from_slice(code)?;
        let model = self.catalog.instantiate(&spec)?;

        Ok(ModelFactory {
            name: name.to_string(),
            code: code.to_vec(),
            fingerprint,
            spec,
            model,
        })
    }

    /// Loads and registers a model, replacing any entry with the same name.
    ///
    /// # Returns
    /// The new factory, or a `LoadErr` leaving the registry untouched.
    pub fn register(&self, name: &str, code: &[u8]) -> Result<Arc<ModelFactory>, LoadErr> {
        let factory = Arc::new(self.load(name, code)?);

        let replaced = self
            .models
            .write()
            .insert(name.to_string(), Arc::clone(&factory));

        match replaced {
            Some(old) if old.fingerprint() != factory.fingerprint() => {
                info!(model = name, fingerprint = factory.fingerprint(); "replaced model")
            }
            Some(_) => debug!(model = name; "re-registered identical model"),
            None => info!(
                model = name,
                kind = factory.spec().kind.as_str(),
                fingerprint = factory.fingerprint();
                "registered model"
            ),
        }

        Ok(factory)
    }

    /// Looks up a registered model.
    ///
    /// # Returns
    /// The factory or `LoadErr::NotFound`.
    pub fn resolve(&self, name: &str) -> Result<Arc<ModelFactory>, LoadErr> {
        self.models
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| LoadErr::NotFound(name.to_string()))
    }

    /// Removes a model, doing nothing if it isn't registered.
    ///
    /// # Returns
    /// Whether a model was removed.
    pub fn evict(&self, name: &str) -> bool {
        let evicted = self.models.write().remove(name).is_some();

        if evicted {
            info!(model = name; "evicted model");
        } else {
            warn!(model = name; "tried to evict an unregistered model");
        }

        evicted
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    pub fn clear(&self) {
        self.models.write().clear();
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(Catalog::builtin(), TrustPolicy::AcceptAll)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use serde_json::json;

    use super::*;

    fn blob(rate: f64) -> Vec<u8> {
        ModelSpec::new(
            "population",
            json!({
                "species": ["S", "I", "R"],
                "reactions": [
                    { "reactants": { "S": 1, "I": 1 }, "products": { "I": 2 }, "rate": rate },
                    { "reactants": { "I": 1 }, "products": { "R": 1 }, "rate": 0.1 },
                ],
            }),
        )
        .to_blob()
        .unwrap()
    }

    #[test]
    fn register_resolve_evict() {
        let registry = ModelRegistry::default();
        assert!(matches!(registry.resolve("sir"), Err(LoadErr::NotFound(_))));

        let factory = registry.register("sir", &blob(0.01)).unwrap();
        assert_eq!(factory.layout().arity(), 3);
        assert_eq!(registry.resolve("sir").unwrap().fingerprint(), factory.fingerprint());

        assert!(registry.evict("sir"));
        assert!(!registry.evict("sir"));
        assert!(matches!(registry.resolve("sir"), Err(LoadErr::NotFound(_))));
    }

    #[test]
    fn registering_twice_replaces() {
        let registry = ModelRegistry::default();
        let first = registry.register("sir", &blob(0.01)).unwrap();
        let second = registry.register("sir", &blob(0.02)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_ne!(first.fingerprint(), second.fingerprint());
        assert_eq!(registry.resolve("sir").unwrap().fingerprint(), second.fingerprint());
    }

    #[test]
    fn failed_registration_keeps_the_old_entry() {
        let registry = ModelRegistry::default();
        let first = registry.register("sir", &blob(0.01)).unwrap();

        assert!(matches!(
            registry.register("sir", b"not json"),
            Err(LoadErr::Malformed(_))
        ));
        let unknown = ModelSpec::new("neural", json!({})).to_blob().unwrap();
        assert!(matches!(
            registry.register("sir", &unknown),
            Err(LoadErr::UnknownKind(kind)) if kind == "neural"
        ));

        assert_eq!(registry.resolve("sir").unwrap().fingerprint(), first.fingerprint());
    }

    #[test]
    fn pinned_policy_rejects_unknown_fingerprints() {
        let trusted = blob(0.01);
        let trust = TrustPolicy::pinned([fingerprint(&trusted).as_str()]);
        let registry = ModelRegistry::new(Catalog::builtin(), trust);

        assert!(registry.register("sir", &trusted).is_ok());
        assert!(matches!(
            registry.register("sir", &blob(0.5)),
            Err(LoadErr::Untrusted { .. })
        ));
    }

    #[test]
    fn concurrent_readers_never_miss_the_entry() {
        let registry = Arc::new(ModelRegistry::default());
        registry.register("sir", &blob(0.01)).unwrap();

        let writer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..100 {
                    registry.register("sir", &blob(0.01 + i as f64)).unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(registry.resolve("sir").unwrap().layout().arity(), 3);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        registry.clear();
        assert!(registry.is_empty());
    }
}
