use serde::{Deserialize, Serialize};

/// Wire-level model definition, the payload of a model's code blob.
///
/// `kind` is an opaque identifier (e.g. "population") resolved by the model
/// catalog on the receiving side, `version` selects a revision of that kind
/// and `params` carries arbitrary JSON configuration for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub kind: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub params: serde_json::Value,
}

fn default_version() -> u32 {
    1
}

impl ModelSpec {
    /// Creates a new `ModelSpec` for the first version of `kind`.
    pub fn new(kind: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            version: default_version(),
            params,
        }
    }

    /// Serializes this spec into a code blob.
    pub fn to_blob(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
