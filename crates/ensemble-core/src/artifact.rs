use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A versioned, immutable unit of produced content.
///
/// An artifact is owned by the [`ArtifactStore`] once registered. It is never
/// mutated afterwards: a "new version" is a new `Artifact` registered under
/// the same store key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable identity of this artifact (e.g. `"requirements-doc"`).
    pub artifact_id: String,
    /// Kind of content this artifact carries (e.g. `"backend_code"`).
    pub artifact_type: String,
    /// Role that produced the artifact. May be left empty on a draft; the
    /// orchestrator fills in the acting role at registration time.
    #[serde(default)]
    pub producer: String,
    /// Opaque content payload.
    pub content: serde_json::Value,
    /// Generation provenance (model, mode, prompt hashes, ...).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Version assigned by the store at registration. `0` means the artifact
    /// has not been registered yet.
    #[serde(default)]
    pub version: u32,
}

impl Artifact {
    /// Creates an unregistered artifact draft.
    pub fn new(
        artifact_id: impl Into<String>,
        artifact_type: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            artifact_type: artifact_type.into(),
            producer: String::new(),
            content,
            metadata: HashMap::new(),
            version: 0,
        }
    }

    /// Sets the producing role.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Attaches a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Versioned registry of named artifact histories.
///
/// Versions for a key are exactly `1..N` in registration order. Unknown keys
/// are represented as absence, never as errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactStore {
    versions: BTreeMap<String, Vec<Artifact>>,
}

impl ArtifactStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new version of `key`, assigning `version = N + 1`, and
    /// returns the stored artifact.
    pub fn register(&mut self, key: &str, mut artifact: Artifact) -> &Artifact {
        let versions = self.versions.entry(key.to_string()).or_default();
        artifact.version = versions.len() as u32 + 1;
        versions.push(artifact);
        // Just pushed, so the list is non-empty.
        &versions[versions.len() - 1]
    }

    /// Returns the most recently registered version of `key`, if any.
    pub fn get_latest(&self, key: &str) -> Option<&Artifact> {
        self.versions.get(key).and_then(|v| v.last())
    }

    /// Returns a specific version of `key`. Versions are 1-based; `0` or a
    /// version past the end yields `None`.
    pub fn get_version(&self, key: &str, version: u32) -> Option<&Artifact> {
        if version == 0 {
            return None;
        }
        self.versions
            .get(key)
            .and_then(|v| v.get(version as usize - 1))
    }

    /// Returns the registered version numbers for `key`, in order.
    pub fn list_versions(&self, key: &str) -> Vec<u32> {
        self.versions
            .get(key)
            .map(|v| v.iter().map(|a| a.version).collect())
            .unwrap_or_default()
    }

    /// Returns all store keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }
}
