use crate::artifact::{Artifact, ArtifactStore};
use crate::message::{AgentMessage, MessageLog};
use crate::{EnsembleError, EnsembleResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of lifecycle reference slots on [`ProjectState`].
///
/// State updates produced by executors are validated against this whitelist
/// at the orchestrator boundary; any other key is silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleField {
    /// Requirements document reference.
    Requirements,
    /// Architecture document reference.
    Architecture,
    /// Backend code bundle reference.
    BackendCode,
    /// Frontend code bundle reference.
    FrontendCode,
    /// QA report reference.
    QaReport,
    /// Deployment report reference.
    Deployment,
}

impl LifecycleField {
    /// All lifecycle slots in pipeline order.
    pub const ALL: [LifecycleField; 6] = [
        LifecycleField::Requirements,
        LifecycleField::Architecture,
        LifecycleField::BackendCode,
        LifecycleField::FrontendCode,
        LifecycleField::QaReport,
        LifecycleField::Deployment,
    ];

    /// The snake_case field name used in state updates and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleField::Requirements => "requirements",
            LifecycleField::Architecture => "architecture",
            LifecycleField::BackendCode => "backend_code",
            LifecycleField::FrontendCode => "frontend_code",
            LifecycleField::QaReport => "qa_report",
            LifecycleField::Deployment => "deployment",
        }
    }

    /// Parses a state-update key, returning `None` for anything outside the
    /// whitelist.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

impl std::fmt::Display for LifecycleField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single mutable aggregate shared by the orchestrator and all agents
/// for the duration of a run.
///
/// Mutation happens only through the named methods below; lifecycle slots in
/// particular are reserved for the orchestrator's turn-application step and
/// must never be written by topology or embedding code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    run_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    requirements: Option<serde_json::Value>,
    architecture: Option<serde_json::Value>,
    backend_code: Option<serde_json::Value>,
    frontend_code: Option<serde_json::Value>,
    qa_report: Option<serde_json::Value>,
    deployment: Option<serde_json::Value>,

    iteration: u32,
    total_tokens: u64,
    total_api_calls: u64,

    artifact_store: ArtifactStore,
    message_log: MessageLog,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectState {
    /// Creates a fresh state with a random run id and empty stores.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().simple().to_string(),
            created_at: now,
            updated_at: now,
            requirements: None,
            architecture: None,
            backend_code: None,
            frontend_code: None,
            qa_report: None,
            deployment: None,
            iteration: 0,
            total_tokens: 0,
            total_api_calls: 0,
            artifact_store: ArtifactStore::new(),
            message_log: MessageLog::new(),
        }
    }

    /// Run identity, stable across the whole run.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// When the state was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the state was last mutated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Global iteration counter (meaning depends on the topology: one
    /// coordination cycle, revision loop, or feedback round).
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Cumulative token usage across all turns.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Cumulative API call count across all turns.
    pub fn total_api_calls(&self) -> u64 {
        self.total_api_calls
    }

    /// The versioned artifact store.
    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.artifact_store
    }

    /// The ordered message log.
    pub fn message_log(&self) -> &MessageLog {
        &self.message_log
    }

    /// Reads a lifecycle slot.
    pub fn lifecycle(&self, field: LifecycleField) -> Option<&serde_json::Value> {
        match field {
            LifecycleField::Requirements => self.requirements.as_ref(),
            LifecycleField::Architecture => self.architecture.as_ref(),
            LifecycleField::BackendCode => self.backend_code.as_ref(),
            LifecycleField::FrontendCode => self.frontend_code.as_ref(),
            LifecycleField::QaReport => self.qa_report.as_ref(),
            LifecycleField::Deployment => self.deployment.as_ref(),
        }
    }

    /// Writes a lifecycle slot. `Value::Null` clears the slot, so snapshots
    /// round-trip `null` and absence identically.
    ///
    /// Reserved for the orchestrator's turn-application step.
    pub fn set_lifecycle(&mut self, field: LifecycleField, value: serde_json::Value) {
        let slot = if value.is_null() { None } else { Some(value) };
        match field {
            LifecycleField::Requirements => self.requirements = slot,
            LifecycleField::Architecture => self.architecture = slot,
            LifecycleField::BackendCode => self.backend_code = slot,
            LifecycleField::FrontendCode => self.frontend_code = slot,
            LifecycleField::QaReport => self.qa_report = slot,
            LifecycleField::Deployment => self.deployment = slot,
        }
        self.touch();
    }

    /// Registers an artifact version under `key` and returns the stored copy.
    pub fn register_artifact(&mut self, key: &str, artifact: Artifact) -> &Artifact {
        self.touch();
        self.artifact_store.register(key, artifact)
    }

    /// Latest registered version of `key`, if any.
    pub fn get_latest_artifact(&self, key: &str) -> Option<&Artifact> {
        self.artifact_store.get_latest(key)
    }

    /// Appends a message to the log.
    pub fn add_message(&mut self, message: AgentMessage) {
        self.message_log.append(message);
        self.touch();
    }

    /// Advances the global iteration counter by one.
    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
        self.touch();
    }

    /// Accumulates usage deltas into the running totals. Counters are
    /// monotonically non-decreasing.
    pub fn update_usage(&mut self, token_delta: u64, api_call_delta: u64) {
        self.total_tokens += token_delta;
        self.total_api_calls += api_call_delta;
        self.touch();
    }

    /// Serializes the full aggregate to a JSON snapshot.
    pub fn to_json(&self) -> EnsembleResult<String> {
        serde_json::to_string_pretty(self).map_err(EnsembleError::from)
    }

    /// Restores a state from a JSON snapshot produced by [`Self::to_json`].
    pub fn from_json(snapshot: &str) -> EnsembleResult<Self> {
        serde_json::from_str(snapshot).map_err(EnsembleError::from)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
