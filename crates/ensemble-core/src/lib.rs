//! Core types for the Ensemble multi-agent orchestration engine.
//!
//! This crate provides the shared data model that the orchestrator, the
//! topology state machines, and every agent implementation depend on:
//! versioned artifacts, the append-only message log, the project-state
//! aggregate, and the executor contract.
//!
//! # Main types
//!
//! - [`EnsembleError`] — Unified error enum for all Ensemble subsystems.
//! - [`EnsembleResult`] — Convenience alias for `Result<T, EnsembleError>`.
//! - [`Artifact`] / [`ArtifactStore`] — Versioned, immutable produced content.
//! - [`AgentMessage`] / [`MessageLog`] — Ordered inter-agent communication record.
//! - [`ProjectState`] — The single mutable aggregate shared across a run.
//! - [`TaskExecutor`] — The contract every pluggable agent implements.
//! - [`QaGate`] — Pass/fail predicate over the latest QA report.

/// Versioned artifacts and the artifact store.
pub mod artifact;
/// The executor contract and its structured turn output.
pub mod executor;
/// Inter-agent messages and the append-only message log.
pub mod message;
/// QA gate evaluation and failure signatures.
pub mod qa;
/// The shared project-state aggregate.
pub mod state;

pub use artifact::{Artifact, ArtifactStore};
pub use executor::{
    ArtifactDraft, ReviewOutcome, ReviewStatus, TaskExecutor, TurnOutput, UsageDelta,
};
pub use message::{AgentMessage, MessageLog, MessageType, BROADCAST};
pub use qa::QaGate;
pub use state::{LifecycleField, ProjectState};

// --- Error types ---

/// Top-level error type for the Ensemble engine.
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    /// A role was scheduled that has no registered executor. This is a
    /// configuration precondition violation, not a recoverable runtime
    /// failure.
    #[error("no executor registered for role: {0}")]
    UnknownRole(String),

    /// An executor failed while producing its turn output. The orchestrator
    /// converts this into a failed turn result rather than propagating it.
    #[error("executor error: {0}")]
    Executor(String),

    /// Invalid engine or topology configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience `Result` alias using [`EnsembleError`].
pub type EnsembleResult<T> = Result<T, EnsembleError>;
