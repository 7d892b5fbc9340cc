use crate::artifact::Artifact;
use crate::message::AgentMessage;
use crate::state::{LifecycleField, ProjectState};
use crate::EnsembleResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token and API-call usage incurred by one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageDelta {
    /// Tokens consumed by the turn.
    pub tokens: u64,
    /// API calls made by the turn.
    pub api_calls: u64,
}

impl UsageDelta {
    /// True if the delta would not change the running totals.
    pub fn is_zero(&self) -> bool {
        self.tokens == 0 && self.api_calls == 0
    }
}

/// An artifact paired with the store key it should be registered under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDraft {
    /// Logical artifact-store key (e.g. `"backend_code"`).
    pub store_key: String,
    /// The artifact to register.
    pub artifact: Artifact,
}

/// Structured output of one executor turn.
///
/// Every part is optional; an empty output is a valid no-op turn. The record
/// is validated at the orchestrator boundary: state-update keys outside the
/// [`LifecycleField`] whitelist are silently dropped, and empty senders and
/// producers default to the acting role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnOutput {
    /// Lifecycle slot updates, keyed by field name.
    #[serde(default)]
    pub state_updates: BTreeMap<String, serde_json::Value>,
    /// Artifacts to register, in order.
    #[serde(default)]
    pub artifacts: Vec<ArtifactDraft>,
    /// Messages to route, in order.
    #[serde(default)]
    pub messages: Vec<AgentMessage>,
    /// Usage incurred by this turn.
    #[serde(default)]
    pub usage: UsageDelta,
    /// Cooperative termination request, honored between turns.
    #[serde(default)]
    pub stop: bool,
}

impl TurnOutput {
    /// Creates an empty (no-op) output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a lifecycle slot update.
    pub fn with_state_update(mut self, field: LifecycleField, value: serde_json::Value) -> Self {
        self.state_updates.insert(field.as_str().to_string(), value);
        self
    }

    /// Adds an artifact to register under `store_key`.
    pub fn with_artifact(mut self, store_key: impl Into<String>, artifact: Artifact) -> Self {
        self.artifacts.push(ArtifactDraft {
            store_key: store_key.into(),
            artifact,
        });
        self
    }

    /// Adds a message to route.
    pub fn with_message(mut self, message: AgentMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets the usage incurred by this turn.
    pub fn with_usage(mut self, tokens: u64, api_calls: u64) -> Self {
        self.usage = UsageDelta { tokens, api_calls };
        self
    }

    /// Requests cooperative termination after this turn.
    pub fn with_stop(mut self) -> Self {
        self.stop = true;
        self
    }
}

/// Verdict of a peer review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// The artifact may proceed to the next stage.
    Approved,
    /// The artifact must be revised by its producer.
    RevisionNeeded,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Approved => write!(f, "approved"),
            ReviewStatus::RevisionNeeded => write!(f, "revision_needed"),
        }
    }
}

/// Full result of reviewing one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    /// The verdict.
    pub status: ReviewStatus,
    /// Free-form reviewer commentary.
    pub comments: Vec<String>,
    /// Issues that block approval, if any.
    #[serde(default)]
    pub blocking_issues: Vec<String>,
    /// Role of the reviewer that produced this outcome.
    pub reviewer: String,
}

impl ReviewOutcome {
    /// Creates an approving outcome.
    pub fn approved(reviewer: impl Into<String>, comments: Vec<String>) -> Self {
        Self {
            status: ReviewStatus::Approved,
            comments,
            blocking_issues: Vec::new(),
            reviewer: reviewer.into(),
        }
    }

    /// Creates a rejecting outcome with the issues that block approval.
    pub fn revision_needed(
        reviewer: impl Into<String>,
        comments: Vec<String>,
        blocking_issues: Vec<String>,
    ) -> Self {
        Self {
            status: ReviewStatus::RevisionNeeded,
            comments,
            blocking_issues,
            reviewer: reviewer.into(),
        }
    }
}

/// The uniform contract every agent exposes to the orchestrator.
///
/// Content generation is external to the engine: the orchestrator depends
/// only on this trait, never on concrete agent types. `act` receives a
/// read-only snapshot of the shared state and returns the structured output
/// to merge; returning an error is permitted and is treated as a failed turn
/// with no state applied.
#[async_trait]
pub trait TaskExecutor: Send {
    /// The role name this executor is registered under.
    fn role(&self) -> &str;

    /// Produces this turn's output from the current shared state.
    async fn act(&mut self, state: &ProjectState) -> EnsembleResult<TurnOutput>;

    /// Delivers a routed message to this executor's private inbox. The
    /// default implementation discards it.
    fn receive(&mut self, _message: &AgentMessage) {}

    /// Reviews an artifact. The default implementation approves.
    fn review(&mut self, artifact: &Artifact) -> ReviewOutcome {
        ReviewOutcome::approved(
            self.role(),
            vec![format!(
                "{} review passed for {}",
                self.role(),
                artifact.artifact_id
            )],
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_output_builder() {
        let output = TurnOutput::new()
            .with_state_update(LifecycleField::QaReport, json!({"artifact_ref": "qa_report:v1"}))
            .with_artifact(
                "qa_report",
                Artifact::new("qa-report-auth", "qa_report", json!({"summary": {}})),
            )
            .with_usage(470, 1)
            .with_stop();
        assert_eq!(output.state_updates.len(), 1);
        assert_eq!(output.artifacts[0].store_key, "qa_report");
        assert_eq!(output.usage.tokens, 470);
        assert!(output.stop);
    }

    #[test]
    fn test_empty_output_is_noop() {
        let output = TurnOutput::new();
        assert!(output.state_updates.is_empty());
        assert!(output.artifacts.is_empty());
        assert!(output.messages.is_empty());
        assert!(output.usage.is_zero());
        assert!(!output.stop);
    }

    #[test]
    fn test_output_deserializes_from_partial_json() {
        // External executors may produce only some of the five parts.
        let output: TurnOutput =
            serde_json::from_str(r#"{"usage": {"tokens": 100, "api_calls": 1}, "stop": true}"#)
                .unwrap();
        assert_eq!(output.usage.tokens, 100);
        assert!(output.stop);
        assert!(output.artifacts.is_empty());
    }

    #[test]
    fn test_review_outcome_constructors() {
        let ok = ReviewOutcome::approved("reviewer", vec!["looks good".into()]);
        assert_eq!(ok.status, ReviewStatus::Approved);
        assert!(ok.blocking_issues.is_empty());

        let nope = ReviewOutcome::revision_needed(
            "reviewer",
            vec!["needs work".into()],
            vec!["backend_code:v1 requires one revision round".into()],
        );
        assert_eq!(nope.status, ReviewStatus::RevisionNeeded);
        assert_eq!(nope.blocking_issues.len(), 1);
    }
}
