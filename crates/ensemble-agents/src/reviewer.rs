use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, MessageLog, ProjectState, ReviewOutcome, TaskExecutor,
    TurnOutput,
};
use std::collections::HashSet;

/// Deterministic peer reviewer for code artifacts.
///
/// Artifacts outside the target set are waved through. For targets, the
/// first version is rejected when `enforce_second_pass` is set; later
/// versions are approved. The act turn is a no-op: this agent only exists
/// to serve review requests.
pub struct PeerReviewerAgent {
    memory: MessageLog,
    enforce_second_pass: bool,
    review_targets: HashSet<String>,
}

impl Default for PeerReviewerAgent {
    fn default() -> Self {
        Self {
            memory: MessageLog::default(),
            enforce_second_pass: true,
            review_targets: ["backend_code", "frontend_code"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl PeerReviewerAgent {
    /// Creates the agent for the `reviewer` role with default targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controls whether first versions of target artifacts are rejected.
    pub fn with_enforce_second_pass(mut self, enforce: bool) -> Self {
        self.enforce_second_pass = enforce;
        self
    }

    /// Replaces the set of artifact types subject to the review gate.
    pub fn with_review_targets(mut self, targets: HashSet<String>) -> Self {
        self.review_targets = targets;
        self
    }
}

#[async_trait]
impl TaskExecutor for PeerReviewerAgent {
    fn role(&self) -> &str {
        "reviewer"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        Ok(TurnOutput::new())
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }

    fn review(&mut self, artifact: &Artifact) -> ReviewOutcome {
        if !self.review_targets.contains(&artifact.artifact_type) {
            return ReviewOutcome::approved(
                self.role(),
                vec![format!(
                    "{} does not require peer review gate.",
                    artifact.artifact_type
                )],
            );
        }

        if self.enforce_second_pass && artifact.version == 1 {
            return ReviewOutcome::revision_needed(
                self.role(),
                vec!["Initial submission needs revision for production-readiness checks.".into()],
                vec![format!(
                    "{}:v1 requires one revision round",
                    artifact.artifact_type
                )],
            );
        }

        ReviewOutcome::approved(
            self.role(),
            vec![format!(
                "{}:v{} approved",
                artifact.artifact_type, artifact.version
            )],
        )
    }
}
