use crate::orchestrator::{Orchestrator, TurnResult};
use crate::topology::{Topology, TopologyControls};
use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleResult, MessageType, ReviewStatus};
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

/// Bounded peer-review revision loops.
///
/// Each build role with a configured review target runs producer turn →
/// review → (on rejection) back to the producer, consuming one unit of the
/// per-artifact revision budget per loop. Build roles without a target run
/// once via the shared machinery. When the budget is exhausted, `fail_fast`
/// decides between aborting the whole run and proceeding to QA/deployment
/// over the unresolved revision — the latter is an explicit, intentional
/// configuration knob, not the default.
pub struct PeerReviewTopology {
    orchestrator: Orchestrator,
    controls: TopologyControls,
    reviewer_role: String,
    build_roles: Vec<String>,
    review_targets: HashMap<String, String>,
    qa_role: String,
    devops_role: String,
    max_revisions_per_target: u32,
}

impl PeerReviewTopology {
    /// Creates a peer-review run with the default build roles and review
    /// targets (backend and frontend code), allowing one revision per
    /// artifact.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            controls: TopologyControls::default(),
            reviewer_role: "reviewer".to_string(),
            build_roles: ["pm", "architect", "backend_dev", "frontend_dev"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            review_targets: HashMap::from([
                ("backend_dev".to_string(), "backend_code".to_string()),
                ("frontend_dev".to_string(), "frontend_code".to_string()),
            ]),
            qa_role: "qa".to_string(),
            devops_role: "devops".to_string(),
            max_revisions_per_target: 1,
        }
    }

    /// Replaces the reviewer role name.
    pub fn with_reviewer_role(mut self, role: impl Into<String>) -> Self {
        self.reviewer_role = role.into();
        self
    }

    /// Replaces the build role order.
    pub fn with_build_roles(mut self, roles: Vec<String>) -> Self {
        self.build_roles = roles;
        self
    }

    /// Replaces the role → artifact-key review-target map.
    pub fn with_review_targets(mut self, targets: HashMap<String, String>) -> Self {
        self.review_targets = targets;
        self
    }

    /// Sets the per-artifact revision budget.
    pub fn with_max_revisions(mut self, max_revisions_per_target: u32) -> Self {
        self.max_revisions_per_target = max_revisions_per_target;
        self
    }

    /// Replaces the scheduling controls.
    pub fn with_controls(mut self, controls: TopologyControls) -> Self {
        self.controls = controls;
        self
    }

    /// Consumes the topology, returning the scheduler and its final state.
    pub fn into_orchestrator(self) -> Orchestrator {
        self.orchestrator
    }

    /// Records the review round in the message log.
    fn send_review_message(
        &mut self,
        producer_role: &str,
        artifact_key: &str,
        status: ReviewStatus,
        revision_round: u32,
        comments: &[String],
    ) {
        let message = AgentMessage::new(
            self.reviewer_role.clone(),
            producer_role,
            format!("{artifact_key} review={status}; round={revision_round}"),
            MessageType::Review,
        )
        .with_metadata("artifact_key", json!(artifact_key))
        .with_metadata("review_status", json!(status.to_string()))
        .with_metadata("revision_round", json!(revision_round))
        .with_metadata("comments", json!(comments));
        self.orchestrator.route_message(message);
    }

    /// Synthesizes a reviewer turn result for the run history. Review rounds
    /// do not pass through the scheduler, so they carry no usage.
    fn review_turn(&self, approved: bool, stop: bool, error: Option<String>) -> TurnResult {
        TurnResult {
            role: self.reviewer_role.clone(),
            success: approved,
            artifacts_registered: Vec::new(),
            messages_emitted: 0,
            usage_tokens: 0,
            usage_api_calls: 0,
            updated_fields: Vec::new(),
            stop,
            error,
        }
    }

    /// Runs one producer under the review loop. Returns whether the run may
    /// continue to the next build role.
    async fn run_producer_with_review(
        &mut self,
        results: &mut Vec<TurnResult>,
        producer_role: &str,
        artifact_key: &str,
    ) -> EnsembleResult<bool> {
        let reviewer = self.reviewer_role.clone();
        let mut revisions: u32 = 0;

        loop {
            let attempts = self.run_role(producer_role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                return Ok(false);
            }

            // A missing artifact is treated exactly like a rejection, subject
            // to the same fail-fast policy.
            let Some(artifact) = self
                .orchestrator
                .state()
                .get_latest_artifact(artifact_key)
                .cloned()
            else {
                let fail_fast = self.controls.fail_fast;
                warn!(producer_role, artifact_key, "no artifact to review");
                results.push(self.review_turn(
                    false,
                    fail_fast,
                    Some(format!("missing artifact for key={artifact_key}")),
                ));
                return Ok(!fail_fast);
            };

            let outcome = self.orchestrator.review_artifact(&reviewer, &artifact)?;
            self.send_review_message(
                producer_role,
                artifact_key,
                outcome.status,
                revisions,
                &outcome.comments,
            );
            results.push(self.review_turn(outcome.status == ReviewStatus::Approved, false, None));

            if outcome.status == ReviewStatus::Approved {
                info!(producer_role, artifact_key, round = revisions, "review approved");
                return Ok(true);
            }

            if revisions >= self.max_revisions_per_target {
                let fail_fast = self.controls.fail_fast;
                warn!(
                    producer_role,
                    artifact_key,
                    max_revisions = self.max_revisions_per_target,
                    fail_fast,
                    "revision budget exhausted"
                );
                results.push(self.review_turn(
                    false,
                    fail_fast,
                    Some(format!(
                        "revision budget exhausted for {producer_role}: max_revisions={}",
                        self.max_revisions_per_target
                    )),
                ));
                return Ok(!fail_fast);
            }

            revisions += 1;
            self.orchestrator.state_mut().increment_iteration();
        }
    }
}

#[async_trait]
impl Topology for PeerReviewTopology {
    fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    fn controls(&self) -> &TopologyControls {
        &self.controls
    }

    fn plan_roles(&self) -> Vec<String> {
        let mut roles = self.build_roles.clone();
        roles.push(self.reviewer_role.clone());
        roles.push(self.qa_role.clone());
        roles.push(self.devops_role.clone());
        roles
    }

    async fn run(&mut self, kickoff_content: &str) -> EnsembleResult<Vec<TurnResult>> {
        let Some(first_role) = self.build_roles.first().cloned() else {
            return Ok(Vec::new());
        };
        if self.should_skip(&self.reviewer_role) {
            return Ok(Vec::new());
        }

        self.orchestrator.kickoff(&first_role, kickoff_content);
        let mut results = Vec::new();
        let mut aborted = false;

        for role in self.build_roles.clone() {
            if self.should_skip(&role) {
                continue;
            }

            if let Some(artifact_key) = self.review_targets.get(&role).cloned() {
                let proceed = self
                    .run_producer_with_review(&mut results, &role, &artifact_key)
                    .await?;
                if !proceed {
                    aborted = true;
                    break;
                }
                continue;
            }

            let attempts = self.run_role(&role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                return Ok(results);
            }
        }

        if aborted {
            return Ok(results);
        }

        for role in [self.qa_role.clone(), self.devops_role.clone()] {
            if self.should_skip(&role) {
                continue;
            }
            let attempts = self.run_role(&role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                break;
            }
        }

        Ok(results)
    }
}
