use crate::orchestrator::{Orchestrator, TurnResult, ORCHESTRATOR_SENDER};
use crate::topology::{Topology, TopologyControls};
use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleResult, LifecycleField, MessageType, QaGate};
use serde_json::{json, Value};
use tracing::{info, warn};

/// QA-gated iterative rework.
///
/// All build roles run once; then QA runs in a loop. Each failed QA round
/// routes a FEEDBACK message to a target role selected from the bug reports
/// and re-runs it, bounded by two independent counters: the feedback
/// iteration cap, and the stagnant-round cap that aborts when consecutive
/// failures carry an identical failure signature with unchanged
/// backend/frontend versions (the loop is not making progress).
pub struct IterativeFeedbackTopology {
    orchestrator: Orchestrator,
    controls: TopologyControls,
    build_roles: Vec<String>,
    qa_role: String,
    devops_role: String,
    max_feedback_iterations: u32,
    max_stagnant_rounds: u32,
    gate: QaGate,
    default_feedback_role: String,
    /// Ordered keyword markers over bug category/file paths; first match
    /// wins, so frontend/ui take priority over backend/auth.
    feedback_role_map: Vec<(String, String)>,
}

impl IterativeFeedbackTopology {
    /// Creates an iterative-feedback run with the default build roles, QA
    /// gate, and bug-keyword routing.
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            controls: TopologyControls::default(),
            build_roles: ["pm", "architect", "backend_dev", "frontend_dev"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            qa_role: "qa".to_string(),
            devops_role: "devops".to_string(),
            max_feedback_iterations: 2,
            max_stagnant_rounds: 1,
            gate: QaGate::default(),
            default_feedback_role: "backend_dev".to_string(),
            feedback_role_map: [
                ("frontend", "frontend_dev"),
                ("ui", "frontend_dev"),
                ("backend", "backend_dev"),
                ("auth", "backend_dev"),
            ]
            .iter()
            .map(|(marker, role)| (marker.to_string(), role.to_string()))
            .collect(),
        }
    }

    /// Replaces the build role order.
    pub fn with_build_roles(mut self, roles: Vec<String>) -> Self {
        self.build_roles = roles;
        self
    }

    /// Caps the number of feedback iterations.
    pub fn with_max_feedback_iterations(mut self, cap: u32) -> Self {
        self.max_feedback_iterations = cap;
        self
    }

    /// Caps the number of stagnant rounds tolerated before the anti-loop
    /// abort.
    pub fn with_max_stagnant_rounds(mut self, cap: u32) -> Self {
        self.max_stagnant_rounds = cap;
        self
    }

    /// Replaces the QA gate.
    pub fn with_gate(mut self, gate: QaGate) -> Self {
        self.gate = gate;
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

    fn latest_version(&self, artifact_key: &str) -> u32 {
        self.orchestrator
            .state()
            .get_latest_artifact(artifact_key)
            .map_or(0, |artifact| artifact.version)
    }

    /// Scans the latest QA bug reports for category/file keywords to pick
    /// the rework target.
    fn select_feedback_role(&self) -> String {
        let Some(report) = self
            .orchestrator
            .state()
            .get_latest_artifact(LifecycleField::QaReport.as_str())
        else {
            return self.default_feedback_role.clone();
        };
        let Some(bugs) = report.content.get("bug_reports").and_then(Value::as_array) else {
            return self.default_feedback_role.clone();
        };

        for bug in bugs {
            let category = bug
                .get("category")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let file = bug
                .get("file")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let probe = format!("{category} {file}");
            for (marker, role) in &self.feedback_role_map {
                if probe.contains(marker.as_str()) {
                    return role.clone();
                }
            }
        }
        self.default_feedback_role.clone()
    }

    fn route_feedback_task(&mut self, role: &str, reason: &str, iteration: u32) {
        let message = AgentMessage::new(
            ORCHESTRATOR_SENDER,
            role,
            format!("Iterative feedback iteration={iteration}: {reason}"),
            MessageType::Feedback,
        )
        .with_metadata("feedback_iteration", json!(iteration))
        .with_metadata("reason", json!(reason))
        .with_metadata("target_role", json!(role));
        self.orchestrator.route_message(message);
    }
}

#[async_trait]
impl Topology for IterativeFeedbackTopology {
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
        roles.push(self.qa_role.clone());
        roles.push(self.devops_role.clone());
        roles
    }

    async fn run(&mut self, kickoff_content: &str) -> EnsembleResult<Vec<TurnResult>> {
        let Some(first_role) = self.kickoff_receiver(&self.build_roles) else {
            return Ok(Vec::new());
        };
        self.orchestrator.kickoff(&first_role, kickoff_content);

        let mut results = Vec::new();
        for role in self.build_roles.clone() {
            if self.should_skip(&role) {
                continue;
            }
            let attempts = self.run_role(&role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                return Ok(results);
            }
        }

        let qa_role = self.qa_role.clone();
        let devops_role = self.devops_role.clone();
        let mut feedback_iteration: u32 = 0;
        let mut stagnant_rounds: u32 = 0;
        let mut previous_signature: Option<String> = None;
        let mut previous_versions: Option<(u32, u32)> = None;

        loop {
            if self.should_skip(&qa_role) {
                break;
            }

            let attempts = self.run_role(&qa_role).await?;
            let stop = attempts.last().is_some_and(|r| self.should_stop(r));
            results.extend(attempts);
            if stop {
                break;
            }

            if self.gate.passed(self.orchestrator.state()) {
                info!("qa gate passed; proceeding to deployment");
                if !self.should_skip(&devops_role) {
                    let attempts = self.run_role(&devops_role).await?;
                    results.extend(attempts);
                }
                break;
            }

            let current_signature = QaGate::signature(self.orchestrator.state());
            let current_versions = (
                self.latest_version(LifecycleField::BackendCode.as_str()),
                self.latest_version(LifecycleField::FrontendCode.as_str()),
            );

            if previous_signature.as_deref() == Some(current_signature.as_str())
                && previous_versions == Some(current_versions)
            {
                stagnant_rounds += 1;
            } else {
                stagnant_rounds = 0;
            }

            if stagnant_rounds > self.max_stagnant_rounds {
                warn!(signature = %current_signature, stagnant_rounds, "anti-loop triggered");
                results.push(TurnResult::control(
                    &qa_role,
                    format!(
                        "anti-loop triggered: repeated QA failure signature \
                         with unchanged code versions for {stagnant_rounds} rounds"
                    ),
                ));
                break;
            }

            if feedback_iteration >= self.max_feedback_iterations {
                warn!(
                    max_feedback_iterations = self.max_feedback_iterations,
                    "feedback iteration cap reached"
                );
                results.push(TurnResult::control(
                    &qa_role,
                    format!(
                        "feedback iteration cap reached: max_feedback_iterations={}",
                        self.max_feedback_iterations
                    ),
                ));
                break;
            }

            feedback_iteration += 1;
            self.orchestrator.state_mut().increment_iteration();

            let feedback_role = self.select_feedback_role();
            info!(role = %feedback_role, iteration = feedback_iteration, "routing qa feedback");
            self.route_feedback_task(
                &feedback_role,
                &format!("qa gate failed ({current_signature})"),
                feedback_iteration,
            );

            if !self.should_skip(&feedback_role) {
                let attempts = self.run_role(&feedback_role).await?;
                let stop = attempts.last().is_some_and(|r| self.should_stop(r));
                results.extend(attempts);
                if stop {
                    break;
                }
            }

            previous_signature = Some(current_signature);
            previous_versions = Some(current_versions);
        }

        Ok(results)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ensemble_core::Artifact;

    fn topology_with_report(content: Value) -> IterativeFeedbackTopology {
        let mut orchestrator = Orchestrator::new();
        orchestrator
            .state_mut()
            .register_artifact("qa_report", Artifact::new("qa-report", "qa_report", content));
        IterativeFeedbackTopology::new(orchestrator)
    }

    #[test]
    fn test_select_feedback_role_by_category() {
        let topo = topology_with_report(json!({
            "bug_reports": [
                {"bug_id": "BUG-1", "category": "Frontend", "file": "src/App.tsx"},
            ],
        }));
        assert_eq!(topo.select_feedback_role(), "frontend_dev");
    }

    #[test]
    fn test_select_feedback_role_by_file_path() {
        let topo = topology_with_report(json!({
            "bug_reports": [
                {"bug_id": "BUG-1", "category": "Logic", "file": "src/main/java/auth/AuthService.java"},
            ],
        }));
        assert_eq!(topo.select_feedback_role(), "backend_dev");
    }

    #[test]
    fn test_select_feedback_role_defaults_to_backend() {
        let topo = topology_with_report(json!({
            "bug_reports": [
                {"bug_id": "BUG-1", "category": "Docs", "file": "README.md"},
            ],
        }));
        assert_eq!(topo.select_feedback_role(), "backend_dev");

        let no_report = IterativeFeedbackTopology::new(Orchestrator::new());
        assert_eq!(no_report.select_feedback_role(), "backend_dev");
    }

    #[test]
    fn test_frontend_marker_priority_over_backend() {
        // A bug mentioning both surfaces routes to the frontend role: the
        // marker list is ordered.
        let topo = topology_with_report(json!({
            "bug_reports": [
                {"bug_id": "BUG-1", "category": "frontend", "file": "src/backend_client.ts"},
            ],
        }));
        assert_eq!(topo.select_feedback_role(), "frontend_dev");
    }
}
