use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, EnsembleResult, LifecycleField, MessageLog, MessageType, ProjectState, QaGate,
    TaskExecutor, TurnOutput,
};
use serde_json::json;

/// Routes hub-and-spoke turns by inspecting the shared project state.
///
/// The routing decision is a fixed priority walk over the lifecycle slots:
/// the first unfilled slot names the next specialist. Once all slots are
/// filled, the QA gate decides between deployment and rework, with a bounded
/// retry budget so a persistently failing gate cannot loop forever.
pub struct CoordinatorAgent {
    memory: MessageLog,
    gate: QaGate,
    max_qa_retries: u32,
    qa_fallback_role: String,
    qa_retry_count: u32,
}

impl Default for CoordinatorAgent {
    fn default() -> Self {
        Self {
            memory: MessageLog::default(),
            gate: QaGate::default(),
            max_qa_retries: 1,
            qa_fallback_role: "backend_dev".to_string(),
            qa_retry_count: 0,
        }
    }
}

impl CoordinatorAgent {
    /// Creates the agent for the `coordinator` role with default budgets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many rework rounds a failing QA gate may trigger.
    pub fn with_max_qa_retries(mut self, max_qa_retries: u32) -> Self {
        self.max_qa_retries = max_qa_retries;
        self
    }

    /// Sets the role that receives rework tasks after a failed gate.
    pub fn with_qa_fallback_role(mut self, role: impl Into<String>) -> Self {
        self.qa_fallback_role = role.into();
        self
    }

    fn latest_version(state: &ProjectState, key: &str) -> u32 {
        state.get_latest_artifact(key).map_or(0, |a| a.version)
    }

    /// Returns the next role to run, or `None` with a stop reason.
    fn decide_next_role(&mut self, state: &ProjectState) -> (Option<String>, String) {
        let missing = [
            (LifecycleField::Requirements, "pm", "requirements missing"),
            (LifecycleField::Architecture, "architect", "architecture missing"),
            (
                LifecycleField::BackendCode,
                "backend_dev",
                "backend implementation missing",
            ),
            (
                LifecycleField::FrontendCode,
                "frontend_dev",
                "frontend implementation missing",
            ),
            (LifecycleField::QaReport, "qa", "qa validation pending"),
        ];
        for (field, role, reason) in missing {
            if state.lifecycle(field).is_none() {
                return (Some(role.to_string()), reason.to_string());
            }
        }

        if state.lifecycle(LifecycleField::Deployment).is_some() {
            return (None, "deployment completed".to_string());
        }

        if self.gate.passed(state) {
            return (Some("devops".to_string()), "qa gate passed".to_string());
        }

        let qa_version = Self::latest_version(state, LifecycleField::QaReport.as_str());
        let backend_version = Self::latest_version(state, LifecycleField::BackendCode.as_str());
        let frontend_version = Self::latest_version(state, LifecycleField::FrontendCode.as_str());

        if backend_version.max(frontend_version) > qa_version {
            return (
                Some("qa".to_string()),
                "re-run qa after code changes".to_string(),
            );
        }

        if self.qa_retry_count < self.max_qa_retries {
            self.qa_retry_count += 1;
            return (
                Some(self.qa_fallback_role.clone()),
                "qa gate failed, request rework".to_string(),
            );
        }

        (None, "qa gate failed after retry budget".to_string())
    }
}

#[async_trait]
impl TaskExecutor for CoordinatorAgent {
    fn role(&self) -> &str {
        "coordinator"
    }

    async fn act(&mut self, state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let (next_role, reason) = self.decide_next_role(state);

        let output = match next_role {
            None => TurnOutput::new()
                .with_message(
                    AgentMessage::draft(
                        "orchestrator",
                        format!("Coordinator stop: {reason}"),
                        MessageType::Status,
                    )
                    .with_metadata("phase", json!("complete"))
                    .with_metadata("reason", json!(reason)),
                )
                .with_stop(),
            Some(role) => TurnOutput::new().with_message(
                AgentMessage::draft(
                    &role,
                    format!("Coordinator route -> {role}: {reason}"),
                    MessageType::Task,
                )
                .with_metadata("next_role", json!(role))
                .with_metadata("route_reason", json!(reason)),
            ),
        };

        Ok(output.with_usage(180, 1))
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }
}
