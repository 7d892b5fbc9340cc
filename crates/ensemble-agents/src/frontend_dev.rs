use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, LifecycleField, MessageLog, MessageType, ProjectState,
    TaskExecutor, TurnOutput,
};
use serde_json::json;

/// Produces the frontend code bundle for the auth flow.
#[derive(Default)]
pub struct FrontendDeveloperAgent {
    memory: MessageLog,
}

impl FrontendDeveloperAgent {
    /// Creates the agent for the `frontend_dev` role.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutor for FrontendDeveloperAgent {
    fn role(&self) -> &str {
        "frontend_dev"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let code_bundle = json!({
            "src/components/RegisterForm.tsx":
                "export function RegisterForm() {\n  return null;\n}\n",
            "src/components/LoginForm.tsx":
                "export function LoginForm() {\n  return null;\n}\n",
        });
        let frontend_artifact = json!({
            "module": "auth-ui",
            "changed_files": [
                "src/components/RegisterForm.tsx",
                "src/components/LoginForm.tsx",
            ],
            "code_bundle": code_bundle,
            "build_notes": {"bundle_status": "simulated_pass"},
            "test_notes": {"component_tests": "simulated_pending"},
        });

        Ok(TurnOutput::new()
            .with_state_update(
                LifecycleField::FrontendCode,
                json!({"artifact_ref": "frontend_code:v1"}),
            )
            .with_artifact(
                "frontend_code",
                Artifact::new("frontend-auth-ui", "frontend_code", frontend_artifact)
                    .with_metadata("generation", json!({"mode": "rule_based"})),
            )
            .with_message(
                AgentMessage::draft(
                    "qa",
                    "Frontend auth flow ready for QA validation.",
                    MessageType::Task,
                )
                .with_artifacts(vec!["frontend-auth-ui:v1".to_string()]),
            )
            .with_usage(610, 1))
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }
}
