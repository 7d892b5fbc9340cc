use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, LifecycleField, MessageLog, MessageType, ProjectState,
    TaskExecutor, TurnOutput,
};
use serde_json::json;

/// Produces the backend code bundle for the auth module. Each act registers
/// a fresh artifact version, so rework turns advance `backend_code`.
#[derive(Default)]
pub struct BackendDeveloperAgent {
    memory: MessageLog,
}

impl BackendDeveloperAgent {
    /// Creates the agent for the `backend_dev` role.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutor for BackendDeveloperAgent {
    fn role(&self) -> &str {
        "backend_dev"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let code_bundle = json!({
            "src/main/java/com/example/auth/AuthController.java":
                "package com.example.auth;\npublic class AuthController {\n}\n",
            "src/main/java/com/example/auth/AuthService.java":
                "package com.example.auth;\npublic class AuthService {\n}\n",
        });
        let backend_artifact = json!({
            "module": "auth",
            "changed_files": [
                "src/main/java/com/example/auth/AuthController.java",
                "src/main/java/com/example/auth/AuthService.java",
            ],
            "code_bundle": code_bundle,
            "build_notes": {"compile_status": "simulated_pass"},
            "test_notes": {"unit_tests": "simulated_pending"},
        });

        Ok(TurnOutput::new()
            .with_state_update(
                LifecycleField::BackendCode,
                json!({"artifact_ref": "backend_code:v1"}),
            )
            .with_artifact(
                "backend_code",
                Artifact::new("backend-auth-module", "backend_code", backend_artifact)
                    .with_metadata("generation", json!({"mode": "rule_based"})),
            )
            .with_message(
                AgentMessage::draft(
                    "frontend_dev",
                    "Backend auth module ready for frontend integration.",
                    MessageType::Task,
                )
                .with_artifacts(vec!["backend-auth-module:v1".to_string()]),
            )
            .with_usage(680, 1))
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_produces_backend_bundle() {
        let mut agent = BackendDeveloperAgent::new();
        let output = agent.act(&ProjectState::new()).await.unwrap();
        assert_eq!(output.artifacts[0].store_key, "backend_code");
        assert_eq!(output.messages[0].receiver, "frontend_dev");
        assert_eq!(output.usage.tokens, 680);
    }
}
