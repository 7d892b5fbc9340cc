use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, LifecycleField, MessageLog, MessageType, ProjectState,
    TaskExecutor, TurnOutput,
};
use serde_json::json;

/// Generates a structured requirements document from the project brief.
#[derive(Default)]
pub struct ProductManagerAgent {
    memory: MessageLog,
}

impl ProductManagerAgent {
    /// Creates the agent for the `pm` role.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutor for ProductManagerAgent {
    fn role(&self) -> &str {
        "pm"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let requirements = json!({
            "project_name": "StayBooking",
            "functional_requirements": [
                {
                    "id": "FR-001",
                    "user_story": "As a guest, I want to register and login using JWT.",
                    "acceptance_criteria": [
                        "Given valid registration data, user account is created",
                        "Given valid credentials, JWT is returned on login",
                    ],
                    "priority": "Must",
                    "complexity": "Low",
                },
            ],
            "non_functional_requirements": [
                {"id": "NFR-001", "description": "Token-based authentication required"},
            ],
            "api_contracts": [
                {"endpoint": "/auth/register", "method": "POST", "auth_required": false},
                {"endpoint": "/auth/login", "method": "POST", "auth_required": false},
            ],
            "data_model": {"entities": ["User"], "relationships": []},
        });

        Ok(TurnOutput::new()
            .with_state_update(
                LifecycleField::Requirements,
                json!({"artifact_ref": "requirements:v1"}),
            )
            .with_artifact(
                "requirements",
                Artifact::new("requirements-doc", "requirements", requirements)
                    .with_metadata("generation", json!({"mode": "rule_based"})),
            )
            .with_message(
                AgentMessage::draft(
                    "architect",
                    "Requirements ready for architecture design.",
                    MessageType::Task,
                )
                .with_artifacts(vec!["requirements-doc:v1".to_string()]),
            )
            .with_usage(420, 1))
    }

    fn receive(&mut self, message: &AgentMessage) {
        self.memory.append(message.clone());
    }
}
