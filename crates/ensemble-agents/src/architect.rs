use async_trait::async_trait;
use ensemble_core::{
    AgentMessage, Artifact, EnsembleResult, LifecycleField, MessageLog, MessageType, ProjectState,
    TaskExecutor, TurnOutput,
};
use serde_json::json;

/// Derives the architecture document from the requirements.
#[derive(Default)]
pub struct ArchitectAgent {
    memory: MessageLog,
}

impl ArchitectAgent {
    /// Creates the agent for the `architect` role.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskExecutor for ArchitectAgent {
    fn role(&self) -> &str {
        "architect"
    }

    async fn act(&mut self, _state: &ProjectState) -> EnsembleResult<TurnOutput> {
        let architecture = json!({
            "tech_stack": {
                "backend": {"language": "Java 17", "framework": "Spring Boot 3.x"},
                "frontend": {"framework": "React 18"},
                "database": {"primary": "PostgreSQL 15"},
                "infrastructure": {"container": "Docker"},
            },
            "modules": [
                {
                    "name": "auth-module",
                    "responsibility": "User registration, login, and JWT handling",
                    "dependencies": [],
                },
            ],
            "database_schema": {
                "tables": [{"name": "users", "columns": ["id", "username", "password_hash"]}],
            },
            "openapi_spec": {
                "paths": {
                    "/auth/register": {"post": {"summary": "Register user"}},
                    "/auth/login": {"post": {"summary": "Login user"}},
                },
            },
            "deployment": {
                "containers": ["backend", "frontend", "postgres"],
                "networking": {"mode": "bridge"},
            },
        });

        Ok(TurnOutput::new()
            .with_state_update(
                LifecycleField::Architecture,
                json!({"artifact_ref": "architecture:v1"}),
            )
            .with_artifact(
                "architecture",
                Artifact::new("architecture-doc", "architecture", architecture)
                    .with_metadata("generation", json!({"mode": "rule_based"})),
            )
            .with_message(
                AgentMessage::draft(
                    "backend_dev",
                    "Architecture ready for backend implementation.",
                    MessageType::Task,
                )
                .with_artifacts(vec!["architecture-doc:v1".to_string()]),
            )
            .with_usage(520, 1))
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
    async fn test_produces_architecture() {
        let mut agent = ArchitectAgent::new();
        let output = agent.act(&ProjectState::new()).await.unwrap();
        assert!(output.state_updates.contains_key("architecture"));
        assert_eq!(output.messages[0].receiver, "backend_dev");
        assert_eq!(output.usage.tokens, 520);
    }
}
